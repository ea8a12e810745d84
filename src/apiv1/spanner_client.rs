use std::sync::Arc;

use tonic::metadata::MetadataValue;
use tonic::{Code, Request, Response, Status};

use crate::apiv1::service::SpannerService;
use crate::proto::spanner::{
    BeginTransactionRequest, CommitRequest, CommitResponse, CreateSessionRequest, DeleteSessionRequest,
    ExecuteBatchDmlRequest, ExecuteBatchDmlResponse, ExecuteSqlRequest, GetSessionRequest, ReadRequest, ResultSet,
    RollbackRequest, Session, Transaction,
};
use crate::retry::{invoke, RetrySetting};

const RESOURCE_PREFIX_HEADER: &str = "google-cloud-resource-prefix";
const ROUTE_TO_LEADER_HEADER: &str = "x-goog-spanner-route-to-leader";
const REQUEST_PARAMS_HEADER: &str = "x-goog-request-params";

pub(crate) fn ping_query_request(session_name: impl Into<String>) -> ExecuteSqlRequest {
    ExecuteSqlRequest {
        session: session_name.into(),
        sql: "SELECT 1".to_string(),
        ..Default::default()
    }
}

/// Session management RPCs also retry plain unavailability.
fn session_setting() -> RetrySetting {
    RetrySetting {
        codes: vec![Code::Unavailable],
        ..Default::default()
    }
}

/// Transaction-path RPCs retry nothing but stream resets; Aborted belongs to
/// the runner and Unavailable would risk replaying a commit.
fn transaction_setting() -> RetrySetting {
    RetrySetting {
        codes: vec![],
        ..Default::default()
    }
}

/// Thin RPC client: stamps per-call metadata (resource prefix, leader-aware
/// routing, request params) and wraps each unary call in the transparent
/// transient-retry loop.
#[derive(Clone)]
pub struct Client {
    inner: Arc<dyn SpannerService>,
    resource_prefix: String,
    route_to_leader: bool,
}

impl Client {
    pub fn new(inner: Arc<dyn SpannerService>, database: impl Into<String>, route_to_leader: bool) -> Client {
        Client {
            inner,
            resource_prefix: database.into(),
            route_to_leader,
        }
    }

    /// The database this client is scoped to.
    pub fn database(&self) -> &str {
        &self.resource_prefix
    }

    fn request<T>(&self, param: String, message: T, leader_routed: bool) -> Request<T> {
        let mut request = Request::new(message);
        let metadata = request.metadata_mut();
        metadata.insert(RESOURCE_PREFIX_HEADER, self.resource_prefix.parse().unwrap());
        metadata.insert(REQUEST_PARAMS_HEADER, param.parse().unwrap());
        if leader_routed && self.route_to_leader {
            metadata.insert(ROUTE_TO_LEADER_HEADER, MetadataValue::from_static("true"));
        }
        request
    }

    pub async fn create_session(
        &self,
        req: CreateSessionRequest,
        retry: Option<RetrySetting>,
    ) -> Result<Response<Session>, Status> {
        let setting = retry.unwrap_or_else(session_setting);
        let database = req.database.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("database={database}"), req.clone(), false);
            self.inner.create_session(request)
        })
        .await
    }

    /// Returns NOT_FOUND if the session does not exist. Mainly useful for
    /// determining whether a session is still alive.
    pub async fn get_session(
        &self,
        req: GetSessionRequest,
        retry: Option<RetrySetting>,
    ) -> Result<Response<Session>, Status> {
        let setting = retry.unwrap_or_else(session_setting);
        let name = req.name.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("name={name}"), req.clone(), false);
            self.inner.get_session(request)
        })
        .await
    }

    pub async fn delete_session(
        &self,
        req: DeleteSessionRequest,
        retry: Option<RetrySetting>,
    ) -> Result<Response<()>, Status> {
        let setting = retry.unwrap_or_else(session_setting);
        let name = req.name.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("name={name}"), req.clone(), false);
            self.inner.delete_session(request)
        })
        .await
    }

    /// Begins a new transaction. This step can often be skipped: Read,
    /// ExecuteSql and Commit can begin a transaction as a side-effect.
    pub async fn begin_transaction(
        &self,
        req: BeginTransactionRequest,
        retry: Option<RetrySetting>,
    ) -> Result<Response<Transaction>, Status> {
        let setting = retry.unwrap_or_else(transaction_setting);
        let session = req.session.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("session={session}"), req.clone(), true);
            self.inner.begin_transaction(request)
        })
        .await
    }

    /// Operations inside read-write transactions might return ABORTED; the
    /// caller restarts the transaction from the beginning.
    pub async fn execute_sql(
        &self,
        req: ExecuteSqlRequest,
        retry: Option<RetrySetting>,
    ) -> Result<Response<ResultSet>, Status> {
        let setting = retry.unwrap_or_else(transaction_setting);
        let session = req.session.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("session={session}"), req.clone(), true);
            self.inner.execute_sql(request)
        })
        .await
    }

    /// Statements run in sequential order and execution stops at the first
    /// failure; the response `status` reports it, the call itself succeeds.
    pub async fn execute_batch_dml(
        &self,
        req: ExecuteBatchDmlRequest,
        retry: Option<RetrySetting>,
    ) -> Result<Response<ExecuteBatchDmlResponse>, Status> {
        let setting = retry.unwrap_or_else(transaction_setting);
        let session = req.session.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("session={session}"), req.clone(), true);
            self.inner.execute_batch_dml(request)
        })
        .await
    }

    pub async fn read(&self, req: ReadRequest, retry: Option<RetrySetting>) -> Result<Response<ResultSet>, Status> {
        let setting = retry.unwrap_or_else(transaction_setting);
        let session = req.session.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("session={session}"), req.clone(), true);
            self.inner.read(request)
        })
        .await
    }

    /// Commit might return ABORTED at any time, commonly on conflicts with
    /// concurrent transactions; the caller re-attempts from the beginning,
    /// re-using the same session.
    pub async fn commit(&self, req: CommitRequest, retry: Option<RetrySetting>) -> Result<Response<CommitResponse>, Status> {
        let setting = retry.unwrap_or_else(transaction_setting);
        let session = req.session.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("session={session}"), req.clone(), true);
            self.inner.commit(request)
        })
        .await
    }

    /// Rollback returns OK if it aborts the transaction, the transaction was
    /// already aborted, or the transaction is not found. Never ABORTED.
    pub async fn rollback(&self, req: RollbackRequest, retry: Option<RetrySetting>) -> Result<Response<()>, Status> {
        let setting = retry.unwrap_or_else(transaction_setting);
        let session = req.session.clone();
        invoke(Some(setting), || {
            let request = self.request(format!("session={session}"), req.clone(), true);
            self.inner.rollback(request)
        })
        .await
    }
}
