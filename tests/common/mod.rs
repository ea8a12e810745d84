#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use prost::Message;
use prost_types::value::Kind;
use prost_types::{ListValue, Value};
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::{Code, Request, Response, Status};

use spanner_core::apiv1::service::SpannerService;
use spanner_core::apiv1::spanner_client::Client;
use spanner_core::proto::rpc::RetryInfo;
use spanner_core::proto::spanner::result_set_stats::RowCount;
use spanner_core::proto::spanner::transaction_selector::Selector;
use spanner_core::proto::spanner::{
    commit_response, BeginTransactionRequest, CommitRequest, CommitResponse, CreateSessionRequest,
    DeleteSessionRequest, ExecuteBatchDmlRequest, ExecuteBatchDmlResponse, ExecuteSqlRequest, GetSessionRequest,
    ReadRequest, ResultSet, ResultSetMetadata, ResultSetStats, RollbackRequest, Session as SessionProto, Transaction,
    TransactionSelector,
};
use spanner_core::session::Session;

#[ctor::ctor]
fn init() {
    let filter = tracing_subscriber::filter::EnvFilter::from_default_env()
        .add_directive("spanner_core=trace".parse().unwrap());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub const DATABASE: &str = "projects/local-project/instances/test-instance/databases/local-database";

/// Request metadata captured alongside each recorded request.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    pub resource_prefix: Option<String>,
    pub request_params: Option<String>,
    pub route_to_leader: bool,
}

#[derive(Clone)]
pub enum Recorded {
    CreateSession(CreateSessionRequest),
    GetSession(GetSessionRequest),
    DeleteSession(DeleteSessionRequest),
    Begin(BeginTransactionRequest),
    ExecuteSql(ExecuteSqlRequest),
    BatchDml(ExecuteBatchDmlRequest),
    Read(ReadRequest),
    Commit(CommitRequest),
    Rollback(RollbackRequest),
}

/// An in-process Spanner backend: answers well-formed responses, hands out
/// fresh transaction ids for `begin` selectors, and fails on cue.
pub struct MockSpannerService {
    next_id: AtomicU64,
    log: Mutex<Vec<(Recorded, Headers)>>,
    failures: Mutex<HashMap<&'static str, VecDeque<Status>>>,
    batch_responses: Mutex<VecDeque<ExecuteBatchDmlResponse>>,
}

impl Default for MockSpannerService {
    fn default() -> Self {
        MockSpannerService {
            next_id: AtomicU64::new(1),
            log: Mutex::new(vec![]),
            failures: Mutex::new(HashMap::new()),
            batch_responses: Mutex::new(VecDeque::new()),
        }
    }
}

impl MockSpannerService {
    pub fn new() -> Arc<MockSpannerService> {
        Arc::new(MockSpannerService::default())
    }

    /// Queues a failure for the next call of `method`.
    pub fn fail_next(&self, method: &'static str, status: Status) {
        self.failures.lock().entry(method).or_default().push_back(status);
    }

    /// Overrides the response of the next ExecuteBatchDml call.
    pub fn respond_batch(&self, response: ExecuteBatchDmlResponse) {
        self.batch_responses.lock().push_back(response);
    }

    pub fn log(&self) -> Vec<(Recorded, Headers)> {
        self.log.lock().clone()
    }

    pub fn begin_requests(&self) -> Vec<BeginTransactionRequest> {
        self.log()
            .into_iter()
            .filter_map(|(r, _)| match r {
                Recorded::Begin(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn sql_requests(&self) -> Vec<ExecuteSqlRequest> {
        self.log()
            .into_iter()
            .filter_map(|(r, _)| match r {
                Recorded::ExecuteSql(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn batch_requests(&self) -> Vec<ExecuteBatchDmlRequest> {
        self.log()
            .into_iter()
            .filter_map(|(r, _)| match r {
                Recorded::BatchDml(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn read_requests(&self) -> Vec<ReadRequest> {
        self.log()
            .into_iter()
            .filter_map(|(r, _)| match r {
                Recorded::Read(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn commit_requests(&self) -> Vec<CommitRequest> {
        self.log()
            .into_iter()
            .filter_map(|(r, _)| match r {
                Recorded::Commit(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn rollback_requests(&self) -> Vec<RollbackRequest> {
        self.log()
            .into_iter()
            .filter_map(|(r, _)| match r {
                Recorded::Rollback(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    fn take_failure(&self, method: &'static str) -> Option<Status> {
        self.failures.lock().get_mut(method).and_then(|queue| queue.pop_front())
    }

    fn fresh_transaction(&self) -> Transaction {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Transaction {
            id: format!("txn-{n}").into_bytes(),
            read_timestamp: None,
        }
    }

    fn record<T: Clone>(&self, request: &Request<T>, wrap: impl FnOnce(T) -> Recorded) {
        let headers = capture_headers(request);
        self.log.lock().push((wrap(request.get_ref().clone()), headers));
    }
}

fn capture_headers<T>(request: &Request<T>) -> Headers {
    let metadata = request.metadata();
    Headers {
        resource_prefix: metadata
            .get("google-cloud-resource-prefix")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        request_params: metadata
            .get("x-goog-request-params")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        route_to_leader: metadata.get("x-goog-spanner-route-to-leader").is_some(),
    }
}

fn begins(selector: &Option<TransactionSelector>) -> bool {
    matches!(
        selector.as_ref().and_then(|s| s.selector.as_ref()),
        Some(Selector::Begin(_))
    )
}

fn one_row_result(transaction: Option<Transaction>) -> ResultSet {
    ResultSet {
        metadata: Some(ResultSetMetadata {
            row_type: None,
            transaction,
        }),
        rows: vec![ListValue {
            values: vec![Value {
                kind: Some(Kind::StringValue("1".to_string())),
            }],
        }],
        stats: Some(ResultSetStats {
            row_count: Some(RowCount::RowCountExact(1)),
        }),
    }
}

#[async_trait::async_trait]
impl SpannerService for MockSpannerService {
    async fn create_session(&self, req: Request<CreateSessionRequest>) -> Result<Response<SessionProto>, Status> {
        self.record(&req, Recorded::CreateSession);
        if let Some(status) = self.take_failure("create_session") {
            return Err(status);
        }
        let req = req.into_inner();
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Response::new(SessionProto {
            name: format!("{}/sessions/s-{n}", req.database),
            labels: req.session.map(|s| s.labels).unwrap_or_default(),
            ..Default::default()
        }))
    }

    async fn get_session(&self, req: Request<GetSessionRequest>) -> Result<Response<SessionProto>, Status> {
        self.record(&req, Recorded::GetSession);
        if let Some(status) = self.take_failure("get_session") {
            return Err(status);
        }
        let name = req.into_inner().name;
        Ok(Response::new(SessionProto {
            name,
            ..Default::default()
        }))
    }

    async fn delete_session(&self, req: Request<DeleteSessionRequest>) -> Result<Response<()>, Status> {
        self.record(&req, Recorded::DeleteSession);
        if let Some(status) = self.take_failure("delete_session") {
            return Err(status);
        }
        Ok(Response::new(()))
    }

    async fn begin_transaction(&self, req: Request<BeginTransactionRequest>) -> Result<Response<Transaction>, Status> {
        self.record(&req, Recorded::Begin);
        if let Some(status) = self.take_failure("begin_transaction") {
            return Err(status);
        }
        Ok(Response::new(self.fresh_transaction()))
    }

    async fn execute_sql(&self, req: Request<ExecuteSqlRequest>) -> Result<Response<ResultSet>, Status> {
        self.record(&req, Recorded::ExecuteSql);
        if let Some(status) = self.take_failure("execute_sql") {
            return Err(status);
        }
        let transaction = begins(&req.get_ref().transaction).then(|| self.fresh_transaction());
        Ok(Response::new(one_row_result(transaction)))
    }

    async fn execute_batch_dml(
        &self,
        req: Request<ExecuteBatchDmlRequest>,
    ) -> Result<Response<ExecuteBatchDmlResponse>, Status> {
        self.record(&req, Recorded::BatchDml);
        if let Some(status) = self.take_failure("execute_batch_dml") {
            return Err(status);
        }
        if let Some(scripted) = self.batch_responses.lock().pop_front() {
            return Ok(Response::new(scripted));
        }
        let req = req.into_inner();
        let mut result_sets = Vec::with_capacity(req.statements.len());
        for i in 0..req.statements.len() {
            let transaction = (i == 0 && begins(&req.transaction)).then(|| self.fresh_transaction());
            result_sets.push(one_row_result(transaction));
        }
        Ok(Response::new(ExecuteBatchDmlResponse {
            result_sets,
            status: None,
        }))
    }

    async fn read(&self, req: Request<ReadRequest>) -> Result<Response<ResultSet>, Status> {
        self.record(&req, Recorded::Read);
        if let Some(status) = self.take_failure("read") {
            return Err(status);
        }
        let transaction = begins(&req.get_ref().transaction).then(|| self.fresh_transaction());
        Ok(Response::new(one_row_result(transaction)))
    }

    async fn commit(&self, req: Request<CommitRequest>) -> Result<Response<CommitResponse>, Status> {
        self.record(&req, Recorded::Commit);
        if let Some(status) = self.take_failure("commit") {
            return Err(status);
        }
        let req = req.into_inner();
        let commit_stats = req.return_commit_stats.then(|| commit_response::CommitStats {
            mutation_count: req.mutations.len() as i64,
        });
        Ok(Response::new(CommitResponse {
            commit_timestamp: Some(prost_types::Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            }),
            commit_stats,
        }))
    }

    async fn rollback(&self, req: Request<RollbackRequest>) -> Result<Response<()>, Status> {
        self.record(&req, Recorded::Rollback);
        if let Some(status) = self.take_failure("rollback") {
            return Err(status);
        }
        Ok(Response::new(()))
    }
}

pub fn client(mock: Arc<MockSpannerService>) -> Client {
    Client::new(mock, DATABASE, true)
}

pub async fn created_session(mock: Arc<MockSpannerService>) -> Session {
    let session = Session::new(client(mock));
    session.create().await.unwrap();
    session
}

/// An aborted status carrying a server-recommended retry delay.
pub fn aborted_with_retry_info(seconds: i64, nanos: i32) -> Status {
    let info = RetryInfo {
        retry_delay: Some(prost_types::Duration { seconds, nanos }),
    };
    let mut metadata = MetadataMap::new();
    metadata.insert_bin(
        "google.rpc.retryinfo-bin",
        MetadataValue::from_bytes(&info.encode_to_vec()),
    );
    Status::with_metadata(Code::Aborted, "Transaction was aborted", metadata)
}
