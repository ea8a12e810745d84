use async_trait::async_trait;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

use crate::proto::spanner::{
    BeginTransactionRequest, CommitRequest, CommitResponse, CreateSessionRequest, DeleteSessionRequest,
    ExecuteBatchDmlRequest, ExecuteBatchDmlResponse, ExecuteSqlRequest, GetSessionRequest, ReadRequest, ResultSet,
    RollbackRequest, Session, Transaction,
};

/// The unary RPC surface of the Spanner data plane that the session and
/// transaction core depends on.
///
/// `GrpcService` is the production implementation; tests substitute a
/// scripted one. Everything above this seam deals only in message contents,
/// never in framing.
#[async_trait]
pub trait SpannerService: Send + Sync + 'static {
    async fn create_session(&self, req: Request<CreateSessionRequest>) -> Result<Response<Session>, Status>;

    async fn get_session(&self, req: Request<GetSessionRequest>) -> Result<Response<Session>, Status>;

    async fn delete_session(&self, req: Request<DeleteSessionRequest>) -> Result<Response<()>, Status>;

    async fn begin_transaction(&self, req: Request<BeginTransactionRequest>) -> Result<Response<Transaction>, Status>;

    async fn execute_sql(&self, req: Request<ExecuteSqlRequest>) -> Result<Response<ResultSet>, Status>;

    async fn execute_batch_dml(
        &self,
        req: Request<ExecuteBatchDmlRequest>,
    ) -> Result<Response<ExecuteBatchDmlResponse>, Status>;

    async fn read(&self, req: Request<ReadRequest>) -> Result<Response<ResultSet>, Status>;

    async fn commit(&self, req: Request<CommitRequest>) -> Result<Response<CommitResponse>, Status>;

    async fn rollback(&self, req: Request<RollbackRequest>) -> Result<Response<()>, Status>;
}

/// Channel-backed implementation speaking `google.spanner.v1.Spanner`.
#[derive(Clone)]
pub struct GrpcService {
    inner: tonic::client::Grpc<Channel>,
}

impl GrpcService {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<M1, M2>(&self, req: Request<M1>, path: &'static str) -> Result<Response<M2>, Status>
    where
        M1: prost::Message + Send + Sync + 'static,
        M2: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;
        let codec = tonic::codec::ProstCodec::default();
        grpc.unary(req, PathAndQuery::from_static(path), codec).await
    }
}

#[async_trait]
impl SpannerService for GrpcService {
    async fn create_session(&self, req: Request<CreateSessionRequest>) -> Result<Response<Session>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/CreateSession").await
    }

    async fn get_session(&self, req: Request<GetSessionRequest>) -> Result<Response<Session>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/GetSession").await
    }

    async fn delete_session(&self, req: Request<DeleteSessionRequest>) -> Result<Response<()>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/DeleteSession").await
    }

    async fn begin_transaction(&self, req: Request<BeginTransactionRequest>) -> Result<Response<Transaction>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/BeginTransaction").await
    }

    async fn execute_sql(&self, req: Request<ExecuteSqlRequest>) -> Result<Response<ResultSet>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/ExecuteSql").await
    }

    async fn execute_batch_dml(
        &self,
        req: Request<ExecuteBatchDmlRequest>,
    ) -> Result<Response<ExecuteBatchDmlResponse>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/ExecuteBatchDml").await
    }

    async fn read(&self, req: Request<ReadRequest>) -> Result<Response<ResultSet>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/Read").await
    }

    async fn commit(&self, req: Request<CommitRequest>) -> Result<Response<CommitResponse>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/Commit").await
    }

    async fn rollback(&self, req: Request<RollbackRequest>) -> Result<Response<()>, Status> {
        self.unary(req, "/google.spanner.v1.Spanner/Rollback").await
    }
}
