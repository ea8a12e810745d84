//! Read-write transactions with lazy (inline) begin.
//!
//! A transaction starts out without a server-side id. The first data call
//! sends a `begin` selector and adopts the id the server picks; every later
//! call references that id. Locks are acquired lazily as the transaction
//! reads and writes, so sending begin eagerly would only lengthen the lock
//! hold time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prost_types::Struct;
use tonic::{Code, Status};

use crate::apiv1::spanner_client::Client;
use crate::key::KeySet;
use crate::proto::rpc;
use crate::proto::spanner::execute_sql_request::QueryMode;
use crate::proto::spanner::request_options::Priority;
use crate::proto::spanner::transaction_options::{Mode, ReadWrite};
use crate::proto::spanner::transaction_selector::Selector;
use crate::proto::spanner::TransactionOptions as WireTransactionOptions;
use crate::proto::spanner::{
    execute_batch_dml_request, commit_request, result_set_stats, BeginTransactionRequest, CommitRequest,
    CommitResponse, ExecuteBatchDmlRequest, ExecuteSqlRequest, Mutation, ReadRequest, RequestOptions, ResultSet,
    RollbackRequest, TransactionSelector,
};
use crate::retry::{RetrySetting, TryAs};
use crate::session::Session;
use crate::statement::Statement;
use crate::value::Timestamp;

/// Options applied when the transaction is created.
#[derive(Clone, Default)]
pub struct TransactionOptions {
    /// Attached to every request in this transaction, and to its commit.
    pub transaction_tag: Option<String>,
    pub exclude_txn_from_change_streams: bool,
}

#[derive(Clone, Default)]
pub struct CallOptions {
    pub priority: Option<Priority>,
    /// Tag for this request only; never applied to commit or rollback.
    pub request_tag: Option<String>,
    pub retry: Option<RetrySetting>,
}

#[derive(Clone)]
pub struct QueryOptions {
    pub mode: QueryMode,
    pub optimizer_options: Option<crate::proto::spanner::execute_sql_request::QueryOptions>,
    pub call_options: CallOptions,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            mode: QueryMode::Normal,
            optimizer_options: None,
            call_options: CallOptions::default(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ReadOptions {
    /// Secondary index to read from instead of the primary key.
    pub index: String,
    /// 0 means no limit.
    pub limit: i64,
    pub call_options: CallOptions,
}

#[derive(Clone, Default)]
pub struct CommitOptions {
    pub return_commit_stats: bool,
    pub max_commit_delay: Option<Duration>,
    pub call_options: CallOptions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No server-side transaction exists yet.
    Fresh,
    Begun,
    Committed,
    RolledBack,
    /// The server aborted the transaction; only a fresh transaction can
    /// retry the work.
    Aborted,
}

struct TxInner {
    status: TransactionStatus,
    transaction_id: Option<Vec<u8>>,
    mutations: Vec<Mutation>,
    committed_at: Option<Timestamp>,
}

impl TxInner {
    fn check_active(&self) -> Result<(), Status> {
        match self.status {
            TransactionStatus::Committed => Err(Status::failed_precondition("transaction is already committed")),
            TransactionStatus::RolledBack => Err(Status::failed_precondition("transaction is already rolled back")),
            TransactionStatus::Aborted => Err(Status::aborted(
                "transaction was aborted; retry the work on a fresh transaction",
            )),
            TransactionStatus::Fresh | TransactionStatus::Begun => Ok(()),
        }
    }
}

/// State shared between a transaction and the session that created it, so
/// the session can abandon a transaction it no longer tracks.
pub(crate) struct TransactionState {
    inner: Mutex<TxInner>,
}

impl TransactionState {
    pub(crate) fn new() -> Arc<TransactionState> {
        Arc::new(TransactionState {
            inner: Mutex::new(TxInner {
                status: TransactionStatus::Fresh,
                transaction_id: None,
                mutations: vec![],
                committed_at: None,
            }),
        })
    }

    /// Rolls the transaction back locally when its session moves on to a
    /// new one. No rollback RPC is sent; the server reclaims the locks when
    /// the session runs its next transaction.
    pub(crate) fn mark_abandoned(&self) {
        let mut inner = self.inner.lock();
        if matches!(inner.status, TransactionStatus::Fresh | TransactionStatus::Begun) {
            inner.status = TransactionStatus::RolledBack;
        }
    }
}

/// A single-session read-write transaction.
///
/// All methods take `&self`; the transaction may be shared behind an `Arc`
/// and used from several tasks, with at most one begin ever sent.
pub struct Transaction {
    session: Session,
    session_name: String,
    client: Client,
    state: Arc<TransactionState>,
    /// Serializes the call that carries the `begin` selector.
    begin_lock: tokio::sync::Mutex<()>,
    sequence_number: AtomicI64,
    options: TransactionOptions,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("session_name", &self.session_name)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) fn new(
        session: Session,
        session_name: String,
        client: Client,
        state: Arc<TransactionState>,
        options: TransactionOptions,
    ) -> Transaction {
        Transaction {
            session,
            session_name,
            client,
            state,
            begin_lock: tokio::sync::Mutex::new(()),
            sequence_number: AtomicI64::new(0),
            options,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.state.inner.lock().status
    }

    /// The server-assigned transaction id, once one exists.
    pub fn transaction_id(&self) -> Option<Vec<u8>> {
        self.state.inner.lock().transaction_id.clone()
    }

    /// The commit timestamp, after a successful commit.
    pub fn committed_at(&self) -> Option<Timestamp> {
        self.state.inner.lock().committed_at
    }

    /// Queues mutations to be applied atomically by [`Transaction::commit`].
    /// Nothing is sent to the server until then.
    pub fn buffer_write(&self, mutations: Vec<Mutation>) -> Result<(), Status> {
        let mut inner = self.state.inner.lock();
        inner.check_active()?;
        inner.mutations.extend(mutations);
        Ok(())
    }

    pub fn buffered_mutation_count(&self) -> usize {
        self.state.inner.lock().mutations.len()
    }

    fn begin_options(&self) -> WireTransactionOptions {
        WireTransactionOptions {
            mode: Some(Mode::ReadWrite(ReadWrite {})),
            exclude_txn_from_change_streams: self.options.exclude_txn_from_change_streams,
        }
    }

    fn request_options(&self, call: &CallOptions) -> Option<RequestOptions> {
        let transaction_tag = self.options.transaction_tag.clone().unwrap_or_default();
        let request_tag = call.request_tag.clone().unwrap_or_default();
        let priority = call.priority.map(|p| p as i32).unwrap_or(0);
        if transaction_tag.is_empty() && request_tag.is_empty() && priority == 0 {
            None
        } else {
            Some(RequestOptions {
                priority,
                request_tag,
                transaction_tag,
            })
        }
    }

    /// Commit and rollback accept a transaction tag and a priority but no
    /// per-request tag.
    fn commit_request_options(&self, call: &CallOptions) -> Option<RequestOptions> {
        self.request_options(&CallOptions {
            priority: call.priority,
            request_tag: None,
            retry: call.retry.clone(),
        })
    }

    /// Picks the transaction selector for a data call. When no id exists
    /// yet, takes the begin lock and keeps it for the duration of the call,
    /// so exactly one request ever carries the `begin` selector.
    async fn selector(&self) -> Result<(TransactionSelector, Option<tokio::sync::MutexGuard<'_, ()>>), Status> {
        {
            let inner = self.state.inner.lock();
            inner.check_active()?;
            if let Some(id) = &inner.transaction_id {
                return Ok((
                    TransactionSelector {
                        selector: Some(Selector::Id(id.clone())),
                    },
                    None,
                ));
            }
        }
        let guard = self.begin_lock.lock().await;
        let inner = self.state.inner.lock();
        inner.check_active()?;
        match &inner.transaction_id {
            // Another call begun the transaction while we waited.
            Some(id) => Ok((
                TransactionSelector {
                    selector: Some(Selector::Id(id.clone())),
                },
                None,
            )),
            None => Ok((
                TransactionSelector {
                    selector: Some(Selector::Begin(self.begin_options())),
                },
                Some(guard),
            )),
        }
    }

    fn adopt_transaction_id(&self, id: Vec<u8>) {
        let mut inner = self.state.inner.lock();
        inner.transaction_id = Some(id);
        inner.status = TransactionStatus::Begun;
    }

    fn observe_status(&self, status: &Status) {
        if status.code() == Code::Aborted {
            {
                let mut inner = self.state.inner.lock();
                inner.status = TransactionStatus::Aborted;
            }
            self.session.detach(&self.state);
        }
    }

    /// Finalizes an inline-begin call: adopts the returned id, or fails if
    /// the server did not return one despite the `begin` selector.
    fn finish_call<R>(
        &self,
        result: Result<R, Status>,
        began_here: bool,
        extract_id: impl FnOnce(&R) -> Option<Vec<u8>>,
    ) -> Result<R, Status> {
        match result {
            Ok(response) => {
                if began_here {
                    match extract_id(&response) {
                        Some(id) => self.adopt_transaction_id(id),
                        None => {
                            return Err(Status::internal(
                                "begin was requested but the response carried no transaction id",
                            ))
                        }
                    }
                }
                Ok(response)
            }
            Err(status) => {
                self.observe_status(&status);
                Err(status)
            }
        }
    }

    /// Runs a SQL statement, DML or query, returning the full result set.
    pub async fn execute_sql(&self, statement: Statement, options: Option<QueryOptions>) -> Result<ResultSet, Status> {
        let opt = options.unwrap_or_default();
        let (selector, guard) = self.selector().await?;
        let seqno = self.sequence_number.fetch_add(1, Ordering::Relaxed);
        let request = ExecuteSqlRequest {
            session: self.session_name.clone(),
            transaction: Some(selector),
            sql: statement.sql,
            params: Some(Struct {
                fields: statement.params,
            }),
            param_types: statement.param_types,
            query_mode: opt.mode as i32,
            seqno,
            query_options: opt.optimizer_options,
            request_options: self.request_options(&opt.call_options),
        };
        let result = self
            .client
            .execute_sql(request, opt.call_options.retry)
            .await
            .map(|response| response.into_inner());
        let result = self.finish_call(result, guard.is_some(), |rs| rs.transaction_id().map(|id| id.to_vec()));
        drop(guard);
        result
    }

    /// Runs a DML statement and returns the affected row count.
    pub async fn execute_update(&self, statement: Statement, options: Option<QueryOptions>) -> Result<i64, Status> {
        let result_set = self.execute_sql(statement, options).await?;
        Ok(extract_row_count(&result_set).unwrap_or(0))
    }

    /// Runs a batch of DML statements under one sequence number. Statements
    /// run in order and stop at the first failure; that failure is reported
    /// in the returned status, not as an error. Row counts cover the
    /// statements that did run.
    pub async fn execute_batch_dml(
        &self,
        statements: Vec<Statement>,
        options: Option<CallOptions>,
    ) -> Result<(rpc::Status, Vec<i64>), Status> {
        let opt = options.unwrap_or_default();
        let (selector, guard) = self.selector().await?;
        let seqno = self.sequence_number.fetch_add(1, Ordering::Relaxed);
        let request = ExecuteBatchDmlRequest {
            session: self.session_name.clone(),
            transaction: Some(selector),
            statements: statements
                .into_iter()
                .map(|statement| execute_batch_dml_request::Statement {
                    sql: statement.sql,
                    params: Some(Struct {
                        fields: statement.params,
                    }),
                    param_types: statement.param_types,
                })
                .collect(),
            seqno,
            request_options: self.request_options(&opt),
        };
        let result = self
            .client
            .execute_batch_dml(request, opt.retry)
            .await
            .map(|response| response.into_inner());
        let response = match result {
            Ok(response) => {
                // A failing first statement yields a non-OK status with no
                // result sets, and so no id for the attempted begin. That is
                // not an error here; the transaction stays fresh and the next
                // call re-attempts the inline begin.
                if guard.is_some() {
                    if let Some(id) = response.result_sets.first().and_then(|rs| rs.transaction_id()) {
                        self.adopt_transaction_id(id.to_vec());
                    }
                }
                response
            }
            Err(status) => {
                self.observe_status(&status);
                return Err(status);
            }
        };
        drop(guard);
        let row_counts = response
            .result_sets
            .iter()
            .map(|rs| extract_row_count(rs).unwrap_or(0))
            .collect();
        Ok((response.status.unwrap_or_default(), row_counts))
    }

    /// Reads rows from a table by key.
    pub async fn read(
        &self,
        table: &str,
        columns: &[&str],
        key_set: impl Into<KeySet>,
        options: Option<ReadOptions>,
    ) -> Result<ResultSet, Status> {
        let opt = options.unwrap_or_default();
        let (selector, guard) = self.selector().await?;
        let request = ReadRequest {
            session: self.session_name.clone(),
            transaction: Some(selector),
            table: table.to_string(),
            index: opt.index,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            key_set: Some(key_set.into().inner),
            limit: opt.limit,
            request_options: self.request_options(&opt.call_options),
        };
        let result = self
            .client
            .read(request, opt.call_options.retry)
            .await
            .map(|response| response.into_inner());
        let result = self.finish_call(result, guard.is_some(), |rs| rs.transaction_id().map(|id| id.to_vec()));
        drop(guard);
        result
    }

    /// Explicitly begins the transaction on the server. Usually unnecessary:
    /// the first data call begins the transaction inline.
    pub async fn begin(&self, options: Option<CallOptions>) -> Result<(), Status> {
        {
            let inner = self.state.inner.lock();
            inner.check_active()?;
            if inner.transaction_id.is_some() {
                return Err(Status::failed_precondition("transaction is already begun"));
            }
        }
        self.ensure_begun(&options.unwrap_or_default()).await.map(|_| ())
    }

    async fn ensure_begun(&self, call: &CallOptions) -> Result<Vec<u8>, Status> {
        if let Some(id) = self.transaction_id() {
            return Ok(id);
        }
        let _guard = self.begin_lock.lock().await;
        if let Some(id) = self.transaction_id() {
            return Ok(id);
        }
        let request = BeginTransactionRequest {
            session: self.session_name.clone(),
            options: Some(self.begin_options()),
            request_options: self.request_options(call),
        };
        let result = self
            .client
            .begin_transaction(request, call.retry.clone())
            .await
            .map(|response| response.into_inner());
        match result {
            Ok(transaction) => {
                self.adopt_transaction_id(transaction.id.clone());
                Ok(transaction.id)
            }
            Err(status) => {
                self.observe_status(&status);
                Err(status)
            }
        }
    }

    /// Commits the buffered mutations along with any reads and DML already
    /// run. A transaction that never touched the server and has no buffered
    /// mutations cannot commit; a mutation-only transaction is begun
    /// explicitly first, so commit never carries a `begin` selector.
    pub async fn commit(&self, options: CommitOptions) -> Result<CommitResponse, Status> {
        {
            let inner = self.state.inner.lock();
            inner.check_active()?;
            if inner.transaction_id.is_none() && inner.mutations.is_empty() {
                return Err(Status::failed_precondition("transaction is not begun"));
            }
        }
        let transaction_id = self.ensure_begun(&options.call_options).await?;
        let mutations = self.state.inner.lock().mutations.clone();
        let request = CommitRequest {
            session: self.session_name.clone(),
            mutations,
            return_commit_stats: options.return_commit_stats,
            request_options: self.commit_request_options(&options.call_options),
            max_commit_delay: options.max_commit_delay.map(|d| prost_types::Duration {
                seconds: d.as_secs() as i64,
                nanos: d.subsec_nanos() as i32,
            }),
            transaction: Some(commit_request::Transaction::TransactionId(transaction_id)),
        };
        let result = self.client.commit(request, options.call_options.retry).await;
        match result {
            Ok(response) => {
                let response = response.into_inner();
                {
                    let mut inner = self.state.inner.lock();
                    inner.status = TransactionStatus::Committed;
                    inner.committed_at = response.commit_timestamp.clone().map(Timestamp::from);
                }
                self.session.detach(&self.state);
                Ok(response)
            }
            Err(status) => {
                self.observe_status(&status);
                Err(status)
            }
        }
    }

    /// Consumes the outcome of the work done in this transaction: commits
    /// on success, rolls back on any failure except Aborted, which is left
    /// for a retry loop to observe. Returns the commit timestamp alongside
    /// the value.
    pub async fn finish<T, E>(
        &self,
        result: Result<T, E>,
        options: Option<CommitOptions>,
    ) -> Result<(Option<Timestamp>, T), E>
    where
        E: TryAs<Status> + From<Status>,
    {
        match result {
            Ok(value) => {
                let response = self.commit(options.unwrap_or_default()).await.map_err(E::from)?;
                Ok((response.commit_timestamp.map(Timestamp::from), value))
            }
            Err(err) => {
                let aborted = err.try_as().map(|status| status.code() == Code::Aborted).unwrap_or(false);
                if !aborted {
                    self.rollback().await;
                }
                Err(err)
            }
        }
    }

    /// Abandons the transaction. Idempotent, and never raises: a rollback
    /// failure only means the server holds the locks until the session runs
    /// its next transaction.
    pub async fn rollback(&self) {
        let transaction_id = {
            let mut inner = self.state.inner.lock();
            match inner.status {
                TransactionStatus::Committed | TransactionStatus::RolledBack => return,
                _ => {}
            }
            inner.status = TransactionStatus::RolledBack;
            inner.transaction_id.clone()
        };
        if let Some(id) = transaction_id {
            let request = RollbackRequest {
                session: self.session_name.clone(),
                transaction_id: id,
            };
            if let Err(status) = self.client.rollback(request, None).await {
                tracing::warn!(error = %status, "rollback failed; abandoning the transaction anyway");
            }
        }
        self.session.detach(&self.state);
    }
}

pub(crate) fn extract_row_count(result_set: &ResultSet) -> Option<i64> {
    match result_set.stats.as_ref()?.row_count.as_ref()? {
        result_set_stats::RowCount::RowCountExact(count) => Some(*count),
        result_set_stats::RowCount::RowCountLowerBound(count) => Some(*count),
    }
}
