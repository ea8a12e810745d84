//! Server-side sessions and their lifecycle.
//!
//! A session hosts at most one read-write transaction at a time. Pool
//! layers are expected to hand a session to one owner, run work on it, and
//! only return it once the transaction is finished; nothing here serializes
//! concurrent use of one session across owners.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tonic::{Code, Status};

use crate::apiv1::spanner_client::{ping_query_request, Client};
use crate::proto::spanner::{CreateSessionRequest, DeleteSessionRequest, GetSessionRequest, Session as SessionProto};
use crate::retry::{RetrySetting, TryAs};
use crate::runner::{self, RunOptions};
use crate::transaction::{Transaction, TransactionOptions, TransactionState};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("session is already created as {0}")]
    AlreadyCreated(String),
    #[error(transparent)]
    Grpc(#[from] Status),
}

impl TryAs<Status> for SessionError {
    fn try_as(&self) -> Option<&Status> {
        match self {
            SessionError::Grpc(status) => Some(status),
            _ => None,
        }
    }
}

struct SessionInner {
    client: Client,
    requested_labels: HashMap<String, String>,
    /// Server-assigned resource name, set once by `create`.
    name: Mutex<Option<String>>,
    labels: Mutex<HashMap<String, String>>,
    /// The transaction this session currently tracks. Weak: a dropped
    /// transaction must not be kept alive by its session.
    active: Mutex<Weak<TransactionState>>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(client: Client) -> Session {
        Session::with_labels(client, HashMap::new())
    }

    pub fn with_labels(client: Client, labels: HashMap<String, String>) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                client,
                requested_labels: labels,
                name: Mutex::new(None),
                labels: Mutex::new(HashMap::new()),
                active: Mutex::new(Weak::new()),
            }),
        }
    }

    /// The server-assigned resource name, once created.
    pub fn name(&self) -> Option<String> {
        self.inner.name.lock().clone()
    }

    pub fn labels(&self) -> HashMap<String, String> {
        self.inner.labels.lock().clone()
    }

    /// Session-not-found errors mean the server evicted the session; pool
    /// layers drop such sessions instead of returning them.
    pub fn is_session_not_found(status: &Status) -> bool {
        status.code() == Code::NotFound && status.message().contains("Session not found")
    }

    pub async fn create(&self) -> Result<(), SessionError> {
        if let Some(name) = self.name() {
            return Err(SessionError::AlreadyCreated(name));
        }
        let request = CreateSessionRequest {
            database: self.inner.client.database().to_string(),
            session: Some(SessionProto {
                labels: self.inner.requested_labels.clone(),
                ..Default::default()
            }),
        };
        let session = self.inner.client.create_session(request, None).await?.into_inner();
        *self.inner.name.lock() = Some(session.name);
        *self.inner.labels.lock() = session.labels;
        Ok(())
    }

    /// Whether the session still exists on the server. A session that was
    /// never created does not exist; no RPC is sent for it.
    pub async fn exists(&self) -> Result<bool, Status> {
        let name = match self.name() {
            Some(name) => name,
            None => return Ok(false),
        };
        match self.inner.client.get_session(GetSessionRequest { name }, None).await {
            Ok(_) => Ok(true),
            Err(status) if status.code() == Code::NotFound => Ok(false),
            Err(status) => Err(status),
        }
    }

    /// Keeps the session alive with a `SELECT 1`. NotFound propagates so
    /// callers can evict. Retries unavailability like the other session
    /// management calls; there is no transaction to replay.
    pub async fn ping(&self) -> Result<(), Status> {
        let name = self.qualified_name()?;
        self.inner
            .client
            .execute_sql(ping_query_request(name), Some(RetrySetting::default()))
            .await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), Status> {
        let name = self.qualified_name()?;
        self.inner.client.delete_session(DeleteSessionRequest { name }, None).await?;
        Ok(())
    }

    /// Starts a fresh read-write transaction. If a previous transaction is
    /// still attached and not finished, it is abandoned locally first; a
    /// session hosts one transaction at a time.
    pub fn transaction(&self, options: TransactionOptions) -> Result<Transaction, Status> {
        let name = self.qualified_name()?;
        let state = TransactionState::new();
        {
            let mut active = self.inner.active.lock();
            if let Some(previous) = active.upgrade() {
                previous.mark_abandoned();
            }
            *active = Arc::downgrade(&state);
        }
        Ok(Transaction::new(
            self.clone(),
            name,
            self.inner.client.clone(),
            state,
            options,
        ))
    }

    /// Runs `f` in a read-write transaction, committing on success and
    /// retrying the whole callback when the server aborts.
    pub async fn run_in_transaction<T, E, F, Fut>(&self, f: F, options: Option<RunOptions>) -> Result<T, E>
    where
        F: Fn(Arc<Transaction>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TryAs<Status> + From<Status>,
    {
        runner::run_in_transaction(self, f, options.unwrap_or_default()).await
    }

    pub(crate) fn qualified_name(&self) -> Result<String, Status> {
        self.name()
            .ok_or_else(|| Status::failed_precondition("session is not created"))
    }

    /// Clears the active-transaction slot when `state` is still the one
    /// this session tracks.
    pub(crate) fn detach(&self, state: &Arc<TransactionState>) {
        let mut active = self.inner.active.lock();
        if let Some(current) = active.upgrade() {
            if Arc::ptr_eq(&current, state) {
                *active = Weak::new();
            }
        }
    }
}
