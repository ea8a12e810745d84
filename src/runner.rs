//! Retry orchestration for read-write transactions.
//!
//! The server may abort a read-write transaction at any point to resolve
//! lock conflicts. The only correct reaction is to run the whole unit of
//! work again on a fresh transaction, backing off first; the abort often
//! carries a server-recommended delay in the `google.rpc.retryinfo-bin`
//! trailer, which wins over the local schedule.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use rand::Rng;
use tokio::time::Instant;
use tonic::{Code, Status};

use crate::proto::rpc::RetryInfo;
use crate::retry::TryAs;
use crate::session::Session;
use crate::transaction::{CommitOptions, Transaction, TransactionOptions};

const RETRY_INFO_KEY: &str = "google.rpc.retryinfo-bin";
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(32);
const JITTER_MILLIS: u64 = 250;

/// Overall budget for all attempts of one unit of work, sleeps included.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct RunOptions {
    pub timeout: Duration,
    pub transaction_options: TransactionOptions,
    pub commit_options: CommitOptions,
    /// Requests commit stats and logs the mutation count on success.
    pub log_commit_stats: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            timeout: DEFAULT_RETRY_TIMEOUT,
            transaction_options: TransactionOptions::default(),
            commit_options: CommitOptions::default(),
            log_commit_stats: false,
        }
    }
}

/// Runs `f` against fresh transactions until one commits, the deadline
/// passes, or a non-Aborted error surfaces.
///
/// The callback must be safe to run multiple times; side effects outside
/// the transaction are not undone between attempts.
pub(crate) async fn run_in_transaction<T, E, F, Fut>(session: &Session, f: F, options: RunOptions) -> Result<T, E>
where
    F: Fn(Arc<Transaction>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TryAs<Status> + From<Status>,
{
    let deadline = Instant::now() + options.timeout;
    let mut commit_options = options.commit_options.clone();
    if options.log_commit_stats {
        commit_options.return_commit_stats = true;
    }
    let mut attempt: u32 = 0;
    loop {
        let transaction = Arc::new(session.transaction(options.transaction_options.clone()).map_err(E::from)?);
        let aborted = match f(Arc::clone(&transaction)).await {
            Ok(value) => match transaction.commit(commit_options.clone()).await {
                Ok(response) => {
                    if options.log_commit_stats {
                        if let Some(stats) = &response.commit_stats {
                            tracing::info!(mutation_count = stats.mutation_count, "transaction committed");
                        }
                    }
                    return Ok(value);
                }
                Err(status) if status.code() == Code::Aborted => status,
                Err(status) => return Err(E::from(status)),
            },
            Err(err) => match err.try_as().filter(|status| status.code() == Code::Aborted).cloned() {
                Some(status) => status,
                None => {
                    // Release the server-side locks before surfacing.
                    if transaction.transaction_id().is_some() {
                        transaction.rollback().await;
                    }
                    return Err(err);
                }
            },
        };
        let delay = next_delay(&aborted, attempt);
        if Instant::now() + delay > deadline {
            tracing::debug!(attempt, "retry budget exhausted; surfacing the abort");
            return Err(E::from(aborted));
        }
        tracing::trace!(attempt, ?delay, "transaction aborted; backing off before retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn next_delay(status: &Status, attempt: u32) -> Duration {
    if let Some(delay) = retry_delay_from_trailers(status) {
        return delay;
    }
    let exp = BACKOFF_BASE.saturating_mul(1u32 << attempt.min(5));
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MILLIS));
    exp.min(BACKOFF_CAP) + jitter
}

/// The server-recommended delay from the abort's trailers. A missing,
/// undecodable, or negative delay falls back to the local schedule.
fn retry_delay_from_trailers(status: &Status) -> Option<Duration> {
    let value = status.metadata().get_bin(RETRY_INFO_KEY)?;
    let bytes = value.to_bytes().ok()?;
    let info = RetryInfo::decode(bytes.as_ref()).ok()?;
    let delay = info.retry_delay?;
    if delay.seconds < 0 || delay.nanos < 0 {
        return None;
    }
    Some(Duration::new(delay.seconds as u64, delay.nanos as u32))
}
