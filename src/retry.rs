use std::future::Future;
use std::iter::Take;
use std::time::Duration;

use tonic::{Code, Status};

/// Delay schedule that doubles each step, clamped to `max_delay`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max_delay: Duration) -> ExponentialBackoff {
        ExponentialBackoff {
            current: initial,
            max_delay,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current.min(self.max_delay);
        self.current = self.current.saturating_mul(2);
        Some(delay)
    }
}

/// Borrow the RPC status out of a composite error type, when there is one.
pub trait TryAs<T> {
    fn try_as(&self) -> Option<&T>;
}

impl TryAs<Status> for Status {
    fn try_as(&self) -> Option<&Status> {
        Some(self)
    }
}

pub trait Predicate<E> {
    fn should_retry(&mut self, error: &E) -> bool;
}

/// `Internal` errors are transport hiccups only when the message carries one
/// of the known stream-reset sentinels; everything else surfaces.
pub(crate) fn is_stream_reset(status: &Status) -> bool {
    status.code() == Code::Internal
        && (status.message().contains("RST_STREAM")
            || status.message().contains("HTTP/2 error code: INTERNAL_ERROR")
            || status.message().contains("Connection closed with unknown cause")
            || status
                .message()
                .contains("Received unexpected EOS on DATA frame from server"))
}

/// Retries stream resets plus the configured code list. `Aborted` is never
/// matched here; transaction-level retry belongs to the runner.
pub struct TransientPredicate {
    codes: Vec<Code>,
}

impl TransientPredicate {
    pub fn new(codes: Vec<Code>) -> Self {
        Self { codes }
    }
}

impl<E> Predicate<E> for TransientPredicate
where
    E: TryAs<Status>,
{
    fn should_retry(&mut self, error: &E) -> bool {
        let status = match error.try_as() {
            Some(s) => s,
            None => return false,
        };
        if is_stream_reset(status) {
            return true;
        }
        self.codes.contains(&status.code())
    }
}

#[derive(Clone)]
pub struct RetrySetting {
    pub initial: Duration,
    pub max_delay: Duration,
    pub take: usize,
    pub codes: Vec<Code>,
}

impl RetrySetting {
    pub(crate) fn strategy(&self) -> Take<ExponentialBackoff> {
        ExponentialBackoff::new(self.initial, self.max_delay).take(self.take)
    }

    pub(crate) fn predicate(&self) -> TransientPredicate {
        TransientPredicate::new(self.codes.clone())
    }
}

impl Default for RetrySetting {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(50),
            max_delay: Duration::from_secs(10),
            take: 20,
            codes: vec![Code::Unavailable],
        }
    }
}

/// Repeats the call until it succeeds, the predicate rejects, or the backoff
/// schedule is exhausted.
pub async fn invoke<R, A>(retry: Option<RetrySetting>, mut f: impl FnMut() -> A) -> Result<R, Status>
where
    A: Future<Output = Result<R, Status>>,
{
    let retry = retry.unwrap_or_default();
    let mut strategy = retry.strategy();
    let mut predicate = retry.predicate();
    loop {
        let status = match f().await {
            Ok(s) => return Ok(s),
            Err(e) => e,
        };
        if !predicate.should_retry(&status) {
            return Err(status);
        }
        match strategy.next() {
            None => return Err(status),
            Some(duration) => {
                tracing::trace!(code = ?status.code(), delay_ms = duration.as_millis() as u64, "retrying transient rpc failure");
                tokio::time::sleep(duration).await
            }
        };
    }
}
