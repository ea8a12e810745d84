mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tonic::{Code, Status};

use common::{aborted_with_retry_info, created_session, MockSpannerService};
use spanner_core::mutation::insert;
use spanner_core::retry::TryAs;
use spanner_core::runner::RunOptions;
use spanner_core::statement::Statement;

fn update_statement() -> Statement {
    Statement::new("UPDATE Guild SET MemberCount = MemberCount + 1 WHERE TRUE")
}

#[derive(thiserror::Error, Debug)]
enum UserError {
    #[error("member limit reached")]
    MemberLimit,
    #[error(transparent)]
    Grpc(#[from] Status),
}

impl TryAs<Status> for UserError {
    fn try_as(&self) -> Option<&Status> {
        match self {
            UserError::Grpc(status) => Some(status),
            _ => None,
        }
    }
}

// Scenario: the callback only buffers a mutation. The begin happens as its
// own RPC right before commit, since commit cannot begin inline.
#[tokio::test]
async fn test_mutation_only_callback() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;

    let value = session
        .run_in_transaction(
            |tx| async move {
                tx.buffer_write(vec![insert("Guild", &["UserId"], &[&"user-1"])])?;
                Ok::<_, Status>(7)
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(value, 7);
    let commits = mock.commit_requests();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].mutations.len(), 1);
    assert_eq!(mock.begin_requests().len(), 1);
    assert!(mock.sql_requests().is_empty());
}

#[tokio::test]
async fn test_dml_callback_inline_begins_and_commits_once() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;

    let value = session
        .run_in_transaction(
            |tx| async move {
                let updated = tx.execute_update(update_statement(), None).await?;
                Ok::<_, Status>(updated)
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(value, 1);

    let sqls = mock.sql_requests();
    assert_eq!(sqls.len(), 1);
    assert_eq!(sqls[0].seqno, 0);
    assert!(mock.begin_requests().is_empty());

    let commits = mock.commit_requests();
    assert_eq!(commits.len(), 1);
    // Commit references the id adopted from the inline begin.
    match &commits[0].transaction {
        Some(spanner_core::proto::spanner::commit_request::Transaction::TransactionId(id)) => {
            assert!(!id.is_empty())
        }
        other => panic!("expected a transaction id, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_commit_abort_honors_retry_info() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;
    mock.fail_next("commit", aborted_with_retry_info(12, 3456));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let start = tokio::time::Instant::now();
    let value = session
        .run_in_transaction(
            move |tx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tx.execute_update(update_statement(), None).await?;
                    Ok::<_, Status>("done")
                }
            },
            Some(RunOptions {
                timeout: Duration::from_secs(30),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

    assert_eq!(value, "done");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(mock.commit_requests().len(), 2);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::new(12, 3456), "slept only {elapsed:?}");
    assert!(elapsed < Duration::from_millis(12_100), "slept {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_commit_abort_without_retry_info_backs_off() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;
    mock.fail_next("commit", Status::aborted("Transaction was aborted"));
    mock.fail_next("commit", Status::aborted("Transaction was aborted"));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let start = tokio::time::Instant::now();
    session
        .run_in_transaction(
            move |tx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tx.execute_update(update_statement(), None).await?;
                    Ok::<_, Status>(())
                }
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(mock.commit_requests().len(), 3);
    // 1s·2^0 and 1s·2^1, each with at most 250ms of jitter.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "slept only {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(3_500), "slept {elapsed:?}");
}

// A non-Aborted error out of the callback rolls back and surfaces as-is.
#[tokio::test]
async fn test_callback_error_rolls_back() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let err = session
        .run_in_transaction(
            move |tx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tx.buffer_write(vec![insert("Guild", &["UserId"], &[&"user-1"])])?;
                    Err::<(), UserError>(UserError::MemberLimit)
                }
            },
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UserError::MemberLimit));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(mock.commit_requests().is_empty());
    // No id was ever assigned, so there is nothing to roll back remotely.
    assert!(mock.rollback_requests().is_empty());
}

#[tokio::test]
async fn test_callback_error_after_begin_rolls_back_remotely() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;

    let err = session
        .run_in_transaction(
            |tx| async move {
                tx.execute_update(update_statement(), None).await?;
                Err::<(), Status>(Status::invalid_argument("cannot apply"))
            },
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::InvalidArgument);
    assert!(mock.commit_requests().is_empty());
    assert_eq!(mock.rollback_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_exhaustion_reraises_without_sleep() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;
    mock.fail_next("commit", aborted_with_retry_info(2, 0));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let start = tokio::time::Instant::now();
    let err = session
        .run_in_transaction(
            move |tx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tx.execute_update(update_statement(), None).await?;
                    Ok::<_, Status>(())
                }
            },
            Some(RunOptions {
                timeout: Duration::from_secs(1),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Aborted);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.commit_requests().len(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

// An abort observed inside the callback, not at commit, retries the same way.
#[tokio::test(start_paused = true)]
async fn test_abort_inside_callback_retries() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;
    mock.fail_next("execute_sql", aborted_with_retry_info(0, 0));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    session
        .run_in_transaction(
            move |tx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tx.execute_update(update_statement(), None).await?;
                    Ok::<_, Status>(())
                }
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(mock.commit_requests().len(), 1);
    assert!(mock.rollback_requests().is_empty());
}

// Each retried attempt gets a fresh transaction, so seqno restarts at 0.
#[tokio::test(start_paused = true)]
async fn test_seqno_restarts_per_attempt() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;
    mock.fail_next("commit", aborted_with_retry_info(0, 0));

    session
        .run_in_transaction(
            |tx| async move {
                tx.execute_update(update_statement(), None).await?;
                tx.execute_update(update_statement(), None).await?;
                Ok::<_, Status>(())
            },
            None,
        )
        .await
        .unwrap();

    let seqnos: Vec<i64> = mock.sql_requests().iter().map(|r| r.seqno).collect();
    assert_eq!(seqnos, vec![0, 1, 0, 1]);
}

#[tokio::test]
async fn test_commit_error_other_than_abort_is_terminal() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;
    mock.fail_next("commit", Status::internal("commit infrastructure failure"));

    let err = session
        .run_in_transaction(
            |tx| async move {
                tx.execute_update(update_statement(), None).await?;
                Ok::<_, Status>(())
            },
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Internal);
    assert_eq!(mock.commit_requests().len(), 1);
}

#[tokio::test]
async fn test_log_commit_stats_requests_stats() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;

    session
        .run_in_transaction(
            |tx| async move {
                tx.buffer_write(vec![insert("Guild", &["UserId"], &[&"user-1"])])?;
                Ok::<_, Status>(())
            },
            Some(RunOptions {
                log_commit_stats: true,
                ..Default::default()
            }),
        )
        .await
        .unwrap();

    assert!(mock.commit_requests()[0].return_commit_stats);
}

// The round-trip law: a read-only callable still begins exactly once and
// commits exactly once, returning its value unchanged.
#[tokio::test]
async fn test_select_only_callable_round_trips() {
    let mock = MockSpannerService::new();
    let session = created_session(Arc::clone(&mock)).await;

    let value = session
        .run_in_transaction(
            |tx| async move {
                tx.execute_sql(Statement::new("SELECT 1"), None).await?;
                Ok::<_, Status>(99)
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(value, 99);
    assert_eq!(mock.sql_requests().len(), 1);
    assert_eq!(mock.commit_requests().len(), 1);
    assert!(mock.begin_requests().is_empty());
}
