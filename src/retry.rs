//! Bounded retry executor around transient external fetches.
//!
//! Backoff is exact powers of two: the wait after a failure on attempt `k`
//! is `2^(k-1)` seconds, so a fully failing run sleeps 1, 2, 4, 8 seconds
//! between its five attempts and never makes a sixth. Every failed attempt
//! is journaled as `fetch_retry`/`retry`; the final outcome is journaled
//! exactly once. Backoff sleeps abort immediately on shutdown with a
//! `Cancelled` outcome that counts as neither success nor failure.
//!
//! Fetch outcomes surface as [`AgentError::Fetch`] and the calling cycle
//! skips the venue; a journal append failure surfaces as
//! [`AgentError::Persistence`] and is fatal to the process.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AgentError, FetchError, Result};
use crate::market::Venue;
use crate::metrics;
use crate::storage::{TaskAction, TaskJournal, TaskLogEntry, TaskStatus};
use crate::utils::ShutdownListener;

/// Default attempt bound.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff before the next attempt after a failure on `attempt` (1-indexed).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1))
}

/// Run `operation` with bounded exponential backoff.
pub async fn with_retry<T, F, Fut>(
    venue: Venue,
    subject: &str,
    max_attempts: u32,
    journal: &dyn TaskJournal,
    shutdown: &mut ShutdownListener,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, FetchError>>,
{
    let mut last_reason = String::new();

    for attempt in 1..=max_attempts {
        if shutdown.is_triggered() {
            return Err(FetchError::Cancelled.into());
        }

        match operation().await {
            Ok(value) => {
                journal
                    .append(
                        TaskLogEntry::new(TaskAction::FetchRetry, TaskStatus::Success, subject)
                            .with_detail(format!("{venue} attempt {attempt}/{max_attempts}")),
                    )
                    .await?;
                return Ok(value);
            }
            Err(err) if err.is_cancelled() => return Err(err.into()),
            Err(err) => {
                last_reason = err.to_string();
                metrics::inc_fetch_retry(venue);
                warn!(
                    venue = %venue,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Fetch attempt failed"
                );
                journal
                    .append(
                        TaskLogEntry::new(TaskAction::FetchRetry, TaskStatus::Retry, subject)
                            .with_detail(format!("{venue} attempt {attempt}/{max_attempts}"))
                            .with_error(last_reason.clone()),
                    )
                    .await?;

                // No retry follows the last attempt, so no backoff either.
                if attempt < max_attempts {
                    let delay = backoff_delay(attempt);
                    debug!(venue = %venue, delay_secs = delay.as_secs(), "Backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.wait() => return Err(FetchError::Cancelled.into()),
                    }
                }
            }
        }
    }

    metrics::inc_fetch_failure(venue);
    journal
        .append(
            TaskLogEntry::new(TaskAction::FetchRetry, TaskStatus::Failure, subject)
                .with_detail(format!("{venue} exhausted {max_attempts} attempts"))
                .with_error(last_reason.clone()),
        )
        .await?;

    Err(AgentError::Fetch(FetchError::Exhausted {
        venue,
        attempts: max_attempts,
        reason: last_reason,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::storage::InMemoryJournal;
    use crate::utils::Shutdown;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> FetchError {
        FetchError::Transient {
            venue: Venue::Kalshi,
            reason: "timeout".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_retries_with_exact_backoff() {
        let journal = InMemoryJournal::new();
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        let calls = Arc::new(AtomicU32::new(0));

        let started = tokio::time::Instant::now();
        let result = with_retry(Venue::Kalshi, "crypto", 5, &journal, &mut listener, || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two failures: 1s + 2s of backoff under paused time.
        assert_eq!(started.elapsed(), Duration::from_secs(3));

        let entries = journal.replay_since(None).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, TaskStatus::Retry);
        assert_eq!(entries[1].status, TaskStatus::Retry);
        assert_eq!(entries[2].status, TaskStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_five_attempts() {
        let journal = InMemoryJournal::new();
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        let calls = Arc::new(AtomicU32::new(0));

        let started = tokio::time::Instant::now();
        let result: Result<()> =
            with_retry(Venue::Polymarket, "sports", 5, &journal, &mut listener, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Transient {
                        venue: Venue::Polymarket,
                        reason: "down".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(AgentError::Fetch(FetchError::Exhausted { attempts: 5, .. }))
        ));
        // Never a sixth attempt.
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // Backoff between attempts only: 1+2+4+8 seconds, none after the last.
        assert_eq!(started.elapsed(), Duration::from_secs(15));

        let entries = journal.replay_since(None).await.unwrap();
        assert_eq!(entries.len(), 6);
        assert!(entries[..5].iter().all(|e| e.status == TaskStatus::Retry));
        assert_eq!(entries[5].status, TaskStatus::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_backoff() {
        let journal = InMemoryJournal::new();
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let handle = tokio::spawn(async move {
            with_retry::<(), _, _>(Venue::Kalshi, "tech", 5, &journal, &mut listener, || async {
                Err(FetchError::Transient {
                    venue: Venue::Kalshi,
                    reason: "down".to_string(),
                })
            })
            .await
        });

        // Let the first attempt fail and enter its backoff sleep.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        shutdown.trigger();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(AgentError::Fetch(FetchError::Cancelled))
        ));
    }

    /// Journal that rejects every append.
    struct BrokenJournal;

    #[async_trait]
    impl TaskJournal for BrokenJournal {
        async fn append(
            &self,
            _entry: TaskLogEntry,
        ) -> std::result::Result<(), PersistenceError> {
            Err(PersistenceError::Journal("disk full".to_string()))
        }

        async fn replay_since(
            &self,
            _since: Option<time::OffsetDateTime>,
        ) -> std::result::Result<Vec<TaskLogEntry>, PersistenceError> {
            Ok(Vec::new())
        }

        async fn recent(
            &self,
            _limit: usize,
        ) -> std::result::Result<Vec<TaskLogEntry>, PersistenceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn journal_append_failure_is_persistence_not_fetch() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        // The fetch itself succeeds; only the journal write fails.
        let result = with_retry(
            Venue::Kalshi,
            "crypto",
            5,
            &BrokenJournal,
            &mut listener,
            || async { Ok(42) },
        )
        .await;

        assert!(matches!(result, Err(AgentError::Persistence(_))));
    }

    #[test]
    fn backoff_schedule_is_powers_of_two() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), Duration::from_secs(16));
    }
}
