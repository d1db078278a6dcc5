//! Busy-retry for SQLite writes that race with other connections.

use rand::random;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::{Error, Result};

/// Retries after the first attempt.
const MAX_BUSY_RETRIES: u32 = 12;
const BASE_DELAY: Duration = Duration::from_millis(10);
const MAX_DELAY: Duration = Duration::from_secs(2);

// SQLITE_BUSY, SQLITE_LOCKED
const BUSY_CODES: [&str; 2] = ["5", "6"];

fn mentions_busy(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("database is locked") || message.contains("database is busy")
}

fn is_busy(err: &Error) -> bool {
    match err {
        Error::DatabaseSqlx(sqlx::Error::Database(db_err)) => {
            db_err
                .code()
                .is_some_and(|code| BUSY_CODES.contains(&&*code))
                || mentions_busy(db_err.message())
        }
        Error::DatabaseSqlx(other) => mentions_busy(&other.to_string()),
        _ => false,
    }
}

/// Capped exponential delays with up to 25% jitter.
struct BusyBackoff {
    retries: u32,
}

impl BusyBackoff {
    fn new() -> Self {
        Self { retries: 0 }
    }

    /// Delay before the next retry, or `None` once retries are used up.
    fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= MAX_BUSY_RETRIES {
            return None;
        }
        let base = BASE_DELAY
            .saturating_mul(1u32 << self.retries.min(16))
            .min(MAX_DELAY);
        let jitter_ms = random::<u64>() % (base.as_millis() as u64 / 4 + 1);
        self.retries += 1;
        Some((base + Duration::from_millis(jitter_ms)).min(MAX_DELAY))
    }
}

/// Run `op`, retrying while SQLite reports the database as busy or locked.
/// Any other error is returned immediately.
pub async fn retry_on_sqlite_busy<T, F, Fut>(op_name: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = BusyBackoff::new();
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_busy(&err) {
            return Err(err);
        }
        let Some(delay) = backoff.next_delay() else {
            return Err(err);
        };
        debug!(
            op = op_name,
            retry = backoff.retries,
            ?delay,
            "SQLite busy, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_non_busy_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry_on_sqlite_busy("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::validation("nope")) }
        })
        .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_busy_error_is_retried() {
        let calls = AtomicUsize::new(0);
        let result = retry_on_sqlite_busy("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::DatabaseSqlx(sqlx::Error::Protocol(
                        "database is locked".to_string(),
                    )))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_is_capped_and_bounded() {
        let mut backoff = BusyBackoff::new();
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_delay()).collect();
        assert_eq!(delays.len(), MAX_BUSY_RETRIES as usize);
        assert!(delays[0] >= BASE_DELAY);
        assert!(delays.iter().all(|d| *d <= MAX_DELAY));
        assert_eq!(*delays.last().unwrap(), MAX_DELAY);
    }
}
