use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Connection and timeout failures are worth another attempt, HTTP and
/// decoding errors are not.
pub fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Runs `operation` until it succeeds, fails with a non transient error, or
/// the policy runs out of retries.
pub async fn with_retry<F, Fut, T>(mut operation: F, policy: RetryPolicy) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt < policy.retries && is_transient(&err) => {
                attempt += 1;
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, policy.retries, err
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_connection_errors_are_retried() {
        let attempts = AtomicUsize::new(0);
        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            retries: 2,
            delay: Duration::from_millis(1),
        };

        // Nothing listens on port 9 of localhost, so every attempt fails to connect.
        let result = with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                client.get("http://127.0.0.1:9/").send()
            },
            policy,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
