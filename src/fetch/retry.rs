//! Retry timing and cooperative cancellation
//!
//! Every suspension point in the pipeline and the poller goes through
//! [`sleep_or_cancel`] so that a fired cancellation token resolves a pending
//! delay immediately instead of waiting out its timer.

use crate::LogoError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default number of attempts beyond the first for rate-limited requests
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Upper bound on a server-requested `Retry-After`
pub const MAX_RETRY_AFTER_SECS: u64 = 300;

/// Fixed delay before the single retry of an HTTP 500
pub const SERVER_ERROR_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Converts a `Retry-After` value into the delay before the next attempt
///
/// The delay is at least one second and at most five minutes.
///
/// ```
/// use std::time::Duration;
/// use quikturn_logos::fetch::rate_limit_delay;
///
/// assert_eq!(rate_limit_delay(0), Duration::from_secs(1));
/// assert_eq!(rate_limit_delay(30), Duration::from_secs(30));
/// assert_eq!(rate_limit_delay(3600), Duration::from_secs(300));
/// ```
pub fn rate_limit_delay(retry_after_secs: u64) -> Duration {
    Duration::from_secs(retry_after_secs.clamp(1, MAX_RETRY_AFTER_SECS))
}

/// Fails with `Abort` if the token has fired
pub fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), LogoError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(LogoError::Abort),
        _ => Ok(()),
    }
}

/// Sleeps for `duration` unless the token fires first
///
/// # Returns
///
/// * `Ok(())` - The full delay elapsed
/// * `Err(LogoError::Abort)` - The token fired before or during the delay
pub async fn sleep_or_cancel(
    duration: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<(), LogoError> {
    check_cancelled(cancel)?;

    match cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => Err(LogoError::Abort),
                _ = tokio::time::sleep(duration) => Ok(()),
            }
        }
        None => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_rate_limit_delay_bounds() {
        assert_eq!(rate_limit_delay(0), Duration::from_secs(1));
        assert_eq!(rate_limit_delay(1), Duration::from_secs(1));
        assert_eq!(rate_limit_delay(299), Duration::from_secs(299));
        assert_eq!(rate_limit_delay(u64::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_check_cancelled() {
        assert!(check_cancelled(None).is_ok());

        let token = CancellationToken::new();
        assert!(check_cancelled(Some(&token)).is_ok());
        token.cancel();
        assert_eq!(check_cancelled(Some(&token)), Err(LogoError::Abort));
    }

    #[tokio::test]
    async fn test_sleep_completes_without_token() {
        let start = Instant::now();
        sleep_or_cancel(Duration::from_millis(20), None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_sleep_rejects_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let result = sleep_or_cancel(Duration::from_secs(60), Some(&token)).await;
        assert_eq!(result, Err(LogoError::Abort));
    }

    #[tokio::test]
    async fn test_sleep_resolves_early_on_cancel() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(60), Some(&token)).await;
        assert_eq!(result, Err(LogoError::Abort));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
