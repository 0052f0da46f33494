use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::warn;

use crate::ClientError;

/// Sends a request, rebuilding and resending it on transient failures.
///
/// 429 backs off twice as long as a 5xx or a timeout/connect error. Any other
/// outcome is returned as is, so a final 5xx response still reaches the caller.
pub(crate) async fn send_with_retry<F>(
    build_request: F,
    max_attempts: u32,
    base_delay: Duration,
    context: &str,
) -> Result<Response, ClientError>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let result = build_request().send().await;

        let delay = match &result {
            Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => Some(backoff(base_delay, attempt + 1)),
            Ok(response) if response.status().is_server_error() => Some(backoff(base_delay, attempt)),
            Err(err) if err.is_timeout() || err.is_connect() => Some(backoff(base_delay, attempt)),
            _ => None,
        };

        match delay {
            Some(delay) if attempt + 1 < max_attempts => {
                match &result {
                    Ok(response) => warn!("{context}: {} from server, retrying in {delay:?}", response.status()),
                    Err(err) => warn!("{context}: network error ({err}), retrying in {delay:?}"),
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Some(_) => {
                warn!("{context}: giving up after {max_attempts} attempts");
                return result.map_err(ClientError::from);
            }
            None => return result.map_err(ClientError::from),
        }
    }
}

/// `base_delay · 2^exponent`, saturating instead of overflowing.
fn backoff(base_delay: Duration, exponent: u32) -> Duration {
    base_delay.saturating_mul(2u32.saturating_pow(exponent))
}

#[test]
fn backoff_doubles_and_saturates() {
    let base = Duration::from_millis(100);
    assert_eq!(backoff(base, 0), base);
    assert_eq!(backoff(base, 3), Duration::from_millis(800));
    assert_eq!(backoff(base, 40), base * u32::MAX);
    assert_eq!(backoff(Duration::MAX, 2), Duration::MAX);
}
