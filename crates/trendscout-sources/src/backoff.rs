//! Retry with exponential back-off and jitter for the source fetchers.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! errors the supplied policy deems transient. The two fetcher variants carry
//! different policies: the paginated source retries the same page on 429, the
//! single-shot source treats 429 as final because its window admits one call.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

const MAX_DELAY_MS: u64 = 60_000;

/// Retry policy for the paginated listing source.
///
/// **Retriable:** transport failures (timeout, connection reset), 5xx, and
/// 429; the same page is retried after the delay, never a later cursor.
///
/// **Not retriable:** [`SourceError::Auth`] (config-level, surfaced
/// immediately), [`SourceError::QuotaExhausted`] (blocked until the period
/// reset), [`SourceError::Deserialize`] and [`SourceError::PaginationLimit`]
/// (retrying returns the same bytes).
pub(crate) fn paginated_retriable(err: &SourceError) -> bool {
    match err {
        SourceError::RateLimited { .. } => true,
        other => transport_retriable(other),
    }
}

/// Retry policy for the single-shot search source: transport failures and
/// 5xx only.
pub(crate) fn single_shot_retriable(err: &SourceError) -> bool {
    transport_retriable(err)
}

fn transport_retriable(err: &SourceError) -> bool {
    match err {
        SourceError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SourceError::UnexpectedStatus { status, .. } => *status >= 500,
        SourceError::Auth { .. }
        | SourceError::RateLimited { .. }
        | SourceError::QuotaExhausted { .. }
        | SourceError::Deserialize { .. }
        | SourceError::PaginationLimit { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on errors
/// accepted by `is_retriable`.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt        |
/// |---------|----------------------------------|
/// | 1       | 1 000 ms × 2⁰ ± 25 % jitter     |
/// | 2       | 1 000 ms × 2¹ ± 25 % jitter     |
/// | 3       | 1 000 ms × 2² ± 25 % jitter     |
///
/// Delay is capped at 60 s. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut, P>(
    max_retries: u32,
    backoff_base_ms: u64,
    is_retriable: P,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
    P: Fn(&SourceError) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient source error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
