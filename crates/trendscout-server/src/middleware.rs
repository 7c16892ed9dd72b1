//! Request middleware: request ids, bearer-token auth, and a fixed-window
//! rate limit applied to the protected API routes.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

/// Correlation id attached to every request and echoed in the
/// `x-request-id` response header.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4().to_string());
    req.extensions_mut().insert(id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.0) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Bearer-token auth backed by the `TRENDSCOUT_API_KEYS` env var
/// (comma-separated). Outside development the variable must be set;
/// in development an empty list disables auth with a warning.
#[derive(Clone)]
pub struct AuthState {
    keys: Arc<Vec<String>>,
    enabled: bool,
}

impl AuthState {
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        Self::from_keys(std::env::var("TRENDSCOUT_API_KEYS").ok(), is_development)
    }

    pub fn from_keys(raw: Option<String>, is_development: bool) -> anyhow::Result<Self> {
        let keys: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_owned)
            .collect();

        if keys.is_empty() {
            if is_development {
                tracing::warn!("TRENDSCOUT_API_KEYS is empty; API auth is disabled");
                return Ok(Self {
                    keys: Arc::new(Vec::new()),
                    enabled: false,
                });
            }
            anyhow::bail!("TRENDSCOUT_API_KEYS must be set outside development");
        }

        Ok(Self {
            keys: Arc::new(keys),
            enabled: true,
        })
    }

    fn accepts(&self, token: &str) -> bool {
        !self.enabled || self.keys.iter().any(|key| key == token)
    }
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .is_some_and(|token| auth.accepts(token));

    if authorized {
        next.run(req).await
    } else {
        reject(
            &req,
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        )
    }
}

fn extract_bearer_token(value: &str) -> Option<&str> {
    let rest = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Fixed-window rate limit shared across all protected routes. The window
/// resets `window` after its first request rather than sliding.
#[derive(Clone)]
pub struct RateLimitState {
    window: Duration,
    max_requests: u32,
    inner: Arc<Mutex<RateWindow>>,
}

struct RateWindow {
    started: Instant,
    count: u32,
}

impl RateLimitState {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            inner: Arc::new(Mutex::new(RateWindow {
                started: Instant::now(),
                count: 0,
            })),
        }
    }

    /// 120 requests per minute, matching the public deployment default.
    pub fn standard() -> Self {
        Self::new(Duration::from_secs(60), 120)
    }

    fn try_acquire(&self) -> Result<(), u64> {
        let Ok(mut window) = self.inner.lock() else {
            return Ok(());
        };

        let now = Instant::now();
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            let elapsed = now.duration_since(window.started);
            let remaining = self.window.saturating_sub(elapsed);
            return Err(remaining.as_secs().max(1));
        }

        window.count += 1;
        Ok(())
    }
}

pub async fn enforce_rate_limit(
    State(limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    match limit.try_acquire() {
        Ok(()) => next.run(req).await,
        Err(retry_after_secs) => {
            let mut response = reject(
                &req,
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "request rate limit exceeded",
            );
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

fn reject(req: &Request, status: StatusCode, code: &str, message: &str) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let body = json!({
        "error": { "code": code, "message": message },
        "meta": { "request_id": request_id },
    });
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_extraction_requires_the_scheme() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Bearer "), None, "empty token is rejected");
        assert_eq!(extract_bearer_token("Basic abc123"), None, "wrong scheme is rejected");
        assert_eq!(extract_bearer_token("abc123"), None, "bare token is rejected");
    }

    #[test]
    fn auth_state_accepts_any_configured_key() {
        let auth = AuthState::from_keys(Some("alpha, beta".to_owned()), false)
            .expect("two keys configured");
        assert!(auth.enabled);
        assert!(auth.accepts("alpha"));
        assert!(auth.accepts("beta"));
        assert!(!auth.accepts("gamma"));
    }

    #[test]
    fn missing_keys_disable_auth_only_in_development() {
        let dev = AuthState::from_keys(None, true).expect("development tolerates empty keys");
        assert!(!dev.enabled);
        assert!(dev.accepts("anything"), "disabled auth accepts all tokens");

        assert!(
            AuthState::from_keys(None, false).is_err(),
            "production requires at least one key"
        );
        assert!(
            AuthState::from_keys(Some(" , ".to_owned()), false).is_err(),
            "whitespace-only keys count as empty"
        );
    }

    #[test]
    fn rate_limit_rejects_after_the_window_budget() {
        let limit = RateLimitState::new(Duration::from_secs(60), 2);
        assert!(limit.try_acquire().is_ok());
        assert!(limit.try_acquire().is_ok());

        let retry = limit.try_acquire().expect_err("third request exceeds the budget");
        assert!(retry >= 1, "retry-after is at least one second");
    }

    #[test]
    fn rate_limit_window_resets_after_expiry() {
        let limit = RateLimitState::new(Duration::from_millis(0), 1);
        assert!(limit.try_acquire().is_ok());
        // Zero-length window: the next call starts a fresh window.
        assert!(limit.try_acquire().is_ok());
    }
}
