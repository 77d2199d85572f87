use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::validate_jwt;
use axum::{extract::{Request, State}, middleware::Next, response::Response};
use chrono::Utc;

/// Per-process sliding-window rate limiter keyed by user id (when a valid
/// bearer token is present) or client IP. State lives in an in-memory map;
/// each replica enforces its own window.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = limiter_key(&state, &req);
    let now = Utc::now().timestamp();
    let window = state.config.rate_limit_window_secs as i64;
    let max = state.config.rate_limit_max_requests as usize;

    let mut retry_after = None;
    {
        let mut entry = state.rate_tracker.entry(key).or_default();
        entry.retain(|t| now - t < window);
        if entry.len() >= max {
            let oldest = entry.first().copied().unwrap_or(now);
            retry_after = Some(((oldest + window) - now).max(1) as u64);
        } else {
            entry.push(now);
        }
    }

    // Lazy prune: drop keys whose window has fully drained
    state
        .rate_tracker
        .retain(|_, timestamps| timestamps.iter().any(|t| now - t < window));

    if let Some(retry_after) = retry_after {
        return Err(AppError::RateLimited { retry_after });
    }

    Ok(next.run(req).await)
}

fn limiter_key(state: &AppState, req: &Request) -> String {
    let user_key = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|token| validate_jwt(token, &state.config).ok())
        .map(|claims| format!("user:{}", claims.sub));

    user_key.unwrap_or_else(|| {
        let ip = req
            .headers()
            .get("x-forwarded-for")
            .or_else(|| req.headers().get("x-real-ip"))
            .and_then(|h| h.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!("ip:{}", ip)
    })
}
