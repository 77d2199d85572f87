use crate::utils::auth::{Claims, validate_jwt};
use crate::{AppState, entities::prelude::Users};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;

/// Optionally-authenticated viewer. Public read endpoints go through the
/// optional middleware and receive this instead of bare `Claims`.
#[derive(Clone, Debug)]
pub struct MaybeUser(pub Option<Claims>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|c| c.sub.as_str())
    }
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

// Takes the token by value so the middleware futures stay Send; the request
// body must not be borrowed across the database await.
async fn resolve_claims(
    state: &AppState,
    token: Option<String>,
) -> Result<Option<Claims>, StatusCode> {
    let Some(token) = token else {
        return Ok(None);
    };

    let Ok(claims) = validate_jwt(&token, &state.config) else {
        return Ok(None);
    };

    // The token may outlive the account; check the user is still active
    let user = Users::find_by_id(claims.sub.clone())
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    match user {
        Some(u) if u.is_active => Ok(Some(claims)),
        _ => Ok(None),
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match resolve_claims(&state, bearer_token(&req)).await? {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Same token resolution, but anonymous requests pass through. Invalid or
/// stale tokens degrade to anonymous instead of failing the request.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = resolve_claims(&state, bearer_token(&req)).await?;
    req.extensions_mut().insert(MaybeUser(claims));
    Ok(next.run(req).await)
}
