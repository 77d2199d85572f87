use crate::api::error::AppError;
use crate::api::middleware::auth::MaybeUser;
use crate::entities::users;
use crate::services::profile_service::{ProfileService, UserSearch};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct SearchUsersQuery {
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Public card for listing contexts; email and birth date stay out.
fn user_card(u: &users::Model) -> Value {
    json!({
        "id": u.id,
        "nom": u.nom,
        "prenom": u.prenom,
        "role": u.role,
        "classe": u.classe,
        "matiere": u.matiere,
        "avatar_url": u.avatar_url,
        "bio": u.bio,
    })
}

#[utoipa::path(
    get,
    path = "/api/profil/{user_id}",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile with counts and stats"),
        (status = 404, description = "Unknown or deactivated user")
    ),
    tag = "profil"
)]
pub async fn get_profile(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let profile = ProfileService::get_profile(&state.db, &user_id, viewer.user_id()).await?;

    Ok(Json(json!({ "success": true, "profil": profile })))
}

#[utoipa::path(
    post,
    path = "/api/profil/{user_id}/follow",
    params(("user_id" = String, Path, description = "User to follow")),
    responses(
        (status = 200, description = "Now following"),
        (status = 400, description = "Cannot follow yourself"),
        (status = 409, description = "Already following")
    ),
    security(("jwt" = [])),
    tag = "profil"
)]
pub async fn follow_user(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ProfileService::follow(&state.db, &claims.sub, &user_id).await?;
    Ok(Json(json!({ "success": true, "following": true })))
}

#[utoipa::path(
    delete,
    path = "/api/profil/{user_id}/follow",
    params(("user_id" = String, Path, description = "User to unfollow")),
    responses(
        (status = 200, description = "No longer following"),
        (status = 404, description = "Was not following")
    ),
    security(("jwt" = [])),
    tag = "profil"
)]
pub async fn unfollow_user(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ProfileService::unfollow(&state.db, &claims.sub, &user_id).await?;
    Ok(Json(json!({ "success": true, "following": false })))
}

#[utoipa::path(
    get,
    path = "/api/profil/{user_id}/followers",
    params(("user_id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Followers, paginated")),
    tag = "profil"
)]
pub async fn list_followers(
    State(state): State<crate::AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let (users, pagination) =
        ProfileService::followers(&state.db, &user_id, query.page, query.limit).await?;

    Ok(Json(json!({
        "success": true,
        "followers": users.iter().map(user_card).collect::<Vec<_>>(),
        "pagination": pagination,
    })))
}

#[utoipa::path(
    get,
    path = "/api/profil/{user_id}/following",
    params(("user_id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Followed users, paginated")),
    tag = "profil"
)]
pub async fn list_following(
    State(state): State<crate::AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let (users, pagination) =
        ProfileService::following(&state.db, &user_id, query.page, query.limit).await?;

    Ok(Json(json!({
        "success": true,
        "following": users.iter().map(user_card).collect::<Vec<_>>(),
        "pagination": pagination,
    })))
}

#[utoipa::path(
    get,
    path = "/api/profil/{user_id}/activity",
    params(("user_id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Recent activity; empty for anyone but the owner")),
    tag = "profil"
)]
pub async fn get_activity(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let (items, pagination, message) =
        ProfileService::get_activity(&state.db, &user_id, viewer.user_id(), query.page, query.limit)
            .await?;

    let mut body = json!({
        "success": true,
        "activite": items,
        "pagination": pagination,
    });
    if let Some(message) = message {
        body["message"] = json!(message);
    }

    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/utilisateurs",
    params(
        ("search" = Option<String>, Query, description = "Name or email fragment"),
        ("role" = Option<String>, Query, description = "professeur|eleve")
    ),
    responses((status = 200, description = "Active users matching the search")),
    tag = "profil"
)]
pub async fn search_users(
    State(state): State<crate::AppState>,
    Query(query): Query<SearchUsersQuery>,
) -> Result<Json<Value>, AppError> {
    let (users, pagination) = ProfileService::search_users(
        &state.db,
        UserSearch {
            term: query.search,
            role: query.role,
            page: query.page,
            limit: query.limit,
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "utilisateurs": users.iter().map(user_card).collect::<Vec<_>>(),
        "pagination": pagination,
    })))
}
