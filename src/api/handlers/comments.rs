use crate::api::error::AppError;
use crate::api::middleware::auth::MaybeUser;
use crate::services::comment_service::{CommentService, CommentThread};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub contenu: String,
    pub parent_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateCommentRequest {
    pub contenu: String,
}

fn author_json(author: &Option<crate::entities::users::Model>) -> Value {
    match author {
        Some(u) => json!({
            "id": u.id,
            "nom": u.nom,
            "prenom": u.prenom,
            "role": u.role,
            "avatar_url": u.avatar_url,
        }),
        None => Value::Null,
    }
}

fn thread_json(thread: &CommentThread) -> Value {
    let replies: Vec<Value> = thread
        .replies
        .iter()
        .map(|(reply, author)| {
            json!({
                "id": reply.id,
                "contenu": reply.contenu,
                "author": author_json(author),
                "parent_id": reply.parent_id,
                "is_edited": reply.is_edited,
                "created_at": reply.created_at,
                "updated_at": reply.updated_at,
            })
        })
        .collect();

    json!({
        "id": thread.comment.id,
        "contenu": thread.comment.contenu,
        "author": author_json(&thread.author),
        "is_edited": thread.comment.is_edited,
        "created_at": thread.comment.created_at,
        "updated_at": thread.comment.updated_at,
        "replies": replies,
    })
}

#[utoipa::path(
    get,
    path = "/api/ressources/{id}/commentaires",
    params(("id" = String, Path, description = "Ressource ID")),
    responses(
        (status = 200, description = "Threaded comments, newest top-level first"),
        (status = 404, description = "Ressource absent or not visible")
    ),
    tag = "commentaires"
)]
pub async fn list_comments(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let threads = CommentService::list_by_ressource(&state.db, &id, viewer.user_id()).await?;

    let commentaires: Vec<Value> = threads.iter().map(thread_json).collect();

    Ok(Json(json!({
        "success": true,
        "commentaires": commentaires,
    })))
}

#[utoipa::path(
    post,
    path = "/api/ressources/{id}/commentaires",
    params(("id" = String, Path, description = "Ressource ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created"),
        (status = 400, description = "Contenu invalid or parent not a valid top-level comment")
    ),
    security(("jwt" = [])),
    tag = "commentaires"
)]
pub async fn create_comment(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let comment = CommentService::create(
        &state.db,
        &id,
        &claims.sub,
        payload.contenu.trim(),
        payload.parent_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "commentaire": comment })),
    ))
}

#[utoipa::path(
    put,
    path = "/api/commentaires/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated and flagged as edited"),
        (status = 403, description = "Not the author")
    ),
    security(("jwt" = [])),
    tag = "commentaires"
)]
pub async fn update_comment(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<Value>, AppError> {
    let comment =
        CommentService::update(&state.db, &id, &claims.sub, payload.contenu.trim()).await?;

    Ok(Json(json!({ "success": true, "commentaire": comment })))
}

#[utoipa::path(
    delete,
    path = "/api/commentaires/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment and its direct replies deleted"),
        (status = 403, description = "Not the author")
    ),
    security(("jwt" = [])),
    tag = "commentaires"
)]
pub async fn delete_comment(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    CommentService::delete(&state.db, &id, &claims.sub).await?;
    Ok(Json(json!({ "success": true })))
}
