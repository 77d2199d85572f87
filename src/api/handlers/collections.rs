use crate::api::error::AppError;
use crate::api::middleware::auth::MaybeUser;
use crate::services::collection_service::{
    CollectionDetail, CollectionService, CollectionSummary, CreateCollection, UpdateCollection,
    CollectionFilters,
};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateCollectionRequest {
    #[validate(length(min = 1, max = 100, message = "Le nom doit faire entre 1 et 100 caractères"))]
    pub nom: String,
    #[validate(length(max = 500, message = "La description ne doit pas dépasser 500 caractères"))]
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateCollectionRequest {
    #[validate(length(min = 1, max = 100, message = "Le nom doit faire entre 1 et 100 caractères"))]
    pub nom: Option<String>,
    #[validate(length(max = 500, message = "La description ne doit pas dépasser 500 caractères"))]
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct ListCollectionsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub author_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddRessourceRequest {
    pub ressource_id: String,
    pub ordre: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub ressources: Vec<ReorderEntry>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderEntry {
    pub ressource_id: String,
    pub ordre: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct DuplicateRequest {
    pub nom: Option<String>,
}

fn summary_json(s: &CollectionSummary) -> Value {
    json!({
        "id": s.collection.id,
        "nom": s.collection.nom,
        "description": s.collection.description,
        "author_id": s.collection.author_id,
        "is_public": s.collection.is_public,
        "ressources_count": s.ressources_count,
        "created_at": s.collection.created_at,
        "updated_at": s.collection.updated_at,
    })
}

fn detail_json(d: &CollectionDetail) -> Value {
    let ressources: Vec<Value> = d
        .membres
        .iter()
        .map(|(membre, r)| {
            json!({
                "id": r.id,
                "titre": r.titre,
                "description": r.description,
                "type": r.type_ressource,
                "author_id": r.author_id,
                "is_public": r.is_public,
                "ordre": membre.ordre,
                "added_at": membre.created_at,
            })
        })
        .collect();

    json!({
        "id": d.collection.id,
        "nom": d.collection.nom,
        "description": d.collection.description,
        "author_id": d.collection.author_id,
        "is_public": d.collection.is_public,
        "ressources_count": d.ressources_count,
        "ressources": ressources,
        "created_at": d.collection.created_at,
        "updated_at": d.collection.updated_at,
    })
}

#[utoipa::path(
    get,
    path = "/api/collections",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("author_id" = Option<String>, Query, description = "Filter by owner"),
        ("search" = Option<String>, Query, description = "Free text over nom/description")
    ),
    responses((status = 200, description = "Visible collections, paginated")),
    tag = "collections"
)]
pub async fn list_collections(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Query(query): Query<ListCollectionsQuery>,
) -> Result<Json<Value>, AppError> {
    let (items, pagination) = CollectionService::list(
        &state.db,
        viewer.user_id(),
        CollectionFilters {
            page: query.page,
            limit: query.limit,
            author_id: query.author_id,
            search: query.search,
        },
    )
    .await?;

    let collections: Vec<Value> = items.iter().map(summary_json).collect();

    Ok(Json(json!({
        "success": true,
        "collections": collections,
        "pagination": pagination,
    })))
}

#[utoipa::path(
    post,
    path = "/api/collections",
    request_body = CreateCollectionRequest,
    responses((status = 201, description = "Collection created")),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn create_collection(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    payload.validate().map_err(AppError::from_validation)?;

    let collection = CollectionService::create(
        &state.db,
        &claims.sub,
        CreateCollection {
            nom: payload.nom,
            description: payload.description,
            is_public: payload.is_public,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "collection": collection })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/collections/{id}",
    params(("id" = String, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection with ordered member ressources"),
        (status = 404, description = "Absent or not visible to this viewer")
    ),
    tag = "collections"
)]
pub async fn get_collection(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let detail = CollectionService::get(&state.db, &id, viewer.user_id()).await?;

    Ok(Json(json!({
        "success": true,
        "collection": detail_json(&detail),
    })))
}

#[utoipa::path(
    put,
    path = "/api/collections/{id}",
    params(("id" = String, Path, description = "Collection ID")),
    request_body = UpdateCollectionRequest,
    responses(
        (status = 200, description = "Collection updated"),
        (status = 403, description = "Not the author")
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn update_collection(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCollectionRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate().map_err(AppError::from_validation)?;

    let collection = CollectionService::update(
        &state.db,
        &id,
        &claims.sub,
        UpdateCollection {
            nom: payload.nom,
            description: payload.description,
            is_public: payload.is_public,
        },
    )
    .await?;

    Ok(Json(json!({ "success": true, "collection": collection })))
}

#[utoipa::path(
    delete,
    path = "/api/collections/{id}",
    params(("id" = String, Path, description = "Collection ID")),
    responses((status = 200, description = "Collection and membership rows deleted")),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn delete_collection(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    CollectionService::delete(&state.db, &id, &claims.sub).await?;
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    post,
    path = "/api/collections/{id}/ressources",
    params(("id" = String, Path, description = "Collection ID")),
    request_body = AddRessourceRequest,
    responses(
        (status = 200, description = "Ressource added to the collection"),
        (status = 409, description = "Already a member")
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn add_ressource(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<AddRessourceRequest>,
) -> Result<Json<Value>, AppError> {
    let membre = CollectionService::add_ressource(
        &state.db,
        &id,
        &payload.ressource_id,
        payload.ordre,
        &claims.sub,
    )
    .await?;

    Ok(Json(json!({ "success": true, "membre": membre })))
}

#[utoipa::path(
    delete,
    path = "/api/collections/{id}/ressources/{ressource_id}",
    params(
        ("id" = String, Path, description = "Collection ID"),
        ("ressource_id" = String, Path, description = "Ressource ID")
    ),
    responses(
        (status = 200, description = "Ressource removed"),
        (status = 404, description = "Not a member")
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn remove_ressource(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, ressource_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    CollectionService::remove_ressource(&state.db, &id, &ressource_id, &claims.sub).await?;
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    put,
    path = "/api/collections/{id}/reorder",
    params(("id" = String, Path, description = "Collection ID")),
    request_body = ReorderRequest,
    responses((status = 200, description = "Member order updated")),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn reorder_ressources(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<Value>, AppError> {
    let positions = payload
        .ressources
        .into_iter()
        .map(|e| (e.ressource_id, e.ordre))
        .collect();

    CollectionService::reorder(&state.db, &id, &claims.sub, positions).await?;
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    post,
    path = "/api/collections/{id}/dupliquer",
    params(("id" = String, Path, description = "Collection ID")),
    request_body = DuplicateRequest,
    responses((status = 201, description = "Private copy created for the caller")),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn duplicate_collection(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<DuplicateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let copy = CollectionService::duplicate(&state.db, &id, payload.nom, &claims.sub).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "collection": copy })),
    ))
}
