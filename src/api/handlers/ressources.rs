use crate::api::error::AppError;
use crate::api::middleware::auth::MaybeUser;
use crate::services::collection_service::CollectionService;
use crate::services::ressource_service::{
    CreateRessource, RessourceFilters, RessourceService, RessourceView, UpdateRessource,
    UploadedFile,
};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct RessourceResponse {
    pub id: String,
    pub titre: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ressource: String,
    pub contenu: Value,
    pub tags: Vec<String>,
    pub matiere: Option<String>,
    pub niveau: Option<String>,
    pub author_id: String,
    pub is_public: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub downloads_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub is_liked: bool,
    pub is_favorited: bool,
}

impl From<RessourceView> for RessourceResponse {
    fn from(view: RessourceView) -> Self {
        let r = view.ressource;
        Self {
            tags: serde_json::from_str(&r.tags).unwrap_or_default(),
            id: r.id,
            titre: r.titre,
            description: r.description,
            type_ressource: r.type_ressource,
            contenu: r.contenu,
            matiere: r.matiere,
            niveau: r.niveau,
            author_id: r.author_id,
            is_public: r.is_public,
            views_count: r.views_count,
            likes_count: r.likes_count,
            downloads_count: r.downloads_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
            is_liked: view.is_liked,
            is_favorited: view.is_favorited,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ListRessourcesQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(rename = "type")]
    pub type_ressource: Option<String>,
    pub matiere: Option<String>,
    pub niveau: Option<String>,
    pub author_id: Option<String>,
    /// Comma-separated tag list, overlap semantics
    pub tags: Option<String>,
    pub search: Option<String>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct GetRessourceQuery {
    pub track_view: Option<bool>,
}

fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    (ip, user_agent)
}

/// Collects the multipart fields shared by create and update. Text fields
/// are plain strings; `contenu` and `tags` arrive JSON-encoded.
struct RessourceForm {
    fields: std::collections::HashMap<String, String>,
    file: Option<UploadedFile>,
}

async fn read_multipart(
    mut multipart: Multipart,
    max_files: usize,
) -> Result<RessourceForm, AppError> {
    let mut fields = std::collections::HashMap::new();
    let mut file = None;
    let mut file_count = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file_count += 1;
            if file_count > max_files {
                return Err(AppError::Validation(format!(
                    "{} fichiers maximum par requête",
                    max_files
                )));
            }
            let filename = field.file_name().unwrap_or("fichier").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?
                .to_vec();
            file = Some(UploadedFile {
                filename,
                content_type,
                data,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            fields.insert(name, value);
        }
    }

    Ok(RessourceForm { fields, file })
}

fn parse_tags(raw: Option<&String>) -> Result<Vec<String>, AppError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| AppError::Validation("Le champ 'tags' doit être un tableau JSON".to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/api/ressources",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Page size, 50 max"),
        ("type" = Option<String>, Query, description = "document|media|video|lien"),
        ("search" = Option<String>, Query, description = "Free text over titre/description"),
        ("tags" = Option<String>, Query, description = "Comma-separated tags")
    ),
    responses((status = 200, description = "Visible ressources, paginated")),
    tag = "ressources"
)]
pub async fn list_ressources(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Query(query): Query<ListRessourcesQuery>,
) -> Result<Json<Value>, AppError> {
    let tags = query
        .tags
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let (items, pagination) = RessourceService::list(
        &state.db,
        viewer.user_id(),
        RessourceFilters {
            page: query.page,
            limit: query.limit,
            type_ressource: query.type_ressource,
            matiere: query.matiere,
            niveau: query.niveau,
            author_id: query.author_id,
            tags,
            search: query.search,
            sort_by: query.sort_by,
            sort_order: query.sort_order,
        },
    )
    .await?;

    let ressources: Vec<RessourceResponse> =
        items.into_iter().map(RessourceResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "ressources": ressources,
        "pagination": pagination,
    })))
}

#[utoipa::path(
    post,
    path = "/api/ressources",
    request_body(content = Multipart, description = "Fields titre, type, contenu, tags plus an optional file part"),
    responses(
        (status = 201, description = "Ressource created"),
        (status = 400, description = "Validation failure")
    ),
    security(("jwt" = [])),
    tag = "ressources"
)]
pub async fn create_ressource(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let form = read_multipart(multipart, state.config.max_files_per_request).await?;

    let titre = form
        .fields
        .get("titre")
        .filter(|t| !t.is_empty())
        .cloned()
        .ok_or_else(|| AppError::Validation("Le titre est requis".to_string()))?;
    let type_ressource = form
        .fields
        .get("type")
        .cloned()
        .ok_or_else(|| AppError::Validation("Le type est requis".to_string()))?;
    let contenu = match form.fields.get("contenu") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| AppError::Validation("Le champ 'contenu' doit être du JSON".to_string()))?,
        None => json!({}),
    };

    let view = RessourceService::create(
        &state.db,
        state.storage.as_ref(),
        &state.config,
        &claims.sub,
        CreateRessource {
            titre,
            description: form.fields.get("description").cloned(),
            type_ressource,
            contenu,
            tags: parse_tags(form.fields.get("tags"))?,
            matiere: form.fields.get("matiere").cloned(),
            niveau: form.fields.get("niveau").cloned(),
            is_public: form.fields.get("is_public").map(|v| v == "true"),
        },
        form.file,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": RessourceResponse::from(RessourceView {
                ressource: view,
                is_liked: false,
                is_favorited: false,
            }),
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/ressources/{id}",
    params(
        ("id" = String, Path, description = "Ressource ID"),
        ("track_view" = Option<bool>, Query, description = "Log this view")
    ),
    responses(
        (status = 200, description = "Ressource detail"),
        (status = 404, description = "Absent or not visible to this viewer")
    ),
    tag = "ressources"
)]
pub async fn get_ressource(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(id): Path<String>,
    Query(query): Query<GetRessourceQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let (ip, user_agent) = client_meta(&headers);
    let view = RessourceService::get(
        &state.db,
        &id,
        viewer.user_id(),
        query.track_view.unwrap_or(false),
        ip,
        user_agent,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "ressource": RessourceResponse::from(view),
    })))
}

#[utoipa::path(
    put,
    path = "/api/ressources/{id}",
    params(("id" = String, Path, description = "Ressource ID")),
    request_body(content = Multipart, description = "Whitelisted fields plus an optional replacement file"),
    responses(
        (status = 200, description = "Ressource updated"),
        (status = 403, description = "Not the author")
    ),
    security(("jwt" = [])),
    tag = "ressources"
)]
pub async fn update_ressource(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = read_multipart(multipart, state.config.max_files_per_request).await?;

    let tags = match form.fields.get("tags") {
        Some(_) => Some(parse_tags(form.fields.get("tags"))?),
        None => None,
    };

    let ressource = RessourceService::update(
        &state.db,
        state.storage.as_ref(),
        &state.config,
        &id,
        &claims.sub,
        UpdateRessource {
            titre: form.fields.get("titre").cloned(),
            description: form.fields.get("description").cloned(),
            tags,
            matiere: form.fields.get("matiere").cloned(),
            niveau: form.fields.get("niveau").cloned(),
            is_public: form.fields.get("is_public").map(|v| v == "true"),
        },
        form.file,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": RessourceResponse::from(RessourceView {
            ressource,
            is_liked: false,
            is_favorited: false,
        }),
    })))
}

#[utoipa::path(
    delete,
    path = "/api/ressources/{id}",
    params(("id" = String, Path, description = "Ressource ID")),
    responses(
        (status = 200, description = "Ressource and stored file deleted"),
        (status = 403, description = "Not the author")
    ),
    security(("jwt" = [])),
    tag = "ressources"
)]
pub async fn delete_ressource(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    RessourceService::delete(&state.db, state.storage.as_ref(), &id, &claims.sub).await?;
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    post,
    path = "/api/ressources/{id}/like",
    params(("id" = String, Path, description = "Ressource ID")),
    responses((status = 200, description = "New like state")),
    security(("jwt" = [])),
    tag = "ressources"
)]
pub async fn toggle_like(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let liked = RessourceService::toggle_like(&state.db, &claims.sub, &id).await?;
    Ok(Json(json!({ "success": true, "liked": liked })))
}

#[utoipa::path(
    post,
    path = "/api/ressources/{id}/favorite",
    params(("id" = String, Path, description = "Ressource ID")),
    responses((status = 200, description = "New favorite state")),
    security(("jwt" = [])),
    tag = "ressources"
)]
pub async fn toggle_favorite(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let favorited = RessourceService::toggle_favorite(&state.db, &claims.sub, &id).await?;
    Ok(Json(json!({ "success": true, "favorited": favorited })))
}

/// Redirects to the stored capability URL; bytes never flow through here.
#[utoipa::path(
    get,
    path = "/api/ressources/{id}/download",
    params(("id" = String, Path, description = "Ressource ID")),
    responses(
        (status = 302, description = "Redirect to the presigned file URL"),
        (status = 400, description = "Ressource has no downloadable file")
    ),
    tag = "ressources"
)]
pub async fn download_ressource(
    State(state): State<crate::AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let url = RessourceService::download(&state.db, &id, viewer.user_id()).await?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, url.clone())],
        Json(json!({ "success": true, "url": url })),
    )
        .into_response())
}

/// Anonymous counter bump. Deliberately no ownership or dedup check; this is
/// the second view-counting entry point next to `track_view`, both funneling
/// into the same record_view path.
#[utoipa::path(
    post,
    path = "/api/ressources/{id}/view",
    params(("id" = String, Path, description = "Ressource ID")),
    responses((status = 200, description = "View counted")),
    tag = "ressources"
)]
pub async fn increment_view(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let (ip, user_agent) = client_meta(&headers);
    RessourceService::record_view(&state.db, &id, None, ip, user_agent).await?;
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    get,
    path = "/api/ressources/{id}/collections",
    params(("id" = String, Path, description = "Ressource ID")),
    responses((status = 200, description = "Public collections containing this ressource")),
    tag = "ressources"
)]
pub async fn collections_for_ressource(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let summaries = CollectionService::get_by_ressource(&state.db, &id).await?;

    let collections: Vec<Value> = summaries
        .iter()
        .map(|s| {
            json!({
                "id": s.collection.id,
                "nom": s.collection.nom,
                "description": s.collection.description,
                "author_id": s.collection.author_id,
                "is_public": s.collection.is_public,
                "ressources_count": s.ressources_count,
                "created_at": s.collection.created_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "collections": collections,
    })))
}
