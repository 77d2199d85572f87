use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{prelude::*, favorites, likes, ressource_views, ressources};
use crate::services::storage::StorageService;
use crate::utils::pagination::{Pagination, clamp};
use crate::utils::upload::{build_storage_key, sanitize_filename, validate_upload};
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashSet;
use uuid::Uuid;

pub const RESSOURCE_TYPES: [&str; 4] = ["document", "media", "video", "lien"];
pub const FILE_TYPES: [&str; 3] = ["document", "media", "video"];

pub struct CreateRessource {
    pub titre: String,
    pub description: Option<String>,
    pub type_ressource: String,
    pub contenu: serde_json::Value,
    pub tags: Vec<String>,
    pub matiere: Option<String>,
    pub niveau: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Default)]
pub struct UpdateRessource {
    pub titre: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub matiere: Option<String>,
    pub niveau: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Default)]
pub struct RessourceFilters {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub type_ressource: Option<String>,
    pub matiere: Option<String>,
    pub niveau: Option<String>,
    pub author_id: Option<String>,
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// An uploaded multipart file, already read into memory.
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A ressource paired with the viewer-specific projections.
pub struct RessourceView {
    pub ressource: ressources::Model,
    pub is_liked: bool,
    pub is_favorited: bool,
}

fn validate_tags(tags: &[String]) -> Result<(), AppError> {
    if tags.len() > 10 {
        return Err(AppError::Validation("10 tags maximum".to_string()));
    }
    if tags.iter().any(|t| t.is_empty() || t.len() > 50) {
        return Err(AppError::Validation(
            "Chaque tag doit faire entre 1 et 50 caractères".to_string(),
        ));
    }
    Ok(())
}

/// Public-or-owner predicate as a query condition, applied before pagination.
fn visibility_condition(viewer_id: Option<&str>) -> Condition {
    match viewer_id {
        Some(viewer) => Condition::any()
            .add(ressources::Column::IsPublic.eq(true))
            .add(ressources::Column::AuthorId.eq(viewer)),
        None => Condition::all().add(ressources::Column::IsPublic.eq(true)),
    }
}

pub struct RessourceService;

impl RessourceService {
    pub async fn create(
        db: &DatabaseConnection,
        storage: &dyn StorageService,
        config: &AppConfig,
        author_id: &str,
        data: CreateRessource,
        file: Option<UploadedFile>,
    ) -> Result<ressources::Model, AppError> {
        if !RESSOURCE_TYPES.contains(&data.type_ressource.as_str()) {
            return Err(AppError::Validation(format!(
                "Type de ressource invalide: '{}'",
                data.type_ressource
            )));
        }
        validate_tags(&data.tags)?;

        let mut contenu = data.contenu;

        if data.type_ressource == "lien" {
            let has_url = contenu.get("url").and_then(|u| u.as_str()).is_some();
            if !has_url {
                return Err(AppError::Validation(
                    "Une ressource de type 'lien' doit contenir une url".to_string(),
                ));
            }
        } else if let Some(file) = file {
            contenu = Self::store_file(storage, config, author_id, &file).await?;
        }

        let now = Utc::now();
        let ressource = ressources::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            titre: Set(data.titre),
            description: Set(data.description),
            type_ressource: Set(data.type_ressource),
            contenu: Set(contenu),
            tags: Set(serde_json::to_string(&data.tags)
                .map_err(|e| AppError::Internal(e.to_string()))?),
            matiere: Set(data.matiere),
            niveau: Set(data.niveau),
            author_id: Set(author_id.to_string()),
            is_public: Set(data.is_public.unwrap_or(true)),
            views_count: Set(0),
            likes_count: Set(0),
            downloads_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(ressource.insert(db).await?)
    }

    /// Uploads the file and builds the contenu payload around it. The
    /// presigned URL is computed once here, at upload time.
    async fn store_file(
        storage: &dyn StorageService,
        config: &AppConfig,
        author_id: &str,
        file: &UploadedFile,
    ) -> Result<serde_json::Value, AppError> {
        let filename = sanitize_filename(&file.filename)?;
        validate_upload(&filename, &file.data, config)?;

        let key = build_storage_key(author_id, &filename);
        storage
            .upload_file(&key, file.data.clone(), &file.content_type)
            .await
            .map_err(|e| AppError::Internal(format!("Echec de l'upload: {}", e)))?;

        let file_url = storage
            .presigned_url(&key, config.presign_expiry_secs)
            .await
            .map_err(|e| AppError::Internal(format!("Echec de la signature d'URL: {}", e)))?;

        Ok(serde_json::json!({
            "file_url": file_url,
            "file_key": key,
            "file_name": filename,
            "file_size": file.data.len(),
            "file_type": file.content_type,
        }))
    }

    /// Fetch applying the visibility rule; invisible and absent look the
    /// same from outside. When `track_view` is set and the viewer is not the
    /// author, the view is logged fire-and-forget.
    pub async fn get(
        db: &DatabaseConnection,
        id: &str,
        viewer_id: Option<&str>,
        track_view: bool,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<RessourceView, AppError> {
        let ressource = Ressources::find_by_id(id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(viewer_id))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        if track_view && viewer_id != Some(ressource.author_id.as_str()) {
            let db = db.clone();
            let ressource_id = ressource.id.clone();
            let user_id = viewer_id.map(|v| v.to_string());
            tokio::spawn(async move {
                if let Err(e) =
                    Self::record_view(&db, &ressource_id, user_id, ip, user_agent).await
                {
                    tracing::warn!("View tracking failed for {}: {}", ressource_id, e);
                }
            });
        }

        let (is_liked, is_favorited) = match viewer_id {
            Some(viewer) => Self::viewer_flags(db, &ressource.id, viewer).await?,
            None => (false, false),
        };

        Ok(RessourceView {
            ressource,
            is_liked,
            is_favorited,
        })
    }

    async fn viewer_flags(
        db: &DatabaseConnection,
        ressource_id: &str,
        viewer_id: &str,
    ) -> Result<(bool, bool), AppError> {
        let is_liked = Likes::find()
            .filter(likes::Column::UserId.eq(viewer_id))
            .filter(likes::Column::RessourceId.eq(ressource_id))
            .one(db)
            .await?
            .is_some();
        let is_favorited = Favorites::find()
            .filter(favorites::Column::UserId.eq(viewer_id))
            .filter(favorites::Column::RessourceId.eq(ressource_id))
            .one(db)
            .await?
            .is_some();
        Ok((is_liked, is_favorited))
    }

    pub async fn list(
        db: &DatabaseConnection,
        viewer_id: Option<&str>,
        filters: RessourceFilters,
    ) -> Result<(Vec<RessourceView>, Pagination), AppError> {
        let (page, limit) = clamp(filters.page, filters.limit);

        let mut cond = Condition::all().add(visibility_condition(viewer_id));

        if let Some(ref t) = filters.type_ressource {
            cond = cond.add(ressources::Column::TypeRessource.eq(t));
        }
        if let Some(ref matiere) = filters.matiere {
            cond = cond.add(ressources::Column::Matiere.eq(matiere));
        }
        if let Some(ref niveau) = filters.niveau {
            cond = cond.add(ressources::Column::Niveau.eq(niveau));
        }
        if let Some(ref author) = filters.author_id {
            cond = cond.add(ressources::Column::AuthorId.eq(author));
        }
        if !filters.tags.is_empty() {
            // Overlap semantics: any requested tag present. Tags are stored
            // JSON-encoded, so membership is a LIKE on the quoted value.
            let mut tag_cond = Condition::any();
            for tag in &filters.tags {
                tag_cond = tag_cond
                    .add(ressources::Column::Tags.like(format!("%\"{}\"%", tag.replace('"', ""))));
            }
            cond = cond.add(tag_cond);
        }
        if let Some(ref search) = filters.search {
            let pattern = format!("%{}%", search.to_lowercase());
            cond = cond.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(ressources::Column::Titre)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(ressources::Column::Description)))
                            .like(pattern),
                    ),
            );
        }

        let sort_column = match filters.sort_by.as_deref() {
            Some("updated_at") => ressources::Column::UpdatedAt,
            Some("likes_count") => ressources::Column::LikesCount,
            Some("views_count") => ressources::Column::ViewsCount,
            Some("titre") => ressources::Column::Titre,
            _ => ressources::Column::CreatedAt,
        };
        let sort_order = match filters.sort_order.as_deref() {
            Some("asc") => Order::Asc,
            _ => Order::Desc,
        };

        let query = Ressources::find().filter(cond);
        let total = query.clone().count(db).await?;

        let items = query
            .order_by(sort_column, sort_order)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        let views = match viewer_id {
            Some(viewer) => {
                let ids: Vec<String> = items.iter().map(|r| r.id.clone()).collect();
                let liked: HashSet<String> = Likes::find()
                    .filter(likes::Column::UserId.eq(viewer))
                    .filter(likes::Column::RessourceId.is_in(ids.clone()))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|l| l.ressource_id)
                    .collect();
                let favorited: HashSet<String> = Favorites::find()
                    .filter(favorites::Column::UserId.eq(viewer))
                    .filter(favorites::Column::RessourceId.is_in(ids))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|f| f.ressource_id)
                    .collect();
                items
                    .into_iter()
                    .map(|r| RessourceView {
                        is_liked: liked.contains(&r.id),
                        is_favorited: favorited.contains(&r.id),
                        ressource: r,
                    })
                    .collect()
            }
            None => items
                .into_iter()
                .map(|r| RessourceView {
                    ressource: r,
                    is_liked: false,
                    is_favorited: false,
                })
                .collect(),
        };

        Ok((views, Pagination::new(page, limit, total)))
    }

    /// Ownership-gated fetch shared by the mutation paths: invisible rows
    /// 404, visible rows owned by someone else 403.
    async fn find_owned(
        db: &DatabaseConnection,
        id: &str,
        user_id: &str,
    ) -> Result<ressources::Model, AppError> {
        let ressource = Ressources::find_by_id(id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(Some(user_id)))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        if ressource.author_id != user_id {
            return Err(AppError::Forbidden(
                "Seul l'auteur peut modifier cette ressource".to_string(),
            ));
        }
        Ok(ressource)
    }

    pub async fn update(
        db: &DatabaseConnection,
        storage: &dyn StorageService,
        config: &AppConfig,
        id: &str,
        user_id: &str,
        updates: UpdateRessource,
        file: Option<UploadedFile>,
    ) -> Result<ressources::Model, AppError> {
        let ressource = Self::find_owned(db, id, user_id).await?;

        if let Some(ref tags) = updates.tags {
            validate_tags(tags)?;
        }

        let mut new_contenu = None;
        if let Some(file) = file {
            if !FILE_TYPES.contains(&ressource.type_ressource.as_str()) {
                return Err(AppError::Validation(
                    "Cette ressource n'accepte pas de fichier".to_string(),
                ));
            }
            // Delete the previous object first; a failed delete leaves an
            // orphan in the bucket and is only logged.
            if let Some(old_key) = ressource.contenu.get("file_key").and_then(|k| k.as_str())
                && let Err(e) = storage.delete_file(old_key).await
            {
                tracing::warn!("Failed to delete replaced file {}: {}", old_key, e);
            }
            new_contenu = Some(Self::store_file(storage, config, user_id, &file).await?);
        }

        let mut active: ressources::ActiveModel = ressource.into();
        if let Some(titre) = updates.titre {
            active.titre = Set(titre);
        }
        if let Some(description) = updates.description {
            active.description = Set(Some(description));
        }
        if let Some(tags) = updates.tags {
            active.tags =
                Set(serde_json::to_string(&tags).map_err(|e| AppError::Internal(e.to_string()))?);
        }
        if let Some(matiere) = updates.matiere {
            active.matiere = Set(Some(matiere));
        }
        if let Some(niveau) = updates.niveau {
            active.niveau = Set(Some(niveau));
        }
        if let Some(is_public) = updates.is_public {
            active.is_public = Set(is_public);
        }
        if let Some(contenu) = new_contenu {
            active.contenu = Set(contenu);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(db).await?)
    }

    /// Stored object goes first, then the row: an orphan file is preferable
    /// to a row pointing at a deleted object.
    pub async fn delete(
        db: &DatabaseConnection,
        storage: &dyn StorageService,
        id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let ressource = Self::find_owned(db, id, user_id).await?;

        if let Some(key) = ressource.contenu.get("file_key").and_then(|k| k.as_str())
            && let Err(e) = storage.delete_file(key).await
        {
            tracing::warn!("Failed to delete stored file {}: {}", key, e);
        }

        Ressources::delete_by_id(&ressource.id).exec(db).await?;
        Ok(())
    }

    /// Insert-or-delete by pair existence; likes_count moves with the row.
    pub async fn toggle_like(
        db: &DatabaseConnection,
        user_id: &str,
        ressource_id: &str,
    ) -> Result<bool, AppError> {
        let ressource = Ressources::find_by_id(ressource_id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(Some(user_id)))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        let existing = Likes::find()
            .filter(likes::Column::UserId.eq(user_id))
            .filter(likes::Column::RessourceId.eq(ressource_id))
            .one(db)
            .await?;

        let liked = match existing {
            Some(like) => {
                Likes::delete_by_id(&like.id).exec(db).await?;
                false
            }
            None => {
                likes::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    user_id: Set(user_id.to_string()),
                    ressource_id: Set(ressource_id.to_string()),
                    created_at: Set(Utc::now()),
                }
                .insert(db)
                .await?;
                true
            }
        };

        let delta: i64 = if liked { 1 } else { -1 };
        let new_count = (ressource.likes_count + delta).max(0);
        let mut active: ressources::ActiveModel = ressource.into();
        active.likes_count = Set(new_count);
        active.update(db).await?;

        Ok(liked)
    }

    pub async fn toggle_favorite(
        db: &DatabaseConnection,
        user_id: &str,
        ressource_id: &str,
    ) -> Result<bool, AppError> {
        Ressources::find_by_id(ressource_id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(Some(user_id)))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        let existing = Favorites::find()
            .filter(favorites::Column::UserId.eq(user_id))
            .filter(favorites::Column::RessourceId.eq(ressource_id))
            .one(db)
            .await?;

        match existing {
            Some(favorite) => {
                Favorites::delete_by_id(&favorite.id).exec(db).await?;
                Ok(false)
            }
            None => {
                favorites::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    user_id: Set(user_id.to_string()),
                    ressource_id: Set(ressource_id.to_string()),
                    created_at: Set(Utc::now()),
                }
                .insert(db)
                .await?;
                Ok(true)
            }
        }
    }

    /// Returns the stored capability URL; the app never streams file bytes.
    pub async fn download(
        db: &DatabaseConnection,
        id: &str,
        viewer_id: Option<&str>,
    ) -> Result<String, AppError> {
        let ressource = Ressources::find_by_id(id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(viewer_id))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        let url = ressource
            .contenu
            .get("file_url")
            .and_then(|u| u.as_str())
            .map(|u| u.to_string())
            .ok_or_else(|| {
                AppError::Validation(
                    "Cette ressource n'a pas de fichier téléchargeable".to_string(),
                )
            })?;

        let new_count = ressource.downloads_count + 1;
        let mut active: ressources::ActiveModel = ressource.into();
        active.downloads_count = Set(new_count);
        active.update(db).await?;

        Ok(url)
    }

    /// Single increment path shared by authenticated view tracking and the
    /// anonymous bump endpoint. Both log a row and both increment; no dedup.
    pub async fn record_view(
        db: &DatabaseConnection,
        ressource_id: &str,
        user_id: Option<String>,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), AppError> {
        let ressource = Ressources::find_by_id(ressource_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        ressource_views::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            ressource_id: Set(ressource_id.to_string()),
            user_id: Set(user_id),
            ip: Set(ip),
            user_agent: Set(user_agent),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        let new_count = ressource.views_count + 1;
        let mut active: ressources::ActiveModel = ressource.into();
        active.views_count = Set(new_count);
        active.update(db).await?;
        Ok(())
    }
}
