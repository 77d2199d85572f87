use crate::api::error::AppError;
use crate::entities::{prelude::*, comments, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, Set,
};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

/// A top-level comment with its direct replies, oldest reply first.
pub struct CommentThread {
    pub comment: comments::Model,
    pub author: Option<users::Model>,
    pub replies: Vec<(comments::Model, Option<users::Model>)>,
}

pub struct CommentService;

impl CommentService {
    /// Creation is the only place the single-level rule is enforced: the
    /// read path fetches top-level comments plus direct replies, so a deeper
    /// reply would simply never be loaded.
    pub async fn create(
        db: &DatabaseConnection,
        ressource_id: &str,
        author_id: &str,
        contenu: &str,
        parent_id: Option<String>,
    ) -> Result<comments::Model, AppError> {
        Ressources::find_by_id(ressource_id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(Some(author_id)))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        if contenu.is_empty() || contenu.chars().count() > 1000 {
            return Err(AppError::Validation(
                "Le commentaire doit faire entre 1 et 1000 caractères".to_string(),
            ));
        }

        if let Some(ref parent) = parent_id {
            let parent = Comments::find_by_id(parent)
                .one(db)
                .await?
                .ok_or_else(|| {
                    AppError::Validation("Commentaire parent invalide".to_string())
                })?;
            if parent.ressource_id != ressource_id || parent.parent_id.is_some() {
                return Err(AppError::Validation(
                    "Commentaire parent invalide".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let comment = comments::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            ressource_id: Set(ressource_id.to_string()),
            author_id: Set(author_id.to_string()),
            contenu: Set(contenu.to_string()),
            parent_id: Set(parent_id),
            is_edited: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(comment.insert(db).await?)
    }

    /// Top-level comments newest first, each with its direct replies oldest
    /// first, plus author projections fetched in one batch.
    pub async fn list_by_ressource(
        db: &DatabaseConnection,
        ressource_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Vec<CommentThread>, AppError> {
        Ressources::find_by_id(ressource_id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(viewer_id))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        let top_level = Comments::find()
            .filter(comments::Column::RessourceId.eq(ressource_id))
            .filter(comments::Column::ParentId.is_null())
            .order_by(comments::Column::CreatedAt, Order::Desc)
            .all(db)
            .await?;

        let replies = Comments::find()
            .filter(comments::Column::RessourceId.eq(ressource_id))
            .filter(comments::Column::ParentId.is_not_null())
            .order_by(comments::Column::CreatedAt, Order::Asc)
            .all(db)
            .await?;

        let mut author_ids: Vec<String> = top_level
            .iter()
            .chain(replies.iter())
            .map(|c| c.author_id.clone())
            .collect();
        author_ids.dedup();
        let authors: HashMap<String, users::Model> = Users::find()
            .filter(users::Column::Id.is_in(author_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut by_parent: HashMap<String, Vec<comments::Model>> = HashMap::new();
        for reply in replies {
            if let Some(parent) = reply.parent_id.clone() {
                by_parent.entry(parent).or_default().push(reply);
            }
        }

        Ok(top_level
            .into_iter()
            .map(|comment| {
                let replies = by_parent
                    .remove(&comment.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| {
                        let author = authors.get(&r.author_id).cloned();
                        (r, author)
                    })
                    .collect();
                let author = authors.get(&comment.author_id).cloned();
                CommentThread {
                    comment,
                    author,
                    replies,
                }
            })
            .collect())
    }

    async fn find_owned(
        db: &DatabaseConnection,
        id: &str,
        user_id: &str,
    ) -> Result<comments::Model, AppError> {
        let comment = Comments::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Commentaire non trouvé".to_string()))?;

        if comment.author_id != user_id {
            return Err(AppError::Forbidden(
                "Seul l'auteur peut modifier ce commentaire".to_string(),
            ));
        }
        Ok(comment)
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: &str,
        user_id: &str,
        contenu: &str,
    ) -> Result<comments::Model, AppError> {
        let comment = Self::find_owned(db, id, user_id).await?;

        if contenu.is_empty() || contenu.chars().count() > 1000 {
            return Err(AppError::Validation(
                "Le commentaire doit faire entre 1 et 1000 caractères".to_string(),
            ));
        }

        let mut active: comments::ActiveModel = comment.into();
        active.contenu = Set(contenu.to_string());
        active.is_edited = Set(true);
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    /// Deleting a top-level comment takes its direct replies with it.
    pub async fn delete(
        db: &DatabaseConnection,
        id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let comment = Self::find_owned(db, id, user_id).await?;

        Comments::delete_many()
            .filter(comments::Column::ParentId.eq(&comment.id))
            .exec(db)
            .await?;
        Comments::delete_by_id(&comment.id).exec(db).await?;
        Ok(())
    }
}
