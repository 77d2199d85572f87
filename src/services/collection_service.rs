use crate::api::error::AppError;
use crate::entities::{prelude::*, collection_ressources, collections, ressources};
use crate::utils::pagination::{Pagination, clamp};
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;
use uuid::Uuid;

pub struct CreateCollection {
    pub nom: String,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Default)]
pub struct UpdateCollection {
    pub nom: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Default)]
pub struct CollectionFilters {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub author_id: Option<String>,
    pub search: Option<String>,
}

/// A collection with its derived member count.
pub struct CollectionSummary {
    pub collection: collections::Model,
    pub ressources_count: u64,
}

/// Full projection for the detail view: members sorted by ordre. Membership
/// rows whose ressource has since gone private for this viewer are filtered
/// out of the listing (the row itself stays).
pub struct CollectionDetail {
    pub collection: collections::Model,
    pub ressources_count: u64,
    pub membres: Vec<(collection_ressources::Model, ressources::Model)>,
}

pub struct CollectionService;

impl CollectionService {
    pub async fn create(
        db: &DatabaseConnection,
        author_id: &str,
        data: CreateCollection,
    ) -> Result<collections::Model, AppError> {
        let now = Utc::now();
        let collection = collections::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            nom: Set(data.nom),
            description: Set(data.description),
            author_id: Set(author_id.to_string()),
            is_public: Set(data.is_public.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(collection.insert(db).await?)
    }

    async fn member_count(db: &DatabaseConnection, collection_id: &str) -> Result<u64, AppError> {
        Ok(CollectionRessources::find()
            .filter(collection_ressources::Column::CollectionId.eq(collection_id))
            .count(db)
            .await?)
    }

    pub async fn get(
        db: &DatabaseConnection,
        id: &str,
        viewer_id: Option<&str>,
    ) -> Result<CollectionDetail, AppError> {
        let collection = Collections::find_by_id(id)
            .one(db)
            .await?
            .filter(|c| c.visible_to(viewer_id))
            .ok_or_else(|| AppError::NotFound("Collection non trouvée".to_string()))?;

        let membres: Vec<(collection_ressources::Model, Option<ressources::Model>)> =
            CollectionRessources::find()
                .filter(collection_ressources::Column::CollectionId.eq(&collection.id))
                .find_also_related(Ressources)
                .order_by(collection_ressources::Column::Ordre, Order::Asc)
                .all(db)
                .await?;

        let ressources_count = membres.len() as u64;
        let membres = membres
            .into_iter()
            .filter_map(|(m, r)| r.map(|r| (m, r)))
            .filter(|(_, r)| r.visible_to(viewer_id))
            .collect();

        Ok(CollectionDetail {
            collection,
            ressources_count,
            membres,
        })
    }

    pub async fn list(
        db: &DatabaseConnection,
        viewer_id: Option<&str>,
        filters: CollectionFilters,
    ) -> Result<(Vec<CollectionSummary>, Pagination), AppError> {
        let (page, limit) = clamp(filters.page, filters.limit);

        let visibility = match viewer_id {
            Some(viewer) => Condition::any()
                .add(collections::Column::IsPublic.eq(true))
                .add(collections::Column::AuthorId.eq(viewer)),
            None => Condition::all().add(collections::Column::IsPublic.eq(true)),
        };

        let mut cond = Condition::all().add(visibility);
        if let Some(ref author) = filters.author_id {
            cond = cond.add(collections::Column::AuthorId.eq(author));
        }
        if let Some(ref search) = filters.search {
            let pattern = format!("%{}%", search.to_lowercase());
            cond = cond.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(collections::Column::Nom)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(collections::Column::Description)))
                            .like(pattern),
                    ),
            );
        }

        let query = Collections::find().filter(cond);
        let total = query.clone().count(db).await?;

        let items = query
            .order_by(collections::Column::CreatedAt, Order::Desc)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        // Derived member counts for the whole page in one query
        let ids: Vec<String> = items.iter().map(|c| c.id.clone()).collect();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for membre in CollectionRessources::find()
            .filter(collection_ressources::Column::CollectionId.is_in(ids))
            .all(db)
            .await?
        {
            *counts.entry(membre.collection_id).or_insert(0) += 1;
        }

        let summaries = items
            .into_iter()
            .map(|c| CollectionSummary {
                ressources_count: counts.get(&c.id).copied().unwrap_or(0),
                collection: c,
            })
            .collect();

        Ok((summaries, Pagination::new(page, limit, total)))
    }

    async fn find_owned(
        db: &DatabaseConnection,
        id: &str,
        user_id: &str,
    ) -> Result<collections::Model, AppError> {
        let collection = Collections::find_by_id(id)
            .one(db)
            .await?
            .filter(|c| c.visible_to(Some(user_id)))
            .ok_or_else(|| AppError::NotFound("Collection non trouvée".to_string()))?;

        if collection.author_id != user_id {
            return Err(AppError::Forbidden(
                "Seul l'auteur peut modifier cette collection".to_string(),
            ));
        }
        Ok(collection)
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: &str,
        user_id: &str,
        updates: UpdateCollection,
    ) -> Result<collections::Model, AppError> {
        let collection = Self::find_owned(db, id, user_id).await?;

        let mut active: collections::ActiveModel = collection.into();
        if let Some(nom) = updates.nom {
            active.nom = Set(nom);
        }
        if let Some(description) = updates.description {
            active.description = Set(Some(description));
        }
        if let Some(is_public) = updates.is_public {
            active.is_public = Set(is_public);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(db).await?)
    }

    pub async fn delete(
        db: &DatabaseConnection,
        id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let collection = Self::find_owned(db, id, user_id).await?;

        CollectionRessources::delete_many()
            .filter(collection_ressources::Column::CollectionId.eq(&collection.id))
            .exec(db)
            .await?;
        Collections::delete_by_id(&collection.id).exec(db).await?;
        Ok(())
    }

    /// Requires collection ownership AND that the ressource is independently
    /// visible to the requester: nobody curates what they cannot see.
    pub async fn add_ressource(
        db: &DatabaseConnection,
        collection_id: &str,
        ressource_id: &str,
        ordre: Option<i32>,
        user_id: &str,
    ) -> Result<collection_ressources::Model, AppError> {
        let collection = Self::find_owned(db, collection_id, user_id).await?;

        Ressources::find_by_id(ressource_id)
            .one(db)
            .await?
            .filter(|r| r.visible_to(Some(user_id)))
            .ok_or_else(|| AppError::NotFound("Ressource non trouvée".to_string()))?;

        let already = CollectionRessources::find()
            .filter(collection_ressources::Column::CollectionId.eq(&collection.id))
            .filter(collection_ressources::Column::RessourceId.eq(ressource_id))
            .one(db)
            .await?
            .is_some();
        if already {
            return Err(AppError::Conflict(
                "Cette ressource est déjà dans la collection".to_string(),
            ));
        }

        let ordre = match ordre {
            Some(o) => o,
            None => Self::member_count(db, &collection.id).await? as i32,
        };

        let membre = collection_ressources::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            collection_id: Set(collection.id),
            ressource_id: Set(ressource_id.to_string()),
            ordre: Set(ordre),
            created_at: Set(Utc::now()),
        };
        Ok(membre.insert(db).await?)
    }

    pub async fn remove_ressource(
        db: &DatabaseConnection,
        collection_id: &str,
        ressource_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let collection = Self::find_owned(db, collection_id, user_id).await?;

        let membre = CollectionRessources::find()
            .filter(collection_ressources::Column::CollectionId.eq(&collection.id))
            .filter(collection_ressources::Column::RessourceId.eq(ressource_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("Cette ressource n'est pas dans la collection".to_string())
            })?;

        CollectionRessources::delete_by_id(&membre.id).exec(db).await?;
        Ok(())
    }

    /// Bulk positional update. Gaps or duplicate ordre values are the
    /// caller's responsibility.
    pub async fn reorder(
        db: &DatabaseConnection,
        collection_id: &str,
        user_id: &str,
        positions: Vec<(String, i32)>,
    ) -> Result<(), AppError> {
        let collection = Self::find_owned(db, collection_id, user_id).await?;

        for (ressource_id, ordre) in positions {
            CollectionRessources::update_many()
                .col_expr(collection_ressources::Column::Ordre, Expr::value(ordre))
                .filter(collection_ressources::Column::CollectionId.eq(&collection.id))
                .filter(collection_ressources::Column::RessourceId.eq(&ressource_id))
                .exec(db)
                .await?;
        }
        Ok(())
    }

    /// The copy belongs to the requester and is always private, whatever the
    /// source's visibility. Membership keeps its relative order, re-indexed
    /// from 0. No transaction wraps the two steps: a failure after the
    /// create leaves an empty copy, not a rollback.
    pub async fn duplicate(
        db: &DatabaseConnection,
        id: &str,
        new_name: Option<String>,
        user_id: &str,
    ) -> Result<collections::Model, AppError> {
        let source = Collections::find_by_id(id)
            .one(db)
            .await?
            .filter(|c| c.visible_to(Some(user_id)))
            .ok_or_else(|| AppError::NotFound("Collection non trouvée".to_string()))?;

        let now = Utc::now();
        let copy = collections::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            nom: Set(new_name.unwrap_or_else(|| format!("{} (copie)", source.nom))),
            description: Set(source.description.clone()),
            author_id: Set(user_id.to_string()),
            is_public: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let copy = copy.insert(db).await?;

        let membres = CollectionRessources::find()
            .filter(collection_ressources::Column::CollectionId.eq(&source.id))
            .order_by(collection_ressources::Column::Ordre, Order::Asc)
            .all(db)
            .await?;

        for (index, membre) in membres.into_iter().enumerate() {
            collection_ressources::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                collection_id: Set(copy.id.clone()),
                ressource_id: Set(membre.ressource_id),
                ordre: Set(index as i32),
                created_at: Set(now),
            }
            .insert(db)
            .await?;
        }

        Ok(copy)
    }

    /// Reverse lookup stays public-only so a private collection never leaks
    /// through the ressources it contains.
    pub async fn get_by_ressource(
        db: &DatabaseConnection,
        ressource_id: &str,
    ) -> Result<Vec<CollectionSummary>, AppError> {
        let memberships = CollectionRessources::find()
            .filter(collection_ressources::Column::RessourceId.eq(ressource_id))
            .all(db)
            .await?;

        let ids: Vec<String> = memberships.iter().map(|m| m.collection_id.clone()).collect();
        let publics = Collections::find()
            .filter(collections::Column::Id.is_in(ids))
            .filter(collections::Column::IsPublic.eq(true))
            .order_by(collections::Column::CreatedAt, Order::Desc)
            .all(db)
            .await?;

        let mut summaries = Vec::with_capacity(publics.len());
        for collection in publics {
            let count = Self::member_count(db, &collection.id).await?;
            summaries.push(CollectionSummary {
                collection,
                ressources_count: count,
            });
        }
        Ok(summaries)
    }
}
