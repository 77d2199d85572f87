use crate::api::error::AppError;
use crate::entities::{prelude::*, collections, comments, follows, likes, ressources, users};
use crate::utils::pagination::{Pagination, clamp};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Viewer-dependent profile projection: email requires an authenticated
/// viewer, date_naissance is owner-only.
#[derive(Serialize, ToSchema)]
pub struct Profile {
    pub id: String,
    pub nom: String,
    pub prenom: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub classe: Option<String>,
    pub matiere: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_naissance: Option<chrono::NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub followers_count: u64,
    pub following_count: u64,
    pub is_following: bool,
    pub stats: ProfileStats,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileStats {
    pub ressources_count: u64,
    pub collections_count: u64,
    pub likes_received: u64,
}

#[derive(Serialize, ToSchema)]
pub struct ActivityItem {
    /// "ressource", "collection" or "commentaire"
    pub kind: String,
    pub id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

// How far back each source query reaches before the in-memory merge.
const ACTIVITY_FETCH_LIMIT: u64 = 100;

#[derive(Default)]
pub struct UserSearch {
    pub term: Option<String>,
    pub role: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub struct ProfileService;

impl ProfileService {
    async fn find_active_user(
        db: &DatabaseConnection,
        user_id: &str,
    ) -> Result<users::Model, AppError> {
        Users::find_by_id(user_id)
            .one(db)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::NotFound("Utilisateur non trouvé".to_string()))
    }

    pub async fn get_profile(
        db: &DatabaseConnection,
        user_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Profile, AppError> {
        let user = Self::find_active_user(db, user_id).await?;

        let followers_count = Follows::find()
            .filter(follows::Column::FollowingId.eq(user_id))
            .count(db)
            .await?;
        let following_count = Follows::find()
            .filter(follows::Column::FollowerId.eq(user_id))
            .count(db)
            .await?;
        let is_following = match viewer_id {
            Some(viewer) => Follows::find()
                .filter(follows::Column::FollowerId.eq(viewer))
                .filter(follows::Column::FollowingId.eq(user_id))
                .one(db)
                .await?
                .is_some(),
            None => false,
        };

        let ressources_count = Ressources::find()
            .filter(ressources::Column::AuthorId.eq(user_id))
            .count(db)
            .await?;
        let collections_count = Collections::find()
            .filter(collections::Column::AuthorId.eq(user_id))
            .count(db)
            .await?;
        let likes_received = Likes::find()
            .join(JoinType::InnerJoin, likes::Relation::Ressource.def())
            .filter(ressources::Column::AuthorId.eq(user_id))
            .count(db)
            .await?;

        let is_owner = viewer_id == Some(user_id);
        Ok(Profile {
            id: user.id,
            nom: user.nom,
            prenom: user.prenom,
            role: user.role,
            email: viewer_id.map(|_| user.email),
            classe: user.classe,
            matiere: user.matiere,
            avatar_url: user.avatar_url,
            bio: user.bio,
            date_naissance: if is_owner { user.date_naissance } else { None },
            created_at: user.created_at,
            followers_count,
            following_count,
            is_following,
            stats: ProfileStats {
                ressources_count,
                collections_count,
                likes_received,
            },
        })
    }

    pub async fn follow(
        db: &DatabaseConnection,
        follower_id: &str,
        following_id: &str,
    ) -> Result<(), AppError> {
        if follower_id == following_id {
            return Err(AppError::Validation(
                "Impossible de se suivre soi-même".to_string(),
            ));
        }

        Self::find_active_user(db, following_id).await?;

        let already = Follows::find()
            .filter(follows::Column::FollowerId.eq(follower_id))
            .filter(follows::Column::FollowingId.eq(following_id))
            .one(db)
            .await?
            .is_some();
        if already {
            return Err(AppError::Conflict(
                "Vous suivez déjà cet utilisateur".to_string(),
            ));
        }

        follows::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            follower_id: Set(follower_id.to_string()),
            following_id: Set(following_id.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;
        Ok(())
    }

    pub async fn unfollow(
        db: &DatabaseConnection,
        follower_id: &str,
        following_id: &str,
    ) -> Result<(), AppError> {
        let relation = Follows::find()
            .filter(follows::Column::FollowerId.eq(follower_id))
            .filter(follows::Column::FollowingId.eq(following_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("Vous ne suivez pas cet utilisateur".to_string())
            })?;

        Follows::delete_by_id(&relation.id).exec(db).await?;
        Ok(())
    }

    pub async fn followers(
        db: &DatabaseConnection,
        user_id: &str,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<(Vec<users::Model>, Pagination), AppError> {
        Self::find_active_user(db, user_id).await?;
        let (page, limit) = clamp(page, limit);

        let query = Follows::find().filter(follows::Column::FollowingId.eq(user_id));
        let total = query.clone().count(db).await?;
        let edges = query
            .order_by(follows::Column::CreatedAt, Order::Desc)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        let ids: Vec<String> = edges.into_iter().map(|f| f.follower_id).collect();
        let users = Users::find()
            .filter(users::Column::Id.is_in(ids))
            .all(db)
            .await?;

        Ok((users, Pagination::new(page, limit, total)))
    }

    pub async fn following(
        db: &DatabaseConnection,
        user_id: &str,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<(Vec<users::Model>, Pagination), AppError> {
        Self::find_active_user(db, user_id).await?;
        let (page, limit) = clamp(page, limit);

        let query = Follows::find().filter(follows::Column::FollowerId.eq(user_id));
        let total = query.clone().count(db).await?;
        let edges = query
            .order_by(follows::Column::CreatedAt, Order::Desc)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        let ids: Vec<String> = edges.into_iter().map(|f| f.following_id).collect();
        let users = Users::find()
            .filter(users::Column::Id.is_in(ids))
            .all(db)
            .await?;

        Ok((users, Pagination::new(page, limit, total)))
    }

    /// Activity is owner-only data even when the profile is public: any
    /// other viewer gets an empty list with an explanatory message, not an
    /// error. Three source queries are merged and re-sorted in memory, then
    /// paginated in memory.
    pub async fn get_activity(
        db: &DatabaseConnection,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<(Vec<ActivityItem>, Pagination, Option<String>), AppError> {
        Self::find_active_user(db, user_id).await?;
        let (page, limit) = clamp(page, limit);

        if viewer_id != Some(user_id) {
            return Ok((
                Vec::new(),
                Pagination::new(page, limit, 0),
                Some("L'activité n'est visible que par son propriétaire".to_string()),
            ));
        }

        let ressources = Ressources::find()
            .filter(ressources::Column::AuthorId.eq(user_id))
            .order_by(ressources::Column::CreatedAt, Order::Desc)
            .limit(ACTIVITY_FETCH_LIMIT)
            .all(db)
            .await?;
        let collections = Collections::find()
            .filter(collections::Column::AuthorId.eq(user_id))
            .order_by(collections::Column::CreatedAt, Order::Desc)
            .limit(ACTIVITY_FETCH_LIMIT)
            .all(db)
            .await?;
        let commentaires = Comments::find()
            .join(JoinType::InnerJoin, comments::Relation::Ressource.def())
            .filter(comments::Column::AuthorId.eq(user_id))
            .filter(ressources::Column::IsPublic.eq(true))
            .order_by(comments::Column::CreatedAt, Order::Desc)
            .limit(ACTIVITY_FETCH_LIMIT)
            .all(db)
            .await?;

        let mut items: Vec<ActivityItem> = Vec::new();
        items.extend(ressources.into_iter().map(|r| ActivityItem {
            kind: "ressource".to_string(),
            id: r.id,
            label: r.titre,
            created_at: r.created_at,
        }));
        items.extend(collections.into_iter().map(|c| ActivityItem {
            kind: "collection".to_string(),
            id: c.id,
            label: c.nom,
            created_at: c.created_at,
        }));
        items.extend(commentaires.into_iter().map(|c| ActivityItem {
            kind: "commentaire".to_string(),
            id: c.id,
            label: c.contenu,
            created_at: c.created_at,
        }));

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = items.len() as u64;
        let start = ((page - 1) * limit) as usize;
        let items: Vec<ActivityItem> = items
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();

        Ok((items, Pagination::new(page, limit, total), None))
    }

    /// Free-text OR match on nom/prenom; an empty term lists everyone, which
    /// backs the get-all and by-role listings.
    pub async fn search_users(
        db: &DatabaseConnection,
        search: UserSearch,
    ) -> Result<(Vec<users::Model>, Pagination), AppError> {
        let (page, limit) = clamp(search.page, search.limit);

        let mut cond = Condition::all().add(users::Column::IsActive.eq(true));
        if let Some(ref role) = search.role {
            cond = cond.add(users::Column::Role.eq(role));
        }
        if let Some(term) = search.term.filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            cond = cond.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(users::Column::Nom)))
                            .like(pattern.clone()),
                    )
                    .add(Expr::expr(Func::lower(Expr::col(users::Column::Prenom))).like(pattern)),
            );
        }

        let query = Users::find().filter(cond);
        let total = query.clone().count(db).await?;
        let users = query
            .order_by(users::Column::Nom, Order::Asc)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        Ok((users, Pagination::new(page, limit, total)))
    }
}
