use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Row existence is the state: toggling a like inserts or deletes the
/// (user_id, ressource_id) pair.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "likes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub ressource_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ressources::Entity",
        from = "Column::RessourceId",
        to = "super::ressources::Column::Id"
    )]
    Ressource,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::ressources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ressource.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
