use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Comments on a ressource. One level of nesting only: `parent_id` must point
/// at a top-level comment on the same ressource. Read paths fetch top-level
/// comments plus their direct replies, so deeper trees would be invisible;
/// creation is where the single-level rule is enforced.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub ressource_id: String,
    pub author_id: String,
    pub contenu: String,
    pub parent_id: Option<String>,
    pub is_edited: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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
        from = "Column::AuthorId",
        to = "super::users::Column::Id"
    )]
    Author,
}

impl Related<super::ressources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ressource.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
