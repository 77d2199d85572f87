use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only view log. Views are not deduplicated per viewer: every tracked
/// hit adds a row and bumps the ressource counter.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ressource_views")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub ressource_id: String,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
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
}

impl Related<super::ressources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ressource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
