use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ordered membership of a ressource inside a collection. The
/// (collection_id, ressource_id) pair is unique: a ressource appears at most
/// once per collection.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collection_ressources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub collection_id: String,
    pub ressource_id: String,
    pub ordre: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collections::Entity",
        from = "Column::CollectionId",
        to = "super::collections::Column::Id"
    )]
    Collection,
    #[sea_orm(
        belongs_to = "super::ressources::Entity",
        from = "Column::RessourceId",
        to = "super::ressources::Column::Id"
    )]
    Ressource,
}

impl Related<super::collections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collection.def()
    }
}

impl Related<super::ressources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ressource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
