use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Named, owned sets of ressources. The member count is derived from the join
/// table, never stored here. Visibility follows the same public-or-owner rule
/// as ressources.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub nom: String,
    pub description: Option<String>,
    pub author_id: String,
    pub is_public: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id"
    )]
    Author,
    #[sea_orm(has_many = "super::collection_ressources::Entity")]
    CollectionRessources,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::collection_ressources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionRessources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn visible_to(&self, viewer_id: Option<&str>) -> bool {
        self.is_public || viewer_id == Some(self.author_id.as_str())
    }
}
