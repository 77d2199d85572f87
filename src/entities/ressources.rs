use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Educational resources. `contenu` is a free-form JSON payload: a bare `url`
/// for type "lien", or `{file_url, file_key, file_name, file_size, file_type}`
/// for uploaded files. `tags` is a JSON-encoded string array so the overlap
/// filter can run as a LIKE on both Postgres and SQLite.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ressources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub titre: String,
    pub description: Option<String>,
    /// "document", "media", "video" or "lien"
    #[sea_orm(column_name = "type")]
    pub type_ressource: String,
    pub contenu: Json,
    pub tags: String,
    pub matiere: Option<String>,
    pub niveau: Option<String>,
    pub author_id: String,
    pub is_public: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub downloads_count: i64,
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
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::collection_ressources::Entity")]
    CollectionRessources,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::collection_ressources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionRessources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Public-or-owner read rule shared by every viewer-facing code path.
    pub fn visible_to(&self, viewer_id: Option<&str>) -> bool {
        self.is_public || viewer_id == Some(self.author_id.as_str())
    }

    pub fn tags_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}
