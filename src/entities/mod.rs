pub mod prelude;

pub mod collection_ressources;
pub mod collections;
pub mod comments;
pub mod favorites;
pub mod follows;
pub mod likes;
pub mod registration_keys;
pub mod ressource_views;
pub mod ressources;
pub mod users;
