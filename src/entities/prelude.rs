pub use super::collection_ressources::Entity as CollectionRessources;
pub use super::collections::Entity as Collections;
pub use super::comments::Entity as Comments;
pub use super::favorites::Entity as Favorites;
pub use super::follows::Entity as Follows;
pub use super::likes::Entity as Likes;
pub use super::registration_keys::Entity as RegistrationKeys;
pub use super::ressource_views::Entity as RessourceViews;
pub use super::ressources::Entity as Ressources;
pub use super::users::Entity as Users;
