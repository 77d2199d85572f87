pub mod auth;
pub mod collections;
pub mod comments;
pub mod health;
pub mod profil;
pub mod ressources;
