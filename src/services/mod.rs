pub mod auth_service;
pub mod collection_service;
pub mod comment_service;
pub mod profile_service;
pub mod ressource_service;
pub mod storage;
