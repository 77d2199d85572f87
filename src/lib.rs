pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::storage::StorageService;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use dashmap::DashMap;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::me,
        api::handlers::auth::refresh,
        api::handlers::auth::change_password,
        api::handlers::auth::update_profile,
        api::handlers::auth::validate_key,
        api::handlers::ressources::list_ressources,
        api::handlers::ressources::create_ressource,
        api::handlers::ressources::get_ressource,
        api::handlers::ressources::update_ressource,
        api::handlers::ressources::delete_ressource,
        api::handlers::ressources::toggle_like,
        api::handlers::ressources::toggle_favorite,
        api::handlers::ressources::download_ressource,
        api::handlers::ressources::increment_view,
        api::handlers::ressources::collections_for_ressource,
        api::handlers::collections::list_collections,
        api::handlers::collections::create_collection,
        api::handlers::collections::get_collection,
        api::handlers::collections::update_collection,
        api::handlers::collections::delete_collection,
        api::handlers::collections::add_ressource,
        api::handlers::collections::remove_ressource,
        api::handlers::collections::reorder_ressources,
        api::handlers::collections::duplicate_collection,
        api::handlers::comments::list_comments,
        api::handlers::comments::create_comment,
        api::handlers::comments::update_comment,
        api::handlers::comments::delete_comment,
        api::handlers::profil::get_profile,
        api::handlers::profil::follow_user,
        api::handlers::profil::unfollow_user,
        api::handlers::profil::list_followers,
        api::handlers::profil::list_following,
        api::handlers::profil::get_activity,
        api::handlers::profil::search_users,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::UserResponse,
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::ChangePasswordRequest,
            api::handlers::auth::UpdateProfileRequest,
            api::handlers::auth::ValidateKeyRequest,
            api::handlers::ressources::RessourceResponse,
            api::handlers::collections::CreateCollectionRequest,
            api::handlers::collections::UpdateCollectionRequest,
            api::handlers::collections::AddRessourceRequest,
            api::handlers::collections::ReorderRequest,
            api::handlers::collections::DuplicateRequest,
            api::handlers::comments::CreateCommentRequest,
            api::handlers::comments::UpdateCommentRequest,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Registration keys, sessions and profile"),
        (name = "ressources", description = "Educational ressources"),
        (name = "collections", description = "Ordered ressource collections"),
        (name = "commentaires", description = "Threaded comments"),
        (name = "profil", description = "Public profiles and follows")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub config: AppConfig,
    pub rate_tracker: Arc<DashMap<String, Vec<i64>>>,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        Self {
            db,
            storage,
            config,
            rate_tracker: Arc::new(DashMap::new()),
            started_at: std::time::Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let auth = |state: &AppState| {
        from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware)
    };
    let optional = |state: &AppState| {
        from_fn_with_state(state.clone(), api::middleware::auth::optional_auth_middleware)
    };

    Router::new()
        .route(
            "/api/auth/register",
            post(api::handlers::auth::register),
        )
        .route("/api/auth/login", post(api::handlers::auth::login))
        .route("/api/auth/refresh", post(api::handlers::auth::refresh))
        .route(
            "/api/auth/validate-key",
            post(api::handlers::auth::validate_key),
        )
        .route(
            "/api/auth/me",
            get(api::handlers::auth::me).layer(auth(&state)),
        )
        .route(
            "/api/auth/password",
            put(api::handlers::auth::change_password).layer(auth(&state)),
        )
        .route(
            "/api/auth/profil",
            put(api::handlers::auth::update_profile).layer(auth(&state)),
        )
        .route(
            "/api/ressources",
            get(api::handlers::ressources::list_ressources).layer(optional(&state)),
        )
        .route(
            "/api/ressources",
            post(api::handlers::ressources::create_ressource)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size + 10 * 1024 * 1024,
                ))
                .layer(auth(&state)),
        )
        .route(
            "/api/ressources/:id",
            get(api::handlers::ressources::get_ressource).layer(optional(&state)),
        )
        .route(
            "/api/ressources/:id",
            put(api::handlers::ressources::update_ressource)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size + 10 * 1024 * 1024,
                ))
                .delete(api::handlers::ressources::delete_ressource)
                .layer(auth(&state)),
        )
        .route(
            "/api/ressources/:id/like",
            post(api::handlers::ressources::toggle_like).layer(auth(&state)),
        )
        .route(
            "/api/ressources/:id/favorite",
            post(api::handlers::ressources::toggle_favorite).layer(auth(&state)),
        )
        .route(
            "/api/ressources/:id/download",
            get(api::handlers::ressources::download_ressource).layer(optional(&state)),
        )
        .route(
            "/api/ressources/:id/view",
            post(api::handlers::ressources::increment_view),
        )
        .route(
            "/api/ressources/:id/collections",
            get(api::handlers::ressources::collections_for_ressource),
        )
        .route(
            "/api/ressources/:id/commentaires",
            get(api::handlers::comments::list_comments).layer(optional(&state)),
        )
        .route(
            "/api/ressources/:id/commentaires",
            post(api::handlers::comments::create_comment).layer(auth(&state)),
        )
        .route(
            "/api/commentaires/:id",
            put(api::handlers::comments::update_comment)
                .delete(api::handlers::comments::delete_comment)
                .layer(auth(&state)),
        )
        .route(
            "/api/collections",
            get(api::handlers::collections::list_collections).layer(optional(&state)),
        )
        .route(
            "/api/collections",
            post(api::handlers::collections::create_collection).layer(auth(&state)),
        )
        .route(
            "/api/collections/:id",
            get(api::handlers::collections::get_collection).layer(optional(&state)),
        )
        .route(
            "/api/collections/:id",
            put(api::handlers::collections::update_collection)
                .delete(api::handlers::collections::delete_collection)
                .layer(auth(&state)),
        )
        .route(
            "/api/collections/:id/ressources",
            post(api::handlers::collections::add_ressource).layer(auth(&state)),
        )
        .route(
            "/api/collections/:id/reorder",
            put(api::handlers::collections::reorder_ressources).layer(auth(&state)),
        )
        .route(
            "/api/collections/:id/ressources/:ressource_id",
            axum::routing::delete(api::handlers::collections::remove_ressource)
                .layer(auth(&state)),
        )
        .route(
            "/api/collections/:id/dupliquer",
            post(api::handlers::collections::duplicate_collection).layer(auth(&state)),
        )
        .route(
            "/api/profil/:user_id",
            get(api::handlers::profil::get_profile).layer(optional(&state)),
        )
        .route(
            "/api/profil/:user_id/follow",
            post(api::handlers::profil::follow_user)
                .delete(api::handlers::profil::unfollow_user)
                .layer(auth(&state)),
        )
        .route(
            "/api/profil/:user_id/followers",
            get(api::handlers::profil::list_followers),
        )
        .route(
            "/api/profil/:user_id/following",
            get(api::handlers::profil::list_following),
        )
        .route(
            "/api/profil/:user_id/activity",
            get(api::handlers::profil::get_activity).layer(optional(&state)),
        )
        .route(
            "/api/utilisateurs",
            get(api::handlers::profil::search_users),
        )
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::rate_limit::rate_limit_middleware,
        ))
        .route("/health", get(api::handlers::health::health_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
        .collect();

    if origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
