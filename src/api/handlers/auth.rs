use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::services::auth_service::{AuthService, ProfileUpdate, RegisterData};
use crate::utils::auth::{Claims, refresh_jwt};
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::StatusCode,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;
use validator::Validate;

/// Public user projection returned by the auth endpoints.
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub nom: String,
    pub prenom: String,
    pub role: String,
    pub classe: Option<String>,
    pub matiere: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub date_naissance: Option<chrono::NaiveDate>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            nom: user.nom,
            prenom: user.prenom,
            role: user.role,
            classe: user.classe,
            matiere: user.matiere,
            avatar_url: user.avatar_url,
            bio: user.bio,
            date_naissance: user.date_naissance,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "La clé d'inscription est requise"))]
    #[serde(alias = "keyValue")]
    pub key_value: String,
    #[validate(email(message = "Format d'email invalide"))]
    pub email: String,
    #[validate(length(min = 8, message = "Le mot de passe doit faire au moins 8 caractères"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Le nom doit faire entre 1 et 100 caractères"))]
    pub nom: String,
    #[validate(length(min = 1, max = 100, message = "Le prénom doit faire entre 1 et 100 caractères"))]
    pub prenom: String,
    pub classe: Option<String>,
    pub matiere: Option<String>,
    pub date_naissance: Option<chrono::NaiveDate>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Format d'email invalide"))]
    pub email: String,
    #[validate(length(min = 1, message = "Le mot de passe est requis"))]
    pub password: String,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Le mot de passe actuel est requis"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Le nouveau mot de passe doit faire au moins 8 caractères"))]
    pub new_password: String,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub nom: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub prenom: Option<String>,
    #[validate(length(max = 500, message = "La bio est limitée à 500 caractères"))]
    pub bio: Option<String>,
    #[validate(url(message = "URL d'avatar invalide"))]
    pub avatar_url: Option<String>,
    pub classe: Option<String>,
    pub matiere: Option<String>,
    pub date_naissance: Option<chrono::NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct ValidateKeyRequest {
    #[serde(alias = "keyValue")]
    pub key_value: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully"),
        (status = 400, description = "Invalid key, email taken or missing role field")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    payload.validate().map_err(AppError::from_validation)?;

    let (user, token) = AuthService::register(
        &state.db,
        &state.config,
        RegisterData {
            key_value: payload.key_value,
            email: payload.email,
            password: payload.password,
            nom: payload.nom,
            prenom: payload.prenom,
            classe: payload.classe,
            matiere: payload.matiere,
            date_naissance: payload.date_naissance,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": UserResponse::from(user),
            "token": token,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate().map_err(AppError::from_validation)?;

    let (user, token) =
        AuthService::login(&state.db, &state.config, &payload.email, &payload.password).await?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user),
        "token": token,
    })))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, AppError> {
    let user = Users::find_by_id(&claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Utilisateur non trouvé".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

/// Not behind the auth middleware: an expired token must still be
/// refreshable, so the token is pulled straight from the header here.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Fresh token issued"),
        (status = 401, description = "Token missing or unverifiable")
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<crate::AppState>,
    req: Request,
) -> Result<Json<Value>, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Token manquant".to_string()))?;

    let fresh = refresh_jwt(token, &state.config)
        .map_err(|_| AppError::Unauthorized("Token invalide".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "token": fresh,
    })))
}

#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Wrong current password")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate().map_err(AppError::from_validation)?;

    AuthService::change_password(
        &state.db,
        &claims.sub,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    put,
    path = "/api/auth/profil",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "No valid field to update")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn update_profile(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate().map_err(AppError::from_validation)?;

    let user = AuthService::update_profile(
        &state.db,
        &claims.sub,
        ProfileUpdate {
            nom: payload.nom,
            prenom: payload.prenom,
            bio: payload.bio,
            avatar_url: payload.avatar_url,
            classe: payload.classe,
            matiere: payload.matiere,
            date_naissance: payload.date_naissance,
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

#[utoipa::path(
    post,
    path = "/api/auth/validate-key",
    request_body = ValidateKeyRequest,
    responses(
        (status = 200, description = "Key validity; never a 404 for unknown keys")
    ),
    tag = "auth"
)]
pub async fn validate_key(
    State(state): State<crate::AppState>,
    Json(payload): Json<ValidateKeyRequest>,
) -> Result<Json<Value>, AppError> {
    let (valid, role) =
        AuthService::validate_registration_key(&state.db, &payload.key_value).await?;

    Ok(Json(json!({
        "success": true,
        "valid": valid,
        "role": role,
    })))
}
