use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{prelude::*, registration_keys, users};
use crate::utils::auth::create_jwt;
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

pub struct RegisterData {
    pub key_value: String,
    pub email: String,
    pub password: String,
    pub nom: String,
    pub prenom: String,
    pub classe: Option<String>,
    pub matiere: Option<String>,
    pub date_naissance: Option<chrono::NaiveDate>,
}

#[derive(Default)]
pub struct ProfileUpdate {
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub classe: Option<String>,
    pub matiere: Option<String>,
    pub date_naissance: Option<chrono::NaiveDate>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.nom.is_none()
            && self.prenom.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
            && self.classe.is_none()
            && self.matiere.is_none()
            && self.date_naissance.is_none()
    }
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        let argon2 = Argon2::default();
        let parsed_hash =
            argon2::PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Redeems a registration key: the key must exist and be unused, the
    /// email must be free, and the role the key grants fixes which profile
    /// field (classe/matiere) is required.
    pub async fn register(
        db: &DatabaseConnection,
        config: &AppConfig,
        data: RegisterData,
    ) -> Result<(users::Model, String), AppError> {
        let key = RegistrationKeys::find()
            .filter(registration_keys::Column::KeyValue.eq(&data.key_value))
            .one(db)
            .await?
            .filter(|k| !k.is_used)
            .ok_or_else(|| {
                AppError::Validation("Clé d'inscription invalide ou déjà utilisée".to_string())
            })?;

        let email_taken = Users::find()
            .filter(users::Column::Email.eq(&data.email))
            .one(db)
            .await?
            .is_some();
        if email_taken {
            return Err(AppError::Validation(
                "Un compte existe déjà avec cet email".to_string(),
            ));
        }

        match key.role.as_str() {
            "eleve" if data.classe.is_none() => {
                return Err(AppError::Validation(
                    "La classe est requise pour un élève".to_string(),
                ));
            }
            "professeur" if data.matiere.is_none() => {
                return Err(AppError::Validation(
                    "La matière est requise pour un professeur".to_string(),
                ));
            }
            _ => {}
        }

        let now = Utc::now();
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email: Set(data.email),
            password_hash: Set(Self::hash_password(&data.password)?),
            nom: Set(data.nom),
            prenom: Set(data.prenom),
            role: Set(key.role.clone()),
            classe: Set(data.classe.filter(|_| key.role == "eleve")),
            matiere: Set(data.matiere.filter(|_| key.role == "professeur")),
            avatar_url: Set(None),
            bio: Set(None),
            date_naissance: Set(data.date_naissance),
            is_active: Set(true),
            last_login: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let user = user.insert(db).await?;

        let mut key_active: registration_keys::ActiveModel = key.into();
        key_active.is_used = Set(true);
        key_active.used_by = Set(Some(user.id.clone()));
        key_active.used_at = Set(Some(now));
        key_active.update(db).await?;

        let token = create_jwt(&user.id, &user.email, &user.role, config)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok((user, token))
    }

    /// Same message for "no such user" and "wrong password" so the endpoint
    /// cannot be used to enumerate accounts.
    pub async fn login(
        db: &DatabaseConnection,
        config: &AppConfig,
        email: &str,
        password: &str,
    ) -> Result<(users::Model, String), AppError> {
        let invalid = || AppError::Unauthorized("Identifiants invalides".to_string());

        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(invalid)?;

        if !Self::verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        let mut active: users::ActiveModel = user.clone().into();
        active.last_login = Set(Some(Utc::now()));
        let user = active.update(db).await?;

        let token = create_jwt(&user.id, &user.email, &user.role, config)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok((user, token))
    }

    pub async fn change_password(
        db: &DatabaseConnection,
        user_id: &str,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        let user = Users::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Utilisateur non trouvé".to_string()))?;

        if !Self::verify_password(current, &user.password_hash)? {
            return Err(AppError::Validation(
                "Mot de passe actuel incorrect".to_string(),
            ));
        }

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(Self::hash_password(new)?);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    /// Whitelist update: only the fields carried by `ProfileUpdate` can ever
    /// change through this path.
    pub async fn update_profile(
        db: &DatabaseConnection,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<users::Model, AppError> {
        if update.is_empty() {
            return Err(AppError::Validation(
                "Aucun champ valide à mettre à jour".to_string(),
            ));
        }

        let user = Users::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Utilisateur non trouvé".to_string()))?;

        let mut active: users::ActiveModel = user.into();
        if let Some(nom) = update.nom {
            active.nom = Set(nom);
        }
        if let Some(prenom) = update.prenom {
            active.prenom = Set(prenom);
        }
        if let Some(bio) = update.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(avatar_url) = update.avatar_url {
            active.avatar_url = Set(Some(avatar_url));
        }
        if let Some(classe) = update.classe {
            active.classe = Set(Some(classe));
        }
        if let Some(matiere) = update.matiere {
            active.matiere = Set(Some(matiere));
        }
        if let Some(date_naissance) = update.date_naissance {
            active.date_naissance = Set(Some(date_naissance));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(db).await?)
    }

    /// Pre-submit UX check: never errors for an unknown key, just reports
    /// validity and the role the key would grant.
    pub async fn validate_registration_key(
        db: &DatabaseConnection,
        key_value: &str,
    ) -> Result<(bool, Option<String>), AppError> {
        let key = RegistrationKeys::find()
            .filter(registration_keys::Column::KeyValue.eq(key_value))
            .one(db)
            .await?;

        match key {
            Some(k) if !k.is_used => Ok((true, Some(k.role))),
            _ => Ok((false, None)),
        }
    }
}
