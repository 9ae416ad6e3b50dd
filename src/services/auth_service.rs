use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{
    generate_reset_token, hash_password, hash_reset_token, reset_token_ttl, verify_against_dummy,
    verify_password,
};
use crate::auth::validate::{normalize_email, validate_password, validate_signup};
use crate::auth::{generate_jwt, validate_jwt, Claims, JwtError};
use crate::config::AppConfig;
use crate::database::models::UserRecord;
use crate::database::{StoreError, UserStore};
use crate::types::{Role, UserView};

pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email and wrong password are deliberately indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),
    #[error("Validation failed")]
    Validation(HashMap<String, String>),
    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,
    #[error("{0}")]
    Unauthorized(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Token plus the account it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_in: i64,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordOutcome {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { users, config }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            let mut field_errors = HashMap::new();
            field_errors.insert("email".to_string(), "Email and password are required".to_string());
            return Err(AuthError::Validation(field_errors));
        }

        let email = normalize_email(email);
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            verify_against_dummy(password);
            warn!("Login failed for unknown email {}", email);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            warn!("Login failed for {}: wrong password", email);
            return Err(AuthError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        self.issue(&user)
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let field_errors = validate_signup(name, email, password);
        if !field_errors.is_empty() {
            return Err(AuthError::Validation(field_errors));
        }

        let email = normalize_email(email);
        let role = if self.config.security.is_seed_email(&email) {
            Role::Admin
        } else {
            Role::User
        };
        let password_hash = hash_password(password).map_err(|e| AuthError::Hashing(e.to_string()))?;

        let record = UserRecord::new(name.trim().to_string(), email.clone(), password_hash, role);
        let user = match self.users.insert_user(record).await {
            Ok(user) => user,
            Err(StoreError::Duplicate(_)) => return Err(AuthError::DuplicateEmail(email)),
            Err(e) => return Err(e.into()),
        };

        info!("Registered user {} with role {}", user.id, user.role);
        self.issue(&user)
    }

    /// Resolves a bearer token to the current state of its account.
    pub async fn authenticate(&self, token: &str) -> Result<UserView, AuthError> {
        let claims = validate_jwt(token, &self.config.security.jwt_secret).map_err(|e| match e {
            JwtError::InvalidToken(_) => AuthError::Unauthorized("Invalid or expired token".to_string()),
            other => AuthError::Token(other),
        })?;
        self.me(claims.sub).await
    }

    pub async fn me(&self, user_id: Uuid) -> Result<UserView, AuthError> {
        match self.users.find_user(user_id).await? {
            Some(user) => Ok(user.to_view(&self.config.security)),
            None => Err(AuthError::Unauthorized("User no longer exists".to_string())),
        }
    }

    pub async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordOutcome, AuthError> {
        let email = normalize_email(email);
        let mut reset_token = None;

        if let Some(user) = self.users.find_user_by_email(&email).await? {
            let token = generate_reset_token();
            let expires_at = Utc::now() + reset_token_ttl();
            self.users
                .set_reset_token(user.id, Some(hash_reset_token(&token)), Some(expires_at))
                .await?;

            info!("Password reset requested for {}; token {}", email, token);
            if self.config.security.expose_reset_token {
                reset_token = Some(token);
            }
        } else {
            info!("Password reset requested for unknown email {}", email);
        }

        Ok(ForgotPasswordOutcome {
            message: RESET_REQUESTED_MESSAGE.to_string(),
            reset_token,
        })
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if let Err(e) = validate_password(new_password) {
            let mut field_errors = HashMap::new();
            field_errors.insert("password".to_string(), e);
            return Err(AuthError::Validation(field_errors));
        }

        let digest = hash_reset_token(token.trim());
        let user = self
            .users
            .consume_reset_token(&digest, Utc::now())
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let password_hash = hash_password(new_password).map_err(|e| AuthError::Hashing(e.to_string()))?;
        self.users.update_password(user.id, password_hash).await?;
        info!("Password reset completed for user {}", user.id);
        Ok(())
    }

    fn issue(&self, user: &UserRecord) -> Result<AuthSession, AuthError> {
        let claims = Claims::new(user.id, user.email.clone(), user.role);
        let token = generate_jwt(&claims, &self.config.security.jwt_secret)?;
        Ok(AuthSession {
            token,
            expires_in: claims.expires_in(),
            user: user.to_view(&self.config.security),
        })
    }
}
