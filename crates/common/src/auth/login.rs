//! Password sign-in

use super::JwtManager;
use crate::db::UserStore;
use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Sign-in form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    pub password: String,
}

/// Issued bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Hash a password into an Argon2id PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| AppError::Internal {
        message: format!("Invalid password hash: {}", e),
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Exchanges credentials for tokens
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtManager>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt: Arc<JwtManager>) -> Self {
        Self { users, jwt }
    }

    /// Verify email and password and issue a token for the user.
    ///
    /// Unknown emails and wrong passwords fail the same way.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn login(&self, form: LoginForm) -> Result<TokenResponse> {
        form.validate()?;

        let Some(user) = self.users.find_user_by_email(&form.email).await? else {
            warn!("Sign-in for unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(&form.password, &user.password)? {
            warn!(user_id = %user.id, "Sign-in with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.jwt.generate_token(user.id)?;
        info!(user_id = %user.id, "User signed in");

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: self.jwt.expiration_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::User;
    use crate::db::MemoryStore;
    use uuid::Uuid;

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn service_with_user() -> (AuthService, Arc<JwtManager>, User) {
        let store = Arc::new(MemoryStore::new());
        let user = User {
            id: Uuid::new_v4(),
            name: "User".into(),
            email: "user@nextmail.com".into(),
            password: hash_password("123456").unwrap(),
        };
        store.insert_user(user.clone()).await;

        let jwt = Arc::new(JwtManager::new("login_secret", 900));
        (AuthService::new(store, jwt.clone()), jwt, user)
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("anything", "plaintext").is_err());
    }

    #[tokio::test]
    async fn test_login_issues_token_for_user() {
        let (service, jwt, user) = service_with_user().await;

        let token = service.login(form("User@NextMail.com", "123456")).await.unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 900);
        assert_eq!(jwt.authenticate(&token.access_token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let (service, _, _) = service_with_user().await;

        let wrong_password = service.login(form("user@nextmail.com", "654321")).await.unwrap_err();
        let unknown_email = service.login(form("nobody@nextmail.com", "123456")).await.unwrap_err();
        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_invalid_form_names_field() {
        let (service, _, _) = service_with_user().await;

        let err = service.login(form("not-an-email", "123456")).await.unwrap_err();
        assert_eq!(err.field(), Some("email"));

        let err = service.login(form("user@nextmail.com", "123")).await.unwrap_err();
        assert_eq!(err.field(), Some("password"));
    }
}
