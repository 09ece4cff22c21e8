use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::info;

use vault_db::models::UserRow;
use vault_db::{ScriptRepository, UserStore, clock, ids};
use vault_types::api::{AuthResponse, Claims, LoginRequest, MeResponse, SignupRequest};
use vault_types::models::PublicUser;

use crate::error::{ApiError, blocking, json_body};
use crate::identity::{Caller, IdentityMode};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub scripts: ScriptRepository,
    pub users: Arc<dyn UserStore>,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub identity_mode: IdentityMode,
    pub ping_message: String,
}

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 64;

pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let req = json_body(body)?;

    let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
    let username = req.username.as_deref().map(str::trim).unwrap_or_default().to_string();
    let password = req.password.unwrap_or_default();

    if email.is_empty() || username.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email, username and password are required"));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("Email address is invalid"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request("Username is too long"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let db = state.clone();
    let user = blocking(move || {
        let row = UserRow {
            id: ids::user_id(),
            email,
            username,
            password_hash: hash_password(&password)?,
            created_at: clock::format_timestamp(clock::now()),
        };

        if !db.users.create_user(&row)? {
            return Err(ApiError::Conflict("Email already in use".into()));
        }
        Ok(public_user(row))
    })
    .await?;

    let token = create_token(&state.jwt_secret, &user.id, &user.username, state.token_ttl_days)?;

    info!(user_id = %user.id, "User signed up");
    Ok(Json(AuthResponse { user, token }))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let req = json_body(body)?;

    let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let db = state.clone();
    let user = blocking(move || {
        let user = db
            .users
            .get_user_by_email(&email)?
            .ok_or_else(invalid_credentials)?;

        if !verify_password(&password, &user.password_hash)? {
            return Err(invalid_credentials());
        }
        Ok(public_user(user))
    })
    .await?;

    let token = create_token(&state.jwt_secret, &user.id, &user.username, state.token_ttl_days)?;

    Ok(Json(AuthResponse { user, token }))
}

/// Profile of the bearer of the token.
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<MeResponse>, ApiError> {
    let user_id = caller
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?
        .to_string();

    let db = state.clone();
    let user = blocking(move || Ok(db.users.get_user_by_id(&user_id)?))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(MeResponse {
        user: public_user(user),
    }))
}

pub fn create_token(
    secret: &str,
    user_id: &str,
    username: &str,
    ttl_days: i64,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Argon2id with a fresh random salt.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored password hash is corrupt: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".into())
}

fn public_user(row: UserRow) -> PublicUser {
    PublicUser {
        id: row.id,
        email: row.email,
        username: row.username,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_same_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn each_hash_gets_a_fresh_salt() {
        let a = hash_password("correct horse").unwrap();
        let b = hash_password("correct horse").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("correct horse", &b).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
