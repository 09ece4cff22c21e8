//! Who is calling.
//!
//! In `token` mode the caller is whoever a valid bearer token names. In
//! `asserted` mode a request may instead simply state an owner id; that is
//! only suitable for local runs and demos.

use std::fmt;
use std::str::FromStr;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use vault_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Header carrying an asserted owner id on raw fetches.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityMode {
    /// Only bearer tokens establish identity.
    #[default]
    Token,
    /// Without a token, request-supplied owner ids are trusted.
    Asserted,
}

impl FromStr for IdentityMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(IdentityMode::Token),
            "asserted" => Ok(IdentityMode::Asserted),
            other => Err(anyhow::anyhow!(
                "unknown identity mode '{}', expected 'token' or 'asserted'",
                other
            )),
        }
    }
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityMode::Token => f.write_str("token"),
            IdentityMode::Asserted => f.write_str("asserted"),
        }
    }
}

/// Verified bearer identity of the current request, if any.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Claims>);

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|claims| claims.sub.as_str())
    }
}

/// Decode a bearer token if one is sent. A present but invalid
/// `Authorization` header is rejected outright.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match req.headers().get(header::AUTHORIZATION) {
        None => Caller(None),
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header".into()))?;
            Caller(Some(decode_token(&state.jwt_secret, token)?))
        }
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))
}

/// The owner id to act as.
///
/// A verified caller always wins; an asserted owner sent alongside a token
/// must name the same user. Without a token, the asserted owner counts only
/// in asserted mode. `Ok(None)` means no usable identity was supplied.
pub fn resolve_owner(
    mode: IdentityMode,
    caller: &Caller,
    asserted: Option<&str>,
) -> Result<Option<String>, ApiError> {
    let asserted = asserted.map(str::trim).filter(|owner| !owner.is_empty());

    match (caller.user_id(), asserted) {
        (Some(user_id), Some(owner)) if owner != user_id => Err(ApiError::Forbidden(
            "Owner does not match the authenticated user".into(),
        )),
        (Some(user_id), _) => Ok(Some(user_id.to_string())),
        (None, Some(owner)) if mode == IdentityMode::Asserted => Ok(Some(owner.to_string())),
        (None, _) => Ok(None),
    }
}

/// What to answer when no identity could be resolved: token mode asks for
/// credentials, asserted mode reports the missing field.
pub fn missing_identity(mode: IdentityMode, message: &str) -> ApiError {
    match mode {
        IdentityMode::Token => ApiError::Unauthorized("Authentication required".into()),
        IdentityMode::Asserted => ApiError::BadRequest(message.to_string()),
    }
}

/// Asserted owner from a body field, falling back to the `x-user-id` header.
pub fn asserted_owner<'a>(field: Option<&'a str>, headers: &'a HeaderMap) -> Option<&'a str> {
    field
        .filter(|owner| !owner.trim().is_empty())
        .or_else(|| headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()))
}
