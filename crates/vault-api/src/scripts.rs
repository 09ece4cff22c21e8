use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::info;

use vault_types::api::{
    DeleteRequest, MessageBody, OwnerQuery, ProtectRequest, ProtectResponse, RenameRequest,
    ScriptListResponse, UpdateCodeRequest,
};
use vault_types::models::Script;

use crate::auth::AppState;
use crate::error::{ApiError, blocking, json_body, optional_json_body};
use crate::identity::{Caller, IdentityMode, asserted_owner, missing_identity, resolve_owner};

const NOT_FOUND: &str = "Script not found";
/// Mutations never reveal whether the id exists for someone else.
const NOT_FOUND_OR_UNAUTHORIZED: &str = "Script not found or unauthorized";

/// POST /api/protect — store a new script for the caller.
pub async fn protect(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    body: Result<Json<ProtectRequest>, JsonRejection>,
) -> Result<Json<ProtectResponse>, ApiError> {
    const REQUIRED: &str = "Code and owner are required";

    let req = json_body(body)?;
    let owner = resolve_owner(
        state.identity_mode,
        &caller,
        asserted_owner(req.owner.as_deref(), &headers),
    )?
    .ok_or_else(|| missing_identity(state.identity_mode, REQUIRED))?;
    let code = req
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request(REQUIRED))?;
    let name = req.name;

    let repo = state.scripts.clone();
    let script = blocking(move || Ok(repo.create(&owner, name.as_deref(), &code)?)).await?;

    info!(script_id = %script.id, code_len = script.code.len(), "Script protected");
    Ok(Json(ProtectResponse {
        script_id: script.id,
        message: "Script protected successfully".into(),
    }))
}

/// GET /api/user/{user_id}/scripts — summaries, newest first.
///
/// In token mode only the user themself may list; asserted mode keeps the
/// listing open.
pub async fn list_user_scripts(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
) -> Result<Json<ScriptListResponse>, ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::bad_request("User ID is required"));
    }

    if state.identity_mode == IdentityMode::Token {
        let viewer = caller
            .user_id()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;
        if viewer != user_id {
            return Err(ApiError::Forbidden("Cannot list another user's scripts".into()));
        }
    }

    let repo = state.scripts.clone();
    let scripts = blocking(move || Ok(repo.list_by_owner(&user_id)?)).await?;

    Ok(Json(ScriptListResponse {
        total: scripts.len(),
        scripts,
    }))
}

/// GET /api/script/{script_id} — the full script, code included.
///
/// When an identity is known the script must belong to it; a foreign script
/// looks exactly like a missing one.
pub async fn get_script(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(script_id): Path<String>,
    Query(query): Query<OwnerQuery>,
    headers: HeaderMap,
) -> Result<Json<Script>, ApiError> {
    let viewer = resolve_owner(
        state.identity_mode,
        &caller,
        asserted_owner(query.owner.as_deref(), &headers),
    )?;
    if viewer.is_none() && state.identity_mode == IdentityMode::Token {
        return Err(missing_identity(state.identity_mode, "Owner is required"));
    }

    let script = fetch(&state, script_id).await?.ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    if viewer.is_some_and(|viewer| viewer != script.owner_id) {
        return Err(ApiError::not_found(NOT_FOUND));
    }

    Ok(Json(script))
}

/// PUT /api/script/{script_id} — replace the code.
pub async fn update_code(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(script_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UpdateCodeRequest>, JsonRejection>,
) -> Result<Json<Script>, ApiError> {
    const REQUIRED: &str = "Script ID, code, and owner are required";

    let req = json_body(body)?;
    let owner = resolve_owner(
        state.identity_mode,
        &caller,
        asserted_owner(req.owner.as_deref(), &headers),
    )?
    .ok_or_else(|| missing_identity(state.identity_mode, REQUIRED))?;
    let code = req
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request(REQUIRED))?;

    let repo = state.scripts.clone();
    let updated = blocking(move || Ok(repo.update_code(&script_id, &owner, &code)?))
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND_OR_UNAUTHORIZED))?;

    Ok(Json(updated))
}

/// PATCH /api/script/{script_id}/name
pub async fn rename(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(script_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<Script>, ApiError> {
    const REQUIRED: &str = "Name and owner are required";

    let req = json_body(body)?;
    let owner = resolve_owner(
        state.identity_mode,
        &caller,
        asserted_owner(req.owner.as_deref(), &headers),
    )?
    .ok_or_else(|| missing_identity(state.identity_mode, REQUIRED))?;
    let name = req
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(REQUIRED))?;

    let repo = state.scripts.clone();
    let renamed = blocking(move || Ok(repo.update_name(&script_id, &owner, &name)?))
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND_OR_UNAUTHORIZED))?;

    Ok(Json(renamed))
}

/// DELETE /api/script/{script_id} — the body may be omitted when a bearer
/// token identifies the caller.
pub async fn delete_script(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(script_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let req = optional_json_body(body)?;
    let owner = resolve_owner(
        state.identity_mode,
        &caller,
        asserted_owner(req.owner.as_deref(), &headers),
    )?
    .ok_or_else(|| missing_identity(state.identity_mode, "Owner is required"))?;

    let repo = state.scripts.clone();
    let sid = script_id.clone();
    let removed = blocking(move || Ok(repo.delete(&sid, &owner)?)).await?;
    if !removed {
        return Err(ApiError::not_found(NOT_FOUND_OR_UNAUTHORIZED));
    }

    info!(%script_id, "Script deleted");
    Ok(Json(MessageBody {
        message: "Script deleted successfully".into(),
    }))
}

/// GET /api/script/{script_id}/raw — the bare code as a text download.
///
/// Unlike the mutation routes this one distinguishes a foreign script (403)
/// from a missing one (404).
pub async fn raw(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(script_id): Path<String>,
    Query(query): Query<OwnerQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let owner = resolve_owner(
        state.identity_mode,
        &caller,
        asserted_owner(query.owner.as_deref(), &headers),
    )?
    .ok_or_else(|| ApiError::Unauthorized("Owner identity is required".into()))?;

    let script = fetch(&state, script_id).await?.ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    if script.owner_id != owner {
        return Err(ApiError::Forbidden("Forbidden".into()));
    }

    let disposition = format!("attachment; filename=\"script_{}.lua\"", script.id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        script.code,
    ))
}

async fn fetch(state: &AppState, script_id: String) -> Result<Option<Script>, ApiError> {
    let repo = state.scripts.clone();
    blocking(move || Ok(repo.get_by_id(&script_id)?)).await
}
