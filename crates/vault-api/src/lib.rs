pub mod auth;
pub mod error;
pub mod identity;
pub mod scripts;

use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, patch, post},
};

use vault_types::api::MessageBody;

use crate::auth::AppState;

/// All API routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/protect", post(scripts::protect))
        .route("/api/user/{user_id}/scripts", get(scripts::list_user_scripts))
        .route(
            "/api/script/{script_id}",
            get(scripts::get_script)
                .put(scripts::update_code)
                .delete(scripts::delete_script),
        )
        .route("/api/script/{script_id}/name", patch(scripts::rename))
        .route("/api/script/{script_id}/raw", get(scripts::raw))
        .layer(middleware::from_fn_with_state(state.clone(), identity::authenticate))
        .with_state(state)
}

async fn ping(State(state): State<AppState>) -> Json<MessageBody> {
    Json(MessageBody {
        message: state.ping_message.clone(),
    })
}
