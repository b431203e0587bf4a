//! services/api/src/web/middleware.rs
//!
//! Middleware that decides which user a request acts as.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use study_tracker_core::domain::Identity;
use tracing::{error, warn};

use crate::config::StorageMode;
use crate::web::state::AppState;

/// Reads the `session` cookie value from the request headers.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, makes sure the user's workspace is loaded and inserts both the
/// `Identity` and the `Arc<Workspace>` into request extensions. If invalid or
/// missing, returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let accounts = state.accounts.as_ref().ok_or_else(|| {
        error!("Cookie authentication used without an account service");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let auth_session_id = session_cookie(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id: Identity = accounts
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            warn!("Rejected auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // A restarted server has no workspaces yet; the first request rebuilds it.
    let workspace = state.workspaces.activate(user_id).await;
    req.extensions_mut().insert(user_id);
    req.extensions_mut().insert(workspace);

    Ok(next.run(req).await)
}

/// Middleware for local mode: every request acts as the configured local user.
pub async fn local_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let StorageMode::Local { user_id, .. } = &state.config.storage else {
        error!("Local identity middleware used outside local mode");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };
    let user_id = *user_id;

    let workspace = state.workspaces.activate(user_id).await;
    req.extensions_mut().insert(user_id);
    req.extensions_mut().insert(workspace);

    Ok(next.run(req).await)
}
