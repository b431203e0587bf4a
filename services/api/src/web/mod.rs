pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::ApiError;
use auth::{login_handler, logout_handler, signup_handler};
use middleware::{local_identity, require_auth};
use rest::*;
use state::AppState;

// Re-export the main WebSocket handler alongside the router builder.
pub use ws_handler::ws_handler;

/// Builds the API router. Auth routes and cookie checks are only mounted when
/// the state carries an account service; otherwise every request acts as the
/// configured local user.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Router(format!("ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let study_routes = Router::new()
        .route("/session", get(session_handler))
        .route("/topics", get(list_topics_handler))
        .route("/topics/{topic_id}/cycle", post(cycle_topic_handler))
        .route(
            "/topics/{topic_id}/subtopics/{sub_topic_id}/cycle",
            post(cycle_sub_topic_handler),
        )
        .route("/snippets", get(list_snippets_handler).post(create_snippet_handler))
        .route("/snippets/grouped", get(grouped_snippets_handler))
        .route(
            "/snippets/{id}",
            put(update_snippet_handler).delete(delete_snippet_handler),
        )
        .route("/exams", get(list_exams_handler).post(create_exam_handler))
        .route(
            "/exams/{id}",
            put(update_exam_handler).delete(delete_exam_handler),
        )
        .route("/ws", get(ws_handler));

    let router = if app_state.accounts.is_some() {
        // Public routes (no auth required)
        let public_routes = Router::new()
            .route("/auth/signup", post(signup_handler))
            .route("/auth/login", post(login_handler))
            .route("/auth/logout", post(logout_handler));
        let protected_routes = study_routes.route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));
        Router::new().merge(public_routes).merge(protected_routes)
    } else {
        study_routes.route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            local_identity,
        ))
    };

    Ok(router.layer(cors).with_state(app_state))
}
