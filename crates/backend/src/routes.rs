use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::shared::state::AppState;
use crate::system::middleware::request_logger::request_logger;
use crate::{handlers, system};

/// Конфигурация всех роутов приложения
pub fn configure_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]);

    // Роуты, требующие Bearer токен
    let protected = Router::new()
        .route(
            "/api/session",
            get(system::handlers::auth::current_session),
        )
        .route("/api/auth/logout", post(system::handlers::auth::logout))
        .route(
            "/api/dreams",
            get(handlers::a001_dream::list_all).post(handlers::a001_dream::create),
        )
        .route("/api/dreams/:id", get(handlers::a001_dream::get_by_id))
        .route("/api/dreams/:id/events", get(handlers::a001_dream::events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            system::auth::middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // AUTH ROUTES (PUBLIC)
        // ========================================
        .route("/api/auth/login", post(system::handlers::auth::login))
        .route("/api/auth/register", post(system::handlers::auth::register))
        .merge(protected)
        .layer(middleware::from_fn(request_logger))
        .layer(cors)
        .with_state(state)
}
