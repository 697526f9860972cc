use crate::{handlers, AppState};
use axum::{
    http::header,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_router(state: AppState) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::USER_AGENT])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/register_server", post(handlers::register_server_handler))
        .route("/heartbeat", post(handlers::heartbeat_handler))
        .route("/search_tools", post(handlers::search_tools_handler))
        .route("/find_server", post(handlers::find_server_handler))
        .route("/servers", get(handlers::list_servers_handler))
        .route("/servers/{id}", get(handlers::get_server_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}
