pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/start", post(routes::dialogue::start))
        .route("/counselor_turn", post(routes::dialogue::counselor_turn))
        .route(
            "/generate_client_response",
            post(routes::dialogue::generate_client_response),
        )
        .route(
            "/generate_client_response_stream",
            post(handlers::stream::generate_client_response_stream),
        )
        .route(
            "/ask_client_custom_question",
            post(routes::dialogue::ask_client_custom_question),
        )
        .route("/test_api_key", post(routes::providers::test_api_key))
        .route("/set_api_key", post(routes::providers::set_api_key))
        .route("/get_api_providers", get(routes::providers::get_api_providers))
        .layer(axum::middleware::from_fn(session::session_layer))
        .layer(axum::middleware::from_fn(middleware::logging::log_request))
        // Generous bound so slow provider streams are not cut off.
        .layer(TimeoutLayer::new(Duration::from_secs(300)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            for origin in &config.cors.origins {
                if let Ok(parsed_origin) = origin.parse::<HeaderValue>() {
                    cors = cors.allow_origin(parsed_origin);
                }
            }
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}
