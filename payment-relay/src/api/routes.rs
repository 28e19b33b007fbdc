use crate::api::handlers::payment_handlers;
use crate::app_state::AppState;
use crate::config::ServerConfig;
use crate::infrastructure::make_request_span;
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let server = &app_state.config.server;
    let cors = cors_layer(server);
    let timeout = TimeoutLayer::new(Duration::from_secs(server.request_timeout));

    Router::new()
        // 健康检查
        .route("/health", get(payment_handlers::health))

        // 支付订单接口
        .route("/payment/orders", post(payment_handlers::create_order))
        .route("/payment/orders/{idempotency_key}", get(payment_handlers::get_order))

        .layer(timeout)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .with_state(app_state)
}

// `*` 表示允许任意来源
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if server.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}
