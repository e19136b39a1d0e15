//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::*;
use crate::config::CorsConfig;
use crate::error::ErrorResponse;
use crate::relay::{Author, Message, Reply, Role, SendRequest};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trio Relay API",
        description = "One shared conversation relayed to several LLM backends in caller-specified order.",
        license(name = "MIT"),
    ),
    servers(
        (url = "http://localhost:8001", description = "Local development server")
    ),
    paths(
        handlers::root,
        handlers::get_history,
        handlers::send_message,
        handlers::reset_chat,
    ),
    components(schemas(
        SendRequest,
        SendResponse,
        HistoryResponse,
        ResetResponse,
        ServiceInfo,
        ErrorResponse,
        Message,
        Reply,
        Author,
        Role,
    )),
    tags(
        (name = "Chat", description = "Conversation endpoints"),
        (name = "Health", description = "Liveness endpoint"),
    )
)]
pub struct ApiDoc;

fn chat_routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/history", get(handlers::get_history))
        .route("/send", post(handlers::send_message))
        .route("/reset", post(handlers::reset_chat))
}

/// Build the CORS layer. Credentials are always allowed; a `*` list mirrors
/// the request origin since browsers reject a literal `*` with credentials.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allows_any() {
        return CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
}

/// Create the main application router
pub async fn create_router(state: Arc<crate::AppState>) -> Router {
    let cors = {
        let config = state.settings.read().await;
        cors_layer(&config.cors)
    };

    Router::new()
        .merge(chat_routes())
        // Same endpoints behind the /api prefix used by the web client's ingress
        .nest("/api", chat_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
