pub mod auth;
pub mod calendar;
pub mod client;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod models;
pub mod openapi;
pub mod sanitize;
pub mod settings;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use handlers::{
    get_calendar, get_day_events, get_ical, get_me, get_notices, get_notifications, get_overview,
    healthz_live, healthz_ready, login, logout, root,
};
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::SessionStore;
use crate::client::BackendClient;
use crate::ical::ICalExporter;
use crate::openapi::ApiDoc;
use crate::sanitize::HtmlSanitizer;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub client: Arc<BackendClient>,
    pub session: Arc<SessionStore>,
    pub sanitizer: Arc<HtmlSanitizer>,
    pub exporter: Arc<ICalExporter>,
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState {
        settings: settings.clone(),
        client: Arc::new(BackendClient::new(settings.backend_base_url.clone())),
        session: Arc::new(SessionStore::new(settings.session_token.clone())),
        sanitizer: Arc::new(HtmlSanitizer::new()),
        exporter: Arc::new(ICalExporter::new()),
    };

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting Campus Portal API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    // Browser dashboards call this service directly.
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
        .route("/notices", get(get_notices))
        .route("/notifications", get(get_notifications))
        .route("/calendar", get(get_calendar))
        .route("/calendar/day", get(get_day_events))
        .route("/calendar.ical", get(get_ical))
        .route("/overview", get(get_overview))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(cors_layer).layer(trace_layer)
}
