//! HTTP gateway for flowdeck.
//!
//! Exposes every registered flow over HTTP, serves canvas artifacts for
//! preview and optionally a prebuilt front end.
//!
//! Built on Axum.

pub mod artifacts;
pub mod flows_api;
pub mod static_ui;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use flowdeck_config::{AppConfig, GatewayConfig};
use flowdeck_core::event::{DomainEvent, EventBus};
use flowdeck_flows::{FlowContext, FlowRegistry, default_flows};
use flowdeck_tools::ArtifactManager;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub flows: FlowRegistry,
    pub artifacts: Arc<dyn ArtifactManager>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(flows: FlowRegistry, artifacts: Arc<dyn ArtifactManager>) -> SharedState {
        Arc::new(Self { flows, artifacts })
    }

    /// State for every built-in flow over `ctx`.
    pub fn from_context(ctx: &FlowContext) -> SharedState {
        Self::new(default_flows(ctx), ctx.artifacts.clone())
    }
}

/// Build the Axum router with all gateway routes.
///
/// Layers: body size limit, CORS from `gateway.allowed_origins`, HTTP trace
/// logging. Unknown GET paths fall through to `gateway.ui_dir` when set.
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/flows", get(flows_api::list_flows))
        .route("/api/{flow}", post(flows_api::run_flow))
        .route("/flows/{flow}", post(flows_api::run_flow))
        .route("/artifacts/{*path}", get(artifacts::get_artifact))
        .with_state(state);

    if let Some(dir) = &gateway.ui_dir {
        app = app.merge(static_ui::ui_router(dir));
    }

    let body_limit = gateway.body_limit_mb.saturating_mul(1024 * 1024);
    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Log domain events at debug level until the bus closes.
fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event.as_ref() {
                DomainEvent::ModelCalled {
                    model,
                    turn,
                    tokens_used,
                    ..
                } => debug!(model = %model, turn, tokens = ?tokens_used, "Model called"),
                DomainEvent::ToolExecuted {
                    tool_name,
                    success,
                    duration_ms,
                    ..
                } => debug!(tool = %tool_name, success, duration_ms, "Tool executed"),
                DomainEvent::ErrorOccurred {
                    context,
                    error_message,
                    ..
                } => debug!(context = %context, error = %error_message, "Error event"),
                DomainEvent::FlowStarted { .. } | DomainEvent::FlowCompleted { .. } => {}
            }
        }
    });
}

/// Start the gateway HTTP server.
///
/// Providers, stores and tools are built once and shared by every flow.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let ctx = FlowContext::from_config(&config)?;
    spawn_event_logger(&ctx.events);
    let state = GatewayState::from_context(&ctx);
    let flow_count = state.flows.len();

    let app = build_router(state, &config.gateway);

    info!(addr = %addr, flows = flow_count, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    flows: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        flows: state.flows.len(),
    })
}
