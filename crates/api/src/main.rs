// Orderflow API server
//
// Accepts order submissions, drives the durable orchestration engine in
// the background, and exposes the approval signal endpoint the published
// status instructs a human to call.

mod orders;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use orderflow_durable::{EngineConfig, InMemoryRunEventStore, OrchestrationEngine};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::get_order,
        orders::raise_order_event,
    ),
    components(
        schemas(
            orders::CreateOrderRequest,
            orders::OrderAccepted,
            orders::OrderStatus,
            orders::ApprovalPrompt,
        )
    ),
    tags(
        (name = "orders", description = "Order orchestration endpoints")
    ),
    info(
        title = "Orderflow API",
        version = "0.1.0",
        description = "Durable order processing with a human approval step",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "orderflow_api=debug,orderflow_durable=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("orderflow-api starting...");

    let bind_addr =
        std::env::var("ORDERFLOW_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let public_url =
        std::env::var("ORDERFLOW_PUBLIC_URL").unwrap_or_else(|_| format!("http://{bind_addr}"));
    let approval_timeout = std::env::var("ORDERFLOW_APPROVAL_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(orderflow_durable::approval::DEFAULT_APPROVAL_TIMEOUT);
    tracing::info!(
        %public_url,
        timeout_secs = approval_timeout.as_secs(),
        "Approval window configured"
    );

    let store = Arc::new(InMemoryRunEventStore::new());
    let engine = Arc::new(OrchestrationEngine::with_config(
        store,
        EngineConfig {
            approval_timeout,
            public_base_url: public_url.clone(),
        },
    ));

    let state = orders::AppState { engine, public_url };

    let app = Router::new()
        .route("/health", get(health))
        .merge(orders::routes(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
