// Order orchestration HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use orderflow_durable::{
    EngineError, InMemoryRunEventStore, InputOrder, Money, OrchestrationEngine, RunInfo, StoreError,
    APPROVAL_EVENT,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub type Engine = OrchestrationEngine<InMemoryRunEventStore>;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub public_url: String,
}

/// Request to start an order run
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_name: String,
    pub quantity: i64,
    /// Unit price in major currency units, e.g. 19.99
    pub unit_price: f64,
}

/// Management URIs handed back when a run is accepted
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderAccepted {
    pub id: Uuid,
    pub status_query_get_uri: String,
    pub send_event_post_uri: String,
}

/// Published approval prompt, shown while the run waits for a decision
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPrompt {
    pub name: String,
    pub instruction: String,
}

/// Status of an order run
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    pub id: Uuid,
    pub runtime_status: String,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<ApprovalPrompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrderStatus {
    fn from_info(info: RunInfo) -> Self {
        Self {
            id: info.id,
            runtime_status: info.status.to_string(),
            input: info.input,
            current_step: info.current_step.map(|s| s.to_string()),
            custom_status: info.approval_status.map(|s| ApprovalPrompt {
                name: s.name,
                instruction: s.instruction,
            }),
            output: info.result,
            error: info.error,
        }
    }
}

/// Create order routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/events/:event_name", post(raise_order_event))
        .with_state(state)
}

/// POST /orders - Start a new order run
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 202, description = "Order run accepted", body = OrderAccepted),
        (status = 500, description = "Internal server error")
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderAccepted>), StatusCode> {
    let input = InputOrder {
        product_name: req.product_name,
        quantity: req.quantity,
        unit_price: Money::from_cents((req.unit_price * 100.0).round() as i64),
    };

    let run_id = state.engine.start(input).await.map_err(|e| {
        tracing::error!("Failed to start order run: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // Drive the run in the background; clients poll the status URI
    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.drive(run_id).await {
            tracing::error!(run_id = %run_id, "Order run failed: {}", e);
        }
    });

    tracing::info!(run_id = %run_id, "Order run accepted");

    let accepted = OrderAccepted {
        id: run_id,
        status_query_get_uri: format!("{}/orders/{run_id}", state.public_url),
        send_event_post_uri: format!(
            "{}/orders/{run_id}/events/{APPROVAL_EVENT}",
            state.public_url
        ),
    };
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// GET /orders/{order_id} - Get run status
#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order run ID")
    ),
    responses(
        (status = 200, description = "Order run status", body = OrderStatus),
        (status = 404, description = "Order run not found")
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderStatus>, StatusCode> {
    let info = state
        .engine
        .info(order_id)
        .await
        .map_err(engine_error_status)?;

    Ok(Json(OrderStatus::from_info(info)))
}

/// POST /orders/{order_id}/events/{event_name} - Deliver an external event
///
/// The body is a bare JSON boolean: the approval decision.
#[utoipa::path(
    post,
    path = "/orders/{order_id}/events/{event_name}",
    params(
        ("order_id" = Uuid, Path, description = "Order run ID"),
        ("event_name" = String, Path, description = "Event name, e.g. ApprovalEvent")
    ),
    request_body = bool,
    responses(
        (status = 202, description = "Event accepted"),
        (status = 400, description = "Unknown event name"),
        (status = 404, description = "Order run not found"),
        (status = 410, description = "Order run already finished")
    ),
    tag = "orders"
)]
pub async fn raise_order_event(
    State(state): State<AppState>,
    Path((order_id, event_name)): Path<(Uuid, String)>,
    Json(approved): Json<bool>,
) -> Result<StatusCode, StatusCode> {
    state
        .engine
        .raise_event(order_id, &event_name, approved)
        .await
        .map_err(engine_error_status)?;

    tracing::info!(run_id = %order_id, event = %event_name, approved, "Event delivered");
    Ok(StatusCode::ACCEPTED)
}

fn engine_error_status(err: EngineError) -> StatusCode {
    match err {
        EngineError::Store(StoreError::RunNotFound(_)) => StatusCode::NOT_FOUND,
        EngineError::RunCompleted(_) | EngineError::RunFailed(_, _) => StatusCode::GONE,
        EngineError::UnknownEvent(_) => StatusCode::BAD_REQUEST,
        e => {
            tracing::error!("Engine error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
