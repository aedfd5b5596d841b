//! The shard's HTTP surface: order submission, seeding, and health.
//!
//! Handlers are the producers of the ingress pipeline: a submission is
//! validated, claimed into the ring, and acknowledged. Submitters see four
//! response classes — accepted, rejected (with reason), busy, and (at the
//! router) gateway-unavailable.

use crate::engine::{OrderKind, RejectReason, Side};
use crate::ingress::OrderIngress;
use crate::processor::SeedOrder;
use crate::utils::current_time_millis;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared state for the shard's HTTP handlers.
#[derive(Clone)]
pub struct ShardHttpState {
    /// Producer handle into the ring.
    pub ingress: OrderIngress,
    /// Side channel to the consumer for seed orders.
    pub seed_tx: Sender<SeedOrder>,
    /// This shard's identifier, echoed in responses.
    pub shard_id: Arc<str>,
    /// The closed symbol set this shard accepts.
    pub symbols: Arc<HashSet<String>>,
}

/// An order submission as received on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Caller-assigned order id.
    pub order_id: String,
    /// The trading symbol.
    pub symbol: String,
    /// `"BUY"` or `"SELL"`.
    pub side: String,
    /// Order type; only `"LIMIT"`.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Limit price in integer cents.
    pub price: i64,
    /// Order quantity.
    pub quantity: u64,
    /// Optional caller timestamp, epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// The `/seed` request body.
#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    /// Orders to place directly into the books.
    pub orders: Vec<OrderRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedBody {
    status: &'static str,
    order_id: String,
    shard_id: String,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectedBody {
    status: &'static str,
    order_id: String,
    reason: String,
}

/// Build the shard's router.
pub fn shard_router(state: ShardHttpState) -> Router {
    Router::new()
        .route("/orders", post(submit_order))
        .route("/seed", post(seed_orders))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse and validate the wire fields shared by `/orders` and `/seed`.
fn validate_request(
    request: &OrderRequest,
    symbols: &HashSet<String>,
) -> Result<(Side, OrderKind), RejectReason> {
    let side = Side::parse(&request.side).ok_or(RejectReason::InvalidSide)?;
    let kind = OrderKind::parse(&request.order_type).ok_or(RejectReason::UnsupportedOrderType)?;
    if !symbols.contains(&request.symbol) {
        return Err(RejectReason::UnknownSymbol);
    }
    if request.price <= 0 {
        return Err(RejectReason::NonPositivePrice);
    }
    if request.quantity == 0 {
        return Err(RejectReason::NonPositiveQuantity);
    }
    Ok((side, kind))
}

async fn submit_order(
    State(state): State<ShardHttpState>,
    Json(request): Json<OrderRequest>,
) -> Response {
    let (side, kind) = match validate_request(&request, &state.symbols) {
        Ok(parsed) => parsed,
        Err(reason) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RejectedBody {
                    status: "REJECTED",
                    order_id: request.order_id,
                    reason: reason.to_string(),
                }),
            )
                .into_response();
        }
    };

    let timestamp = request.timestamp.unwrap_or_else(current_time_millis);
    match state.ingress.submit(
        &request.order_id,
        &request.symbol,
        side,
        kind,
        request.price,
        request.quantity,
        timestamp,
    ) {
        Ok(_sequence) => (
            StatusCode::OK,
            Json(AcceptedBody {
                status: "ACCEPTED",
                order_id: request.order_id,
                shard_id: state.shard_id.to_string(),
                timestamp: current_time_millis(),
            }),
        )
            .into_response(),
        Err(full) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RejectedBody {
                status: "BUSY",
                order_id: request.order_id,
                reason: full.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Test-only bypass: place orders directly into the books, skipping the ring
/// and producing no events.
async fn seed_orders(
    State(state): State<ShardHttpState>,
    Json(request): Json<SeedRequest>,
) -> Response {
    let mut seeded = 0usize;
    for order in request.orders {
        let Ok((side, _kind)) = validate_request(&order, &state.symbols) else {
            warn!(order_id = %order.order_id, symbol = %order.symbol, "seed order skipped");
            continue;
        };
        let seed = SeedOrder {
            order_id: order.order_id,
            symbol: order.symbol,
            side,
            price: order.price,
            quantity: order.quantity,
        };
        if state.seed_tx.send(seed).is_ok() {
            seeded += 1;
        }
    }
    Json(serde_json::json!({ "seeded": seeded })).into_response()
}

async fn health(State(state): State<ShardHttpState>) -> Response {
    Json(serde_json::json!({
        "status": "UP",
        "shardId": state.shard_id.as_ref(),
    }))
    .into_response()
}
