//! The edge router: a stateless symbol-routing front-end.
//!
//! The router owns an explicit symbol→shard table — explicit rather than
//! hashed, so load generators and the router agree on placement without
//! sharing a hash function. `/orders` bodies are forwarded byte-for-byte on
//! a pooled HTTP client; the shard's response passes through unchanged.
//! Unknown symbols are a client error, unreachable shards a gateway error.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

fn default_listen_port() -> u16 {
    8000
}

/// Router configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Listener port for the routed surface.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// The shard table.
    pub shards: Vec<ShardEndpoint>,
}

/// One shard endpoint in the routing table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardEndpoint {
    /// Shard identifier, as used in `/seed/{shardId}`.
    pub id: String,
    /// Base URL of the shard's HTTP surface, e.g. `http://shard-0:8080`.
    pub base_url: String,
    /// Symbols owned by this shard.
    pub symbols: Vec<String>,
}

impl RouterConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RouterConfigError`] when the file is unreadable, fails to
    /// parse, or maps one symbol to two shards.
    pub fn load<P: AsRef<FsPath>>(path: P) -> Result<Self, RouterConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| RouterConfigError::Io {
            message: format!("{}: {e}", path.display()),
        })?;
        let config: RouterConfig =
            toml::from_str(&raw).map_err(|e| RouterConfigError::Parse {
                message: format!("{}: {e}", path.display()),
            })?;
        SymbolTable::build(&config.shards)?;
        Ok(config)
    }
}

/// Errors raised while loading the router configuration.
#[derive(Debug)]
#[non_exhaustive]
pub enum RouterConfigError {
    /// The configuration file could not be read.
    Io {
        /// The underlying error, including the path.
        message: String,
    },

    /// The configuration file is not valid TOML for the expected shape.
    Parse {
        /// The underlying parse error, including the path.
        message: String,
    },

    /// A symbol appears under two shards.
    DuplicateSymbol {
        /// The offending symbol.
        symbol: String,
    },

    /// A shard id appears twice.
    DuplicateShard {
        /// The offending shard id.
        id: String,
    },
}

impl fmt::Display for RouterConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterConfigError::Io { message } => write!(f, "cannot read router config: {message}"),
            RouterConfigError::Parse { message } => {
                write!(f, "cannot parse router config: {message}")
            }
            RouterConfigError::DuplicateSymbol { symbol } => {
                write!(f, "symbol {symbol} is mapped to more than one shard")
            }
            RouterConfigError::DuplicateShard { id } => {
                write!(f, "shard id {id} appears more than once")
            }
        }
    }
}

impl std::error::Error for RouterConfigError {}

/// The immutable routing table derived from configuration.
#[derive(Debug)]
pub struct SymbolTable {
    shards: Vec<ShardEndpoint>,
    by_symbol: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl SymbolTable {
    /// Build the table, rejecting duplicate symbols or shard ids.
    ///
    /// # Errors
    ///
    /// Returns [`RouterConfigError`] on duplicates.
    pub fn build(shards: &[ShardEndpoint]) -> Result<Self, RouterConfigError> {
        let mut by_symbol = HashMap::new();
        let mut by_id = HashMap::new();
        for (index, shard) in shards.iter().enumerate() {
            if by_id.insert(shard.id.clone(), index).is_some() {
                return Err(RouterConfigError::DuplicateShard {
                    id: shard.id.clone(),
                });
            }
            for symbol in &shard.symbols {
                if by_symbol.insert(symbol.clone(), index).is_some() {
                    return Err(RouterConfigError::DuplicateSymbol {
                        symbol: symbol.clone(),
                    });
                }
            }
        }
        Ok(Self {
            shards: shards.to_vec(),
            by_symbol,
            by_id,
        })
    }

    /// The shard owning `symbol`.
    #[must_use]
    pub fn shard_for_symbol(&self, symbol: &str) -> Option<&ShardEndpoint> {
        self.by_symbol.get(symbol).map(|&i| &self.shards[i])
    }

    /// The shard with the given id.
    #[must_use]
    pub fn shard_by_id(&self, id: &str) -> Option<&ShardEndpoint> {
        self.by_id.get(id).map(|&i| &self.shards[i])
    }

    /// Every configured shard id.
    pub fn shard_ids(&self) -> impl Iterator<Item = &str> {
        self.shards.iter().map(|s| s.id.as_str())
    }
}

/// Shared state for the router's handlers.
#[derive(Clone)]
pub struct RouterState {
    /// The routing table.
    pub table: Arc<SymbolTable>,
    /// Pooled upstream client; connections persist across requests.
    pub client: reqwest::Client,
}

impl RouterState {
    /// Build state over a table with a fresh pooled client.
    #[must_use]
    pub fn new(table: Arc<SymbolTable>) -> Self {
        Self {
            table,
            client: reqwest::Client::new(),
        }
    }
}

/// Only the field the router needs from a submission.
#[derive(Debug, Deserialize)]
struct SymbolProbe {
    symbol: String,
}

/// Build the edge router's HTTP app.
pub fn edge_router(state: RouterState) -> Router {
    Router::new()
        .route("/orders", post(route_order))
        .route("/seed/:shard_id", post(route_seed))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn client_error(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "status": "REJECTED", "reason": reason })),
    )
        .into_response()
}

fn gateway_error(shard_id: &str, message: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(serde_json::json!({
            "status": "UNAVAILABLE",
            "shardId": shard_id,
            "reason": message,
        })),
    )
        .into_response()
}

/// Forward `body` unchanged to `url`, passing the upstream response through.
async fn forward(client: &reqwest::Client, shard_id: &str, url: String, body: Bytes) -> Response {
    let upstream = client
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) => {
            warn!(shard = shard_id, error = %e, "shard unreachable");
            return gateway_error(shard_id, "shard unreachable");
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    match upstream.bytes().await {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(shard = shard_id, error = %e, "shard response truncated");
            gateway_error(shard_id, "shard response truncated")
        }
    }
}

async fn route_order(State(state): State<RouterState>, body: Bytes) -> Response {
    let probe: SymbolProbe = match serde_json::from_slice(&body) {
        Ok(probe) => probe,
        Err(_) => return client_error("malformed order body"),
    };
    let Some(shard) = state.table.shard_for_symbol(&probe.symbol) else {
        return client_error("unknown symbol");
    };
    let url = format!("{}/orders", shard.base_url);
    forward(&state.client, &shard.id, url, body).await
}

async fn route_seed(
    State(state): State<RouterState>,
    Path(shard_id): Path<String>,
    body: Bytes,
) -> Response {
    let Some(shard) = state.table.shard_by_id(&shard_id) else {
        return client_error("unknown shard id");
    };
    let url = format!("{}/seed", shard.base_url);
    forward(&state.client, &shard.id, url, body).await
}

async fn health(State(state): State<RouterState>) -> Response {
    let shards: Vec<&str> = state.table.shard_ids().collect();
    Json(serde_json::json!({ "status": "UP", "shards": shards })).into_response()
}
