//! HTTP peer transport: server routes and the peer client pool.
//!
//! This is the collaborator that turns a set of [`Group`]s into a fleet
//! node. It has two halves:
//!
//! - **Server**: an axum [`router`] exposing each group at
//!   `GET /_peercache/:group/:key` (plus `/stats/:group` and `/health`).
//!   The cache core is thread-blocking, so handlers hop through
//!   `spawn_blocking` before calling into it.
//! - **Client**: [`HttpPool`] implements [`PeerPicker`] over a
//!   [`HashRing`] of peer base URLs, handing out an [`HttpPeerClient`]
//!   (a blocking `ureq` client) for keys owned by a remote peer and `None`
//!   for keys this node owns itself.
//!
//! The wire format is a raw `application/octet-stream` body — the group
//! layer sees bytes and nothing else. An empty body is a valid zero-length
//! value.
//!
//! ## Example Usage
//!
//! ```no_run
//! use peercache::http::HttpPool;
//! use peercache::group::new_group;
//! use peercache::error::BoxError;
//!
//! let group = new_group("scores", 2 << 10, |key: &str| -> Result<Vec<u8>, BoxError> {
//!     Err(format!("{key} not exist").into())
//! });
//!
//! let pool = HttpPool::new("http://10.0.0.1:9999");
//! pool.set_peers([
//!     "http://10.0.0.1:9999",
//!     "http://10.0.0.2:9999",
//!     "http://10.0.0.3:9999",
//! ]);
//! group.register_peer_picker(pool);
//! ```

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::ds::ring::HashRing;
use crate::error::{GetError, PeerError};
use crate::group::get_group;
use crate::peers::{PeerGetter, PeerPicker};
use crate::store::lru::StoreMetrics;

/// Path prefix peers address each other under.
pub const DEFAULT_BASE_PATH: &str = "/_peercache/";

/// Virtual nodes per peer on the routing ring.
pub const DEFAULT_REPLICAS: usize = 50;

/// Timeout for a single peer fetch. Peer misses fall back to the local
/// loader, so a slow peer must not stall the request indefinitely.
const PEER_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Server half
// ---------------------------------------------------------------------------

/// Error surface of the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested group is not registered on this node.
    #[error("no such group: {0}")]
    UnknownGroup(String),
    /// The cache lookup itself failed.
    #[error(transparent)]
    Get(#[from] GetError),
    /// Handler plumbing failed (blocking task died, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownGroup(_) => StatusCode::NOT_FOUND,
            ApiError::Get(GetError::EmptyKey) => StatusCode::BAD_REQUEST,
            ApiError::Get(GetError::Loader { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Per-group stats payload for `/stats/:group`.
#[derive(Debug, Serialize)]
pub struct GroupStats {
    /// Group name.
    pub group: String,
    /// Entries currently in the local store.
    pub entries: usize,
    /// Byte footprint of the local store.
    pub used_bytes: usize,
    /// Hit/miss/eviction counters.
    pub metrics: StoreMetrics,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

/// Builds the node's router: the peer endpoint plus stats and health.
///
/// Groups are resolved through the process-wide registry, so the router
/// serves every group registered before or after it was built.
pub fn router() -> Router {
    Router::new()
        .route("/_peercache/:group/:key", get(peer_value))
        .route("/stats/:group", get(group_stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

/// `GET /_peercache/:group/:key` — the peer wire endpoint.
async fn peer_value(
    Path((group_name, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let group = get_group(&group_name).ok_or(ApiError::UnknownGroup(group_name))?;

    // Group::get blocks (loader I/O, peer fetches); keep it off the runtime.
    let view = tokio::task::spawn_blocking(move || group.get(&key))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        view.to_vec(),
    )
        .into_response())
}

/// `GET /stats/:group` — local store counters for one group.
async fn group_stats(Path(group_name): Path<String>) -> Result<Json<GroupStats>, ApiError> {
    let group = get_group(&group_name).ok_or(ApiError::UnknownGroup(group_name))?;
    Ok(Json(GroupStats {
        group: group.name().to_owned(),
        entries: group.cached_entries(),
        used_bytes: group.used_bytes(),
        metrics: group.stats(),
    }))
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

// ---------------------------------------------------------------------------
// Client half
// ---------------------------------------------------------------------------

/// Blocking HTTP client for one remote peer.
pub struct HttpPeerClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpPeerClient {
    /// Creates a client for a peer's base URL (scheme + authority).
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            agent: ureq::AgentBuilder::new().timeout(PEER_TIMEOUT).build(),
        }
    }
}

impl PeerGetter for HttpPeerClient {
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>, PeerError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            utf8_percent_encode(group, NON_ALPHANUMERIC),
            utf8_percent_encode(key, NON_ALPHANUMERIC),
        );

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| PeerError::with_source(format!("peer request {url} failed"), err))?;

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|err| PeerError::with_source("reading peer response body", err))?;
        Ok(body)
    }
}

impl std::fmt::Debug for HttpPeerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPeerClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

struct PoolState {
    ring: HashRing,
    clients: FxHashMap<String, Arc<HttpPeerClient>>,
}

/// Peer pool: knows the fleet membership and this node's own identity.
///
/// `set_peers` rebuilds the ring and the per-peer clients as one snapshot
/// under the pool mutex, so lookups racing a membership change observe
/// either the old fleet or the new one, never a mix.
pub struct HttpPool {
    self_url: String,
    base_path: String,
    replicas: usize,
    state: Mutex<PoolState>,
}

impl HttpPool {
    /// Creates a pool for the node reachable at `self_url`
    /// (e.g. `http://10.0.0.1:9999`), with [`DEFAULT_REPLICAS`].
    pub fn new(self_url: impl Into<String>) -> Self {
        Self::with_replicas(self_url, DEFAULT_REPLICAS)
    }

    /// Creates a pool with an explicit virtual-node count.
    ///
    /// Every node in the fleet must use the same count or they will
    /// disagree about key ownership.
    pub fn with_replicas(self_url: impl Into<String>, replicas: usize) -> Self {
        Self {
            self_url: self_url.into(),
            base_path: DEFAULT_BASE_PATH.to_owned(),
            replicas,
            state: Mutex::new(PoolState {
                ring: HashRing::new(replicas),
                clients: FxHashMap::default(),
            }),
        }
    }

    /// This node's own base URL.
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Replaces the fleet membership. Include this node's own URL so that
    /// the ring can assign keys to it.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = HashRing::new(self.replicas);
        let mut clients = FxHashMap::default();
        for peer in peers {
            let peer = peer.as_ref();
            ring.add([peer]);
            clients.insert(
                peer.to_owned(),
                Arc::new(HttpPeerClient::new(format!("{peer}{}", self.base_path))),
            );
        }
        info!(self_url = %self.self_url, peers = clients.len(), "peer set updated");

        let mut state = self.state.lock();
        state.ring = ring;
        state.clients = clients;
    }
}

impl PeerPicker for HttpPool {
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.lock();
        let owner = state.ring.get(key)?;
        if owner == self.self_url {
            return None;
        }
        debug!(self_url = %self.self_url, key, peer = owner, "picked remote peer");
        state
            .clients
            .get(owner)
            .map(|client| Arc::clone(client) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("peers", &self.state.lock().clients.len())
            .finish_non_exhaustive()
    }
}
