//! Relay server library.
//!
//! Exposes the router, shared state and the relay engine so they can be
//! driven by integration tests as well as by the `relay-server` binary.

pub mod broadcast;
pub mod config;
pub mod console;
pub mod gate;
pub mod landing;
pub mod registry;
pub mod session;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full router.
///
/// Handlers read the peer address through `ConnectInfo`, so serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing::index))
        .route("/ws", get(gate::handler))
        .route("/api/status", get(landing::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
