//! Landing page and status endpoint.
//!
//! `GET /` serves a small HTML page to browsers. The same path also accepts
//! WebSocket upgrades, which are handed to the [`gate`](crate::gate).

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::UPGRADE;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::gate;
use crate::state::AppState;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html><head><title>Relay</title></head>
<body>
<h1>Relay</h1>
<p>Connect a WebSocket client with <code>Authorization: Bearer &lt;token&gt;</code>.
<a href="/api/status">View status JSON</a></p>
</body></html>"#;

/// `GET /`: landing page, or the upgrade gate if the client asks to upgrade.
pub async fn index(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    if wants_websocket(req.headers()) {
        return gate::admit(state, remote, req).await;
    }
    Html(INDEX_HTML).into_response()
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connections: usize,
    /// Remote address of each connected client.
    pub clients: Vec<SocketAddr>,
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let mut clients = state.registry().remotes();
    clients.sort();
    Json(StatusResponse {
        connections: clients.len(),
        clients,
    })
}

/// True if the request carries `Upgrade: websocket`.
fn wants_websocket(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}
