//! Authenticated WebSocket upgrade.
//!
//! Endpoint: GET /ws (and GET / when the request asks for an upgrade)
//!
//! Flow:
//! 1. Read `Authorization: Bearer <token>`; missing or malformed → 401
//! 2. Compare the token with the shared secret; mismatch → 403
//! 3. Complete the upgrade and hand the socket to [`session::run`]
//!
//! Rejections have an empty body and `Connection: close`, so the transport is
//! released as soon as the status line is written.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, CONNECTION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use relay_common::auth::{AuthError, TokenValidator};

use crate::session;
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("missing or malformed authorization header")]
    Unauthenticated,
    #[error("invalid token")]
    Forbidden,
}

impl From<AuthError> for Rejection {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => Rejection::Unauthenticated,
            AuthError::Forbidden => Rejection::Forbidden,
        }
    }
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Unauthenticated => StatusCode::UNAUTHORIZED,
            Rejection::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

/// Check the request's credential against the shared secret.
pub fn authorize(validator: &TokenValidator, headers: &HeaderMap) -> Result<(), Rejection> {
    let header = match headers.get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| Rejection::Unauthenticated)?),
        None => None,
    };
    validator.authorize(header).map_err(Rejection::from)
}

/// Axum handler: authenticates, then upgrades HTTP to WebSocket.
pub async fn handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    admit(state, remote, req).await
}

/// Run the gate for one request.
///
/// Authentication happens before the upgrade headers are looked at, so a bad
/// credential gets 401/403 even on a request that could not be upgraded.
pub async fn admit(state: AppState, remote: SocketAddr, req: Request) -> Response {
    let (mut parts, _body) = req.into_parts();

    if let Err(rejection) = authorize(state.validator(), &parts.headers) {
        tracing::warn!(remote = %remote, reason = %rejection, "upgrade rejected");
        return rejection.into_response();
    }

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::debug!(remote = %remote, "authorized request is not a websocket upgrade");
            return rejection.into_response();
        }
    };

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(remote = %remote, error = %e, "websocket upgrade failed");
    })
    .on_upgrade(move |socket| session::run(state, socket, remote))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new("abc123").unwrap()
    }

    fn headers(auth: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(auth).unwrap());
        headers
    }

    #[test]
    fn missing_header_is_unauthenticated() {
        assert_eq!(
            authorize(&validator(), &HeaderMap::new()),
            Err(Rejection::Unauthenticated)
        );
    }

    #[test]
    fn wrong_scheme_is_unauthenticated() {
        assert_eq!(
            authorize(&validator(), &headers(b"Basic abc123")),
            Err(Rejection::Unauthenticated)
        );
    }

    #[test]
    fn non_ascii_header_is_unauthenticated() {
        assert_eq!(
            authorize(&validator(), &headers(b"Bearer \xffabc")),
            Err(Rejection::Unauthenticated)
        );
    }

    #[test]
    fn wrong_token_is_forbidden() {
        assert_eq!(
            authorize(&validator(), &headers(b"Bearer wrong")),
            Err(Rejection::Forbidden)
        );
    }

    #[test]
    fn correct_token_passes() {
        assert_eq!(authorize(&validator(), &headers(b"Bearer abc123")), Ok(()));
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(
            Rejection::from(AuthError::Unauthenticated).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Rejection::from(AuthError::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn rejection_closes_connection() {
        let response = Rejection::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[CONNECTION], "close");
    }
}
