//! Command-line and environment configuration.
//!
//! Every flag falls back to an environment variable, and `main` loads a
//! `.env` file (if any) before parsing, so a bare `relay-server` works with
//! the usual `TOKEN=... PORT=...` deployment setup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;
use thiserror::Error;

use relay_common::auth::TokenValidator;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOKEN is not set; refusing to start without a shared secret")]
    MissingToken,
}

/// Authenticated WebSocket relay.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-server", about = "Authenticated WebSocket broadcast relay")]
pub struct Cli {
    /// Shared secret clients present as `Authorization: Bearer <token>`.
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Listen port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Listen address.
    #[arg(long, env = "BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Host name shown in the startup banner.
    #[arg(long, env = "HOST", default_value = "localhost")]
    pub host: String,

    /// Public domain the service is reachable at (shown as a `wss://` link).
    #[arg(long, env = "RAILWAY_STATIC_URL")]
    pub public_url: Option<String>,

    /// Don't read broadcast lines from stdin.
    #[arg(long, default_value_t = false)]
    pub no_console: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Build the token validator, failing if no secret is configured.
    pub fn validator(&self) -> Result<TokenValidator, ConfigError> {
        let token = self.token.as_deref().unwrap_or_default();
        TokenValidator::new(token).map_err(|_| ConfigError::MissingToken)
    }

    /// Link clients should connect to.
    ///
    /// With a public domain the service sits behind TLS on the default port;
    /// otherwise it's a plain `ws://host:port` link.
    pub fn access_link(&self) -> String {
        match self.public_url.as_deref().filter(|d| !d.is_empty()) {
            Some(domain) => {
                let domain = domain
                    .trim_start_matches("https://")
                    .trim_start_matches("wss://")
                    .trim_end_matches('/');
                format!("wss://{domain}")
            }
            None => format!("ws://{}:{}", self.host, self.port),
        }
    }
}
