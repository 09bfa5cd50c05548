//! Shared application state.

use std::sync::Arc;

use relay_common::auth::TokenValidator;

use crate::broadcast::{self, FanoutReport, Origin, Payload};
use crate::registry::ConnectionRegistry;

/// State shared across all request handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    /// Read-only after startup.
    validator: TokenValidator,
    /// Connected clients, keyed by connection id.
    registry: ConnectionRegistry,
}

impl AppState {
    pub fn new(validator: TokenValidator) -> Self {
        Self {
            inner: Arc::new(Inner {
                validator,
                registry: ConnectionRegistry::new(),
            }),
        }
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.inner.validator
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    /// Fan a payload out to the registry on behalf of `origin`.
    pub fn relay(&self, origin: Origin<'_>, payload: Payload) -> FanoutReport {
        broadcast::relay(self.registry(), origin, payload)
    }
}
