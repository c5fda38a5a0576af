use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use wicket_codes::Entropy;

use crate::{
    auth::AdmissionControl, registry::ConnectionRegistry, requests::AccessRequestQueue,
    services::GatewayServices,
};

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
///
/// Owns every mutable map in the process — connections, pending requests,
/// one-time codes — behind explicit components with their own locks.
/// Created on gateway start, dropped on teardown; nothing here is a global.
pub struct GatewayState {
    pub registry: ConnectionRegistry,
    pub requests: AccessRequestQueue,
    pub admission: AdmissionControl,
    pub services: GatewayServices,
    /// Cancelled once, on shutdown; every connection holds a child token.
    pub shutdown: CancellationToken,
    /// Optional bound on how long an access request may stay pending.
    pub request_ttl: Option<Duration>,
    /// Server version string.
    pub version: String,
}

impl GatewayState {
    pub fn new(
        shared_entropy: Entropy,
        services: GatewayServices,
        request_ttl: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: ConnectionRegistry::new(),
            requests: AccessRequestQueue::new(),
            admission: AdmissionControl::new(shared_entropy),
            services,
            shutdown: CancellationToken::new(),
            request_ttl,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Number of currently admitted connections.
    pub async fn client_count(&self) -> usize {
        self.registry.count().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_state_is_empty() {
        let (_, entropy) = wicket_codes::generate().unwrap().into_parts();
        let state = GatewayState::new(entropy, GatewayServices::noop(), None);
        assert_eq!(state.client_count().await, 0);
        assert!(state.requests.list().await.is_empty());
        assert!(!state.shutdown.is_cancelled());
    }
}
