use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WicketConfig {
    pub gateway: GatewayConfig,
    pub access: AccessConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,

    /// TCP port. `0` binds an ephemeral port (tests do this).
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

/// Admission-workflow knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// How long a pending access request may wait for an operator decision,
    /// in seconds. Absent means requests wait indefinitely.
    pub request_ttl_secs: Option<u64>,
}

impl AccessConfig {
    pub fn request_ttl(&self) -> Option<Duration> {
        self.request_ttl_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_loopback_and_unbounded() {
        let config = WicketConfig::default();
        assert_eq!(config.gateway.bind, "127.0.0.1");
        assert_eq!(config.gateway.port, 5000);
        assert!(config.access.request_ttl().is_none());
    }

    #[test]
    fn ttl_converts_to_duration() {
        let access = AccessConfig {
            request_ttl_secs: Some(90),
        };
        assert_eq!(access.request_ttl(), Some(Duration::from_secs(90)));
    }
}
