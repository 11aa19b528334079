//! Provider health status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Provider is answering normally
    Healthy,
    /// Provider is failing intermittently
    Degraded,
    /// Provider is failing consistently
    Down,
    /// No request has been recorded yet
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Check if callers should keep sending traffic to the provider
    #[must_use]
    pub fn should_route(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded | Self::Unknown)
    }

    /// Check if the status indicates a problem
    #[must_use]
    pub fn is_problematic(&self) -> bool {
        matches!(self, Self::Degraded | Self::Down)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Down => write!(f, "down"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_routing() {
        assert!(HealthStatus::Healthy.should_route());
        assert!(HealthStatus::Degraded.should_route());
        assert!(!HealthStatus::Down.should_route());
        assert!(HealthStatus::Down.is_problematic());
        assert!(!HealthStatus::Unknown.is_problematic());
    }

    #[test]
    fn test_health_status_serde() {
        let json = serde_json::to_string(&HealthStatus::Degraded).expect("serialize");
        assert_eq!(json, "\"degraded\"");
        assert_eq!(HealthStatus::default(), HealthStatus::Unknown);
        assert_eq!(HealthStatus::Down.to_string(), "down");
    }
}
