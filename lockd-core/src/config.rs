use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator tuning knobs. Field names match the recognised option names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Lease TTL used when the caller gives none, and the renewal extension
    pub default_timeout_seconds: u64,
    /// Upper clamp for requested TTLs and extensions
    pub max_timeout_seconds: u64,
    pub renewal_interval_seconds: u64,
    pub detection_interval_seconds: u64,
    pub poll_interval_milliseconds: u64,
    pub deadlock_detection_enabled: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: 30,
            max_timeout_seconds: 300,
            renewal_interval_seconds: 5,
            detection_interval_seconds: 10,
            poll_interval_milliseconds: 100,
            deadlock_detection_enabled: true,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_timeout_seconds == 0 {
            return Err("default_timeout_seconds must be greater than 0".to_string());
        }
        if self.default_timeout_seconds > self.max_timeout_seconds {
            return Err(format!(
                "default_timeout_seconds ({}) must not exceed max_timeout_seconds ({})",
                self.default_timeout_seconds, self.max_timeout_seconds
            ));
        }
        if self.renewal_interval_seconds == 0 {
            return Err("renewal_interval_seconds must be greater than 0".to_string());
        }
        if self.detection_interval_seconds == 0 {
            return Err("detection_interval_seconds must be greater than 0".to_string());
        }
        if self.poll_interval_milliseconds == 0 {
            return Err("poll_interval_milliseconds must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_seconds)
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_seconds)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_secs(self.detection_interval_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_milliseconds)
    }

    /// Resolve a requested lease TTL: missing or zero falls back to the
    /// default, anything above the maximum is clamped.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(ttl) if !ttl.is_zero() => ttl.min(self.max_timeout()),
            _ => self.default_timeout(),
        }
    }
}
