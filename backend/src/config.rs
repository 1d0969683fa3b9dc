//! Warden settings loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::telemetry::LogFormat;

const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 300;

/// Configuration values for hosts embedding the punishment registry.
///
/// Values layer CLI arguments over `WARDEN_*` environment variables over a
/// configuration file.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WARDEN")]
pub struct WardenSettings {
    /// Emit logs as JSON lines instead of human-readable text.
    #[ortho_config(default = false)]
    pub json_logs: bool,
    /// Seconds between periodic registry flushes performed by the host.
    pub flush_interval_secs: Option<u64>,
}

impl WardenSettings {
    /// Log format selected by [`Self::json_logs`].
    pub fn log_format(&self) -> LogFormat {
        if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    /// Interval for [`crate::domain::PeriodicFlush`], falling back to five
    /// minutes when unset or zero.
    pub fn flush_interval(&self) -> Duration {
        let seconds = self
            .flush_interval_secs
            .filter(|seconds| *seconds > 0)
            .unwrap_or(DEFAULT_FLUSH_INTERVAL_SECS);
        Duration::from_secs(seconds)
    }
}
