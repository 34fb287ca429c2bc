use serde::Deserialize;
use std::time::Duration;

/// Configuration for statement monitoring and timeouts.
///
/// Monitoring is disabled by default and must be explicitly enabled.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Statement timeout. `None` means no timeout (default).
    pub query_timeout: Option<Duration>,
    /// Slow statement threshold for alerting.
    pub slow_query_threshold: Option<Duration>,
    /// Whether monitors receive events.
    pub monitoring_enabled: bool,
}

/// File form of [`MonitorConfig`], durations in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSettings {
    pub timeout_ms: Option<u64>,
    pub slow_query_ms: Option<u64>,
    pub enabled: Option<bool>,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements exceeding this duration are cancelled and fail with a timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Statements exceeding this duration trigger `on_slow_query`.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        self.monitoring_enabled = false;
        self
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    /// Monitoring is enabled when a slow threshold is set, unless `enabled`
    /// says otherwise.
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            query_timeout: settings.timeout_ms.map(Duration::from_millis),
            slow_query_threshold: settings.slow_query_ms.map(Duration::from_millis),
            monitoring_enabled: settings
                .enabled
                .unwrap_or(settings.slow_query_ms.is_some()),
        }
    }
}
