//! Statement monitoring and hooks around a [`Driver`](crate::Driver).
//!
//! - Timing and statistics per statement type
//! - Hooks that can inspect, rewrite or abort a statement before it runs
//! - A statement timeout with best-effort server-side cancellation
//!
//! ```rust,ignore
//! use pgmodel::monitor::{InstrumentedDriver, MonitorConfig, StatsMonitor, TracingSqlHook};
//! use std::time::Duration;
//!
//! let driver = InstrumentedDriver::new(client)
//!     .with_config(
//!         MonitorConfig::new()
//!             .with_query_timeout(Duration::from_secs(30))
//!             .with_slow_query_threshold(Duration::from_millis(500))
//!             .enable_monitoring(),
//!     )
//!     .with_monitor(StatsMonitor::new())
//!     .add_hook(TracingSqlHook::new());
//!
//! let rows = registry.model("item", params)?.get(&driver).await?;
//! ```

mod config;
mod instrumented;
mod monitors;
mod tracing_hook;
mod types;


pub use config::{MonitorConfig, MonitorSettings};
pub use instrumented::InstrumentedDriver;
pub use monitors::{
    CompositeHook, CompositeMonitor, LoggingMonitor, NoopMonitor, QueryStats, StatsMonitor,
};
pub use tracing_hook::TracingSqlHook;
pub use types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryType};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
