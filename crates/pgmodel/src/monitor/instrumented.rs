use super::config::MonitorConfig;
use super::monitors::{CompositeHook, NoopMonitor};
use super::types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryType};
use crate::driver::{Driver, DriverOutput};
use crate::error::{ModelError, ModelResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A driver wrapper that adds hooks, monitors and a statement timeout.
///
/// Monitoring must be explicitly enabled via `MonitorConfig::enable_monitoring()`;
/// hooks and the timeout apply regardless.
pub struct InstrumentedDriver<D> {
    driver: D,
    monitor: Arc<dyn QueryMonitor>,
    hook: Option<Arc<dyn QueryHook>>,
    config: MonitorConfig,
}

impl<D: Driver> InstrumentedDriver<D> {
    /// Wrap a driver with no monitoring.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            monitor: Arc::new(NoopMonitor),
            hook: None,
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Add a hook; an existing hook runs first.
    pub fn add_hook<H: QueryHook + 'static>(self, hook: H) -> Self {
        self.add_hook_arc(Arc::new(hook))
    }

    pub fn add_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hook = Some(match self.hook.take() {
            None => hook,
            Some(existing) => Arc::new(CompositeHook::new().add_arc(existing).add_arc(hook)),
        });
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = Some(timeout);
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = true;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn inner(&self) -> &D {
        &self.driver
    }

    pub fn into_inner(self) -> D {
        self.driver
    }

    fn apply_hook(&self, ctx: &mut QueryContext) -> ModelResult<()> {
        let Some(hook) = &self.hook else {
            return Ok(());
        };
        match hook.before_query(ctx) {
            HookAction::Continue => Ok(()),
            HookAction::ModifySql(sql) => {
                ctx.query_type = QueryType::from_sql(&sql);
                ctx.sql = sql;
                Ok(())
            }
            HookAction::Abort(reason) => Err(ModelError::Other(format!(
                "statement aborted by hook: {reason}"
            ))),
        }
    }

    fn report_result(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        if !self.config.monitoring_enabled {
            return;
        }
        if let Some(hook) = &self.hook {
            hook.after_query(ctx, duration, result);
        }
        self.monitor.on_query_complete(ctx, duration, result);
        if self
            .config
            .slow_query_threshold
            .is_some_and(|threshold| duration > threshold)
        {
            self.monitor.on_slow_query(ctx, duration);
        }
    }

    async fn execute_with_timeout<F>(&self, future: F) -> ModelResult<DriverOutput>
    where
        F: std::future::Future<Output = ModelResult<DriverOutput>> + Send,
    {
        match self.config.query_timeout {
            Some(timeout) => {
                tokio::pin!(future);
                tokio::select! {
                    result = &mut future => result,
                    _ = tokio::time::sleep(timeout) => {
                        if let Some(cancel_token) = self.driver.cancel_token() {
                            tokio::spawn(async move {
                                let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                            });
                        }
                        Err(ModelError::Timeout(timeout))
                    }
                }
            }
            None => future.await,
        }
    }

    async fn run_inner(&self, sql: &str, tag: Option<&str>) -> ModelResult<DriverOutput> {
        let mut ctx = QueryContext::new(sql);
        if let Some(tag) = tag {
            ctx.tag = Some(tag.to_string());
        }

        self.apply_hook(&mut ctx)?;

        if self.config.monitoring_enabled {
            self.monitor.on_query_start(&ctx);
        }

        let start = Instant::now();
        let result = self.execute_with_timeout(self.driver.run(&ctx.sql)).await;
        let duration = start.elapsed();

        let query_result = match &result {
            Ok(DriverOutput::Rows(rows)) => QueryResult::Rows(rows.len()),
            Ok(DriverOutput::Write(info)) => QueryResult::Affected(info.affected_rows),
            Err(ModelError::Timeout(d)) => QueryResult::Error(format!("timeout after {d:?}")),
            Err(e) => QueryResult::error(e.to_string()),
        };

        self.report_result(&ctx, duration, &query_result);
        result
    }
}

impl<D: Driver> Driver for InstrumentedDriver<D> {
    async fn run(&self, sql: &str) -> ModelResult<DriverOutput> {
        self.run_inner(sql, None).await
    }

    async fn run_tagged(&self, tag: &str, sql: &str) -> ModelResult<DriverOutput> {
        self.run_inner(sql, Some(tag)).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        self.driver.cancel_token()
    }
}
