//! Driver boundary.
//!
//! The core hands a driver one final SQL string at a time and gets back
//! either rows or write metadata. Statements are executed with the simple
//! query protocol, so the string runs exactly as built and every value comes
//! back in its text form.

use crate::error::{ModelError, ModelResult};
use crate::monitor::QueryType;
use serde::Serialize;
use tokio_postgres::SimpleQueryMessage;

/// One result row: physical column name to raw text value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawRow {
    columns: Vec<(String, Option<String>)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.push(column, value.map(str::to_string));
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        self.columns.push((column.into(), value));
    }

    /// Value of the first column named `column`. `None` when the column is
    /// absent, `Some(None)` for SQL `NULL`.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v.as_deref()))
    }
}

impl FromIterator<(String, Option<String>)> for RawRow {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Metadata of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteInfo {
    /// First returned column of the first returned row (the generated identity
    /// of an insert).
    pub last_insert_id: Option<String>,
    pub affected_rows: u64,
    /// Command tag, e.g. `INSERT 1`.
    pub driver_info: String,
    /// Rows produced by a `RETURNING` clause.
    pub returning: Vec<RawRow>,
}

/// What a driver returns for one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOutput {
    Rows(Vec<RawRow>),
    Write(WriteInfo),
}

impl DriverOutput {
    /// Interpret a statement result by the kind of statement that produced it.
    pub fn from_parts(sql: &str, rows: Vec<RawRow>, affected: u64) -> Self {
        let query_type = QueryType::from_sql(sql);
        match query_type {
            QueryType::Select => DriverOutput::Rows(rows),
            _ => DriverOutput::Write(WriteInfo {
                last_insert_id: rows
                    .first()
                    .and_then(|r| r.iter().next())
                    .and_then(|(_, v)| v.map(str::to_string)),
                affected_rows: affected,
                driver_info: format!("{} {affected}", query_type.command_tag()),
                returning: rows,
            }),
        }
    }

    /// The rows, or an error for write metadata.
    pub fn into_rows(self) -> ModelResult<Vec<RawRow>> {
        match self {
            DriverOutput::Rows(rows) => Ok(rows),
            DriverOutput::Write(info) => Err(ModelError::Other(format!(
                "expected rows, driver returned '{}'",
                info.driver_info
            ))),
        }
    }

    /// The write metadata, or an error for rows.
    pub fn into_write(self) -> ModelResult<WriteInfo> {
        match self {
            DriverOutput::Write(info) => Ok(info),
            DriverOutput::Rows(rows) => Err(ModelError::Other(format!(
                "expected write metadata, driver returned {} rows",
                rows.len()
            ))),
        }
    }
}

/// Executes final SQL strings.
///
/// Implemented for `tokio_postgres::Client`, `tokio_postgres::Transaction`
/// and, with the `pool` feature, `deadpool_postgres::Client`. Failures are
/// returned unchanged; the core never retries.
pub trait Driver: Send + Sync {
    /// Execute one statement.
    fn run(&self, sql: &str) -> impl std::future::Future<Output = ModelResult<DriverOutput>> + Send;

    /// Execute one statement, associating a tag for monitoring.
    ///
    /// The default implementation ignores `tag` and calls [`Driver::run`].
    fn run_tagged(
        &self,
        tag: &str,
        sql: &str,
    ) -> impl std::future::Future<Output = ModelResult<DriverOutput>> + Send {
        let _ = tag;
        self.run(sql)
    }

    /// Return a cancellation token for the underlying connection, if supported.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }
}

fn interpret(sql: &str, messages: Vec<SimpleQueryMessage>) -> DriverOutput {
    let mut rows = Vec::new();
    let mut affected = 0;
    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                let raw: RawRow = row
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| (col.name().to_string(), row.get(i).map(str::to_string)))
                    .collect();
                rows.push(raw);
            }
            SimpleQueryMessage::CommandComplete(n) => affected = n,
            _ => {}
        }
    }
    DriverOutput::from_parts(sql, rows, affected)
}

impl Driver for tokio_postgres::Client {
    async fn run(&self, sql: &str) -> ModelResult<DriverOutput> {
        let messages = tokio_postgres::Client::simple_query(self, sql).await?;
        Ok(interpret(sql, messages))
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Client::cancel_token(self))
    }
}

impl Driver for tokio_postgres::Transaction<'_> {
    async fn run(&self, sql: &str) -> ModelResult<DriverOutput> {
        let messages = tokio_postgres::Transaction::simple_query(self, sql).await?;
        Ok(interpret(sql, messages))
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Transaction::cancel_token(self))
    }
}

#[cfg(feature = "pool")]
impl Driver for deadpool_postgres::Client {
    async fn run(&self, sql: &str) -> ModelResult<DriverOutput> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        Driver::run(client, sql).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        let client: &tokio_postgres::Client = self;
        Driver::cancel_token(client)
    }
}

impl<D: Driver> Driver for &D {
    fn run(&self, sql: &str) -> impl std::future::Future<Output = ModelResult<DriverOutput>> + Send {
        (**self).run(sql)
    }

    fn run_tagged(
        &self,
        tag: &str,
        sql: &str,
    ) -> impl std::future::Future<Output = ModelResult<DriverOutput>> + Send {
        (**self).run_tagged(tag, sql)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        (**self).cancel_token()
    }
}
