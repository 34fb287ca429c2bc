//! In-memory driver that records statements and answers with canned rows.

#![allow(dead_code)]

use pgmodel::{Driver, DriverOutput, EntityRegistry, ModelResult, QueryType, RawRow};
use std::path::PathBuf;
use std::sync::Mutex;

pub fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/models")
}

pub fn registry() -> EntityRegistry {
    EntityRegistry::load_dir(fixtures()).expect("fixture models load")
}

#[derive(Default)]
pub struct RecordingDriver {
    statements: Mutex<Vec<(Option<String>, String)>>,
    rows: Vec<RawRow>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every SELECT.
    pub fn with_rows(mut self, rows: Vec<RawRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    pub fn tags(&self) -> Vec<Option<String>> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    fn answer(&self, tag: Option<&str>, sql: &str) -> DriverOutput {
        self.statements
            .lock()
            .unwrap()
            .push((tag.map(str::to_string), sql.to_string()));

        match QueryType::from_sql(sql) {
            QueryType::Select if sql.starts_with("SELECT COUNT(*)") => DriverOutput::from_parts(
                sql,
                vec![RawRow::new().with("count", Some(&self.rows.len().to_string()))],
                1,
            ),
            QueryType::Select => DriverOutput::from_parts(sql, self.rows.clone(), 0),
            QueryType::Insert => {
                DriverOutput::from_parts(sql, vec![RawRow::new().with("id", Some("42"))], 1)
            }
            _ => DriverOutput::from_parts(sql, Vec::new(), 1),
        }
    }
}

impl Driver for RecordingDriver {
    async fn run(&self, sql: &str) -> ModelResult<DriverOutput> {
        Ok(self.answer(None, sql))
    }

    async fn run_tagged(&self, tag: &str, sql: &str) -> ModelResult<DriverOutput> {
        Ok(self.answer(Some(tag), sql))
    }
}
