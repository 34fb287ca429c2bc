//! Full statements built from clause fragments.

use super::{ClauseBuilder, unqualified};
use crate::error::{ModelError, ModelResult};

fn push_clause(sql: &mut String, keyword: &str, body: &str) {
    if !body.is_empty() {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(body);
    }
}

impl ClauseBuilder<'_> {
    /// `FROM ... JOIN ... WHERE ...` shared by SELECT and COUNT.
    fn source(&self) -> ModelResult<String> {
        let mut sql = format!("FROM {}", self.from_clause());
        let joins = self.join_clause();
        if !joins.is_empty() {
            sql.push(' ');
            sql.push_str(&joins);
        }
        push_clause(&mut sql, "WHERE", &self.where_clause(false)?);
        Ok(sql)
    }

    pub fn select_sql(&self) -> ModelResult<String> {
        let mut sql = format!("SELECT {} {}", self.select_clause()?, self.source()?);
        push_clause(&mut sql, "GROUP BY", &self.group_clause()?);
        push_clause(&mut sql, "ORDER BY", &self.order_clause()?);
        let limit = self.limit_clause();
        if !limit.is_empty() {
            sql.push(' ');
            sql.push_str(&limit);
        }
        Ok(sql)
    }

    /// `SELECT COUNT(*)` over the same joins and predicates as
    /// [`ClauseBuilder::select_sql`]. Grouped queries count groups.
    pub fn count_sql(&self) -> ModelResult<String> {
        let group = self.group_clause()?;
        if group.is_empty() {
            return Ok(format!("SELECT COUNT(*) {}", self.source()?));
        }
        Ok(format!(
            "SELECT COUNT(*) FROM (SELECT 1 {} GROUP BY {group}) AS t",
            self.source()?
        ))
    }

    /// `INSERT` of every mapped parameter, returning the primary columns.
    pub fn insert_sql(&self) -> ModelResult<String> {
        let values = self
            .base_mapper()
            .write_values(self.params, &self.def.primary, false)?;
        let table = self.def.maintable();
        let returning = self.returning();

        if values.is_empty() {
            return Ok(format!("INSERT INTO {table} DEFAULT VALUES RETURNING {returning}"));
        }
        let columns: Vec<&str> = values.iter().map(|w| unqualified(w.column)).collect();
        let literals: Vec<String> = values
            .iter()
            .map(|w| self.escape(w.value, Some(w.field)))
            .collect();
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({}) RETURNING {returning}",
            columns.join(", "),
            literals.join(", ")
        ))
    }

    /// `UPDATE` of every mapped non-primary parameter, identified by the
    /// primary fields.
    pub fn update_sql(&self) -> ModelResult<String> {
        let predicate = self.primary_predicate("update")?;
        let values = self
            .base_mapper()
            .write_values(self.params, &self.def.primary, true)?;
        if values.is_empty() {
            return Err(ModelError::bad_request(format!(
                "update of '{}' sets no fields",
                self.def.name
            )));
        }
        let assignments: Vec<String> = values
            .iter()
            .map(|w| format!("{} = {}", unqualified(w.column), self.escape(w.value, Some(w.field))))
            .collect();
        Ok(format!(
            "UPDATE {} SET {} WHERE {predicate}",
            self.def.maintable(),
            assignments.join(", ")
        ))
    }

    /// `DELETE` identified by the primary fields.
    pub fn delete_sql(&self) -> ModelResult<String> {
        let predicate = self.primary_predicate("delete")?;
        Ok(format!("DELETE FROM {} WHERE {predicate}", self.def.maintable()))
    }

    fn returning(&self) -> String {
        self.def
            .primary
            .iter()
            .map(|p| unqualified(self.base_mapper().to_physical(p)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Primary-only WHERE body; every primary field must be present.
    fn primary_predicate(&self, what: &str) -> ModelResult<String> {
        let missing: Vec<&str> = self
            .def
            .primary
            .iter()
            .filter(|p| !self.params.contains(p))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ModelError::bad_request(format!(
                "{what} of '{}' needs primary field(s): {}",
                self.def.name,
                missing.join(", ")
            )));
        }
        self.where_clause(true)
    }
}
