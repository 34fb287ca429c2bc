//! SQL clause assembly.
//!
//! A [`ClauseBuilder`] is a read-only view over one model instance: its
//! definition, active joins, parameters and query shape. Every fragment is a
//! pure function of that state, and statements are assembled from fragments.
//!
//! Values are always inlined as escaped literals. The only exception is a
//! value matching the dialect's fixed list of SQL constants on a field that
//! accepts constants; see [`ClauseBuilder::escape`].
//!
//! ## Safety rules
//!
//! - Physical references come from entity definitions and are emitted verbatim.
//! - Field names from the request are translated through the mapping; anything
//!   unmapped must parse as a plain identifier.
//! - UPDATE and DELETE require every primary field; UPDATE requires a SET.

mod shape;
mod statement;

pub use shape::{QueryShape, SortOrder};

use crate::config::ModelConfig;
use crate::dialect::Dialect;
use crate::entity::EntityDef;
use crate::error::ModelResult;
use crate::ident::Ident;
use crate::join::JoinResolver;
use crate::mapper::FieldMapper;
use crate::params::{ParamValue, Params};
use indexmap::IndexMap;

/// Clause fragments for one model instance.
#[derive(Clone, Copy)]
pub struct ClauseBuilder<'a> {
    def: &'a EntityDef,
    joins: &'a JoinResolver,
    mapping: &'a IndexMap<String, String>,
    params: &'a Params,
    shape: &'a QueryShape,
    config: &'a ModelConfig,
    dialect: &'a dyn Dialect,
}

impl<'a> ClauseBuilder<'a> {
    pub(crate) fn new(
        def: &'a EntityDef,
        joins: &'a JoinResolver,
        mapping: &'a IndexMap<String, String>,
        params: &'a Params,
        shape: &'a QueryShape,
        config: &'a ModelConfig,
        dialect: &'a dyn Dialect,
    ) -> Self {
        Self {
            def,
            joins,
            mapping,
            params,
            shape,
            config,
            dialect,
        }
    }

    /// Mapper over the combined (base + joined) mapping.
    pub fn mapper(&self) -> FieldMapper<'a> {
        FieldMapper::new(self.mapping)
    }

    /// Mapper over the base entity mapping only.
    pub fn base_mapper(&self) -> FieldMapper<'a> {
        FieldMapper::new(&self.def.mapping)
    }

    /// Escape a value, or pass it through when it is an allowed SQL constant.
    ///
    /// The value is emitted unquoted only if `field` is given, the entity
    /// accepts constants on it, and the whole value is one of the dialect's
    /// constants. Everything else is a quoted literal.
    pub fn escape(&self, value: &str, field: Option<&str>) -> String {
        match field {
            Some(field) if self.is_constant(value, field) => value.to_string(),
            _ => self.dialect.escape_literal(value),
        }
    }

    fn is_constant(&self, value: &str, field: &str) -> bool {
        self.def.accepts_constant(field) && self.dialect.is_sql_constant(value)
    }

    /// Resolve a request-supplied field name to SQL.
    fn column(&self, name: &str) -> ModelResult<String> {
        match self.mapping.get(name) {
            Some(physical) => Ok(physical.clone()),
            None => Ok(Ident::parse(name)?.to_sql()),
        }
    }

    fn column_list(&self, names: &[String]) -> ModelResult<Vec<String>> {
        names.iter().map(|n| self.column(n)).collect()
    }

    /// `SELECT` list (without the keyword).
    ///
    /// Selecting everything with active joins expands to the main table's
    /// columns plus every joined field aliased to its prefixed name.
    pub fn select_clause(&self) -> ModelResult<String> {
        if self.shape.selects_all() {
            if self.joins.is_empty() {
                return Ok("*".to_string());
            }
            let mut items = vec![format!("{}.*", self.def.maintable())];
            for (field, physical) in self.joins.foreign_mapping() {
                if self.mapping.get(&field) == Some(&physical) {
                    items.push(format!("{physical} AS {}", self.dialect.quote_ident(&field)));
                }
            }
            return Ok(items.join(", "));
        }

        let mut items = Vec::with_capacity(self.shape.fields.len());
        for field in &self.shape.fields {
            if field == "*" {
                items.push(format!("{}.*", self.def.maintable()));
                continue;
            }
            match self.mapping.get(field) {
                Some(physical) if physical != field => {
                    items.push(format!("{physical} AS {}", self.dialect.quote_ident(field)));
                }
                Some(physical) => items.push(physical.clone()),
                None => items.push(Ident::parse(field)?.to_sql()),
            }
        }
        Ok(items.join(", "))
    }

    /// `FROM` target (without the keyword).
    pub fn from_clause(&self) -> &'a str {
        &self.def.table
    }

    /// Join templates of the active joins, in catalog order.
    pub fn join_clause(&self) -> String {
        self.joins
            .active()
            .iter()
            .map(|r| r.clause.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Predicates for every mapped field present in the parameters, ANDed
    /// (without the keyword). Empty when nothing applies.
    ///
    /// A value containing `%` is a pattern match, except in the identity
    /// predicate (`primary_only`), where it is compared literally. A list is
    /// an `IN` test and a `NULL` constant is an `IS NULL` test.
    pub fn where_clause(&self, primary_only: bool) -> ModelResult<String> {
        let mut predicates = Vec::new();
        for (field, physical) in self.mapping {
            if primary_only && !self.def.is_primary(field) {
                continue;
            }
            if self.config.reserved.contains(field) {
                continue;
            }
            let Some(value) = self.params.get(field) else {
                continue;
            };
            predicates.push(self.predicate(field, physical, value, !primary_only));
        }
        Ok(predicates.join(" AND "))
    }

    fn predicate(
        &self,
        field: &str,
        physical: &str,
        value: &ParamValue,
        patterns: bool,
    ) -> String {
        match value {
            ParamValue::Scalar(v) if self.is_constant(v, field) => {
                if v.trim().eq_ignore_ascii_case("NULL") {
                    format!("{physical} IS NULL")
                } else {
                    format!("{physical} = {v}")
                }
            }
            ParamValue::Scalar(v) if patterns && v.contains('%') => format!(
                "{physical} {} {}",
                self.config.like_operator(),
                self.dialect.escape_literal(v)
            ),
            ParamValue::Scalar(v) => format!("{physical} = {}", self.dialect.escape_literal(v)),
            ParamValue::List(items) if items.is_empty() => "1=0".to_string(),
            ParamValue::List(items) => {
                let values: Vec<String> = items
                    .iter()
                    .map(|v| self.dialect.escape_literal(v))
                    .collect();
                format!("{physical} IN ({})", values.join(", "))
            }
        }
    }

    /// `ORDER BY` list (without the keyword). Empty means no explicit ordering.
    pub fn order_clause(&self) -> ModelResult<String> {
        let columns = self.column_list(&self.shape.order_by)?;
        Ok(match self.shape.order {
            Some(order) => columns
                .iter()
                .map(|c| format!("{c} {}", order.as_sql()))
                .collect::<Vec<_>>()
                .join(", "),
            None => columns.join(", "),
        })
    }

    /// `GROUP BY` list (without the keyword).
    pub fn group_clause(&self) -> ModelResult<String> {
        Ok(self.column_list(&self.shape.group_by)?.join(", "))
    }

    /// `LIMIT` / `OFFSET` suffix, keywords included.
    pub fn limit_clause(&self) -> String {
        match (self.shape.limit, self.shape.offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (None, Some(offset)) => format!("OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }
}

/// Column name without its table qualifier.
pub(crate) fn unqualified(physical: &str) -> &str {
    physical.rsplit('.').next().unwrap_or(physical).trim()
}

#[cfg(test)]
mod tests;
