//! Per-request model instances and verb dispatch.
//!
//! A [`Model`] is created from the registry for one request, with the
//! request's parameters. Construction strips markup, resolves the join
//! selector and reads the query shape overrides; after that the instance is
//! fixed. Each verb consumes the instance:
//!
//! ```text
//! Uninitialized --gate--> Validated --driver--> Executed --map--> Shaped
//! ```
//!
//! The gate (verb enabled, required fields present, validation rules) runs
//! before any SQL is built, so a rejected request never reaches the driver.
//!
//! ```ignore
//! let params = Params::new().with("name", "%lamp%").with("xjoin", "category");
//! let rows = registry.model("item", params)?.get(&client).await?;
//! ```

use crate::clause::{ClauseBuilder, QueryShape, unqualified};
use crate::config::ModelConfig;
use crate::dialect::Dialect;
use crate::driver::{Driver, RawRow, WriteInfo};
use crate::entity::{EntityDef, Verb};
use crate::error::{ModelError, ModelResult};
use crate::ident::Ident;
use crate::join::JoinResolver;
use crate::mapper::FieldMapper;
use crate::params::{ParamValue, Params, strip_tags};
use crate::registry::EntityRegistry;
use crate::changeset::ValidationErrors;
use crate::validate::Validator;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

/// One shaped result row: external field name to value.
pub type Record = IndexMap<String, Option<String>>;

/// Progress of a verb dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    Validated,
    Executed,
    Shaped,
}

/// Result of [`Model::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Records(Vec<Record>),
    Write(WriteInfo),
    Count(u64),
}

/// An entity instantiated for one request.
pub struct Model {
    def: Arc<EntityDef>,
    params: Params,
    joins: JoinResolver,
    mapping: IndexMap<String, String>,
    shape: QueryShape,
    config: Arc<ModelConfig>,
    dialect: Arc<dyn Dialect>,
    validator: Arc<dyn Validator>,
    state: DispatchState,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("entity", &self.def.name)
            .field("params", &self.params)
            .field("joins", &self.joins.active_joins())
            .field("shape", &self.shape)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Model {
    pub(crate) fn new(
        def: Arc<EntityDef>,
        mut params: Params,
        registry: &EntityRegistry,
    ) -> ModelResult<Self> {
        let config = registry.shared_config();

        if config.strip_tags {
            for field in def.mapping.keys() {
                if def.allows_html(field) {
                    continue;
                }
                if let Some(value) = params.get_mut(field) {
                    *value = value.map(strip_tags);
                }
            }
        }

        let selector = params.selector(&config.reserved.join);
        let joins = JoinResolver::resolve(Arc::clone(&def), selector.as_deref(), registry)?;
        let mapping = joins.combined_mapping();
        let shape = QueryShape::from_request(&def, &params, &config)?;

        for name in shape
            .fields
            .iter()
            .chain(&shape.order_by)
            .chain(&shape.group_by)
        {
            if name != "*" && !mapping.contains_key(name) {
                Ident::parse(name)?;
            }
        }

        Ok(Self {
            def,
            params,
            joins,
            mapping,
            shape,
            config,
            dialect: registry.shared_dialect(),
            validator: registry.shared_validator(),
            state: DispatchState::Uninitialized,
        })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn def(&self) -> &EntityDef {
        &self.def
    }

    /// Parameters after markup stripping.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn shape(&self) -> &QueryShape {
        &self.shape
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Names of the active joins, in catalog order.
    pub fn active_joins(&self) -> Vec<&str> {
        self.joins.active_joins()
    }

    /// Base mapping plus `{related}_{field}` names of the active joins.
    pub fn combined_mapping(&self) -> &IndexMap<String, String> {
        &self.mapping
    }

    /// Mapper over the combined mapping.
    pub fn mapper(&self) -> FieldMapper<'_> {
        FieldMapper::new(&self.mapping)
    }

    /// Values addressed to related entities; see [`JoinResolver::foreign_values`].
    pub fn foreign_values(&self, names: Option<&[&str]>) -> ModelResult<IndexMap<String, ParamValue>> {
        self.joins.foreign_values(&self.params, names)
    }

    /// Physical reference to value for every mapped base parameter.
    pub fn values_for_write(&self, exclude_primary: bool) -> ModelResult<IndexMap<String, String>> {
        FieldMapper::new(&self.def.mapping).values_for_write(
            &self.params,
            &self.def.primary,
            exclude_primary,
        )
    }

    /// Clause fragments and statements for the current state.
    pub fn clauses(&self) -> ClauseBuilder<'_> {
        ClauseBuilder::new(
            &self.def,
            &self.joins,
            &self.mapping,
            &self.params,
            &self.shape,
            &self.config,
            self.dialect.as_ref(),
        )
    }

    /// Escape a value; see [`ClauseBuilder::escape`].
    pub fn escape(&self, value: &str, field: Option<&str>) -> String {
        self.clauses().escape(value, field)
    }

    /// Failing fields among `fields` (every field with rules when empty).
    pub fn invalids(&self, fields: &[String]) -> ValidationErrors {
        self.validator
            .invalids(&self.def.validation, &self.params, fields)
    }

    fn advance(&mut self, verb: Verb, next: DispatchState) {
        tracing::debug!(
            target: "pgmodel.dispatch",
            entity = %self.def.name,
            %verb,
            from = ?self.state,
            to = ?next,
            "dispatch state"
        );
        self.state = next;
    }

    fn reject(&self, verb: Verb, err: ModelError) -> ModelError {
        tracing::debug!(
            target: "pgmodel.dispatch",
            entity = %self.def.name,
            %verb,
            status = err.status_code(),
            error = %err,
            "request rejected"
        );
        err
    }

    /// Verb enabled, required fields present, rules satisfied.
    ///
    /// Checked fields are the verb's required fields plus every present
    /// field that carries rules.
    fn gate(&mut self, verb: Verb) -> ModelResult<()> {
        if !self.def.supports(verb) {
            return Err(self.reject(
                verb,
                ModelError::not_implemented(format!("{verb} on '{}'", self.def.name)),
            ));
        }

        let required = self.def.required.for_verb(verb);
        let missing: Vec<String> = required
            .iter()
            .filter(|f| !self.params.contains(f))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(self.reject(verb, ModelError::MissingParams(missing)));
        }

        let mut fields: Vec<String> = required.to_vec();
        for field in self.def.validation.keys() {
            if self.params.contains(field) && !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        if !fields.is_empty() {
            let errors = self.invalids(&fields);
            if !errors.is_empty() {
                return Err(self.reject(verb, ModelError::Invalid(errors)));
            }
        }

        self.advance(verb, DispatchState::Validated);
        Ok(())
    }

    /// Run the gate and build the statement for `verb` without executing it.
    pub fn prepare(&mut self, verb: Verb) -> ModelResult<String> {
        if self.state != DispatchState::Uninitialized {
            return Err(ModelError::Other(format!(
                "model '{}' was already dispatched",
                self.def.name
            )));
        }
        self.gate(verb)?;
        let clauses = self.clauses();
        let sql = match verb {
            Verb::Get => clauses.select_sql(),
            Verb::Post => clauses.update_sql(),
            Verb::Put => clauses.insert_sql(),
            Verb::Delete => clauses.delete_sql(),
            Verb::Count => clauses.count_sql(),
        };
        sql.map_err(|e| self.reject(verb, e))
    }

    fn tag(&self, verb: Verb) -> String {
        format!("{}.{verb}", self.def.name)
    }

    async fn execute<D: Driver>(
        &mut self,
        verb: Verb,
        driver: &D,
    ) -> ModelResult<crate::driver::DriverOutput> {
        let sql = self.prepare(verb)?;
        let output = driver.run_tagged(&self.tag(verb), &sql).await?;
        self.advance(verb, DispatchState::Executed);
        Ok(output)
    }

    /// Leading and trailing columns the SELECT list already names by their
    /// external names, as `(head, tail)`.
    ///
    /// Those columns are aliases and must not be reverse-mapped; only the
    /// columns a `*` expands to go through the mapper.
    fn named_columns(&self, width: usize) -> (usize, usize) {
        let fields = &self.shape.fields;
        if self.shape.selects_all() {
            let aliased = self
                .joins
                .foreign_mapping()
                .iter()
                .filter(|(field, physical)| self.mapping.get(*field) == Some(*physical))
                .count();
            let tail = if self.joins.is_empty() { 0 } else { aliased };
            return (0, tail.min(width));
        }
        match (
            fields.iter().position(|f| f == "*"),
            fields.iter().rposition(|f| f == "*"),
        ) {
            (Some(first), Some(last)) => {
                let tail = fields.len() - last - 1;
                (first.min(width), tail.min(width - first.min(width)))
            }
            _ => (width, 0),
        }
    }

    /// Key each column by its external name.
    ///
    /// Columns the projection aliases keep their alias. Any other column is
    /// named by an exact physical match first, then by a base field whose
    /// qualified reference ends in the column, then by itself. Candidates
    /// already used by an earlier column are skipped.
    fn shape_row(&self, row: &RawRow) -> Record {
        let mapper = self.mapper();
        let width = row.len();
        let (head, tail) = self.named_columns(width);
        let mut record = Record::with_capacity(width);
        for (index, (column, value)) in row.iter().enumerate() {
            if index < head || index >= width - tail {
                record.insert(column.to_string(), value.map(str::to_string));
                continue;
            }
            let mapped = Some(mapper.to_external(column)).filter(|name| *name != column);
            let qualified = self
                .def
                .mapping
                .iter()
                .find(|(_, physical)| physical.contains('.') && unqualified(physical) == column)
                .map(|(external, _)| external.as_str());
            let name = [mapped, qualified, Some(column)]
                .into_iter()
                .flatten()
                .find(|name| !record.contains_key(*name));
            if let Some(name) = name {
                record.insert(name.to_string(), value.map(str::to_string));
            }
        }
        record
    }

    fn shaped<T>(&mut self, verb: Verb, value: T) -> T {
        self.advance(verb, DispatchState::Shaped);
        value
    }

    /// SELECT; rows come back keyed by external field names.
    pub async fn get<D: Driver>(mut self, driver: &D) -> ModelResult<Vec<Record>> {
        let rows = self.execute(Verb::Get, driver).await?.into_rows()?;
        let records: Vec<Record> = rows.iter().map(|row| self.shape_row(row)).collect();
        Ok(self.shaped(Verb::Get, records))
    }

    /// UPDATE of the non-primary fields, identified by the primary fields.
    pub async fn post<D: Driver>(mut self, driver: &D) -> ModelResult<WriteInfo> {
        let info = self.execute(Verb::Post, driver).await?.into_write()?;
        Ok(self.shaped(Verb::Post, info))
    }

    /// INSERT; the write metadata carries the generated identity.
    pub async fn put<D: Driver>(mut self, driver: &D) -> ModelResult<WriteInfo> {
        let info = self.execute(Verb::Put, driver).await?.into_write()?;
        Ok(self.shaped(Verb::Put, info))
    }

    /// DELETE identified by the primary fields.
    pub async fn delete<D: Driver>(mut self, driver: &D) -> ModelResult<WriteInfo> {
        let info = self.execute(Verb::Delete, driver).await?.into_write()?;
        Ok(self.shaped(Verb::Delete, info))
    }

    /// Number of rows `get` would match (groups when grouped).
    pub async fn count<D: Driver>(mut self, driver: &D) -> ModelResult<u64> {
        let rows = self.execute(Verb::Count, driver).await?.into_rows()?;
        let raw = rows
            .first()
            .and_then(|row| row.iter().next())
            .and_then(|(_, value)| value)
            .ok_or_else(|| ModelError::Other("count returned no value".to_string()))?;
        let count = raw
            .parse::<u64>()
            .map_err(|_| ModelError::Other(format!("count returned '{raw}'")))?;
        Ok(self.shaped(Verb::Count, count))
    }

    /// Run `verb` and wrap its result.
    pub async fn dispatch<D: Driver>(self, verb: Verb, driver: &D) -> ModelResult<Outcome> {
        Ok(match verb {
            Verb::Get => Outcome::Records(self.get(driver).await?),
            Verb::Post => Outcome::Write(self.post(driver).await?),
            Verb::Put => Outcome::Write(self.put(driver).await?),
            Verb::Delete => Outcome::Write(self.delete(driver).await?),
            Verb::Count => Outcome::Count(self.count(driver).await?),
        })
    }
}
