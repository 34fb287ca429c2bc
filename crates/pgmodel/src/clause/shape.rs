//! Request-derived query shape.

use crate::config::ModelConfig;
use crate::entity::EntityDef;
use crate::error::{ModelError, ModelResult};
use crate::params::{ParamValue, Params};
use std::fmt;
use std::str::FromStr;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ASC") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("DESC") {
            Ok(Self::Desc)
        } else {
            Err(ModelError::bad_request(format!(
                "sort direction must be ASC or DESC, got '{s}'"
            )))
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Ordering, grouping, projection and pagination of one request.
///
/// Built once when the model is instantiated; reserved parameters override
/// the entity defaults field by field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryShape {
    /// Projection; empty or `["*"]` selects everything.
    pub fields: Vec<String>,
    pub order_by: Vec<String>,
    pub order: Option<SortOrder>,
    pub group_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

fn scalar<'p>(params: &'p Params, key: &str) -> ModelResult<Option<&'p str>> {
    match params.get(key) {
        None => Ok(None),
        Some(ParamValue::Scalar(s)) => Ok(Some(s.trim())),
        Some(ParamValue::List(_)) => Err(ModelError::bad_request(format!(
            "parameter '{key}' takes a single value"
        ))),
    }
}

fn bound(params: &Params, key: &str) -> ModelResult<Option<u64>> {
    scalar(params, key)?
        .map(|s| {
            s.parse::<u64>().map_err(|_| {
                ModelError::bad_request(format!(
                    "parameter '{key}' must be a non-negative integer, got '{s}'"
                ))
            })
        })
        .transpose()
}

impl QueryShape {
    /// Read the reserved parameters, falling back to the entity defaults.
    pub fn from_request(def: &EntityDef, params: &Params, config: &ModelConfig) -> ModelResult<Self> {
        let keys = &config.reserved;
        let defaults = &def.defaults;

        let order = match scalar(params, &keys.order)? {
            Some(s) => Some(s.parse::<SortOrder>()?),
            None => defaults.order.as_deref().map(str::parse::<SortOrder>).transpose()?,
        };

        let limit = bound(params, &keys.limit)?.or(defaults.limit);
        let limit = match (limit, config.max_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (limit, max) => limit.or(max),
        };

        Ok(Self {
            fields: params
                .selector(&keys.fields)
                .unwrap_or_else(|| defaults.fields.clone()),
            order_by: params
                .selector(&keys.order_by)
                .unwrap_or_else(|| defaults.order_by.clone()),
            order,
            group_by: params
                .selector(&keys.group_by)
                .unwrap_or_else(|| defaults.group_by.clone()),
            limit,
            offset: bound(params, &keys.offset)?,
        })
    }

    /// Whether the projection selects every column.
    pub fn selects_all(&self) -> bool {
        self.fields.is_empty() || self.fields.iter().all(|f| f == "*")
    }
}
