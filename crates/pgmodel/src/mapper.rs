//! Field name translation.
//!
//! External names are what requests and results use; physical references are
//! what the SQL uses. Unmapped names pass through unchanged in both
//! directions.

use crate::error::{ModelError, ModelResult};
use crate::params::{ParamValue, Params};
use indexmap::IndexMap;

/// One value headed for an INSERT or UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteValue<'a> {
    pub field: &'a str,
    pub column: &'a str,
    pub value: &'a str,
}

/// Translates between external and physical names over one mapping.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper<'a> {
    mapping: &'a IndexMap<String, String>,
}

impl<'a> FieldMapper<'a> {
    pub fn new(mapping: &'a IndexMap<String, String>) -> Self {
        Self { mapping }
    }

    pub fn is_mapped(&self, external: &str) -> bool {
        self.mapping.contains_key(external)
    }

    /// The physical reference of `external`, or `external` itself.
    pub fn to_physical<'b>(&self, external: &'b str) -> &'b str
    where
        'a: 'b,
    {
        self.mapping.get(external).map_or(external, String::as_str)
    }

    /// The external name of `physical`, or `physical` itself.
    ///
    /// When several external names share a physical reference, the first
    /// declared one wins.
    pub fn to_external<'b>(&self, physical: &'b str) -> &'b str
    where
        'a: 'b,
    {
        self.mapping
            .iter()
            .find(|(_, p)| p.as_str() == physical)
            .map_or(physical, |(e, _)| e.as_str())
    }

    /// Mapped parameters as write values, in mapping order.
    ///
    /// With `exclude_primary`, fields listed in `primary` are dropped. List
    /// values cannot be written and are rejected.
    pub fn write_values<'p>(
        &self,
        params: &'p Params,
        primary: &[String],
        exclude_primary: bool,
    ) -> ModelResult<Vec<WriteValue<'p>>>
    where
        'a: 'p,
    {
        let mut out = Vec::new();
        for (field, column) in self.mapping {
            if exclude_primary && primary.iter().any(|p| p == field) {
                continue;
            }
            match params.get(field) {
                None => {}
                Some(ParamValue::Scalar(value)) => out.push(WriteValue {
                    field: field.as_str(),
                    column: column.as_str(),
                    value: value.as_str(),
                }),
                Some(ParamValue::List(_)) => {
                    return Err(ModelError::bad_request(format!(
                        "field '{field}' cannot be written with a list of values"
                    )));
                }
            }
        }
        Ok(out)
    }

    /// Physical reference to raw value, for every mapped parameter.
    pub fn values_for_write(
        &self,
        params: &Params,
        primary: &[String],
        exclude_primary: bool,
    ) -> ModelResult<IndexMap<String, String>> {
        Ok(self
            .write_values(params, primary, exclude_primary)?
            .into_iter()
            .map(|w| (w.column.to_string(), w.value.to_string()))
            .collect())
    }
}
