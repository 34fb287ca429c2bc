//! Request parameter sets.
//!
//! A transport front hands the core a flat set of string parameters, each one
//! either a single value or a list of values. Absent keys are `None`; there is
//! no implicit "empty string means missing".

use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;

/// A single request parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    /// The value if it is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    /// Every value, one for a scalar.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Scalar(s) => vec![s.as_str()],
            Self::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// `true` for an empty scalar or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Apply `f` to every contained string.
    pub fn map(&self, f: impl Fn(&str) -> String) -> Self {
        match self {
            Self::Scalar(s) => Self::Scalar(f(s)),
            Self::List(items) => Self::List(items.iter().map(|s| f(s)).collect()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

/// An insertion-ordered parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params {
    values: IndexMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Append a value under `key`; a second value turns a scalar into a list.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.values.entry(key.into()) {
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                match slot {
                    ParamValue::List(items) => items.push(value),
                    ParamValue::Scalar(first) => {
                        let first = std::mem::take(first);
                        *slot = ParamValue::List(vec![first, value]);
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(ParamValue::Scalar(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// The scalar value for `key`, `None` when absent or a list.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ParamValue::as_scalar)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut ParamValue> {
        self.values.get_mut(key)
    }

    /// Read a selector parameter as a list of names.
    ///
    /// Lists are taken as-is; scalars are split on commas. Blank entries are
    /// dropped. `None` when the key is absent.
    pub fn selector(&self, key: &str) -> Option<Vec<String>> {
        let value = self.values.get(key)?;
        let names = match value {
            ParamValue::Scalar(s) => s.split(',').map(|p| p.trim().to_string()).collect::<Vec<_>>(),
            ParamValue::List(items) => items.iter().map(|p| p.trim().to_string()).collect(),
        };
        Some(names.into_iter().filter(|n| !n.is_empty()).collect())
    }

    /// Build a parameter set from a JSON object.
    ///
    /// Strings are taken verbatim, numbers and booleans use their textual form,
    /// arrays become lists and `null` leaves the key absent. Nested objects are
    /// rejected.
    pub fn from_json(value: &serde_json::Value) -> ModelResult<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(ModelError::bad_request("parameters must be a JSON object"));
        };

        let mut params = Self::new();
        for (key, value) in map {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::Array(items) => {
                    let mut list = Vec::with_capacity(items.len());
                    for item in items {
                        list.push(json_scalar(key, item)?);
                    }
                    params.insert(key.clone(), ParamValue::List(list));
                }
                other => params.insert(key.clone(), json_scalar(key, other)?),
            }
        }
        Ok(params)
    }

    /// Parse `key=value` assignments. Repeating a key, or suffixing it with
    /// `[]`, collects the values into a list.
    pub fn from_assignments<I, S>(assignments: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for raw in assignments {
            let raw = raw.as_ref();
            let Some((key, value)) = raw.split_once('=') else {
                return Err(ModelError::bad_request(format!(
                    "expected key=value, got '{raw}'"
                )));
            };
            let (key, force_list) = match key.strip_suffix("[]") {
                Some(k) => (k, true),
                None => (key, false),
            };
            if key.is_empty() {
                return Err(ModelError::bad_request(format!("empty key in '{raw}'")));
            }
            if force_list && !params.contains(key) {
                params.insert(key, ParamValue::List(vec![value.to_string()]));
            } else {
                params.push(key, value);
            }
        }
        Ok(params)
    }
}

fn json_scalar(key: &str, value: &serde_json::Value) -> ModelResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        _ => Err(ModelError::bad_request(format!(
            "parameter '{key}' must be a scalar or a list of scalars"
        ))),
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Remove markup tags from a value.
///
/// Everything from a `<` up to and including the next `>` is dropped; an
/// unterminated `<` drops the remainder of the value.
pub fn strip_tags(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for c in value.chars() {
        match (in_tag, c) {
            (false, '<') => in_tag = true,
            (false, c) => out.push(c),
            (true, '>') => in_tag = false,
            (true, _) => {}
        }
    }
    out
}
