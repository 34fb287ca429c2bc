//! Field validation.
//!
//! Entities declare an ordered list of [`Rule`]s per field. A [`Validator`]
//! runs them against a parameter set and reports the failing fields; the
//! dispatcher only relies on that contract, so a custom validator can replace
//! [`RuleValidator`].
//!
//! In TOML a rule is either a bare name or a table:
//!
//! ```toml
//! [validation]
//! name = ["mandatory", { rule = "length", min = 2, max = 50 }]
//! price = [{ rule = "range", min = 0 }]
//! code = [{ rule = "regex", pattern = "^[A-Z]{3}$" }]
//! status = [{ rule = "one_of", values = ["draft", "published"] }]
//! ```

use crate::changeset::{ValidationCode, ValidationError, ValidationErrors};
use crate::params::{ParamValue, Params};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Best-effort email validation.
///
/// This is intentionally not fully RFC-compliant.
pub fn is_email(s: &str) -> bool {
    static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in email regex")
        })
        .is_match(s)
}

fn compiled(pattern: &str) -> Result<regex::Regex, regex::Error> {
    static CACHE: OnceLock<Mutex<HashMap<String, regex::Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = regex::Regex::new(pattern)?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// Returns `true` if `value` matches `pattern`. An invalid pattern never matches.
pub fn regex_is_match(pattern: &str, value: &str) -> bool {
    compiled(pattern).is_ok_and(|re| re.is_match(value))
}

pub fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

fn is_boolean(s: &str) -> bool {
    ["true", "false", "1", "0", "yes", "no", "on", "off"]
        .iter()
        .any(|b| b.eq_ignore_ascii_case(s))
}

fn is_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_datetime(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}

/// A validation rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawRule")]
pub enum Rule {
    /// Present and non-empty.
    Mandatory,
    /// Character count within bounds.
    Length { min: Option<usize>, max: Option<usize> },
    Integer,
    Numeric,
    /// Numeric value within bounds.
    Range { min: Option<f64>, max: Option<f64> },
    Boolean,
    Email,
    Url,
    Uuid,
    Ip,
    /// `YYYY-MM-DD`
    Date,
    /// RFC 3339 or `YYYY-MM-DD HH:MM:SS`
    DateTime,
    Regex { pattern: String },
    OneOf { values: Vec<String> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Name(String),
    Spec(RuleSpec),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    rule: String,
    min: Option<f64>,
    max: Option<f64>,
    pattern: Option<String>,
    values: Option<Vec<String>>,
}

fn as_count(bound: Option<f64>, what: &str) -> Result<Option<usize>, String> {
    match bound {
        None => Ok(None),
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(Some(n as usize)),
        Some(n) => Err(format!("length {what} must be a non-negative integer, got {n}")),
    }
}

impl TryFrom<RawRule> for Rule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let spec = match raw {
            RawRule::Name(rule) => RuleSpec {
                rule,
                min: None,
                max: None,
                pattern: None,
                values: None,
            },
            RawRule::Spec(spec) => spec,
        };
        let rule = match spec.rule.as_str() {
            "mandatory" | "required" => Rule::Mandatory,
            "length" | "string" => Rule::Length {
                min: as_count(spec.min, "min")?,
                max: as_count(spec.max, "max")?,
            },
            "integer" => Rule::Integer,
            "numeric" => Rule::Numeric,
            "range" => Rule::Range {
                min: spec.min,
                max: spec.max,
            },
            "boolean" => Rule::Boolean,
            "email" => Rule::Email,
            "url" => Rule::Url,
            "uuid" => Rule::Uuid,
            "ip" => Rule::Ip,
            "date" => Rule::Date,
            "datetime" => Rule::DateTime,
            "regex" => Rule::Regex {
                pattern: spec
                    .pattern
                    .ok_or_else(|| "regex rule needs a pattern".to_string())?,
            },
            "one_of" => Rule::OneOf {
                values: spec
                    .values
                    .ok_or_else(|| "one_of rule needs values".to_string())?,
            },
            other => return Err(format!("unknown validation rule '{other}'")),
        };
        Ok(rule)
    }
}

impl Rule {
    pub fn code(&self) -> ValidationCode {
        match self {
            Rule::Mandatory => ValidationCode::Required,
            Rule::Length { .. } => ValidationCode::Len,
            Rule::Integer => ValidationCode::Integer,
            Rule::Numeric => ValidationCode::Numeric,
            Rule::Range { .. } => ValidationCode::Range,
            Rule::Boolean => ValidationCode::Boolean,
            Rule::Email => ValidationCode::Email,
            Rule::Url => ValidationCode::Url,
            Rule::Uuid => ValidationCode::Uuid,
            Rule::Ip => ValidationCode::Ip,
            Rule::Date => ValidationCode::Date,
            Rule::DateTime => ValidationCode::DateTime,
            Rule::Regex { .. } => ValidationCode::Regex,
            Rule::OneOf { .. } => ValidationCode::OneOf,
        }
    }

    /// Check the rule's own arguments.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Rule::Length {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(format!("length min {min} exceeds max {max}")),
            Rule::Range {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(format!("range min {min} exceeds max {max}")),
            Rule::Regex { pattern } => compiled(pattern)
                .map(|_| ())
                .map_err(|e| format!("invalid regex {pattern:?}: {e}")),
            Rule::OneOf { values } if values.is_empty() => {
                Err("one_of rule needs at least one value".to_string())
            }
            _ => Ok(()),
        }
    }

    fn message(&self) -> String {
        match self {
            Rule::Mandatory => "is required".to_string(),
            Rule::Length { min, max } => match (min, max) {
                (Some(min), Some(max)) => format!("must be {min} to {max} characters"),
                (Some(min), None) => format!("must be at least {min} characters"),
                (None, Some(max)) => format!("must be at most {max} characters"),
                (None, None) => "has an invalid length".to_string(),
            },
            Rule::Integer => "must be an integer".to_string(),
            Rule::Numeric => "must be a number".to_string(),
            Rule::Range { min, max } => match (min, max) {
                (Some(min), Some(max)) => format!("must be between {min} and {max}"),
                (Some(min), None) => format!("must be at least {min}"),
                (None, Some(max)) => format!("must be at most {max}"),
                (None, None) => "must be a number".to_string(),
            },
            Rule::Boolean => "must be a boolean".to_string(),
            Rule::Email => "must be an email address".to_string(),
            Rule::Url => "must be a URL".to_string(),
            Rule::Uuid => "must be a UUID".to_string(),
            Rule::Ip => "must be an IP address".to_string(),
            Rule::Date => "must be a date (YYYY-MM-DD)".to_string(),
            Rule::DateTime => "must be a date and time".to_string(),
            Rule::Regex { .. } => "has an invalid format".to_string(),
            Rule::OneOf { values } => format!("must be one of: {}", values.join(", ")),
        }
    }

    fn accepts(&self, value: &str) -> bool {
        match self {
            Rule::Mandatory => !value.trim().is_empty(),
            Rule::Length { min, max } => {
                let n = value.chars().count();
                min.is_none_or(|min| n >= min) && max.is_none_or(|max| n <= max)
            }
            Rule::Integer => value.parse::<i64>().is_ok(),
            Rule::Numeric => value.parse::<f64>().is_ok_and(f64::is_finite),
            Rule::Range { min, max } => value.parse::<f64>().is_ok_and(|n| {
                n.is_finite() && min.is_none_or(|min| n >= min) && max.is_none_or(|max| n <= max)
            }),
            Rule::Boolean => is_boolean(value),
            Rule::Email => is_email(value),
            Rule::Url => is_url(value),
            Rule::Uuid => is_uuid(value),
            Rule::Ip => value.parse::<std::net::IpAddr>().is_ok(),
            Rule::Date => is_date(value),
            Rule::DateTime => is_datetime(value),
            Rule::Regex { pattern } => regex_is_match(pattern, value),
            Rule::OneOf { values } => values.iter().any(|v| v == value),
        }
    }

    /// Validate the value of `field`.
    ///
    /// Only [`Rule::Mandatory`] looks at absent or empty values; the other rules
    /// skip them. List values are checked element by element.
    pub fn validate(&self, field: &str, value: Option<&ParamValue>) -> Option<ValidationError> {
        let failed = match (self, value) {
            (Rule::Mandatory, None) => true,
            (Rule::Mandatory, Some(v)) => v.is_empty() || v.values().iter().all(|s| !self.accepts(s)),
            (_, None) => false,
            (_, Some(v)) => v
                .values()
                .iter()
                .filter(|s| !s.is_empty())
                .any(|s| !self.accepts(s)),
        };
        failed.then(|| ValidationError::new(field, self.code(), format!("{field} {}", self.message())))
    }
}

/// Runs validation rules against a parameter set.
pub trait Validator: Send + Sync {
    /// Return the failing fields.
    ///
    /// `fields` restricts validation to the given names; an empty slice
    /// validates every field that has rules.
    fn invalids(
        &self,
        rules: &IndexMap<String, Vec<Rule>>,
        params: &Params,
        fields: &[String],
    ) -> ValidationErrors;
}

/// The built-in validator: the first failing rule of each field is reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl Validator for RuleValidator {
    fn invalids(
        &self,
        rules: &IndexMap<String, Vec<Rule>>,
        params: &Params,
        fields: &[String],
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        for (field, field_rules) in rules {
            if !fields.is_empty() && !fields.iter().any(|f| f == field) {
                continue;
            }
            let value = params.get(field);
            if let Some(err) = field_rules.iter().find_map(|r| r.validate(field, value)) {
                errors.push(err);
            }
        }
        errors
    }
}
