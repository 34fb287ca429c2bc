//! Request-shaping configuration shared by every model built from a registry.

use serde::Deserialize;

/// Names of the parameters that override the query shape of a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReservedKeys {
    /// Join selector (related entity names).
    pub join: String,
    /// Sort field(s).
    pub order_by: String,
    /// Sort direction (`ASC` or `DESC`).
    pub order: String,
    /// Group-by field(s).
    pub group_by: String,
    /// Result projection field(s).
    pub fields: String,
    /// Maximum number of rows.
    pub limit: String,
    /// Number of rows to skip.
    pub offset: String,
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self {
            join: "xjoin".to_string(),
            order_by: "xorder_by".to_string(),
            order: "xorder".to_string(),
            group_by: "xgroup_by".to_string(),
            fields: "xreturn".to_string(),
            limit: "xlimit".to_string(),
            offset: "xoffset".to_string(),
        }
    }
}

impl ReservedKeys {
    /// Whether `key` is one of the reserved names.
    pub fn contains(&self, key: &str) -> bool {
        [
            &self.join,
            &self.order_by,
            &self.order,
            &self.group_by,
            &self.fields,
            &self.limit,
            &self.offset,
        ]
        .iter()
        .any(|k| k.as_str() == key)
    }
}

/// Configuration for models.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Reserved override parameter names.
    pub reserved: ReservedKeys,
    /// Use `ILIKE` instead of `LIKE` for wildcard filters.
    pub case_insensitive_like: bool,
    /// Upper bound applied to any requested or declared limit.
    pub max_limit: Option<u64>,
    /// Strip markup from mapped parameter values.
    pub strip_tags: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            reserved: ReservedKeys::default(),
            case_insensitive_like: false,
            max_limit: None,
            strip_tags: true,
        }
    }
}

impl ModelConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the reserved parameter names.
    pub fn reserved(mut self, reserved: ReservedKeys) -> Self {
        self.reserved = reserved;
        self
    }

    /// Use `ILIKE` for wildcard filters.
    pub fn case_insensitive_like(mut self, enabled: bool) -> Self {
        self.case_insensitive_like = enabled;
        self
    }

    /// Cap the number of rows any request may fetch.
    pub fn max_limit(mut self, limit: u64) -> Self {
        self.max_limit = Some(limit);
        self
    }

    /// Enable or disable markup stripping.
    pub fn strip_tags(mut self, enabled: bool) -> Self {
        self.strip_tags = enabled;
        self
    }

    pub(crate) fn like_operator(&self) -> &'static str {
        if self.case_insensitive_like { "ILIKE" } else { "LIKE" }
    }
}
