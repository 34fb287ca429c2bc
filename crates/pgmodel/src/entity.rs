//! Entity definitions.
//!
//! An [`EntityDef`] describes one modeled table: how external field names map
//! to physical columns, which fields identify a row, how values are validated
//! and which related entities can be joined in. Definitions are immutable once
//! loaded; everything request-specific lives in [`Model`](crate::Model).
//!
//! Definitions are usually written in TOML, one file per entity:
//!
//! ```toml
//! table = "item"
//! primary = ["id"]
//! constants = ["created"]
//! verbs = ["get", "put", "post", "delete", "count"]
//!
//! [mapping]
//! id = "id"
//! name = "item_name"
//! category_id = "category_id"
//! created = "created_at"
//!
//! [validation]
//! name = ["mandatory", { rule = "length", min = 2, max = 50 }]
//!
//! [required]
//! put = ["name"]
//! delete = ["id"]
//!
//! [joins]
//! category = "LEFT JOIN category ON item.category_id = category.id"
//!
//! [defaults]
//! order_by = ["name"]
//! order = "ASC"
//! ```

use crate::error::{ModelError, ModelResult};
use crate::validate::Rule;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five operations a model can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// SELECT
    Get,
    /// UPDATE
    Post,
    /// INSERT
    Put,
    /// DELETE
    Delete,
    /// SELECT COUNT(*)
    Count,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete, Verb::Count];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
            Verb::Count => "count",
        }
    }

    /// Map an HTTP request method onto a verb.
    ///
    /// `GET`, `POST`, `PUT` and `DELETE` map to the verb of the same name;
    /// anything else is [`ModelError::MethodNotAllowed`].
    pub fn from_http_method(method: &str) -> ModelResult<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            other => Err(ModelError::MethodNotAllowed(other.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::bad_request(format!("unknown verb '{s}'")))
    }
}

/// Fields that must be present for each verb.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequiredFields {
    pub get: Vec<String>,
    pub post: Vec<String>,
    pub put: Vec<String>,
    pub delete: Vec<String>,
    pub count: Vec<String>,
}

impl RequiredFields {
    pub fn for_verb(&self, verb: Verb) -> &[String] {
        match verb {
            Verb::Get => &self.get,
            Verb::Post => &self.post,
            Verb::Put => &self.put,
            Verb::Delete => &self.delete,
            Verb::Count => &self.count,
        }
    }

    fn for_verb_mut(&mut self, verb: Verb) -> &mut Vec<String> {
        match verb {
            Verb::Get => &mut self.get,
            Verb::Post => &mut self.post,
            Verb::Put => &mut self.put,
            Verb::Delete => &mut self.delete,
            Verb::Count => &mut self.count,
        }
    }
}

/// Query shape used when a request does not override it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryDefaults {
    /// Joins active by default.
    pub join: Vec<String>,
    /// Sort fields; empty means no explicit ordering.
    pub order_by: Vec<String>,
    /// Sort direction.
    pub order: Option<String>,
    /// Group-by fields.
    pub group_by: Vec<String>,
    /// Projection; `["*"]` selects everything.
    #[serde(rename = "return")]
    pub fields: Vec<String>,
    /// Row limit.
    pub limit: Option<u64>,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            join: Vec::new(),
            order_by: Vec::new(),
            order: None,
            group_by: Vec::new(),
            fields: vec!["*".to_string()],
            limit: None,
        }
    }
}

fn default_primary() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_verbs() -> Vec<Verb> {
    Verb::ALL.to_vec()
}

/// The definition of one modeled table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDef {
    /// Entity name; taken from the file stem when loading from a directory.
    #[serde(default)]
    pub name: String,
    /// Backing table. A comma-separated list names the main table first.
    pub table: String,
    /// External field name to physical column reference, in declaration order.
    pub mapping: IndexMap<String, String>,
    /// External names of the identity fields.
    #[serde(default = "default_primary")]
    pub primary: Vec<String>,
    /// Fields allowed to carry SQL constants. Empty means every field.
    #[serde(default)]
    pub constants: Vec<String>,
    /// Validation rules per external field.
    #[serde(default)]
    pub validation: IndexMap<String, Vec<Rule>>,
    /// Fields required per verb.
    #[serde(default)]
    pub required: RequiredFields,
    /// Related entity name to join clause.
    #[serde(default)]
    pub joins: IndexMap<String, String>,
    /// Fields whose values keep their markup.
    #[serde(default)]
    pub allow_html: Vec<String>,
    /// Enabled verbs; the others answer "not implemented".
    #[serde(default = "default_verbs")]
    pub verbs: Vec<Verb>,
    #[serde(default)]
    pub defaults: QueryDefaults,
}

impl EntityDef {
    /// Start a definition in code.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            mapping: IndexMap::new(),
            primary: default_primary(),
            constants: Vec::new(),
            validation: IndexMap::new(),
            required: RequiredFields::default(),
            joins: IndexMap::new(),
            allow_html: Vec::new(),
            verbs: default_verbs(),
            defaults: QueryDefaults::default(),
        }
    }

    /// Parse a TOML definition and check it.
    pub fn from_toml(name: impl Into<String>, source: &str) -> ModelResult<Self> {
        let mut def: EntityDef = toml::from_str(source)?;
        let name = name.into();
        if def.name.is_empty() {
            def.name = name;
        } else if def.name != name {
            return Err(ModelError::load(format!(
                "definition declares name '{}' but is loaded as '{name}'",
                def.name
            )));
        }
        def.check()?;
        Ok(def)
    }

    /// Map an external field to a physical column reference.
    pub fn map(mut self, external: impl Into<String>, physical: impl Into<String>) -> Self {
        self.mapping.insert(external.into(), physical.into());
        self
    }

    pub fn primary(mut self, fields: &[&str]) -> Self {
        self.primary = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn constants(mut self, fields: &[&str]) -> Self {
        self.constants = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.validation.entry(field.into()).or_default().push(rule);
        self
    }

    pub fn require(mut self, verb: Verb, fields: &[&str]) -> Self {
        self.required
            .for_verb_mut(verb)
            .extend(fields.iter().map(|s| s.to_string()));
        self
    }

    /// Add a join catalog entry.
    pub fn join(mut self, related: impl Into<String>, clause: impl Into<String>) -> Self {
        self.joins.insert(related.into(), clause.into());
        self
    }

    pub fn allow_html(mut self, fields: &[&str]) -> Self {
        self.allow_html = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn verbs(mut self, verbs: &[Verb]) -> Self {
        self.verbs = verbs.to_vec();
        self
    }

    pub fn defaults(mut self, defaults: QueryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// The main table: first entry of [`EntityDef::table`].
    pub fn maintable(&self) -> &str {
        self.table.split(',').next().unwrap_or_default().trim()
    }

    pub fn is_primary(&self, field: &str) -> bool {
        self.primary.iter().any(|p| p == field)
    }

    pub fn supports(&self, verb: Verb) -> bool {
        self.verbs.contains(&verb)
    }

    /// Whether `field` may carry an unquoted SQL constant.
    pub fn accepts_constant(&self, field: &str) -> bool {
        self.constants.is_empty() || self.constants.iter().any(|c| c == field)
    }

    pub fn allows_html(&self, field: &str) -> bool {
        self.allow_html.iter().any(|f| f == field)
    }

    /// Whether `field` names a base field or a prefixed field of a catalog join.
    fn knows_field(&self, field: &str) -> bool {
        self.mapping.contains_key(field)
            || self.joins.keys().any(|j| {
                field
                    .strip_prefix(j.as_str())
                    .is_some_and(|rest| rest.len() > 1 && rest.starts_with('_'))
            })
    }

    /// Check the definition invariants.
    pub fn check(&self) -> ModelResult<()> {
        let fail = |msg: String| Err(ModelError::load(format!("entity '{}': {msg}", self.name)));

        if self.name.trim().is_empty() {
            return Err(ModelError::load("entity name must not be empty"));
        }
        if self.maintable().is_empty() {
            return fail("table must not be empty".into());
        }
        if self.mapping.is_empty() {
            return fail("mapping must declare at least one field".into());
        }
        if let Some((field, _)) = self.mapping.iter().find(|(_, p)| p.trim().is_empty()) {
            return fail(format!("field '{field}' maps to an empty column"));
        }
        if self.primary.is_empty() {
            return fail("primary must name at least one field".into());
        }
        for (what, fields) in [
            ("primary", &self.primary),
            ("constants", &self.constants),
            ("allow_html", &self.allow_html),
        ] {
            if let Some(field) = fields.iter().find(|f| !self.mapping.contains_key(f.as_str())) {
                return fail(format!("{what} field '{field}' is not mapped"));
            }
        }
        for verb in Verb::ALL {
            if let Some(field) = self
                .required
                .for_verb(verb)
                .iter()
                .find(|f| !self.knows_field(f))
            {
                return fail(format!("required field '{field}' for {verb} is unknown"));
            }
        }
        if let Some(field) = self.validation.keys().find(|f| !self.knows_field(f)) {
            return fail(format!("validation field '{field}' is unknown"));
        }
        for rules in self.validation.values() {
            for rule in rules {
                rule.check().map_err(|e| {
                    ModelError::load(format!("entity '{}': {e}", self.name))
                })?;
            }
        }
        if let Some(join) = self
            .defaults
            .join
            .iter()
            .find(|j| !self.joins.contains_key(j.as_str()))
        {
            return fail(format!("default join '{join}' is not in the join catalog"));
        }
        if let Some(order) = &self.defaults.order {
            if !order.eq_ignore_ascii_case("ASC") && !order.eq_ignore_ascii_case("DESC") {
                return fail(format!("default order '{order}' must be ASC or DESC"));
            }
        }
        Ok(())
    }
}
