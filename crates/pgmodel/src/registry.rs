//! Entity registry.
//!
//! The registry is built once at startup and maps entity names to their
//! definitions. Request handling only ever looks entities up by name, so an
//! unknown name is an explicit [`ModelError::NotFound`].
//!
//! ```ignore
//! let registry = EntityRegistry::load_dir("models")?
//!     .with_config(ModelConfig::new().max_limit(500));
//! let model = registry.model("item", params)?;
//! ```

use crate::config::ModelConfig;
use crate::dialect::{Dialect, Postgres};
use crate::entity::EntityDef;
use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::params::Params;
use crate::validate::{RuleValidator, Validator};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Registration entry for definitions built in code.
///
/// Submitted with [`submit_entity!`](crate::submit_entity) and collected by
/// [`EntityRegistry::from_inventory`].
pub struct EntityRegistration {
    pub build: fn() -> EntityDef,
}

inventory::collect!(EntityRegistration);

/// Register an entity definition at link time.
///
/// ```ignore
/// fn item() -> pgmodel::EntityDef {
///     pgmodel::EntityDef::new("item", "item").map("id", "id").map("name", "item_name")
/// }
/// pgmodel::submit_entity!(item);
/// ```
#[macro_export]
macro_rules! submit_entity {
    ($build:path) => {
        $crate::inventory::submit! {
            $crate::EntityRegistration { build: $build }
        }
    };
}

/// Entity definitions by name, plus the collaborators every model shares.
#[derive(Clone)]
pub struct EntityRegistry {
    entities: IndexMap<String, Arc<EntityDef>>,
    config: Arc<ModelConfig>,
    dialect: Arc<dyn Dialect>,
    validator: Arc<dyn Validator>,
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    /// An empty registry using the PostgreSQL dialect and the rule validator.
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
            config: Arc::new(ModelConfig::default()),
            dialect: Arc::new(Postgres),
            validator: Arc::new(RuleValidator),
        }
    }

    /// Load every `*.toml` file of `dir`; the file stem is the entity name.
    ///
    /// Files are read in name order. The join catalogs are checked once all
    /// files are loaded.
    pub fn load_dir(dir: impl AsRef<Path>) -> ModelResult<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ModelError::load(format!("cannot read {}: {e}", dir.display())))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ModelError::load(format!("cannot read {}: {e}", dir.display())))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            registry.load_file(&path)?;
        }
        registry.check()?;
        tracing::debug!(
            target: "pgmodel.registry",
            dir = %dir.display(),
            entities = registry.len(),
            "loaded entity definitions"
        );
        Ok(registry)
    }

    /// Load one definition file; the file stem is the entity name.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ModelResult<()> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ModelError::load(format!("bad definition file name {}", path.display())))?;
        let source = std::fs::read_to_string(path)
            .map_err(|e| ModelError::load(format!("cannot read {}: {e}", path.display())))?;
        let def = EntityDef::from_toml(name, &source).map_err(|e| match e {
            ModelError::Load(msg) => ModelError::load(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        self.register(def)
    }

    /// Build a registry from every definition submitted with
    /// [`submit_entity!`](crate::submit_entity).
    pub fn from_inventory() -> ModelResult<Self> {
        let mut registry = Self::new();
        for reg in inventory::iter::<EntityRegistration> {
            registry.register((reg.build)())?;
        }
        registry.check()?;
        Ok(registry)
    }

    /// Add a definition after checking its own invariants.
    pub fn register(&mut self, def: EntityDef) -> ModelResult<()> {
        def.check()?;
        if self.entities.contains_key(&def.name) {
            return Err(ModelError::load(format!(
                "entity '{}' is registered twice",
                def.name
            )));
        }
        self.entities.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Builder-style [`EntityRegistry::register`].
    pub fn with_entity(mut self, def: EntityDef) -> ModelResult<Self> {
        self.register(def)?;
        Ok(self)
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Arc::new(dialect);
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Check that every join catalog entry names a registered entity.
    pub fn check(&self) -> ModelResult<()> {
        for def in self.entities.values() {
            if let Some(related) = def.joins.keys().find(|j| !self.entities.contains_key(*j)) {
                return Err(ModelError::load(format!(
                    "entity '{}' joins unknown entity '{related}'",
                    def.name
                )));
            }
        }
        Ok(())
    }

    /// Look an entity up by name.
    pub fn get(&self, name: &str) -> ModelResult<Arc<EntityDef>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::not_found(format!("unknown entity '{name}'")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values().map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Instantiate `name` for one request.
    pub fn model(&self, name: &str, params: Params) -> ModelResult<Model> {
        Model::new(self.get(name)?, params, self)
    }

    pub(crate) fn shared_config(&self) -> Arc<ModelConfig> {
        Arc::clone(&self.config)
    }

    pub(crate) fn shared_dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    pub(crate) fn shared_validator(&self) -> Arc<dyn Validator> {
        Arc::clone(&self.validator)
    }
}
