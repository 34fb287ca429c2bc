//! Join resolution.
//!
//! A request activates joins from the entity's catalog. Every field of an
//! active related entity is addressable as `{related}_{field}`, so a single
//! flat parameter set can filter and project across tables.

use crate::entity::EntityDef;
use crate::error::{ModelError, ModelResult};
use crate::params::{ParamValue, Params};
use crate::registry::EntityRegistry;
use indexmap::IndexMap;
use std::sync::Arc;

/// An active join.
#[derive(Debug, Clone)]
pub struct Related {
    /// Catalog key, also the prefix of the synthesized field names.
    pub name: String,
    /// Join clause template from the catalog.
    pub clause: String,
    pub def: Arc<EntityDef>,
}

impl Related {
    /// Qualify a physical column with the related main table.
    fn qualify(&self, physical: &str) -> String {
        if physical.contains('.') {
            physical.to_string()
        } else {
            format!("{}.{physical}", self.def.maintable())
        }
    }
}

/// The joins active for one request.
#[derive(Debug, Clone)]
pub struct JoinResolver {
    base: Arc<EntityDef>,
    active: Vec<Related>,
}

impl JoinResolver {
    /// Resolve the join selector against the catalog of `base`.
    ///
    /// Without a selector the entity's default joins apply. Selected names
    /// must be catalog keys (400); their entities must be registered (404).
    /// Active joins keep catalog order whatever the selector order.
    pub fn resolve(
        base: Arc<EntityDef>,
        selector: Option<&[String]>,
        registry: &EntityRegistry,
    ) -> ModelResult<Self> {
        let requested = selector.unwrap_or(&base.defaults.join);
        if let Some(unknown) = requested.iter().find(|n| !base.joins.contains_key(n.as_str())) {
            return Err(ModelError::bad_request(format!(
                "entity '{}' cannot join '{unknown}'",
                base.name
            )));
        }

        let mut active = Vec::new();
        for (name, clause) in &base.joins {
            if requested.iter().any(|r| r == name) {
                active.push(Related {
                    name: name.clone(),
                    clause: clause.clone(),
                    def: registry.get(name)?,
                });
            }
        }
        Ok(Self { base, active })
    }

    /// Names of the active joins, in catalog order.
    pub fn active_joins(&self) -> Vec<&str> {
        self.active.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn active(&self) -> &[Related] {
        &self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Mapping of the synthesized `{related}_{field}` names only.
    ///
    /// On a textual collision the first declared entry wins.
    pub fn foreign_mapping(&self) -> IndexMap<String, String> {
        let mut mapping = IndexMap::new();
        for related in &self.active {
            for (field, physical) in &related.def.mapping {
                mapping
                    .entry(format!("{}_{field}", related.name))
                    .or_insert_with(|| related.qualify(physical));
            }
        }
        mapping
    }

    /// Base mapping followed by the foreign mapping.
    ///
    /// A base field always wins over a synthesized name that spells the same.
    pub fn combined_mapping(&self) -> IndexMap<String, String> {
        let mut mapping = self.base.mapping.clone();
        for (field, physical) in self.foreign_mapping() {
            mapping.entry(field).or_insert(physical);
        }
        mapping
    }

    /// Values addressed to related entities, keyed by the related entity's
    /// own field names.
    ///
    /// `names` restricts the relations considered and defaults to every
    /// active join. A catalog relation that is not active contributes
    /// nothing; a name outside the catalog is rejected.
    pub fn foreign_values(
        &self,
        params: &Params,
        names: Option<&[&str]>,
    ) -> ModelResult<IndexMap<String, ParamValue>> {
        if let Some(unknown) = names
            .unwrap_or_default()
            .iter()
            .find(|n| !self.base.joins.contains_key(**n))
        {
            return Err(ModelError::bad_request(format!(
                "entity '{}' cannot join '{unknown}'",
                self.base.name
            )));
        }

        let mut values = IndexMap::new();
        for related in &self.active {
            if names.is_some_and(|names| !names.contains(&related.name.as_str())) {
                continue;
            }
            for field in related.def.mapping.keys() {
                if let Some(value) = params.get(&format!("{}_{field}", related.name)) {
                    values.entry(field.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EntityRegistry {
        EntityRegistry::new()
            .with_entity(
                EntityDef::new("item", "item")
                    .map("id", "id")
                    .map("name", "item_name")
                    .join("category", "LEFT JOIN category ON item.category_id = category.id")
                    .join("author", "LEFT JOIN person ON item.author_id = person.id"),
            )
            .and_then(|r| {
                r.with_entity(
                    EntityDef::new("category", "category")
                        .map("id", "id")
                        .map("title", "title"),
                )
            })
            .and_then(|r| {
                r.with_entity(
                    EntityDef::new("author", "person")
                        .map("id", "id")
                        .map("name", "full_name"),
                )
            })
            .unwrap()
    }

    fn resolve(selector: Option<&[&str]>) -> ModelResult<JoinResolver> {
        let registry = registry();
        let selector: Option<Vec<String>> =
            selector.map(|s| s.iter().map(|n| n.to_string()).collect());
        JoinResolver::resolve(registry.get("item")?, selector.as_deref(), &registry)
    }

    #[test]
    fn combined_mapping_prefixes_related_fields() {
        let joins = resolve(Some(&["category"])).unwrap();
        let mapping = joins.combined_mapping();
        assert_eq!(mapping["category_id"], "category.id");
        assert_eq!(mapping["category_title"], "category.title");
        assert_eq!(mapping["name"], "item_name");
        let keys: Vec<_> = mapping.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name", "category_id", "category_title"]);
    }

    #[test]
    fn related_columns_use_related_main_table() {
        let joins = resolve(Some(&["author"])).unwrap();
        assert_eq!(joins.combined_mapping()["author_name"], "person.full_name");
    }

    #[test]
    fn active_joins_follow_catalog_order() {
        let joins = resolve(Some(&["author", "category"])).unwrap();
        assert_eq!(joins.active_joins(), vec!["category", "author"]);
        let mapping = joins.combined_mapping();
        assert_eq!(mapping.len(), 2 + 2 + 2);
    }

    #[test]
    fn no_selector_uses_defaults() {
        let joins = resolve(None).unwrap();
        assert!(joins.is_empty());
        assert_eq!(joins.combined_mapping().len(), 2);
    }

    #[test]
    fn unknown_join_is_a_bad_request() {
        let err = resolve(Some(&["tag"])).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn foreign_values_strip_the_prefix() {
        let joins = resolve(Some(&["category", "author"])).unwrap();
        let params = Params::new()
            .with("name", "foo")
            .with("category_title", "Books")
            .with("author_name", "Ann");

        let all = joins.foreign_values(&params, None).unwrap();
        assert_eq!(all.get("title"), Some(&ParamValue::from("Books")));
        assert_eq!(all.get("name"), Some(&ParamValue::from("Ann")));

        let only = joins.foreign_values(&params, Some(&["category"])).unwrap();
        assert_eq!(only.len(), 1);

        assert!(joins.foreign_values(&params, Some(&["tag"])).is_err());
    }

    #[test]
    fn first_declared_join_wins_a_prefixed_collision() {
        // `a` + `b_c` and `a_b` + `c` both spell `a_b_c`
        let registry = EntityRegistry::new()
            .with_entity(
                EntityDef::new("root", "root")
                    .map("id", "id")
                    .map("a_id", "a_ref")
                    .join("a", "LEFT JOIN ta ON root.a_ref = ta.id")
                    .join("a_b", "LEFT JOIN tab ON root.id = tab.root_id"),
            )
            .and_then(|r| r.with_entity(EntityDef::new("a", "ta").map("id", "id").map("b_c", "bc")))
            .and_then(|r| r.with_entity(EntityDef::new("a_b", "tab").map("id", "id").map("c", "c")))
            .unwrap();
        let selector = vec!["a_b".to_string(), "a".to_string()];
        let joins =
            JoinResolver::resolve(registry.get("root").unwrap(), Some(selector.as_slice()), &registry)
                .unwrap();

        assert_eq!(joins.active_joins(), vec!["a", "a_b"]);
        let foreign = joins.foreign_mapping();
        assert_eq!(foreign["a_b_c"], "ta.bc");
        assert_eq!(foreign["a_id"], "ta.id");

        let combined = joins.combined_mapping();
        assert_eq!(combined["a_b_c"], "ta.bc");
        assert_eq!(combined["a_b_id"], "tab.id");
        assert_eq!(combined["a_id"], "a_ref");
    }
}
