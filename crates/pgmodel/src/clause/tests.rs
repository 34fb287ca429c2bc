//! Statement tests for the clause builder.

use crate::config::ModelConfig;
use crate::entity::{EntityDef, QueryDefaults};
use crate::error::ModelError;
use crate::model::Model;
use crate::params::Params;
use crate::registry::EntityRegistry;

fn item() -> EntityDef {
    EntityDef::new("item", "item")
        .map("id", "id")
        .map("name", "item_name")
        .map("created", "created_at")
        .map("category", "category_id")
        .constants(&["created"])
        .join("category", "LEFT JOIN category ON item.category_id = category.id")
}

fn category() -> EntityDef {
    EntityDef::new("category", "category")
        .map("id", "id")
        .map("title", "title")
}

fn registry() -> EntityRegistry {
    EntityRegistry::new()
        .with_entity(item())
        .unwrap()
        .with_entity(category())
        .unwrap()
}

fn model(params: Params) -> Model {
    registry().model("item", params).unwrap()
}

#[test]
fn test_select_basic() {
    let m = model(Params::new());
    assert_eq!(m.clauses().select_sql().unwrap(), "SELECT * FROM item");
}

#[test]
fn test_select_with_equality_predicate() {
    let m = model(Params::new().with("name", "foo"));
    assert_eq!(
        m.clauses().select_sql().unwrap(),
        "SELECT * FROM item WHERE item_name = 'foo'"
    );
}

#[test]
fn test_wildcard_is_pattern_match() {
    let m = model(Params::new().with("name", "%foo%"));
    assert_eq!(m.clauses().where_clause(false).unwrap(), "item_name LIKE '%foo%'");

    let m = registry()
        .with_config(ModelConfig::new().case_insensitive_like(true))
        .model("item", Params::new().with("name", "%foo%"))
        .unwrap();
    assert_eq!(m.clauses().where_clause(false).unwrap(), "item_name ILIKE '%foo%'");
}

#[test]
fn test_list_values_render_in() {
    let m = model(Params::new().with("id", vec!["1", "2"]));
    assert_eq!(m.clauses().where_clause(false).unwrap(), "id IN ('1', '2')");

    let m = model(Params::new().with("id", Vec::<String>::new()));
    assert_eq!(m.clauses().where_clause(false).unwrap(), "1=0");
}

#[test]
fn test_predicates_follow_mapping_order() {
    let m = model(Params::new().with("name", "foo").with("id", "7"));
    assert_eq!(
        m.clauses().where_clause(false).unwrap(),
        "id = '7' AND item_name = 'foo'"
    );
    assert_eq!(m.clauses().where_clause(true).unwrap(), "id = '7'");
}

#[test]
fn test_unmapped_and_reserved_keys_are_ignored() {
    let m = model(
        Params::new()
            .with("unknown", "x")
            .with("xlimit", "5")
            .with("name", "foo"),
    );
    assert_eq!(m.clauses().where_clause(false).unwrap(), "item_name = 'foo'");
}

#[test]
fn test_escape_quotes_injection_attempts() {
    let m = model(Params::new().with("name", "x' OR '1'='1"));
    assert_eq!(
        m.clauses().where_clause(false).unwrap(),
        "item_name = 'x'' OR ''1''=''1'"
    );
}

#[test]
fn test_escape_constant_dual_path() {
    let m = model(Params::new());
    let c = m.clauses();
    assert_eq!(c.escape("now()", Some("created")), "now()");
    assert_eq!(c.escape("CURRENT_TIMESTAMP", Some("created")), "CURRENT_TIMESTAMP");
    // name is not listed in constants
    assert_eq!(c.escape("CURRENT_TIMESTAMP", Some("name")), "'CURRENT_TIMESTAMP'");
    assert_eq!(c.escape("now()", None), "'now()'");
    assert_eq!(c.escape("now(); DROP TABLE item", Some("created")), "'now(); DROP TABLE item'");
}

#[test]
fn test_null_constant_is_null_test() {
    let m = model(Params::new().with("created", "null"));
    assert_eq!(m.clauses().where_clause(false).unwrap(), "created_at IS NULL");

    let m = model(Params::new().with("created", "CURRENT_DATE"));
    assert_eq!(m.clauses().where_clause(false).unwrap(), "created_at = CURRENT_DATE");
}

#[test]
fn test_join_adds_clause_and_prefixed_columns() {
    let m = model(Params::new().with("xjoin", "category").with("category_title", "Books"));
    assert_eq!(
        m.clauses().select_sql().unwrap(),
        "SELECT item.*, category.id AS \"category_id\", category.title AS \"category_title\" \
         FROM item LEFT JOIN category ON item.category_id = category.id \
         WHERE category.title = 'Books'"
    );
}

#[test]
fn test_base_field_shadows_prefixed_join_field() {
    let registry = EntityRegistry::new()
        .with_entity(item().map("category_title", "label"))
        .unwrap()
        .with_entity(category())
        .unwrap();
    let m = registry
        .model(
            "item",
            Params::new().with("xjoin", "category").with("category_title", "Books"),
        )
        .unwrap();

    assert_eq!(m.combined_mapping()["category_title"], "label");
    assert_eq!(m.clauses().where_clause(false).unwrap(), "label = 'Books'");
    let select = m.clauses().select_clause().unwrap();
    assert!(!select.contains("category.title"), "{select}");
    assert!(select.contains("category.id AS \"category_id\""), "{select}");
}

#[test]
fn test_projection_uses_external_aliases() {
    let m = model(Params::new().with("xreturn", "id,name"));
    assert_eq!(
        m.clauses().select_sql().unwrap(),
        "SELECT id, item_name AS \"name\" FROM item"
    );
}

#[test]
fn test_order_group_and_limit() {
    let m = model(
        Params::new()
            .with("xorder_by", "name,id")
            .with("xorder", "desc")
            .with("xlimit", "10")
            .with("xoffset", "20"),
    );
    assert_eq!(
        m.clauses().select_sql().unwrap(),
        "SELECT * FROM item ORDER BY item_name DESC, id DESC LIMIT 10 OFFSET 20"
    );

    let m = model(Params::new().with("xgroup_by", "category").with("xreturn", "category"));
    assert_eq!(
        m.clauses().select_sql().unwrap(),
        "SELECT category_id AS \"category\" FROM item GROUP BY category_id"
    );
}

#[test]
fn test_unmapped_selector_must_be_identifier() {
    let m = model(Params::new().with("xorder_by", "rank"));
    assert_eq!(m.clauses().order_clause().unwrap(), "rank");

    let err = registry()
        .model("item", Params::new().with("xorder_by", "rank desc, 1"))
        .unwrap_err();
    assert!(matches!(err, ModelError::BadRequest(_)));
}

#[test]
fn test_count_plain_and_grouped() {
    let m = model(Params::new().with("name", "foo"));
    assert_eq!(
        m.clauses().count_sql().unwrap(),
        "SELECT COUNT(*) FROM item WHERE item_name = 'foo'"
    );

    let m = model(Params::new().with("xgroup_by", "category"));
    assert_eq!(
        m.clauses().count_sql().unwrap(),
        "SELECT COUNT(*) FROM (SELECT 1 FROM item GROUP BY category_id) AS t"
    );
}

#[test]
fn test_count_ignores_limit_and_order() {
    let m = model(Params::new().with("xlimit", "1").with("xorder_by", "id"));
    assert_eq!(m.clauses().count_sql().unwrap(), "SELECT COUNT(*) FROM item");
}

#[test]
fn test_insert_keeps_given_fields_only() {
    let m = model(Params::new().with("name", "bar"));
    assert_eq!(
        m.clauses().insert_sql().unwrap(),
        "INSERT INTO item (item_name) VALUES ('bar') RETURNING id"
    );

    let m = model(Params::new().with("name", "bar").with("created", "now()"));
    assert_eq!(
        m.clauses().insert_sql().unwrap(),
        "INSERT INTO item (item_name, created_at) VALUES ('bar', now()) RETURNING id"
    );
}

#[test]
fn test_insert_without_values_uses_defaults() {
    let m = model(Params::new().with("xjoin", "category"));
    assert_eq!(
        m.clauses().insert_sql().unwrap(),
        "INSERT INTO item DEFAULT VALUES RETURNING id"
    );
}

#[test]
fn test_update_excludes_primary_from_set() {
    let m = model(Params::new().with("id", "3").with("name", "baz"));
    assert_eq!(
        m.clauses().update_sql().unwrap(),
        "UPDATE item SET item_name = 'baz' WHERE id = '3'"
    );
}

#[test]
fn test_update_requires_primary_and_set() {
    let m = model(Params::new().with("name", "baz"));
    assert!(matches!(m.clauses().update_sql(), Err(ModelError::BadRequest(_))));

    let m = model(Params::new().with("id", "3"));
    assert!(matches!(m.clauses().update_sql(), Err(ModelError::BadRequest(_))));
}

#[test]
fn test_delete_requires_primary() {
    let m = model(Params::new().with("id", "3").with("name", "ignored"));
    assert_eq!(m.clauses().delete_sql().unwrap(), "DELETE FROM item WHERE id = '3'");

    let m = model(Params::new().with("name", "only"));
    let err = m.clauses().delete_sql().unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn test_identity_predicate_compares_wildcards_literally() {
    let m = model(Params::new().with("id", "%"));
    assert_eq!(m.clauses().delete_sql().unwrap(), "DELETE FROM item WHERE id = '%'");

    let m = model(Params::new().with("id", "1%").with("name", "%lamp%"));
    assert_eq!(
        m.clauses().update_sql().unwrap(),
        "UPDATE item SET item_name = '%lamp%' WHERE id = '1%'"
    );
    assert_eq!(
        m.clauses().where_clause(false).unwrap(),
        "id LIKE '1%' AND item_name LIKE '%lamp%'"
    );
}

#[test]
fn test_qualified_physical_columns_are_unqualified_in_writes() {
    let def = EntityDef::new("note", "note, author")
        .map("id", "note.id")
        .map("text", "note.body")
        .defaults(QueryDefaults {
            limit: Some(50),
            ..QueryDefaults::default()
        });
    let registry = EntityRegistry::new().with_entity(def).unwrap();

    let m = registry
        .model("note", Params::new().with("id", "1").with("text", "hi"))
        .unwrap();
    assert_eq!(
        m.clauses().update_sql().unwrap(),
        "UPDATE note SET body = 'hi' WHERE note.id = '1'"
    );
    assert_eq!(
        m.clauses().select_sql().unwrap(),
        "SELECT * FROM note, author WHERE note.id = '1' AND note.body = 'hi' LIMIT 50"
    );
}
