//! Verb dispatch against the fixture models and a recording driver.

mod support;

use pgmodel::{EntityDef, EntityRegistry, ModelError, Outcome, Params, RawRow, Verb};
use support::{RecordingDriver, registry};

fn item_rows() -> Vec<RawRow> {
    vec![
        RawRow::new()
            .with("id", Some("1"))
            .with("item_name", Some("lamp"))
            .with("category_id", None),
        RawRow::new()
            .with("id", Some("2"))
            .with("item_name", Some("desk"))
            .with("category_id", Some("7")),
    ]
}

#[tokio::test]
async fn get_translates_predicates_and_results() {
    let driver = RecordingDriver::new().with_rows(item_rows());
    let records = registry()
        .model("item", Params::new().with("name", "foo"))
        .unwrap()
        .get(&driver)
        .await
        .unwrap();

    assert_eq!(
        driver.statements(),
        vec!["SELECT * FROM item WHERE item.item_name = 'foo' ORDER BY item.id ASC"]
    );
    assert_eq!(driver.tags(), vec![Some("item.get".to_string())]);

    assert_eq!(records.len(), 2);
    let keys: Vec<_> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name", "category"]);
    assert_eq!(records[1]["name"].as_deref(), Some("desk"));
    assert_eq!(records[0]["category"], None);
}

#[tokio::test]
async fn wildcard_value_is_a_pattern_match() {
    let driver = RecordingDriver::new();
    registry()
        .model("item", Params::new().with("name", "%foo%"))
        .unwrap()
        .get(&driver)
        .await
        .unwrap();
    assert!(driver.statements()[0].contains("WHERE item.item_name LIKE '%foo%'"));
}

#[tokio::test]
async fn put_inserts_given_fields_and_returns_identity() {
    let driver = RecordingDriver::new();
    let info = registry()
        .model("item", Params::new().with("name", "bar"))
        .unwrap()
        .put(&driver)
        .await
        .unwrap();

    assert_eq!(
        driver.statements(),
        vec!["INSERT INTO item (item_name) VALUES ('bar') RETURNING id"]
    );
    assert_eq!(info.last_insert_id.as_deref(), Some("42"));
    assert_eq!(info.affected_rows, 1);
    assert_eq!(info.driver_info, "INSERT 1");
}

#[tokio::test]
async fn post_updates_non_primary_fields() {
    let driver = RecordingDriver::new();
    let info = registry()
        .model(
            "item",
            Params::new().with("id", "5").with("price", "9.50").with("created", "now()"),
        )
        .unwrap()
        .post(&driver)
        .await
        .unwrap();

    assert_eq!(
        driver.statements(),
        vec!["UPDATE item SET price = '9.50', created_at = now() WHERE item.id = '5'"]
    );
    assert_eq!(info.affected_rows, 1);
    assert_eq!(info.last_insert_id, None);
}

#[tokio::test]
async fn delete_without_required_field_never_reaches_driver() {
    let driver = RecordingDriver::new();
    let err = registry()
        .model("item", Params::new().with("name", "bar"))
        .unwrap()
        .delete(&driver)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(err.offending_fields(), vec!["id"]);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn invalid_field_never_reaches_driver() {
    let driver = RecordingDriver::new();
    let err = registry()
        .model("item", Params::new().with("name", "x").with("price", "-3"))
        .unwrap()
        .put(&driver)
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::Invalid(_)));
    assert_eq!(err.offending_fields(), vec!["name", "price"]);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn disabled_verb_is_not_implemented() {
    let driver = RecordingDriver::new();
    let err = registry()
        .model("category", Params::new().with("title", "Books"))
        .unwrap()
        .put(&driver)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 501);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn joined_field_filters_without_touching_base_mapping() {
    let registry = registry();
    let driver = RecordingDriver::new();
    let model = registry
        .model(
            "item",
            Params::new().with("xjoin", "category").with("category_title", "Books"),
        )
        .unwrap();

    let mapping = model.combined_mapping();
    assert_eq!(mapping["category_id"], "category.id");
    assert_eq!(mapping["category_title"], "category.title");
    assert_eq!(mapping["category"], "item.category_id");
    assert!(!model.def().mapping.contains_key("category_title"));

    model.get(&driver).await.unwrap();
    assert_eq!(
        driver.statements(),
        vec![
            "SELECT item.*, category.id AS \"category_id\", category.title AS \"category_title\" \
             FROM item LEFT JOIN category ON item.category_id = category.id \
             WHERE category.title = 'Books' ORDER BY item.id ASC"
        ]
    );
    assert_eq!(registry.get("item").unwrap().mapping.len(), 6);
}

#[tokio::test]
async fn foreign_values_are_addressed_by_related_field() {
    let model = registry()
        .model(
            "item",
            Params::new()
                .with("xjoin", "category")
                .with("category_title", "Books")
                .with("name", "lamp"),
        )
        .unwrap();

    let values = model.foreign_values(None).unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values["title"].as_scalar(), Some("Books"));

    let err = model.foreign_values(Some(&["tag"][..])).unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn count_reads_the_first_column() {
    let driver = RecordingDriver::new().with_rows(item_rows());
    let count = registry()
        .model("item", Params::new().with("xlimit", "1"))
        .unwrap()
        .count(&driver)
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(driver.statements(), vec!["SELECT COUNT(*) FROM item"]);
}

#[tokio::test]
async fn markup_is_stripped_unless_allowed() {
    let driver = RecordingDriver::new();
    registry()
        .model(
            "item",
            Params::new()
                .with("name", "<b>lamp</b>")
                .with("description", "<p>bright</p>"),
        )
        .unwrap()
        .put(&driver)
        .await
        .unwrap();

    assert_eq!(
        driver.statements(),
        vec![
            "INSERT INTO item (item_name, description) VALUES ('lamp', '<p>bright</p>') RETURNING id"
        ]
    );
}

#[tokio::test]
async fn dispatch_wraps_each_verb() {
    let driver = RecordingDriver::new().with_rows(item_rows());
    let registry = registry();

    let outcome = registry
        .model("item", Params::new())
        .unwrap()
        .dispatch(Verb::Count, &driver)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Count(2));
    assert_eq!(serde_json::to_value(&outcome).unwrap(), serde_json::json!(2));

    let method = Verb::from_http_method("delete").unwrap();
    let outcome = registry
        .model("item", Params::new().with("id", "1"))
        .unwrap()
        .dispatch(method, &driver)
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Write(ref info) if info.driver_info == "DELETE 1"));

    assert!(Verb::from_http_method("PATCH").unwrap_err().status_code() == 405);
}

#[test]
fn unknown_entity_and_bad_selectors_are_client_errors() {
    let registry = registry();
    assert_eq!(
        registry.model("ghost", Params::new()).unwrap_err().status_code(),
        404
    );
    for (key, value) in [
        ("xjoin", "warehouse"),
        ("xorder", "sideways"),
        ("xlimit", "-1"),
        ("xreturn", "id; DROP TABLE item"),
    ] {
        let err = registry
            .model("item", Params::new().with(key, value))
            .unwrap_err();
        assert_eq!(err.status_code(), 400, "{key}={value}");
    }
}

#[tokio::test]
async fn joined_rows_keep_base_and_prefixed_columns_apart() {
    let driver = RecordingDriver::new().with_rows(vec![
        RawRow::new()
            .with("id", Some("2"))
            .with("item_name", Some("desk"))
            .with("category_id", Some("7"))
            .with("category_id", Some("7"))
            .with("category_title", Some("Books")),
    ]);
    let records = registry()
        .model("item", Params::new().with("xjoin", "category"))
        .unwrap()
        .get(&driver)
        .await
        .unwrap();

    let keys: Vec<_> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name", "category", "category_id", "category_title"]);
    assert_eq!(records[0]["category_title"].as_deref(), Some("Books"));
}

fn doc_registry() -> EntityRegistry {
    EntityRegistry::new()
        .with_entity(
            EntityDef::new("doc", "doc")
                .map("id", "id")
                .map("title", "name")
                .map("name", "label"),
        )
        .unwrap()
}

#[tokio::test]
async fn projected_alias_is_not_mapped_twice() {
    let driver = RecordingDriver::new().with_rows(vec![RawRow::new().with("name", Some("L"))]);
    let records = doc_registry()
        .model("doc", Params::new().with("xreturn", "name"))
        .unwrap()
        .get(&driver)
        .await
        .unwrap();

    assert_eq!(driver.statements(), vec!["SELECT label AS \"name\" FROM doc"]);
    let keys: Vec<_> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name"]);
    assert_eq!(records[0]["name"].as_deref(), Some("L"));
}

#[tokio::test]
async fn star_columns_are_mapped_back() {
    let driver = RecordingDriver::new().with_rows(vec![
        RawRow::new()
            .with("id", Some("1"))
            .with("name", Some("Intro"))
            .with("label", Some("L")),
    ]);
    let records = doc_registry()
        .model("doc", Params::new())
        .unwrap()
        .get(&driver)
        .await
        .unwrap();

    assert_eq!(driver.statements(), vec!["SELECT * FROM doc"]);
    assert_eq!(records[0]["title"].as_deref(), Some("Intro"));
    assert_eq!(records[0]["name"].as_deref(), Some("L"));
}
