mod support;

use pgmodel::{EntityDef, EntityRegistry, ModelError, Params, Rule, Verb};
use std::fs;

fn tag() -> EntityDef {
    EntityDef::new("tag", "tag")
        .map("id", "id")
        .map("label", "label")
        .rule("label", Rule::Mandatory)
}

pgmodel::submit_entity!(tag);

#[test]
fn fixture_directory_loads_in_name_order() {
    let registry = support::registry();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["category", "item"]);

    let item = registry.get("item").unwrap();
    assert_eq!(item.maintable(), "item");
    assert_eq!(item.primary, vec!["id"]);
    assert_eq!(item.required.for_verb(Verb::Delete), ["id".to_string()]);
    assert!(item.accepts_constant("created"));
    assert!(!item.accepts_constant("name"));

    let category = registry.get("category").unwrap();
    assert!(category.supports(Verb::Get));
    assert!(!category.supports(Verb::Delete));
}

#[test]
fn inventory_definitions_are_collected() {
    let registry = EntityRegistry::from_inventory().unwrap();
    assert!(registry.contains("tag"));

    let mut model = registry
        .model("tag", Params::new().with("label", "urgent"))
        .unwrap();
    assert_eq!(
        model.prepare(Verb::Put).unwrap(),
        "INSERT INTO tag (label) VALUES ('urgent') RETURNING id"
    );

    let mut model = registry
        .model("tag", Params::new().with("label", " "))
        .unwrap();
    let err = model.prepare(Verb::Put).unwrap_err();
    assert!(matches!(err, ModelError::Invalid(_)));
}

#[test]
fn broken_definitions_are_load_errors() {
    let dir = std::env::temp_dir().join(format!("pgmodel-registry-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    fs::write(
        dir.join("order.toml"),
        "table = \"orders\"\nprimary = [\"uid\"]\n\n[mapping]\nid = \"id\"\n",
    )
    .unwrap();
    let err = EntityRegistry::load_dir(&dir).unwrap_err();
    assert!(matches!(err, ModelError::Load(ref msg) if msg.contains("uid")));

    fs::write(
        dir.join("order.toml"),
        "table = \"orders\"\n\n[mapping]\nid = \"id\"\n\n[joins]\ncustomer = \"JOIN customer ON TRUE\"\n",
    )
    .unwrap();
    let err = EntityRegistry::load_dir(&dir).unwrap_err();
    assert!(matches!(err, ModelError::Load(ref msg) if msg.contains("customer")));

    fs::write(dir.join("order.toml"), "table = [\n").unwrap();
    let err = EntityRegistry::load_dir(&dir).unwrap_err();
    assert!(matches!(err, ModelError::Load(ref msg) if msg.contains("order.toml")));

    fs::remove_dir_all(&dir).unwrap();
}
