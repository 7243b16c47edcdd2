use std::sync::Arc;

use docmapper::{
    bson::{Bson, doc},
    memory::InMemoryProvider,
    prelude::*,
};

fn provider() -> Arc<InMemoryProvider> {
    Arc::new(InMemoryProvider::builder().database("app").build().unwrap())
}

fn metadata() -> Vec<FieldMetadata> {
    vec![
        FieldMetadata::object_id("_id"),
        FieldMetadata::new("name"),
        FieldMetadata::new("role"),
    ]
}

#[test]
fn test_info_reports_configuration() {
    let users = Collection::builder("users")
        .provider(provider())
        .metadata(metadata())
        .document_type("user")
        .build()
        .unwrap();

    let info = users.info();
    assert_eq!(info.name, "users");
    assert_eq!(info.database, None);
    assert_eq!(info.primary, vec!["_id".to_string()]);
    assert_eq!(info.columns, vec!["_id", "name", "role"]);
    assert_eq!(info.document_type, "user");
    assert_eq!(info.documentset_type, "documentset");

    assert_eq!(users.info_key("name").unwrap(), Bson::String("users".into()));
    assert_eq!(users.info_key("database").unwrap(), Bson::Null);
    assert_eq!(
        users.info_key("primary").unwrap(),
        Bson::Array(vec![Bson::String("_id".into())])
    );
    assert!(matches!(
        users.info_key("bogus"),
        Err(MapperError::UnknownKey(key)) if key == "bogus"
    ));
}

#[test]
fn test_primary_key_from_metadata() {
    let users = Collection::builder("users")
        .provider(provider())
        .metadata(vec![FieldMetadata::new("name"), FieldMetadata::object_id("uid")])
        .primary_key_from_metadata()
        .build()
        .unwrap();

    assert_eq!(users.primary_key(), &PrimaryKey::single("uid"));

    let err = Collection::builder("users")
        .provider(provider())
        .metadata(vec![FieldMetadata::new("name")])
        .primary_key_from_metadata()
        .build()
        .unwrap_err();

    assert!(matches!(err, MapperError::MissingPrimaryKey(name) if name == "users"));
}

#[test]
fn test_database_in_name_selects_database() {
    let provider = provider();
    let logs = Collection::builder("audit.logs")
        .provider(provider.clone())
        .database("ignored")
        .build()
        .unwrap();

    assert_eq!(logs.name(), "logs");
    assert_eq!(logs.database(), Some("audit"));

    logs.insert(doc! { "_id": 1 }).unwrap();

    assert_eq!(provider.records(Some("audit"), "logs").len(), 1);
    assert!(provider.records(None, "logs").is_empty());
}

#[test]
fn test_new_document_uses_declared_defaults() {
    let provider = provider();
    let users = Collection::builder("users")
        .provider(provider.clone())
        .metadata(metadata())
        .default_values(doc! { "role": "member", "undeclared": true })
        .build()
        .unwrap();

    assert_eq!(users.default_values(), &doc! { "role": "member" });

    let mut bob = users.new_document(doc! { "name": "Bob" });
    assert_eq!(bob.get("role").unwrap().as_str(), Some("member"));
    assert!(!bob.contains("undeclared"));

    bob.save().unwrap();
    let stored = provider.records(None, "users");
    assert_eq!(stored[0].get_str("role").unwrap(), "member");
    assert_eq!(stored[0].get_str("name").unwrap(), "Bob");
}

#[test]
fn test_bulk_update_and_delete_forward_options() {
    let users = Collection::builder("users").provider(provider()).build().unwrap();
    for id in 0..4 {
        users.insert(doc! { "_id": id, "group": "a" }).unwrap();
    }

    let updated = users
        .update(doc! { "$set": { "group": "b" } }, doc! { "group": "a" }, WriteOptions::new().multiple(true))
        .unwrap();
    assert_eq!(updated, 4);

    let upserted = users
        .update(doc! { "group": "c" }, doc! { "_id": 9 }, WriteOptions::new().upsert(true))
        .unwrap();
    assert_eq!(upserted, 1);

    assert_eq!(users.delete(doc! { "group": "b" }, WriteOptions::new().just_one(true)).unwrap(), 1);
    assert_eq!(users.count(doc! {}).unwrap(), 4);
    assert_eq!(users.count(doc! { "group": "c" }).unwrap(), 1);
}

#[test]
fn test_configured_columns_restrict_fetches() {
    let users = Collection::builder("users")
        .provider(provider())
        .columns(["name"])
        .build()
        .unwrap();
    users.insert(doc! { "_id": 1, "name": "Ada", "secret": "x" }).unwrap();

    let ada = users.fetch_row(doc! { "_id": 1 }, &[]).unwrap().unwrap();
    assert!(!ada.contains("secret"));

    let full = users
        .fetch_row(doc! { "_id": 1 }, &["secret".to_string()])
        .unwrap()
        .unwrap();
    assert!(full.contains("secret"));
    assert!(!full.contains("name"));
}

#[test]
fn test_execute_runs_provider_commands() {
    let users = Collection::builder("users").provider(provider()).build().unwrap();
    users.insert(doc! { "_id": 1 }).unwrap();

    let reply = users.execute(doc! { "count": "users" }).unwrap();
    assert_eq!(reply.get_i64("n").unwrap(), 1);

    let err = users.execute(doc! { "fsync": 1 }).unwrap_err();
    assert!(matches!(err.root(), MapperError::UnsupportedCommand(name) if name == "fsync"));
}

#[test]
fn test_execute_uses_collection_database() {
    let logs = Collection::builder("audit.logs").provider(provider()).build().unwrap();
    logs.insert(doc! { "_id": 1 }).unwrap();

    let reply = logs.execute(doc! { "count": "logs" }).unwrap();

    assert_eq!(reply.get_i64("n").unwrap(), 1);
}

#[test]
fn test_fetch_row_miss_returns_none() {
    let users = Collection::builder("users").provider(provider()).build().unwrap();

    assert!(users.fetch_row(doc! { "_id": 1 }, &[]).unwrap().is_none());
}
