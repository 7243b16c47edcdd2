use std::sync::Arc;

use docmapper::{bson::doc, memory::InMemoryProvider, prelude::*};

// Registration is process-wide, so every step lives in one test.
#[test]
fn test_default_provider_registration() {
    clear_default_provider();

    let err = Collection::builder("users").build().unwrap_err();
    assert!(matches!(err, MapperError::MissingProvider(name) if name == "users"));

    let provider = Arc::new(InMemoryProvider::builder().database("shared").build().unwrap());
    set_default_provider(provider.clone());
    assert_eq!(default_provider().map(|p| p.database().to_string()), Some("shared".to_string()));

    let users = Collection::builder("users").build().unwrap();
    users.insert(doc! { "_id": 1 }).unwrap();
    assert_eq!(provider.records(None, "users").len(), 1);

    let explicit = Arc::new(InMemoryProvider::default());
    let other = Collection::builder("users").provider(explicit.clone()).build().unwrap();
    other.insert(doc! { "_id": 2 }).unwrap();
    assert_eq!(explicit.records(None, "users").len(), 1);
    assert_eq!(provider.records(None, "users").len(), 1);

    clear_default_provider();
    assert!(default_provider().is_none());
    assert!(Collection::builder("users").build().is_err());
}
