//! Main docmapper crate providing an object-document mapping layer over document databases.
//!
//! This crate is the primary entry point for users of the docmapper framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the different connection providers.
//!
//! # Features
//!
//! - **Change-tracked documents** - Only the fields touched since the last save are written
//! - **Lazy documentsets** - Fetch results are materialized into documents on first access
//! - **Single and compound primary keys** - With a configurable identity field
//! - **Multiple providers** - In-memory and MongoDB, behind one provider trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryProvider};
//! use std::sync::Arc;
//! use bson::doc;
//!
//! let provider = Arc::new(InMemoryProvider::builder().database("app").build()?);
//! let users = Collection::builder("users").provider(provider).build()?;
//!
//! // Insert a new document
//! let mut alice = users.new_document(doc! { "name": "Alice", "age": 30 });
//! let id = alice.save()?;
//!
//! // Update only what changed
//! alice.set("age", 31);
//! alice.save()?;
//!
//! // Walk a fetch result
//! let mut adults = users.fetch_all(FindRequest::new(doc! { "age": { "$gte": 18 } }))?;
//! while adults.valid() {
//!     if let Some(user) = adults.current() {
//!         println!("{:?}", user.get("name")?);
//!     }
//!     adults.next();
//! }
//! ```
//!
//! # Detaching and reattaching
//!
//! Documents and documentsets serialize without their collection. After deserializing,
//! reattach them with `set_collection` before saving:
//!
//! ```ignore
//! let json = serde_json::to_string(&alice)?;
//! let mut restored: Document = serde_json::from_str(&json)?;
//!
//! restored.set_collection(users.clone())?;
//! restored.save()?;
//! ```
//!
//! # Providers
//!
//! - [`memory`] - In-memory provider for development and testing
//! - [`mongodb`] - MongoDB provider (requires `mongodb` feature)

pub mod prelude;

pub use docmapper_core::{collection, config, document, documentset, error, key, provider};

// Re-export BSON types for convenience
pub use bson;

/// In-memory connection provider.
pub mod memory {
    pub use docmapper_memory::{InMemoryCollection, InMemoryCursor, InMemoryProvider, InMemoryProviderBuilder, JournalEntry};
}

/// MongoDB connection provider.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmapper_mongodb::{MongoDbCollection, MongoDbCursor, MongoDbProvider, MongoDbProviderBuilder};
}
