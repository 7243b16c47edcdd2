//! In-memory connection provider for docmapper.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `ConnectionProvider` trait. It evaluates MongoDB-style query documents itself
//! and is meant for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes behind a read-write lock
//! - **Query support** - Comparison, membership, existence and logical operators, dotted paths
//! - **Update operators** - `$set`, `$unset` and `$inc`, upserts and multi-record updates
//! - **Write journal** - Every write is recorded so tests can assert what was sent
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{memory::InMemoryProvider, prelude::Collection};
//! use std::sync::Arc;
//! use bson::doc;
//!
//! let provider = Arc::new(InMemoryProvider::default());
//! let users = Collection::builder("users").provider(provider.clone()).build()?;
//!
//! let mut alice = users.new_document(doc! { "name": "Alice" });
//! alice.save()?;
//!
//! assert_eq!(provider.journal().len(), 1);
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_memory;

pub mod evaluator;
pub mod provider;

pub use provider::{InMemoryCollection, InMemoryCursor, InMemoryProvider, InMemoryProviderBuilder, JournalEntry};
