//! An object-document mapping layer over a document database.
//!
//! This crate is the core of the docmapper project and provides:
//!
//! - **Collections** ([`collection`]) - Named collections with their primary key convention and CRUD operations
//! - **Documents** ([`document`]) - Single records with change tracking, save, delete and refresh
//! - **Documentsets** ([`documentset`]) - Cursor-navigable fetch results with lazily materialized documents
//! - **Primary keys** ([`key`]) - Single and compound key handling
//! - **Connection providers** ([`provider`]) - Traits for implementing different storage backends
//! - **Configuration** ([`config`]) - Connection settings consumed by providers
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//! use bson::doc;
//!
//! let users = Collection::builder("users").provider(provider).build()?;
//!
//! let mut user = users.new_document(doc! { "name": "Alice" });
//! let id = user.save()?;
//!
//! user.set("age", 30);
//! user.save()?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_core;

pub mod collection;
pub mod config;
pub mod document;
pub mod documentset;
pub mod error;
pub mod key;
pub mod provider;
