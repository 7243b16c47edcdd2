//! MongoDB connection provider for docmapper.
//!
//! This crate provides a MongoDB-based implementation of the `ConnectionProvider`
//! trait on top of the driver's blocking API.
//!
//! To use this provider, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmapper = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Validated configuration** - Providers are built from a checked `ConnectionConfig`
//! - **Replica sets** - Every configured host is handed to the driver
//! - **Persistent clients** - Providers built with the same persistent token share one client
//! - **Eager connection** - With `connect` set, the server is pinged when the provider is built
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{config::ConnectionConfig, provider::ProviderBuilder, mongodb::MongoDbProvider};
//!
//! let config = ConnectionConfig::builder()
//!     .dbname("app")
//!     .credentials("", "")
//!     .host("localhost", 27017)
//!     .connect(true)
//!     .build();
//!
//! let provider = MongoDbProvider::builder(config).build()?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_mongodb;

pub mod provider;

pub use provider::{MongoDbCollection, MongoDbCursor, MongoDbProvider, MongoDbProviderBuilder};
