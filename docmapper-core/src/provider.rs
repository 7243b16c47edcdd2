//! Connection provider abstraction.
//!
//! A connection provider owns the live connection to a document database and a
//! selected default database. The mapping core talks to it only through the
//! enumerated operations below; there is no catch-all forwarding to the driver.
//!
//! # Traits
//!
//! - [`ConnectionProvider`]: selects collections and runs ad hoc commands
//! - [`CollectionHandle`]: record-level operations on one collection
//! - [`RecordCursor`]: the result of a find request
//! - [`ProviderBuilder`]: factory trait for creating provider instances
//!
//! A process-wide default provider can be registered with [`set_default_provider`];
//! collections built without an explicit provider fall back to it.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::provider::{ConnectionProvider, FindRequest};
//! use bson::doc;
//!
//! let users = provider.select_collection(None, "users")?;
//! let id = users.insert(doc! { "name": "Alice" })?;
//! let found = users.find_one(doc! { "_id": id }, &[])?;
//! ```

use bson::{Bson, Document as RawRecord};
use parking_lot::{RwLock, const_rwlock};
use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::error::MapperResult;

/// Options forwarded unchanged with update and remove operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Insert a record built from the criteria and data when nothing matches.
    pub upsert: bool,
    /// Update every matching record instead of the first one.
    pub multiple: bool,
    /// Remove only the first matching record.
    pub just_one: bool,
}

impl WriteOptions {
    /// Creates options with every flag unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the upsert flag.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Sets the multiple flag.
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Sets the just-one flag.
    pub fn just_one(mut self, just_one: bool) -> Self {
        self.just_one = just_one;
        self
    }
}

/// A find request sent to a collection handle.
///
/// `limit` and `sort` are only set when the caller asked for them; an empty
/// projection returns whole records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRequest {
    /// Query document in the driver's native syntax.
    pub filter: RawRecord,
    /// Field names to return; the identity field is always returned.
    pub projection: Vec<String>,
    /// Maximum number of records to return.
    pub limit: Option<u64>,
    /// Sort specification, e.g. `{ "name": 1, "age": -1 }`.
    pub sort: Option<RawRecord>,
}

impl FindRequest {
    /// Creates a request for every record matching `filter`.
    pub fn new(filter: RawRecord) -> Self {
        Self { filter, ..Self::default() }
    }

    /// Restricts the returned fields.
    pub fn projection(mut self, fields: Vec<String>) -> Self {
        self.projection = fields;
        self
    }

    /// Limits the number of returned records. A zero limit is ignored.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Sorts the returned records. An empty specification is ignored.
    pub fn sort(mut self, sort: RawRecord) -> Self {
        self.sort = (!sort.is_empty()).then_some(sort);
        self
    }
}

/// A cursor over the records matched by a find request.
pub trait RecordCursor: Send {
    /// Returns whether another record is available.
    fn has_next(&mut self) -> MapperResult<bool>;

    /// Returns the next record, or `None` once the cursor is exhausted.
    fn next_record(&mut self) -> MapperResult<Option<RawRecord>>;

    /// Returns the total number of records matching the filter, ignoring any limit.
    fn count(&mut self) -> MapperResult<u64>;
}

/// Record-level operations on one collection of the connected database.
///
/// A record passed to [`CollectionHandle::update`] is either a plain document, whose
/// fields are assigned onto the matching records, or an operator document whose keys
/// all start with `$` (for example `$set` and `$unset`).
pub trait CollectionHandle: Send + Sync + Debug {
    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Inserts a record and returns its identifier.
    ///
    /// The store generates the identifier when the record carries none.
    fn insert(&self, record: RawRecord) -> MapperResult<Bson>;

    /// Updates the records matching `criteria` and returns how many matched.
    fn update(&self, criteria: RawRecord, record: RawRecord, options: WriteOptions) -> MapperResult<u64>;

    /// Removes the records matching `criteria` and returns how many were removed.
    fn remove(&self, criteria: RawRecord, options: WriteOptions) -> MapperResult<u64>;

    /// Starts a find request.
    fn find(&self, request: FindRequest) -> MapperResult<Box<dyn RecordCursor>>;

    /// Returns the first record matching `query`, if any.
    fn find_one(&self, query: RawRecord, fields: &[String]) -> MapperResult<Option<RawRecord>>;
}

/// Abstract interface for the component owning the live database connection.
///
/// Providers are shared between collections through an `Arc` and must be
/// thread-safe; the mapping core itself never locks or pools the connection.
pub trait ConnectionProvider: Send + Sync + Debug {
    /// Returns the name of the selected default database.
    fn database(&self) -> &str;

    /// Returns a handle on `name` in `database`, or in the default database when `None`.
    fn select_collection(&self, database: Option<&str>, name: &str) -> MapperResult<Box<dyn CollectionHandle>>;

    /// Runs a provider-specific command against `database`, or the default database when `None`.
    fn execute(&self, database: Option<&str>, command: RawRecord) -> MapperResult<RawRecord>;

    /// Returns the timeout the provider enforces on its round trips, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Factory trait for creating provider instances.
pub trait ProviderBuilder {
    /// The provider type produced by this builder.
    type Provider: ConnectionProvider;

    /// Builds the provider, validating its configuration first.
    fn build(self) -> MapperResult<Self::Provider>;
}

static DEFAULT_PROVIDER: RwLock<Option<Arc<dyn ConnectionProvider>>> = const_rwlock(None);

/// Registers the provider used by collections built without one.
pub fn set_default_provider(provider: Arc<dyn ConnectionProvider>) {
    tracing::debug!(target: "docmapper::provider", database = provider.database(), "Default provider registered");
    *DEFAULT_PROVIDER.write() = Some(provider);
}

/// Returns the process-wide default provider, if one is registered.
pub fn default_provider() -> Option<Arc<dyn ConnectionProvider>> {
    DEFAULT_PROVIDER.read().clone()
}

/// Removes the process-wide default provider.
pub fn clear_default_provider() {
    *DEFAULT_PROVIDER.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_find_request_ignores_empty_limit_and_sort() {
        let request = FindRequest::new(doc! { "a": 1 }).limit(0).sort(doc! {});

        assert_eq!(request.limit, None);
        assert_eq!(request.sort, None);

        let request = request.limit(5).sort(doc! { "a": -1 });
        assert_eq!(request.limit, Some(5));
        assert_eq!(request.sort, Some(doc! { "a": -1 }));
    }

    #[test]
    fn test_write_options_builder() {
        let options = WriteOptions::new().upsert(true).multiple(true);

        assert!(options.upsert);
        assert!(options.multiple);
        assert!(!options.just_one);
    }
}
