//! Collections: named groupings of records with their primary key convention.
//!
//! A [`Collection`] is a cheap, cloneable descriptor bound to exactly one
//! [`ConnectionProvider`]. It forwards CRUD operations to the provider and wraps
//! what comes back into [`Document`]s and [`Documentset`]s that call back into it.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//! use bson::doc;
//!
//! let users = Collection::builder("app.users")
//!     .provider(provider)
//!     .build()?;
//!
//! let id = users.insert(doc! { "name": "Alice" })?;
//! let mut alice = users.fetch_row(doc! { "_id": id }, &[])?.expect("just inserted");
//! alice.set("age", 30);
//! alice.save()?;
//! ```

use bson::{Bson, Document as RawRecord, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::debug;

use crate::{
    document::{Document, DocumentHooks, NoHooks},
    documentset::Documentset,
    error::{MapperError, MapperResult},
    key::PrimaryKey,
    provider::{CollectionHandle, ConnectionProvider, FindRequest, RecordCursor, WriteOptions, default_provider},
};

/// Kind recorded for collections that do not declare one.
pub const DEFAULT_KIND: &str = "collection";
/// Document type tag used when none is configured.
pub const DEFAULT_DOCUMENT_TYPE: &str = "document";
/// Documentset type tag used when none is configured.
pub const DEFAULT_DOCUMENTSET_TYPE: &str = "documentset";

/// Information the caller declares about one field of a collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// The field name.
    pub name: String,
    /// Whether this field is the object identifier of the collection.
    #[serde(default)]
    pub object_id: bool,
}

impl FieldMetadata {
    /// Declares a regular field.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), object_id: false }
    }

    /// Declares the object identifier field.
    pub fn object_id(name: impl Into<String>) -> Self {
        Self { name: name.into(), object_id: true }
    }
}

/// Snapshot of a collection's configuration, as returned by [`Collection::info`].
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    /// Database the collection lives in, or `None` for the provider's default.
    pub database: Option<String>,
    /// Collection name.
    pub name: String,
    /// Configured columns, or the declared metadata field names.
    pub columns: Vec<String>,
    /// Primary key fields in order.
    pub primary: Vec<String>,
    /// Declared field metadata.
    pub metadata: Vec<FieldMetadata>,
    /// Document type tag.
    pub document_type: String,
    /// Documentset type tag.
    pub documentset_type: String,
}

#[derive(Debug)]
struct CollectionInner {
    provider: Arc<dyn ConnectionProvider>,
    database: Option<String>,
    name: String,
    kind: String,
    columns: Vec<String>,
    primary_key: PrimaryKey,
    metadata: Vec<FieldMetadata>,
    default_values: RawRecord,
    document_type: String,
    documentset_type: String,
    hooks: Arc<dyn DocumentHooks>,
}

/// A named collection bound to a connection provider.
///
/// Cloning a collection is cheap; clones share the same configuration and provider.
#[derive(Debug, Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    /// Creates a builder for the collection `name`.
    ///
    /// A name of the form `"database.collection"` selects the database as well.
    pub fn builder(name: impl Into<String>) -> CollectionBuilder {
        CollectionBuilder::new(name)
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the database name, or `None` when the provider's default database is used.
    pub fn database(&self) -> Option<&str> {
        self.inner.database.as_deref()
    }

    /// Returns the collection kind recorded on the documents it produces.
    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    /// Returns the resolved primary key.
    pub fn primary_key(&self) -> &PrimaryKey {
        &self.inner.primary_key
    }

    /// Returns the configured columns, or the declared metadata field names.
    pub fn columns(&self) -> Vec<String> {
        if self.inner.columns.is_empty() {
            self.inner.metadata.iter().map(|field| field.name.clone()).collect()
        } else {
            self.inner.columns.clone()
        }
    }

    /// Returns the declared field metadata.
    pub fn metadata(&self) -> &[FieldMetadata] {
        &self.inner.metadata
    }

    /// Returns the default values seeded into new documents.
    pub fn default_values(&self) -> &RawRecord {
        &self.inner.default_values
    }

    /// Returns the document type tag.
    pub fn document_type(&self) -> &str {
        &self.inner.document_type
    }

    /// Returns the documentset type tag.
    pub fn documentset_type(&self) -> &str {
        &self.inner.documentset_type
    }

    /// Returns the connection provider this collection is bound to.
    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.inner.provider
    }

    pub(crate) fn hooks(&self) -> Arc<dyn DocumentHooks> {
        Arc::clone(&self.inner.hooks)
    }

    /// Returns the collection information.
    pub fn info(&self) -> CollectionInfo {
        CollectionInfo {
            database: self.inner.database.clone(),
            name: self.inner.name.clone(),
            columns: self.columns(),
            primary: self.inner.primary_key.fields().to_vec(),
            metadata: self.inner.metadata.clone(),
            document_type: self.inner.document_type.clone(),
            documentset_type: self.inner.documentset_type.clone(),
        }
    }

    /// Returns a single piece of collection information.
    ///
    /// Recognized keys are `database`, `name`, `columns`, `primary`, `metadata`,
    /// `document_type` and `documentset_type`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnknownKey`] for any other key.
    pub fn info_key(&self, key: &str) -> MapperResult<Bson> {
        match serialize_to_bson(&self.info())? {
            Bson::Document(info) => info
                .get(key)
                .cloned()
                .ok_or_else(|| MapperError::UnknownKey(key.to_string())),
            _ => Err(MapperError::Serialization("collection info is not a document".into())),
        }
    }

    fn handle(&self, operation: &'static str) -> MapperResult<Box<dyn CollectionHandle>> {
        self.inner
            .provider
            .select_collection(self.database(), self.name())
            .map_err(|e| e.context(operation, self.name()))
    }

    fn projection(&self, fields: &[String]) -> Vec<String> {
        if fields.is_empty() {
            self.inner.columns.clone()
        } else {
            fields.to_vec()
        }
    }

    /// Inserts a record and returns its identifier.
    ///
    /// An identity field present with a null value is removed first so the store
    /// generates it.
    pub fn insert(&self, mut data: RawRecord) -> MapperResult<Bson> {
        self.inner.primary_key.strip_null_identity(&mut data);

        debug!(target: "docmapper::collection", collection = %self.name(), fields = data.len(), "Inserting record");

        self.handle("insert")?
            .insert(data)
            .map_err(|e| e.context("insert", self.name()))
    }

    /// Updates the records matching `criteria` with `data` and returns how many matched.
    ///
    /// The identity field is stripped from `data` the same way as on insert; `options`
    /// are forwarded unchanged.
    pub fn update(&self, mut data: RawRecord, criteria: RawRecord, options: WriteOptions) -> MapperResult<u64> {
        self.inner.primary_key.strip_null_identity(&mut data);

        debug!(
            target: "docmapper::collection",
            collection = %self.name(),
            criteria = %criteria,
            upsert = options.upsert,
            multiple = options.multiple,
            "Updating records"
        );

        self.handle("update")?
            .update(criteria, data, options)
            .map_err(|e| e.context("update", self.name()))
    }

    /// Deletes the records matching `criteria` and returns how many were removed.
    pub fn delete(&self, criteria: RawRecord, options: WriteOptions) -> MapperResult<u64> {
        debug!(target: "docmapper::collection", collection = %self.name(), criteria = %criteria, "Deleting records");

        self.handle("delete")?
            .remove(criteria, options)
            .map_err(|e| e.context("delete", self.name()))
    }

    /// Runs a find request and drains every matching record into a [`Documentset`].
    ///
    /// The whole result is fetched before returning; use [`Collection::stream`] to
    /// process large results one record at a time.
    pub fn fetch_all(&self, request: FindRequest) -> MapperResult<Documentset> {
        let request = FindRequest {
            projection: self.projection(&request.projection),
            ..request
        };

        debug!(target: "docmapper::collection", collection = %self.name(), filter = %request.filter, limit = ?request.limit, "Fetching records");

        let mut cursor = self
            .handle("fetch_all")?
            .find(request)
            .map_err(|e| e.context("fetch_all", self.name()))?;

        let mut records = Vec::new();
        while cursor.has_next().map_err(|e| e.context("fetch_all", self.name()))? {
            match cursor.next_record().map_err(|e| e.context("fetch_all", self.name()))? {
                Some(record) => records.push(record),
                None => break,
            }
        }

        let count = cursor.count().map_err(|e| e.context("fetch_all", self.name()))?;

        Ok(Documentset::builder(records)
            .with_collection(self.clone())
            .with_count(count as usize)
            .with_stored(true)
            .build())
    }

    /// Fetches every record whose identity field equals `id`.
    pub fn find(&self, id: impl Into<Bson>) -> MapperResult<Documentset> {
        let mut filter = RawRecord::new();
        filter.insert(self.inner.primary_key.identity(), id.into());

        self.fetch_all(FindRequest::new(filter))
    }

    /// Returns the first record matching `query` as a document, or `None`.
    pub fn fetch_row(&self, query: RawRecord, fields: &[String]) -> MapperResult<Option<Document>> {
        debug!(target: "docmapper::collection", collection = %self.name(), query = %query, "Fetching one record");

        let record = self
            .handle("fetch_row")?
            .find_one(query, &self.projection(fields))
            .map_err(|e| e.context("fetch_row", self.name()))?;

        Ok(record
            .filter(|record| !record.is_empty())
            .map(|record| Document::builder(record).collection(self.clone()).stored(true).build()))
    }

    /// Starts a find request and yields documents one record at a time.
    pub fn stream(&self, request: FindRequest) -> MapperResult<DocumentStream> {
        let request = FindRequest {
            projection: self.projection(&request.projection),
            ..request
        };

        let cursor = self
            .handle("stream")?
            .find(request)
            .map_err(|e| e.context("stream", self.name()))?;

        Ok(DocumentStream { collection: self.clone(), cursor })
    }

    /// Creates a new, unsaved document seeded with the default values and `data`.
    pub fn new_document(&self, data: RawRecord) -> Document {
        let mut document = Document::builder(self.inner.default_values.clone())
            .collection(self.clone())
            .build();

        for (field, value) in data {
            document.set(field, value);
        }

        document
    }

    /// Runs a provider-specific command against the collection's database.
    pub fn execute(&self, command: RawRecord) -> MapperResult<RawRecord> {
        self.inner
            .provider
            .execute(self.database(), command)
            .map_err(|e| e.context("execute", self.name()))
    }

    /// Counts the records matching `query`.
    pub fn count(&self, query: RawRecord) -> MapperResult<u64> {
        self.handle("count")?
            .find(FindRequest::new(query).projection(vec![self.inner.primary_key.identity().to_string()]))
            .and_then(|mut cursor| cursor.count())
            .map_err(|e| e.context("count", self.name()))
    }
}

/// Builder for [`Collection`].
pub struct CollectionBuilder {
    name: String,
    provider: Option<Arc<dyn ConnectionProvider>>,
    database: Option<String>,
    kind: String,
    columns: Vec<String>,
    primary_key: Option<PrimaryKey>,
    metadata: Vec<FieldMetadata>,
    default_values: RawRecord,
    document_type: String,
    documentset_type: String,
    hooks: Option<Arc<dyn DocumentHooks>>,
}

impl CollectionBuilder {
    /// Creates a builder with the default `_id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: None,
            database: None,
            kind: DEFAULT_KIND.to_string(),
            columns: Vec::new(),
            primary_key: Some(PrimaryKey::default()),
            metadata: Vec::new(),
            default_values: RawRecord::new(),
            document_type: DEFAULT_DOCUMENT_TYPE.to_string(),
            documentset_type: DEFAULT_DOCUMENTSET_TYPE.to_string(),
            hooks: None,
        }
    }

    /// Binds the collection to `provider` instead of the process-wide default.
    pub fn provider(mut self, provider: Arc<dyn ConnectionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Selects the database. A database given in the collection name takes precedence.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the collection kind checked when documents are reattached.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the fields fetched when a request names none.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the primary key.
    pub fn primary_key(mut self, primary_key: PrimaryKey) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Derives the primary key from the field flagged as object id in the metadata.
    pub fn primary_key_from_metadata(mut self) -> Self {
        self.primary_key = None;
        self
    }

    /// Declares the collection's field metadata.
    pub fn metadata(mut self, metadata: Vec<FieldMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the values seeded into new documents. Fields absent from the metadata are ignored.
    pub fn default_values(mut self, default_values: RawRecord) -> Self {
        self.default_values = default_values;
        self
    }

    /// Sets the document type tag.
    pub fn document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = document_type.into();
        self
    }

    /// Sets the documentset type tag.
    pub fn documentset_type(mut self, documentset_type: impl Into<String>) -> Self {
        self.documentset_type = documentset_type.into();
        self
    }

    /// Installs lifecycle hooks run by documents of this collection.
    pub fn hooks(mut self, hooks: Arc<dyn DocumentHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Resolves the provider and primary key and builds the collection.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::MissingProvider`] when no provider was given and no
    /// default is registered, and [`MapperError::MissingPrimaryKey`] when the key must
    /// be derived from metadata that flags no object id.
    pub fn build(self) -> MapperResult<Collection> {
        let (database, name) = match self.name.split_once('.') {
            Some((database, name)) if !database.is_empty() => (Some(database.to_string()), name.to_string()),
            _ => (self.database, self.name),
        };

        let provider = self
            .provider
            .or_else(default_provider)
            .ok_or_else(|| MapperError::MissingProvider(name.clone()))?;

        let primary_key = match self.primary_key {
            Some(primary_key) => primary_key,
            None => self
                .metadata
                .iter()
                .find(|field| field.object_id)
                .map(|field| PrimaryKey::single(field.name.clone()))
                .ok_or_else(|| MapperError::MissingPrimaryKey(name.clone()))?,
        };

        let default_values = self
            .default_values
            .into_iter()
            .filter(|(field, _)| self.metadata.iter().any(|m| &m.name == field))
            .collect::<RawRecord>();

        debug!(
            target: "docmapper::collection",
            collection = %name,
            database = ?database,
            primary = ?primary_key.fields(),
            "Collection configured"
        );

        Ok(Collection {
            inner: Arc::new(CollectionInner {
                provider,
                database,
                name,
                kind: self.kind,
                columns: self.columns,
                primary_key,
                metadata: self.metadata,
                default_values,
                document_type: self.document_type,
                documentset_type: self.documentset_type,
                hooks: self.hooks.unwrap_or_else(|| Arc::new(NoHooks)),
            }),
        })
    }
}

/// Documents yielded one record at a time from a live cursor.
///
/// Returned by [`Collection::stream`]; nothing is buffered beyond what the provider's
/// cursor holds.
pub struct DocumentStream {
    collection: Collection,
    cursor: Box<dyn RecordCursor>,
}

impl DocumentStream {
    /// Returns the total number of records matching the request.
    pub fn total_count(&mut self) -> MapperResult<u64> {
        self.cursor
            .count()
            .map_err(|e| e.context("stream", self.collection.name()))
    }
}

impl Iterator for DocumentStream {
    type Item = MapperResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.next_record() {
            Ok(Some(record)) => Some(Ok(Document::builder(record)
                .collection(self.collection.clone())
                .stored(true)
                .build())),
            Ok(None) => None,
            Err(e) => Some(Err(e.context("stream", self.collection.name()))),
        }
    }
}

impl fmt::Debug for DocumentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStream")
            .field("collection", &self.collection.name())
            .finish_non_exhaustive()
    }
}
