//! Documents: one record of a collection with change tracking.
//!
//! A [`Document`] keeps the current field values next to the values last read
//! from or written to the store. Saving sends only the fields touched since then,
//! and every successful write reloads the document from the store.
//!
//! A document holds a clone of the [`Collection`] it came from. Serializing it keeps
//! the data and drops the collection; a deserialized document must be reattached
//! with [`Document::set_collection`] before it can be saved, deleted or refreshed.

use bson::{Bson, Document as RawRecord};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Debug};
use tracing::{debug, trace};

use crate::{
    collection::Collection,
    error::{MapperError, MapperResult},
    key::PrimaryKey,
    provider::WriteOptions,
};

/// Extension points run around document writes.
///
/// Every hook defaults to doing nothing. Returning an error aborts the operation;
/// a failing `after_*` hook leaves the write in place.
pub trait DocumentHooks: Send + Sync + Debug {
    /// Runs before a new document is inserted.
    fn before_insert(&self, _document: &mut Document) -> MapperResult<()> {
        Ok(())
    }

    /// Runs after a new document was inserted and its key values merged.
    fn after_insert(&self, _document: &mut Document) -> MapperResult<()> {
        Ok(())
    }

    /// Runs before a stored document is updated.
    fn before_update(&self, _document: &mut Document) -> MapperResult<()> {
        Ok(())
    }

    /// Runs after a stored document was updated.
    fn after_update(&self, _document: &mut Document) -> MapperResult<()> {
        Ok(())
    }

    /// Runs before a document is deleted.
    fn before_delete(&self, _document: &mut Document) -> MapperResult<()> {
        Ok(())
    }

    /// Runs after a document was deleted.
    fn after_delete(&self, _document: &mut Document) -> MapperResult<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl DocumentHooks for NoHooks {}

/// A single record of a collection.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Document {
    fields: RawRecord,
    clean_fields: RawRecord,
    modified_fields: BTreeSet<String>,
    primary_key: PrimaryKey,
    collection_kind: Option<String>,
    read_only: bool,
    #[serde(skip)]
    collection: Option<Collection>,
    #[serde(skip)]
    connected: bool,
}

impl Document {
    /// Creates a builder for a document holding `fields`.
    pub fn builder(fields: RawRecord) -> DocumentBuilder {
        DocumentBuilder::new(fields)
    }

    /// Creates a new, unsaved and detached document.
    pub fn new(fields: RawRecord) -> Self {
        DocumentBuilder::new(fields).build()
    }

    /// Returns the value of `field`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnknownField`] when the document has no such field.
    pub fn get(&self, field: &str) -> MapperResult<&Bson> {
        self.fields
            .get(field)
            .ok_or_else(|| MapperError::UnknownField(field.to_string()))
    }

    /// Sets `field` to `value` and marks it modified. Unknown fields are added.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        let field = field.into();
        self.fields.insert(field.clone(), value.into());
        self.modified_fields.insert(field);
    }

    /// Removes `field` from the document and returns its former value.
    ///
    /// The removal is recorded as a modification, so the next save unsets the field
    /// in the store as well.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnknownField`] when the field is absent and
    /// [`MapperError::PrimaryKeyProtected`] when the document is connected and the
    /// field is part of its collection's primary key.
    pub fn unset(&mut self, field: &str) -> MapperResult<Bson> {
        if !self.fields.contains_key(field) {
            return Err(MapperError::UnknownField(field.to_string()));
        }

        if let (true, Some(collection)) = (self.connected, &self.collection) {
            if collection.primary_key().contains(field) {
                return Err(MapperError::PrimaryKeyProtected(field.to_string()));
            }
        }

        self.modified_fields.insert(field.to_string());
        Ok(self.fields.remove(field).unwrap_or(Bson::Null))
    }

    /// Assigns every value of `data` whose field already exists in the document.
    ///
    /// Returns the names of the fields that were assigned.
    pub fn set_from(&mut self, data: RawRecord) -> Vec<String> {
        let mut assigned = Vec::new();

        for (field, value) in data {
            if self.fields.contains_key(&field) {
                self.set(field.clone(), value);
                assigned.push(field);
            }
        }

        assigned
    }

    /// Returns whether the document has `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns whether `field` was touched since the last save or refresh.
    pub fn is_modified(&self, field: &str) -> bool {
        self.modified_fields.contains(field)
    }

    /// Returns the names of the fields touched since the last save or refresh.
    pub fn modified_fields(&self) -> impl Iterator<Item = &str> {
        self.modified_fields.iter().map(String::as_str)
    }

    /// Returns whether the document was never persisted.
    pub fn is_new(&self) -> bool {
        self.clean_fields.is_empty()
    }

    /// Returns the current field values.
    pub fn fields(&self) -> &RawRecord {
        &self.fields
    }

    /// Returns the field values last read from or written to the store.
    pub fn clean_fields(&self) -> &RawRecord {
        &self.clean_fields
    }

    /// Returns a copy of the current field values.
    pub fn to_array(&self) -> RawRecord {
        self.fields.clone()
    }

    /// Returns the current field values as JSON.
    pub fn to_json(&self) -> MapperResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.fields)?)
    }

    /// Returns the primary key recorded when the document was created.
    pub fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// Returns the kind of the collection the document belongs to.
    pub fn collection_kind(&self) -> Option<&str> {
        self.collection_kind.as_deref()
    }

    /// Returns the collection the document is attached to.
    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref().filter(|_| self.connected)
    }

    /// Returns whether the document is attached to a live collection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns whether saves and deletes are refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Marks the document read-only or writable.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Attaches the document to `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::IncompatibleCollection`] when the collection is of a
    /// different kind than the one the document came from, or when its primary key is
    /// made of different fields.
    pub fn set_collection(&mut self, collection: Collection) -> MapperResult<bool> {
        if let Some(kind) = &self.collection_kind {
            if kind != collection.kind() {
                return Err(MapperError::IncompatibleCollection(format!(
                    "the specified collection is of kind {}, expecting {}",
                    collection.kind(),
                    kind
                )));
            }
        }

        if !self.primary_key.same_fields(collection.primary_key()) {
            return Err(MapperError::IncompatibleCollection(format!(
                "collection {} does not have the same primary key as the document",
                collection.name()
            )));
        }

        self.primary_key = collection.primary_key().clone();
        self.collection_kind = Some(collection.kind().to_string());
        self.collection = Some(collection);
        self.connected = true;

        Ok(true)
    }

    /// Detaches the document from its collection.
    pub fn detach(&mut self) {
        self.collection = None;
        self.connected = false;
    }

    fn live_collection(&self, operation: &'static str) -> MapperResult<Collection> {
        match (&self.collection, self.connected) {
            (Some(collection), true) => Ok(collection.clone()),
            _ => Err(MapperError::Disconnected(operation)),
        }
    }

    fn pending_fields(&self) -> RawRecord {
        self.fields
            .iter()
            .filter(|(field, _)| self.modified_fields.contains(*field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// Saves the document and returns its primary key value.
    ///
    /// A document never persisted is inserted; otherwise only the modified fields are
    /// sent. Either way the document is reloaded from the store afterwards. The key is
    /// returned as a single value for single-field keys and as a document otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::ReadOnlyViolation`] for read-only documents and
    /// [`MapperError::Disconnected`] for detached ones.
    pub fn save(&mut self) -> MapperResult<Bson> {
        if self.read_only {
            return Err(MapperError::ReadOnlyViolation);
        }

        let collection = self.live_collection("save")?;

        if self.clean_fields.is_empty() {
            self.insert(&collection)
        } else {
            self.update(&collection)
        }
    }

    fn insert(&mut self, collection: &Collection) -> MapperResult<Bson> {
        let hooks = collection.hooks();
        hooks.before_insert(self)?;

        let data = self.pending_fields();
        let identifier = collection.insert(data)?;

        for (field, value) in self.primary_key.normalize(&identifier) {
            if matches!(self.fields.get(&field), None | Some(Bson::Null)) {
                self.fields.insert(field, value);
            }
        }

        hooks.after_insert(self)?;

        let criteria = self.primary_key.criteria(&self.fields)?;
        self.reload(collection, criteria)?;

        debug!(target: "docmapper::document", collection = %collection.name(), id = %identifier, "Document inserted");

        Ok(identifier)
    }

    fn update(&mut self, collection: &Collection) -> MapperResult<Bson> {
        let hooks = collection.hooks();
        let criteria = self.primary_key.criteria(&self.clean_fields)?;

        hooks.before_update(self)?;

        let changed = self.pending_fields();
        let removed = self
            .modified_fields
            .iter()
            .filter(|field| !self.fields.contains_key(*field) && self.clean_fields.contains_key(*field))
            .cloned()
            .collect::<Vec<String>>();

        if changed.is_empty() && removed.is_empty() {
            trace!(target: "docmapper::document", collection = %collection.name(), "Nothing to save");

            self.clean_fields = self.fields.clone();
            self.modified_fields.clear();
        } else {
            let payload = if removed.is_empty() {
                changed
            } else {
                let mut unset = RawRecord::new();
                for field in removed {
                    unset.insert(field, "");
                }

                let mut payload = RawRecord::new();
                if !changed.is_empty() {
                    payload.insert("$set", changed);
                }
                payload.insert("$unset", unset);
                payload
            };

            collection.update(payload, criteria, WriteOptions::default())?;
            hooks.after_update(self)?;

            let criteria = self.primary_key.criteria(&self.fields)?;
            self.reload(collection, criteria)?;

            debug!(target: "docmapper::document", collection = %collection.name(), "Document updated");
        }

        self.key_value()
    }

    fn key_value(&self) -> MapperResult<Bson> {
        let mut values = self.primary_key.criteria(&self.fields)?;

        if self.primary_key.is_single() {
            Ok(values.remove(self.primary_key.identity()).unwrap_or(Bson::Null))
        } else {
            Ok(Bson::Document(values))
        }
    }

    /// Deletes the document's record and returns how many records were removed.
    ///
    /// Every field value is nulled afterwards; the field names stay.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::ReadOnlyViolation`] for read-only documents and
    /// [`MapperError::Disconnected`] for detached ones.
    pub fn delete(&mut self) -> MapperResult<u64> {
        if self.read_only {
            return Err(MapperError::ReadOnlyViolation);
        }

        let collection = self.live_collection("delete")?;
        let criteria = self.primary_key.criteria(&self.clean_fields)?;
        let hooks = collection.hooks();

        hooks.before_delete(self)?;
        let removed = collection.delete(criteria, WriteOptions::default())?;
        hooks.after_delete(self)?;

        for (_, value) in self.fields.iter_mut() {
            *value = Bson::Null;
        }

        debug!(target: "docmapper::document", collection = %collection.name(), removed, "Document deleted");

        Ok(removed)
    }

    /// Reloads the document from the store, discarding unsaved changes.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Disconnected`] for detached documents,
    /// [`MapperError::PrimaryKeyValueMissing`] for documents never persisted and
    /// [`MapperError::DocumentNotFound`] when the record no longer exists.
    pub fn refresh(&mut self) -> MapperResult<()> {
        let collection = self.live_collection("refresh")?;
        let criteria = self.primary_key.criteria(&self.clean_fields)?;

        self.reload(&collection, criteria)
    }

    fn reload(&mut self, collection: &Collection, criteria: RawRecord) -> MapperResult<()> {
        let row = collection
            .fetch_row(criteria, &[])?
            .ok_or_else(|| MapperError::DocumentNotFound(collection.name().to_string()))?;

        self.fields = row.fields;
        self.clean_fields = self.fields.clone();
        self.modified_fields.clear();

        Ok(())
    }
}

/// Builder for [`Document`].
#[derive(Debug)]
pub struct DocumentBuilder {
    fields: RawRecord,
    collection: Option<Collection>,
    collection_kind: Option<String>,
    primary_key: Option<PrimaryKey>,
    stored: bool,
    read_only: bool,
}

impl DocumentBuilder {
    /// Creates a builder for a new, unsaved document holding `fields`.
    pub fn new(fields: RawRecord) -> Self {
        Self {
            fields,
            collection: None,
            collection_kind: None,
            primary_key: None,
            stored: false,
            read_only: false,
        }
    }

    /// Attaches the document to `collection` and records its kind and primary key.
    pub fn collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Records the kind of collection the document belongs to.
    pub fn collection_kind(mut self, kind: impl Into<String>) -> Self {
        self.collection_kind = Some(kind.into());
        self
    }

    /// Records the primary key of a document built without a collection.
    pub fn primary_key(mut self, primary_key: PrimaryKey) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Marks the fields as already persisted.
    ///
    /// Fields of an unsaved document all count as modified.
    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    /// Marks the document read-only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builds the document.
    pub fn build(self) -> Document {
        let primary_key = match (&self.collection, self.primary_key) {
            (Some(collection), _) => collection.primary_key().clone(),
            (None, Some(primary_key)) => primary_key,
            (None, None) => PrimaryKey::default(),
        };

        let collection_kind = self
            .collection
            .as_ref()
            .map(|collection| collection.kind().to_string())
            .or(self.collection_kind);

        let (clean_fields, modified_fields) = if self.stored {
            (self.fields.clone(), BTreeSet::new())
        } else {
            (RawRecord::new(), self.fields.keys().cloned().collect())
        };

        Document {
            connected: self.collection.is_some(),
            fields: self.fields,
            clean_fields,
            modified_fields,
            primary_key,
            collection_kind,
            read_only: self.read_only,
            collection: self.collection,
        }
    }
}
