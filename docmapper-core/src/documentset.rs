//! Documentsets: ordered, cursor-navigable results of a fetch.
//!
//! A [`Documentset`] holds the raw records returned by the store and turns them into
//! [`Document`]s lazily. Once a position has been materialized, the same document is
//! returned every time that position is visited again, so edits made through one
//! access are visible through the next.
//!
//! # Example
//!
//! ```ignore
//! let mut users = collection.fetch_all(FindRequest::new(doc! {}))?;
//!
//! users.rewind();
//! while users.valid() {
//!     if let Some(user) = users.current() {
//!         user.set("seen", true);
//!         user.save()?;
//!     }
//!     users.next();
//! }
//! ```

use bson::Document as RawRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    collection::{Collection, DEFAULT_DOCUMENT_TYPE},
    document::Document,
    error::{MapperError, MapperResult},
    key::PrimaryKey,
};

/// An ordered set of documents fetched from one collection.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Documentset {
    records: Vec<RawRecord>,
    materialized: BTreeMap<usize, Document>,
    position: usize,
    count: usize,
    primary_key: PrimaryKey,
    collection_kind: Option<String>,
    document_type: String,
    stored: bool,
    read_only: bool,
    #[serde(skip)]
    collection: Option<Collection>,
    #[serde(skip)]
    connected: bool,
}

impl Documentset {
    /// Creates a builder for a documentset over `records`.
    pub fn builder(records: Vec<RawRecord>) -> DocumentsetBuilder {
        DocumentsetBuilder::new(records)
    }

    /// Moves the cursor back to the first position.
    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self
    }

    /// Advances the cursor by one position.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> &mut Self {
        self.position += 1;
        self
    }

    /// Returns whether the cursor points at a position below the total count.
    pub fn valid(&self) -> bool {
        self.position < self.count
    }

    /// Returns the cursor position.
    pub fn key(&self) -> usize {
        self.position
    }

    /// Returns the total count reported by the store.
    ///
    /// This may exceed [`Documentset::len`] when the fetch was limited.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns the number of records actually fetched.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether no record was fetched.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns whether a record was fetched at `position`.
    pub fn contains(&self, position: usize) -> bool {
        position < self.records.len()
    }

    /// Returns the document at the cursor, materializing it on first access.
    ///
    /// Returns `None` when the cursor is past the end, or points at a position the
    /// store counted but did not return.
    pub fn current(&mut self) -> Option<&mut Document> {
        if !self.valid() {
            return None;
        }

        self.materialize(self.position)
    }

    /// Moves the cursor to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::IndexOutOfRange`] when `position` is not below the total count.
    pub fn seek(&mut self, position: usize) -> MapperResult<&mut Self> {
        if position >= self.count {
            return Err(MapperError::IndexOutOfRange {
                index: position,
                count: self.count,
            });
        }

        self.position = position;
        Ok(self)
    }

    /// Returns the document at `position` without moving the cursor.
    pub fn get(&mut self, position: usize) -> MapperResult<Option<&mut Document>> {
        self.document(position, false)
    }

    /// Returns the document at `position`, leaving the cursor there when `seek` is set.
    pub fn document(&mut self, position: usize, seek: bool) -> MapperResult<Option<&mut Document>> {
        let previous = self.position;
        self.seek(position)?;

        if !seek {
            self.position = previous;
        }

        Ok(self.materialize(position))
    }

    /// Returns every record, with the current data of materialized documents written back.
    pub fn to_array(&mut self) -> Vec<RawRecord> {
        for (position, document) in &self.materialized {
            if let Some(record) = self.records.get_mut(*position) {
                *record = document.to_array();
            }
        }

        self.records.clone()
    }

    /// Returns the kind of the collection the set was fetched from.
    pub fn collection_kind(&self) -> Option<&str> {
        self.collection_kind.as_deref()
    }

    /// Returns the type tag of the documents in this set.
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    /// Returns the collection the set is attached to.
    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref().filter(|_| self.connected)
    }

    /// Returns whether the set is attached to a live collection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Attaches the set and every materialized document to `collection`.
    ///
    /// Returns whether any materialized document was reattached. Documents
    /// materialized afterwards are attached as they are created.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::IncompatibleCollection`] when the collection is of a
    /// different kind or has a different primary key than the one the set came from.
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
                "collection {} does not have the same primary key as the documentset",
                collection.name()
            )));
        }

        let mut reconnected = false;
        for document in self.materialized.values_mut() {
            reconnected |= document.set_collection(collection.clone())?;
        }

        self.primary_key = collection.primary_key().clone();
        self.collection_kind = Some(collection.kind().to_string());
        self.collection = Some(collection);
        self.connected = true;

        Ok(reconnected)
    }

    fn materialize(&mut self, position: usize) -> Option<&mut Document> {
        if !self.materialized.contains_key(&position) {
            let record = self.records.get(position)?.clone();
            let document = self.build_document(record);
            self.materialized.insert(position, document);
        }

        self.materialized.get_mut(&position)
    }

    fn build_document(&self, record: RawRecord) -> Document {
        let mut builder = Document::builder(record)
            .primary_key(self.primary_key.clone())
            .stored(self.stored)
            .read_only(self.read_only);

        if let Some(kind) = &self.collection_kind {
            builder = builder.collection_kind(kind.clone());
        }
        if let (true, Some(collection)) = (self.connected, &self.collection) {
            builder = builder.collection(collection.clone());
        }

        builder.build()
    }
}

impl IntoIterator for Documentset {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    /// Consumes the set and yields every fetched document in order.
    fn into_iter(mut self) -> Self::IntoIter {
        let records = std::mem::take(&mut self.records);
        let mut materialized = std::mem::take(&mut self.materialized);

        records
            .into_iter()
            .enumerate()
            .map(|(position, record)| match materialized.remove(&position) {
                Some(document) => document,
                None => self.build_document(record),
            })
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// Builder for [`Documentset`].
#[derive(Debug)]
pub struct DocumentsetBuilder {
    records: Vec<RawRecord>,
    collection: Option<Collection>,
    count: Option<usize>,
    primary_key: PrimaryKey,
    collection_kind: Option<String>,
    document_type: Option<String>,
    stored: bool,
    read_only: bool,
}

impl DocumentsetBuilder {
    /// Creates a builder over `records`.
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            collection: None,
            count: None,
            primary_key: PrimaryKey::default(),
            collection_kind: None,
            document_type: None,
            stored: false,
            read_only: false,
        }
    }

    /// Attaches the set to `collection` and records its kind, key and document type.
    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Sets the total count reported by the store. Defaults to the number of records.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the primary key of a set built without a collection.
    pub fn with_primary_key(mut self, primary_key: PrimaryKey) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Records the kind of collection the set belongs to.
    pub fn with_collection_kind(mut self, kind: impl Into<String>) -> Self {
        self.collection_kind = Some(kind.into());
        self
    }

    /// Sets the document type tag.
    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    /// Marks the records as already persisted.
    pub fn with_stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    /// Marks every document of the set read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builds the documentset with its cursor at position 0.
    pub fn build(self) -> Documentset {
        let primary_key = self
            .collection
            .as_ref()
            .map(|collection| collection.primary_key().clone())
            .unwrap_or(self.primary_key);

        let collection_kind = self
            .collection
            .as_ref()
            .map(|collection| collection.kind().to_string())
            .or(self.collection_kind);

        let document_type = self
            .document_type
            .or_else(|| self.collection.as_ref().map(|c| c.document_type().to_string()))
            .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string());

        Documentset {
            count: self.count.unwrap_or(self.records.len()),
            records: self.records,
            materialized: BTreeMap::new(),
            position: 0,
            primary_key,
            collection_kind,
            document_type,
            stored: self.stored,
            read_only: self.read_only,
            connected: self.collection.is_some(),
            collection: self.collection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn people() -> Documentset {
        Documentset::builder(vec![
            doc! { "_id": "a", "name": "Ada" },
            doc! { "_id": "b", "name": "Bob" },
            doc! { "_id": "c", "name": "Cy" },
        ])
        .with_stored(true)
        .with_collection_kind("people")
        .build()
    }

    #[test]
    fn test_cursor_walk() {
        let mut set = people();
        let mut names = Vec::new();

        set.rewind();
        while set.valid() {
            let name = set.current().unwrap().get("name").unwrap().clone();
            names.push(name.as_str().unwrap().to_string());
            set.next();
        }

        assert_eq!(names, vec!["Ada", "Bob", "Cy"]);
        assert_eq!(set.key(), 3);
        assert!(set.current().is_none());
    }

    #[test]
    fn test_current_returns_the_same_document() {
        let mut set = people();

        let first = set.current().unwrap() as *const Document;
        let second = set.current().unwrap() as *const Document;
        assert!(std::ptr::eq(first, second));

        set.current().unwrap().set("name", "Ann");
        assert_eq!(set.current().unwrap().get("name").unwrap().as_str(), Some("Ann"));
    }

    #[test]
    fn test_seek_bounds() {
        let mut set = people();

        assert!(set.seek(2).is_ok());
        assert_eq!(set.key(), 2);
        assert!(matches!(set.seek(3), Err(MapperError::IndexOutOfRange { index: 3, count: 3 })));
        assert_eq!(set.key(), 2);
    }

    #[test]
    fn test_get_does_not_move_the_cursor() {
        let mut set = people();

        let doc = set.get(1).unwrap().unwrap();
        assert_eq!(doc.get("_id").unwrap().as_str(), Some("b"));
        assert_eq!(set.key(), 0);

        set.document(2, true).unwrap();
        assert_eq!(set.key(), 2);
    }

    #[test]
    fn test_to_array_writes_back_edits() {
        let mut set = people();

        set.seek(1).unwrap();
        set.current().unwrap().set("name", "Bea");

        let records = set.to_array();
        assert_eq!(records[1], doc! { "_id": "b", "name": "Bea" });
        assert_eq!(records[0], doc! { "_id": "a", "name": "Ada" });
    }

    #[test]
    fn test_count_beyond_fetched_records() {
        let mut set = Documentset::builder(vec![doc! { "_id": "a" }]).with_count(5).build();

        assert_eq!(set.count(), 5);
        assert_eq!(set.len(), 1);
        assert!(set.seek(3).is_ok());
        assert!(set.valid());
        assert!(set.current().is_none());
        assert!(!set.contains(3));
    }

    #[test]
    fn test_into_iter_keeps_edits() {
        let mut set = people();
        set.current().unwrap().set("name", "Ann");

        let names = set
            .into_iter()
            .map(|doc| doc.get("name").unwrap().as_str().unwrap().to_string())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["Ann", "Bob", "Cy"]);
    }

    #[test]
    fn test_detached_set_builds_detached_documents() {
        let mut set = people();
        let doc = set.current().unwrap();

        assert!(!doc.is_connected());
        assert_eq!(doc.collection_kind(), Some("people"));
        assert!(!doc.is_modified("name"));
    }
}
