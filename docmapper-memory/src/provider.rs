//! In-memory connection provider.
//!
//! Records are stored as BSON documents in per-database, per-collection vectors
//! behind a read-write lock. Every write is also appended to a journal that tests
//! can inspect to see exactly what was sent to the store.

use std::{collections::HashMap, sync::Arc, time::Duration};
use bson::{Bson, Document as RawRecord, doc, oid::ObjectId};
use parking_lot::RwLock;
use tracing::debug;

use docmapper_core::{
    error::{MapperError, MapperResult},
    key::OBJECT_ID,
    provider::{CollectionHandle, ConnectionProvider, FindRequest, ProviderBuilder, RecordCursor, WriteOptions},
};

use crate::evaluator::{RecordEvaluator, compare_records};

/// Name of the database selected when none is configured.
pub const DEFAULT_DATABASE: &str = "test";

type CollectionMap = HashMap<String, Vec<RawRecord>>;
type StoreMap = HashMap<String, CollectionMap>;

/// A write received by the in-memory provider.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    /// A record was inserted.
    Insert {
        /// Target collection.
        collection: String,
        /// The record as received.
        record: RawRecord,
    },
    /// An update was requested.
    Update {
        /// Target collection.
        collection: String,
        /// Match criteria.
        criteria: RawRecord,
        /// The update payload as received.
        record: RawRecord,
        /// Forwarded options.
        options: WriteOptions,
    },
    /// A removal was requested.
    Remove {
        /// Target collection.
        collection: String,
        /// Match criteria.
        criteria: RawRecord,
        /// Forwarded options.
        options: WriteOptions,
    },
}

impl JournalEntry {
    /// Returns the collection the write targeted.
    pub fn collection(&self) -> &str {
        match self {
            JournalEntry::Insert { collection, .. }
            | JournalEntry::Update { collection, .. }
            | JournalEntry::Remove { collection, .. } => collection,
        }
    }
}

#[derive(Debug, Default)]
struct SharedState {
    store: RwLock<StoreMap>,
    journal: RwLock<Vec<JournalEntry>>,
}

/// Thread-safe in-memory connection provider.
///
/// `InMemoryProvider` is cloneable; clones share the same records and journal.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryProvider;
/// use docmapper_core::provider::{ConnectionProvider, ProviderBuilder};
/// use bson::doc;
///
/// let provider = InMemoryProvider::builder().database("app").build()?;
/// let users = provider.select_collection(None, "users")?;
/// let id = users.insert(doc! { "name": "Alice" })?;
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    database: String,
    timeout: Option<Duration>,
    state: Arc<SharedState>,
}

impl InMemoryProvider {
    /// Creates an empty provider whose default database is `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            timeout: None,
            state: Arc::new(SharedState::default()),
        }
    }

    /// Creates a builder for constructing an `InMemoryProvider`.
    pub fn builder() -> InMemoryProviderBuilder {
        InMemoryProviderBuilder::default()
    }

    /// Returns every write received so far, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.journal.read().clone()
    }

    /// Forgets the writes received so far.
    pub fn clear_journal(&self) {
        self.state.journal.write().clear();
    }

    /// Returns a copy of every record stored in `collection` of `database`.
    pub fn records(&self, database: Option<&str>, collection: &str) -> Vec<RawRecord> {
        let database = database.unwrap_or(&self.database);

        self.state
            .store
            .read()
            .get(database)
            .and_then(|collections| collections.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    fn count_command(&self, database: &str, collection: &str, query: Option<&RawRecord>) -> MapperResult<u64> {
        let store = self.state.store.read();
        let records = store
            .get(database)
            .and_then(|collections| collections.get(collection))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let matched = match query {
            Some(query) => RecordEvaluator::filter_records(records, query)?.len(),
            None => records.len(),
        };

        Ok(matched as u64)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE)
    }
}

impl ConnectionProvider for InMemoryProvider {
    fn database(&self) -> &str {
        &self.database
    }

    fn select_collection(&self, database: Option<&str>, name: &str) -> MapperResult<Box<dyn CollectionHandle>> {
        Ok(Box::new(InMemoryCollection {
            database: database.unwrap_or(&self.database).to_string(),
            name: name.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn execute(&self, database: Option<&str>, command: RawRecord) -> MapperResult<RawRecord> {
        let Some((name, argument)) = command.iter().next() else {
            return Err(MapperError::UnsupportedCommand("<empty>".into()));
        };
        let database = database.unwrap_or(&self.database);

        debug!(target: "docmapper::provider", command = %name, database = %database, "Executing command");

        match (name.as_str(), argument) {
            ("ping", _) => Ok(doc! { "ok": 1.0 }),
            ("count", Bson::String(collection)) => {
                let n = self.count_command(database, collection, command.get_document("query").ok())?;
                Ok(doc! { "n": n as i64, "ok": 1.0 })
            }
            ("drop", Bson::String(collection)) => {
                let dropped = self
                    .state
                    .store
                    .write()
                    .get_mut(database)
                    .and_then(|collections| collections.remove(collection))
                    .is_some();

                if dropped {
                    Ok(doc! { "ns": format!("{}.{}", database, collection), "ok": 1.0 })
                } else {
                    Err(MapperError::Backend(format!("ns not found: {}.{}", database, collection)))
                }
            }
            ("listCollections", _) => {
                let mut names = self
                    .state
                    .store
                    .read()
                    .get(database)
                    .map(|collections| collections.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();
                names.sort();

                let batch = names.into_iter().map(|name| Bson::Document(doc! { "name": name })).collect::<Vec<_>>();
                Ok(doc! { "cursor": { "firstBatch": batch }, "ok": 1.0 })
            }
            (other, _) => Err(MapperError::UnsupportedCommand(other.to_string())),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Handle on one collection of an [`InMemoryProvider`].
#[derive(Debug)]
pub struct InMemoryCollection {
    database: String,
    name: String,
    state: Arc<SharedState>,
}

impl InMemoryCollection {
    fn record(&self, entry: JournalEntry) {
        self.state.journal.write().push(entry);
    }
}

/// Applies an update payload to a stored record.
///
/// Operator payloads support `$set`, `$unset` and `$inc`; any other payload is
/// assigned field by field. The object id is never changed.
fn apply_update(record: &mut RawRecord, update: &RawRecord) -> MapperResult<()> {
    let is_operator = update.keys().next().is_some_and(|key| key.starts_with('$'));

    if !is_operator {
        for (field, value) in update {
            if field != OBJECT_ID {
                record.insert(field.clone(), value.clone());
            }
        }
        return Ok(());
    }

    for (operator, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| MapperError::Backend(format!("{} expects a document", operator)))?;

        match operator.as_str() {
            "$set" => {
                for (field, value) in fields {
                    if field != OBJECT_ID {
                        record.insert(field.clone(), value.clone());
                    }
                }
            }
            "$unset" => {
                for (field, _) in fields {
                    record.remove(field);
                }
            }
            "$inc" => {
                for (field, amount) in fields {
                    let current = record.get(field).cloned().unwrap_or(Bson::Int32(0));
                    record.insert(field.clone(), increment(field, current, amount)?);
                }
            }
            other => return Err(MapperError::UnsupportedCommand(other.to_string())),
        }
    }

    Ok(())
}

/// Adds `amount` to `current`. Int32 sums that overflow are widened to Int64.
fn increment(field: &str, current: Bson, amount: &Bson) -> MapperResult<Bson> {
    let overflow = || MapperError::Backend(format!("incrementing field {} overflows", field));

    let total = match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map_or_else(|| Bson::Int64(i64::from(a) + i64::from(*b)), Bson::Int32),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(a).checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(i64::from(*b)).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + f64::from(*b)),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(f64::from(a) + b),
        _ => return Err(MapperError::Backend(format!("cannot increment non-numeric field {}", field))),
    };

    Ok(total)
}

/// Builds the record inserted by an upsert that matched nothing.
fn upsert_record(criteria: &RawRecord, update: &RawRecord) -> MapperResult<RawRecord> {
    let mut record = criteria
        .iter()
        .filter(|(field, value)| {
            let is_operator = value.as_document().is_some_and(|d| d.keys().any(|k| k.starts_with('$')));
            !field.starts_with('$') && !is_operator
        })
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect::<RawRecord>();

    apply_update(&mut record, update)?;

    if let Some(id) = update.get(OBJECT_ID).filter(|_| !record.contains_key(OBJECT_ID)) {
        record.insert(OBJECT_ID, id.clone());
    }
    if !record.contains_key(OBJECT_ID) {
        record.insert(OBJECT_ID, ObjectId::new());
    }

    Ok(record)
}

fn project(record: &RawRecord, fields: &[String]) -> RawRecord {
    if fields.is_empty() {
        return record.clone();
    }

    record
        .iter()
        .filter(|(field, _)| field.as_str() == OBJECT_ID || fields.iter().any(|f| f == *field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

impl CollectionHandle for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, mut record: RawRecord) -> MapperResult<Bson> {
        self.record(JournalEntry::Insert {
            collection: self.name.clone(),
            record: record.clone(),
        });

        let id = match record.get(OBJECT_ID) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                record.insert(OBJECT_ID, id.clone());
                id
            }
        };

        let mut store = self.state.store.write();
        let records = store
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();

        if records.iter().any(|existing| existing.get(OBJECT_ID) == Some(&id)) {
            return Err(MapperError::DuplicateKey(id.to_string(), self.name.clone()));
        }

        records.push(record);

        Ok(id)
    }

    fn update(&self, criteria: RawRecord, record: RawRecord, options: WriteOptions) -> MapperResult<u64> {
        self.record(JournalEntry::Update {
            collection: self.name.clone(),
            criteria: criteria.clone(),
            record: record.clone(),
            options,
        });

        let mut store = self.state.store.write();
        let records = store
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();

        let mut positions = Vec::new();
        for (position, existing) in records.iter().enumerate() {
            if RecordEvaluator::new(existing).matches(&criteria)? {
                positions.push(position);

                if !options.multiple {
                    break;
                }
            }
        }

        // Nothing is written unless every matched record accepts the update.
        let updated = positions
            .into_iter()
            .map(|position| {
                let mut candidate = records[position].clone();
                apply_update(&mut candidate, &record).map(|()| (position, candidate))
            })
            .collect::<MapperResult<Vec<_>>>()?;

        let mut matched = updated.len() as u64;
        for (position, candidate) in updated {
            records[position] = candidate;
        }

        if matched == 0 && options.upsert {
            records.push(upsert_record(&criteria, &record)?);
            matched = 1;
        }

        Ok(matched)
    }

    fn remove(&self, criteria: RawRecord, options: WriteOptions) -> MapperResult<u64> {
        self.record(JournalEntry::Remove {
            collection: self.name.clone(),
            criteria: criteria.clone(),
            options,
        });

        let mut store = self.state.store.write();
        let Some(records) = store
            .get_mut(&self.database)
            .and_then(|collections| collections.get_mut(&self.name))
        else {
            return Ok(0);
        };

        let mut removed = 0;
        let mut doomed = Vec::with_capacity(records.len());

        for record in records.iter() {
            let limit_reached = options.just_one && removed > 0;
            let hit = !limit_reached && RecordEvaluator::new(record).matches(&criteria)?;

            removed += u64::from(hit);
            doomed.push(hit);
        }

        let mut doomed = doomed.into_iter();
        records.retain(|_| !doomed.next().unwrap_or(false));

        Ok(removed)
    }

    fn find(&self, request: FindRequest) -> MapperResult<Box<dyn RecordCursor>> {
        let store = self.state.store.read();
        let records = store
            .get(&self.database)
            .and_then(|collections| collections.get(&self.name))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut matched = RecordEvaluator::filter_records(records, &request.filter)?;
        let total = matched.len() as u64;

        if let Some(sort) = &request.sort {
            matched.sort_by(|a, b| compare_records(a, b, sort));
        }

        let records = matched
            .iter()
            .take(request.limit.map_or(usize::MAX, |limit| limit as usize))
            .map(|record| project(record, &request.projection))
            .collect::<Vec<_>>();

        Ok(Box::new(InMemoryCursor {
            records: records.into_iter(),
            total,
        }))
    }

    fn find_one(&self, query: RawRecord, fields: &[String]) -> MapperResult<Option<RawRecord>> {
        let store = self.state.store.read();
        let records = store
            .get(&self.database)
            .and_then(|collections| collections.get(&self.name))
            .map(Vec::as_slice)
            .unwrap_or_default();

        for record in records {
            if RecordEvaluator::new(record).matches(&query)? {
                return Ok(Some(project(record, fields)));
            }
        }

        Ok(None)
    }
}

/// Cursor over a snapshot of matched records.
#[derive(Debug)]
pub struct InMemoryCursor {
    records: std::vec::IntoIter<RawRecord>,
    total: u64,
}

impl RecordCursor for InMemoryCursor {
    fn has_next(&mut self) -> MapperResult<bool> {
        Ok(!self.records.as_slice().is_empty())
    }

    fn next_record(&mut self) -> MapperResult<Option<RawRecord>> {
        Ok(self.records.next())
    }

    fn count(&mut self) -> MapperResult<u64> {
        Ok(self.total)
    }
}

/// Builder for constructing [`InMemoryProvider`] instances.
#[derive(Debug, Default)]
pub struct InMemoryProviderBuilder {
    database: Option<String>,
    timeout: Option<Duration>,
}

impl InMemoryProviderBuilder {
    /// Sets the default database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the timeout reported by the provider.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ProviderBuilder for InMemoryProviderBuilder {
    type Provider = InMemoryProvider;

    fn build(self) -> MapperResult<Self::Provider> {
        let database = self.database.unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        if database.is_empty() || database.contains(['.', ' ', '$', '/', '\\']) {
            return Err(MapperError::InvalidConfiguration(format!("invalid database name {:?}", database)));
        }

        Ok(InMemoryProvider {
            timeout: self.timeout,
            ..InMemoryProvider::new(database)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(provider: &InMemoryProvider) -> Box<dyn CollectionHandle> {
        provider.select_collection(None, "users").unwrap()
    }

    #[test]
    fn test_insert_generates_object_id() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);

        let id = users.insert(doc! { "name": "Alice" }).unwrap();

        assert!(matches!(id, Bson::ObjectId(_)));
        let stored = provider.records(None, "users");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get(OBJECT_ID), Some(&id));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);

        users.insert(doc! { "_id": 1, "name": "a" }).unwrap();
        let err = users.insert(doc! { "_id": 1, "name": "b" }).unwrap_err();

        assert!(matches!(err, MapperError::DuplicateKey(_, collection) if collection == "users"));
    }

    #[test]
    fn test_update_assigns_and_unsets() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        users.insert(doc! { "_id": 1, "x": 1, "y": 2, "z": 3 }).unwrap();

        let matched = users
            .update(doc! { "_id": 1 }, doc! { "x": 5 }, WriteOptions::default())
            .unwrap();
        assert_eq!(matched, 1);

        users
            .update(doc! { "_id": 1 }, doc! { "$set": { "y": 7 }, "$unset": { "z": "" } }, WriteOptions::default())
            .unwrap();

        assert_eq!(provider.records(None, "users"), vec![doc! { "_id": 1, "x": 5, "y": 7 }]);
    }

    #[test]
    fn test_update_multiple_and_upsert() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        users.insert(doc! { "_id": 1, "g": "a" }).unwrap();
        users.insert(doc! { "_id": 2, "g": "a" }).unwrap();

        let single = users
            .update(doc! { "g": "a" }, doc! { "$inc": { "n": 1 } }, WriteOptions::default())
            .unwrap();
        let multiple = users
            .update(doc! { "g": "a" }, doc! { "$inc": { "n": 1 } }, WriteOptions::new().multiple(true))
            .unwrap();
        assert_eq!((single, multiple), (1, 2));

        let upserted = users
            .update(doc! { "_id": 3 }, doc! { "$set": { "g": "b" } }, WriteOptions::new().upsert(true))
            .unwrap();
        assert_eq!(upserted, 1);
        assert_eq!(provider.records(None, "users")[2], doc! { "_id": 3, "g": "b" });
    }

    #[test]
    fn test_remove_just_one() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        for id in 0..3 {
            users.insert(doc! { "_id": id, "g": "a" }).unwrap();
        }

        assert_eq!(users.remove(doc! { "g": "a" }, WriteOptions::new().just_one(true)).unwrap(), 1);
        assert_eq!(users.remove(doc! { "g": "a" }, WriteOptions::default()).unwrap(), 2);
        assert!(provider.records(None, "users").is_empty());
    }

    #[test]
    fn test_find_sorts_limits_projects_and_counts() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        for (id, age) in [(1, 40), (2, 20), (3, 30)] {
            users.insert(doc! { "_id": id, "age": age, "name": format!("u{}", id) }).unwrap();
        }

        let request = FindRequest::new(doc! { "age": { "$gte": 20 } })
            .sort(doc! { "age": 1 })
            .limit(2)
            .projection(vec!["age".to_string()]);
        let mut cursor = users.find(request).unwrap();

        assert_eq!(cursor.count().unwrap(), 3);
        assert!(cursor.has_next().unwrap());
        assert_eq!(cursor.next_record().unwrap(), Some(doc! { "_id": 2, "age": 20 }));
        assert_eq!(cursor.next_record().unwrap(), Some(doc! { "_id": 3, "age": 30 }));
        assert!(!cursor.has_next().unwrap());
        assert_eq!(cursor.next_record().unwrap(), None);
    }

    #[test]
    fn test_databases_are_isolated() {
        let provider = InMemoryProvider::default();
        provider
            .select_collection(Some("other"), "users")
            .unwrap()
            .insert(doc! { "_id": 1 })
            .unwrap();

        assert!(provider.records(None, "users").is_empty());
        assert_eq!(provider.records(Some("other"), "users").len(), 1);
        assert_eq!(users(&provider).find_one(doc! { "_id": 1 }, &[]).unwrap(), None);
    }

    #[test]
    fn test_journal_records_writes() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);

        users.insert(doc! { "_id": 1 }).unwrap();
        users.remove(doc! { "_id": 1 }, WriteOptions::default()).unwrap();

        let journal = provider.journal();
        assert_eq!(journal.len(), 2);
        assert!(matches!(&journal[0], JournalEntry::Insert { record, .. } if record == &doc! { "_id": 1 }));
        assert!(matches!(&journal[1], JournalEntry::Remove { .. }));
        assert_eq!(journal[1].collection(), "users");

        provider.clear_journal();
        assert!(provider.journal().is_empty());
    }

    #[test]
    fn test_commands() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        users.insert(doc! { "_id": 1, "a": 1 }).unwrap();
        users.insert(doc! { "_id": 2, "a": 2 }).unwrap();

        assert_eq!(provider.execute(None, doc! { "ping": 1 }).unwrap().get_f64("ok").unwrap(), 1.0);
        assert_eq!(
            provider
                .execute(None, doc! { "count": "users", "query": { "a": 2 } })
                .unwrap()
                .get_i64("n")
                .unwrap(),
            1
        );
        assert!(provider.execute(None, doc! { "drop": "users" }).is_ok());
        assert!(provider.records(None, "users").is_empty());
        assert!(matches!(
            provider.execute(None, doc! { "shutdown": 1 }),
            Err(MapperError::UnsupportedCommand(name)) if name == "shutdown"
        ));
    }

    #[test]
    fn test_builder_validates_database_name() {
        let provider = InMemoryProvider::builder()
            .database("app")
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();

        assert_eq!(provider.database(), "app");
        assert_eq!(provider.timeout(), Some(Duration::from_secs(1)));
        assert!(InMemoryProvider::builder().database("a.b").build().is_err());
    }

    #[test]
    fn test_rejected_filter_removes_nothing() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        for id in 1..=3 {
            users.insert(doc! { "_id": id, "a": "x" }).unwrap();
        }

        let result = users.remove(doc! { "a": { "$regex": "x" } }, WriteOptions::default());

        assert!(matches!(result, Err(MapperError::UnsupportedCommand(_))));
        assert_eq!(provider.records(None, "users").len(), 3);
    }

    #[test]
    fn test_failed_update_leaves_every_record_untouched() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        users.insert(doc! { "_id": 1, "n": 1 }).unwrap();
        users.insert(doc! { "_id": 2, "n": "s" }).unwrap();

        let result = users.update(doc! {}, doc! { "$inc": { "n": 1 } }, WriteOptions::new().multiple(true));

        assert!(matches!(result, Err(MapperError::Backend(_))));
        assert_eq!(
            provider.records(None, "users"),
            vec![doc! { "_id": 1, "n": 1 }, doc! { "_id": 2, "n": "s" }]
        );
    }

    #[test]
    fn test_increment_widens_or_rejects_overflow() {
        let provider = InMemoryProvider::default();
        let users = users(&provider);
        users.insert(doc! { "_id": 1, "n": i32::MAX, "big": i64::MAX }).unwrap();

        users
            .update(doc! { "_id": 1 }, doc! { "$inc": { "n": 1 } }, WriteOptions::default())
            .unwrap();
        assert_eq!(
            provider.records(None, "users")[0].get("n"),
            Some(&Bson::Int64(i64::from(i32::MAX) + 1))
        );

        let result = users.update(doc! { "_id": 1 }, doc! { "$inc": { "big": 1 } }, WriteOptions::default());
        assert!(matches!(result, Err(MapperError::Backend(_))));
        assert_eq!(provider.records(None, "users")[0].get("big"), Some(&Bson::Int64(i64::MAX)));
    }

    #[test]
    fn test_commands_target_requested_database() {
        let provider = InMemoryProvider::default();
        provider
            .select_collection(Some("audit"), "logs")
            .unwrap()
            .insert(doc! { "_id": 1 })
            .unwrap();

        let count = |database| {
            provider
                .execute(database, doc! { "count": "logs" })
                .unwrap()
                .get_i64("n")
                .unwrap()
        };

        assert_eq!(count(Some("audit")), 1);
        assert_eq!(count(None), 0);
    }
}
