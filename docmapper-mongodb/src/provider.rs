//! MongoDB connection provider built on the blocking driver API.

use std::{collections::BTreeMap, time::Duration};
use bson::{Bson, Document as RawRecord, doc};
use mongodb::{
    error::{Error as DriverError, ErrorKind, WriteFailure},
    options::{ClientOptions, Credential},
    sync::{Client, Collection as MongoCollection, Cursor},
};
use parking_lot::{Mutex, const_mutex};
use tracing::debug;

use docmapper_core::{
    config::ConnectionConfig,
    error::{MapperError, MapperResult},
    key::OBJECT_ID,
    provider::{CollectionHandle, ConnectionProvider, FindRequest, ProviderBuilder, RecordCursor, WriteOptions},
};

/// Server error code reported for unique index violations.
const DUPLICATE_KEY_CODE: i32 = 11000;

static PERSISTENT_CLIENTS: Mutex<BTreeMap<String, Client>> = const_mutex(BTreeMap::new());

fn backend_error(err: DriverError) -> MapperError {
    MapperError::Backend(err.to_string())
}

fn write_error(err: DriverError, id: Option<&Bson>, collection: &str) -> MapperError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY_CODE => {
            MapperError::DuplicateKey(id.map(Bson::to_string).unwrap_or_default(), collection.to_string())
        }
        _ => backend_error(err),
    }
}

/// Turns a list of field names into a projection document.
fn projection(fields: &[String]) -> Option<RawRecord> {
    (!fields.is_empty()).then(|| fields.iter().map(|field| (field.clone(), Bson::Int32(1))).collect())
}

/// Wraps a plain payload in `$set` so the update assigns fields instead of
/// replacing the record. Operator payloads are sent unchanged.
fn update_document(record: RawRecord) -> RawRecord {
    if record.keys().next().is_some_and(|key| key.starts_with('$')) {
        return record;
    }

    let assigned = record
        .into_iter()
        .filter(|(field, _)| field != OBJECT_ID)
        .collect::<RawRecord>();

    doc! { "$set": assigned }
}

/// MongoDB implementation of [`ConnectionProvider`].
#[derive(Debug, Clone)]
pub struct MongoDbProvider {
    client: Client,
    database: String,
    timeout: Duration,
}

impl MongoDbProvider {
    /// Wraps an existing client.
    pub fn new(client: Client, database: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            database: database.into(),
            timeout,
        }
    }

    /// Creates a builder from a connection configuration.
    pub fn builder(config: ConnectionConfig) -> MongoDbProviderBuilder {
        MongoDbProviderBuilder::new(config)
    }

    /// Returns the underlying driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sends a `ping` to the server.
    pub fn ping(&self) -> MapperResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .run()
            .map_err(backend_error)?;

        Ok(())
    }
}

impl ConnectionProvider for MongoDbProvider {
    fn database(&self) -> &str {
        &self.database
    }

    fn select_collection(&self, database: Option<&str>, name: &str) -> MapperResult<Box<dyn CollectionHandle>> {
        let database = database.unwrap_or(&self.database);

        Ok(Box::new(MongoDbCollection {
            name: name.to_string(),
            collection: self.client.database(database).collection::<RawRecord>(name),
        }))
    }

    fn execute(&self, database: Option<&str>, command: RawRecord) -> MapperResult<RawRecord> {
        let database = database.unwrap_or(&self.database);
        debug!(target: "docmapper::mongodb", database = %database, command = %command, "Running command");

        self.client
            .database(database)
            .run_command(command)
            .run()
            .map_err(backend_error)
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}

/// Handle on one MongoDB collection.
#[derive(Debug)]
pub struct MongoDbCollection {
    name: String,
    collection: MongoCollection<RawRecord>,
}

impl CollectionHandle for MongoDbCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, record: RawRecord) -> MapperResult<Bson> {
        let id = record.get(OBJECT_ID).cloned();

        let result = self
            .collection
            .insert_one(record)
            .run()
            .map_err(|e| write_error(e, id.as_ref(), &self.name))?;

        Ok(result.inserted_id)
    }

    fn update(&self, criteria: RawRecord, record: RawRecord, options: WriteOptions) -> MapperResult<u64> {
        let update = update_document(record);

        debug!(target: "docmapper::mongodb", collection = %self.name, criteria = %criteria, update = %update, "Updating");

        let result = if options.multiple {
            self.collection
                .update_many(criteria, update)
                .upsert(options.upsert)
                .run()
        } else {
            self.collection
                .update_one(criteria, update)
                .upsert(options.upsert)
                .run()
        }
        .map_err(|e| write_error(e, None, &self.name))?;

        match result.upserted_id {
            Some(_) if result.matched_count == 0 => Ok(1),
            _ => Ok(result.matched_count),
        }
    }

    fn remove(&self, criteria: RawRecord, options: WriteOptions) -> MapperResult<u64> {
        let result = if options.just_one {
            self.collection.delete_one(criteria).run()
        } else {
            self.collection.delete_many(criteria).run()
        }
        .map_err(backend_error)?;

        Ok(result.deleted_count)
    }

    fn find(&self, request: FindRequest) -> MapperResult<Box<dyn RecordCursor>> {
        let mut find = self.collection.find(request.filter.clone());

        if let Some(projection) = projection(&request.projection) {
            find = find.projection(projection);
        }
        if let Some(limit) = request.limit {
            find = find.limit(limit as i64);
        }
        if let Some(sort) = request.sort {
            find = find.sort(sort);
        }

        let cursor = find.run().map_err(backend_error)?;

        Ok(Box::new(MongoDbCursor {
            cursor,
            peeked: None,
            collection: self.collection.clone(),
            filter: request.filter,
            total: None,
        }))
    }

    fn find_one(&self, query: RawRecord, fields: &[String]) -> MapperResult<Option<RawRecord>> {
        let mut find = self.collection.find_one(query);

        if let Some(projection) = projection(fields) {
            find = find.projection(projection);
        }

        find.run().map_err(backend_error)
    }
}

/// Cursor over the results of a MongoDB find.
///
/// The total count is requested from the server the first time it is asked for.
pub struct MongoDbCursor {
    cursor: Cursor<RawRecord>,
    peeked: Option<RawRecord>,
    collection: MongoCollection<RawRecord>,
    filter: RawRecord,
    total: Option<u64>,
}

impl RecordCursor for MongoDbCursor {
    fn has_next(&mut self) -> MapperResult<bool> {
        if self.peeked.is_none() {
            self.peeked = self.cursor.next().transpose().map_err(backend_error)?;
        }

        Ok(self.peeked.is_some())
    }

    fn next_record(&mut self) -> MapperResult<Option<RawRecord>> {
        match self.peeked.take() {
            Some(record) => Ok(Some(record)),
            None => self.cursor.next().transpose().map_err(backend_error),
        }
    }

    fn count(&mut self) -> MapperResult<u64> {
        if let Some(total) = self.total {
            return Ok(total);
        }

        let total = self
            .collection
            .count_documents(self.filter.clone())
            .run()
            .map_err(backend_error)?;
        self.total = Some(total);

        Ok(total)
    }
}

/// Builder for [`MongoDbProvider`] instances.
#[derive(Debug)]
pub struct MongoDbProviderBuilder {
    config: ConnectionConfig,
}

impl MongoDbProviderBuilder {
    /// Creates a builder from a connection configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    fn client_options(&self) -> MapperResult<ClientOptions> {
        let mut options = ClientOptions::parse(self.config.host_string())
            .run()
            .map_err(|e| MapperError::InvalidConfiguration(e.to_string()))?;

        if let Some((username, password)) = self.config.credentials() {
            options.credential = Some(
                Credential::builder()
                    .username(username.to_string())
                    .password(password.to_string())
                    .source(self.config.database().to_string())
                    .build(),
            );
        }

        options.connect_timeout = Some(self.config.timeout());
        options.server_selection_timeout = Some(self.config.timeout());

        Ok(options)
    }

    fn client(&self) -> MapperResult<Client> {
        let Some(token) = self.config.persistent.as_deref() else {
            return Client::with_options(self.client_options()?).map_err(backend_error);
        };

        let mut clients = PERSISTENT_CLIENTS.lock();
        if let Some(client) = clients.get(token) {
            debug!(target: "docmapper::mongodb", token = %token, "Reusing persistent client");
            return Ok(client.clone());
        }

        let client = Client::with_options(self.client_options()?).map_err(backend_error)?;
        clients.insert(token.to_string(), client.clone());

        Ok(client)
    }
}

impl ProviderBuilder for MongoDbProviderBuilder {
    type Provider = MongoDbProvider;

    fn build(self) -> MapperResult<Self::Provider> {
        self.config.validate()?;

        let provider = MongoDbProvider::new(self.client()?, self.config.database(), self.config.timeout());

        debug!(
            target: "docmapper::mongodb",
            hosts = %self.config.host_string(),
            connect = self.config.connect,
            "MongoDB provider created"
        );

        if self.config.connect {
            provider.ping()?;
        }

        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_update_is_wrapped_in_set() {
        assert_eq!(
            update_document(doc! { "_id": 1, "x": 5 }),
            doc! { "$set": { "x": 5 } }
        );
        assert_eq!(
            update_document(doc! { "$set": { "x": 5 }, "$unset": { "y": "" } }),
            doc! { "$set": { "x": 5 }, "$unset": { "y": "" } }
        );
    }

    #[test]
    fn test_projection_from_fields() {
        assert_eq!(projection(&[]), None);
        assert_eq!(
            projection(&["a".to_string(), "b".to_string()]),
            Some(doc! { "a": 1, "b": 1 })
        );
    }

    #[test]
    fn test_invalid_config_fails_before_connecting() {
        let config = ConnectionConfig::builder().dbname("app").host("localhost", 27017).build();
        let err = MongoDbProvider::builder(config).build().unwrap_err();

        assert!(matches!(err, MapperError::InvalidConfiguration(message) if message.contains("'password'")));
    }
}
