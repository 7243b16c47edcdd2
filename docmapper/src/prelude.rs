//! Convenient re-exports of commonly used types from docmapper.
//!
//! ```ignore
//! use docmapper::prelude::*;
//! ```

pub use docmapper_core::{
    collection::{Collection, CollectionBuilder, CollectionInfo, DocumentStream, FieldMetadata},
    config::{ConnectionConfig, HostConfig},
    document::{Document, DocumentBuilder, DocumentHooks, NoHooks},
    documentset::{Documentset, DocumentsetBuilder},
    error::{MapperError, MapperResult},
    key::PrimaryKey,
    provider::{
        CollectionHandle, ConnectionProvider, FindRequest, ProviderBuilder, RecordCursor, WriteOptions,
        clear_default_provider, default_provider, set_default_provider,
    },
};
