//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```

pub use docbridge_core::{
    access::{AccessControl, AllowAll},
    backend::{FieldUpdate, StoreBackend, StoreBackendBuilder},
    cancel::{CancelHandle, CancelToken},
    collection::{BulkUpdate, ChangeSummary, EntityCollection, GetOptions, Resolved, UpdateOptions},
    config::EngineConfig,
    context::{Caller, OperationContext},
    delta::Delta,
    document::{Entity, EntityExt},
    error::{DocumentStoreError, DocumentStoreResult, OperationError},
    page::SearchResults,
    query::{Expr, Filter, Query, QueryVisitor, Sort, SortDirection},
    result::{ErrorKind, OperationResult},
    schema::{EntitySchema, FieldDescriptor, FieldKind, NameSearch, Relation, SortAlias},
    search::{BooleanOperator, ComparisonOperator, SearchParameter, SearchParameters},
    store::EntityStore,
    value::FilterValue,
};
