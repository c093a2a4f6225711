//! Generic data-access contract over a remote structured store.
//!
//! One trait, `DataStore`, covers every logical operation the service
//! layer needs: fetch-list, fetch-one, create, update, delete, and
//! stored-procedure invocation. Two implementations ship with the crate:
//! `RestStore` (PostgREST dialect over HTTPS) and `MemoryStore` (an
//! in-process double with the same semantics, used in tests).
//!
//! The concrete store is always dependency-injected as
//! `Arc<dyn DataStore>` — there is no hidden global client.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;

pub mod memory;
pub mod rest;
pub mod retry;

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use retry::{RetryPolicy, fetch_with_retry};

/// Entities travel through the contract as plain JSON records.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Membership in a set; the filter value is a JSON array.
    In,
    Like,
}

impl FilterOp {
    /// PostgREST operator token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Like => "like",
        }
    }
}

/// A single column predicate.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn new(column: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub column: String,
    pub ascending: bool,
}

impl Sort {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// One logical operation against the remote store.
///
/// Failure semantics: transport and store-level errors surface as typed
/// `StoreError`s with operation context already logged. Absence is not
/// failure — `fetch_one` returns `Ok(None)` and `remove` of a missing id
/// returns `Ok(false)`.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Fetch all records matching `filters`. An empty result is `Ok(vec![])`.
    async fn fetch_many(
        &self,
        collection: &str,
        filters: &[Filter],
        sort: Option<&Sort>,
        page: Option<Page>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Fetch the first record matching `filters`, or `None`.
    async fn fetch_one(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Option<Record>, StoreError>;

    /// Insert a record; the echoed record includes server-assigned
    /// `id` and `created_at` merged over the supplied payload.
    async fn create(&self, collection: &str, payload: Record) -> Result<Record, StoreError>;

    /// Apply a partial patch to the record with `id`, echoing the result.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Record,
    ) -> Result<Record, StoreError>;

    /// Delete by id. Returns `false` when no row matched (not an error).
    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Invoke a stored procedure — the escape hatch for aggregate
    /// computations and multi-row transactional operations (atomic
    /// counter updates, check-and-insert invariants).
    async fn invoke(&self, procedure: &str, args: Value) -> Result<Value, StoreError>;
}

/// Fail-soft list read: on store failure, log with operation context and
/// return an empty list so list-driven UI stays usable.
///
/// Mutation paths must never use this — callers of create/update/remove
/// need to know the write failed.
pub async fn fetch_many_or_default(
    store: &dyn DataStore,
    collection: &str,
    filters: &[Filter],
    sort: Option<&Sort>,
) -> Vec<Record> {
    match store.fetch_many(collection, filters, sort, None).await {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(collection = %collection, error = %err, "List read failed, substituting empty result");
            Vec::new()
        }
    }
}

/// Fail-soft procedure read: substitute `default` on failure.
pub async fn invoke_or_default(
    store: &dyn DataStore,
    procedure: &str,
    args: Value,
    default: Value,
) -> Value {
    match store.invoke(procedure, args).await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(procedure = %procedure, error = %err, "Procedure read failed, substituting default");
            default
        }
    }
}
