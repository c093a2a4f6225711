//! Client-side state synchronization.
//!
//! `SyncedCollection` keeps an in-memory cache of entities scoped to a
//! key (company id, user id), reconciled against the data-access layer:
//! remote is the source of truth, the cache is spliced only after a
//! successful remote write. `SessionStore` persists the transient
//! pointer state (selection, wizard step) per user so a resumed session
//! starts where it left off while fresher data loads behind it.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::Entity;
use crate::store::Record;

pub mod collection;
pub mod session;

pub use collection::SyncedCollection;
pub use session::{SessionSnapshot, SessionStore, spawn_autosave};

/// The data-access seam a synchronized collection drives. Services
/// implement this per entity (e.g. `TaskService` for `Task`, scoped by
/// company id).
#[async_trait]
pub trait CollectionBackend<T: Entity>: Send + Sync {
    async fn fetch(&self, scope: &str) -> Result<Vec<T>, StoreError>;
    async fn create(&self, input: Record) -> Result<T, StoreError>;
    async fn update(&self, id: &str, patch: Record) -> Result<T, StoreError>;
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;
}
