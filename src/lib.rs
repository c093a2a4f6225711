//! Waypoint: a typed client data layer for a hosted Postgres backend.
//!
//! Three layers compose vertically:
//! - **data access** (`store`, `services`): a generic CRUD/procedure
//!   contract over the remote store, wrapped in stateless typed services
//!   per domain entity;
//! - **state synchronization** (`sync`): scope-keyed collection caches
//!   reconciled remote-first, with durable per-user session pointers;
//! - **presentation rules** (`nav`): the permission-filtering,
//!   middle-truncation, and badge-capping algorithm shared by every
//!   navigation surface.
//!
//! `generate` talks to third-party text-generation APIs; `config` wires
//! the layers together from TOML + environment.

pub mod config;
pub mod errors;
pub mod generate;
pub mod models;
pub mod nav;
pub mod services;
pub mod store;
pub mod sync;

pub use config::WaypointConfig;
pub use errors::{GenerateError, StoreError};
pub use store::{DataStore, MemoryStore, RestStore};
