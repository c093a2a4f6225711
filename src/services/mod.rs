//! Typed CRUD wrappers, one module per domain entity.
//!
//! Each service is stateless: it holds an injected `Arc<dyn DataStore>`
//! and translates typed inputs into contract calls, normalizing the raw
//! records back into domain entities. Read paths that feed UI lists are
//! fail-soft (empty list on failure, logged); mutation paths always
//! propagate typed errors so callers know the write failed.

use serde::de::DeserializeOwned;

use crate::models::from_record;
use crate::store::Record;

pub mod communities;
pub mod companies;
pub mod discussions;
pub mod journeys;
pub mod scores;
pub mod tasks;

pub use communities::CommunityService;
pub use companies::CompanyService;
pub use discussions::DiscussionService;
pub use journeys::JourneyService;
pub use scores::ScoreService;
pub use tasks::TaskService;

/// Decode raw rows into typed entities, skipping rows that no longer
/// match the expected shape. Skips are logged — a malformed row should
/// not take down a whole list read.
pub(crate) fn decode_rows<T: DeserializeOwned>(collection: &str, rows: Vec<Record>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match from_record::<T>(row) {
            Ok(entity) => Some(entity),
            Err(err) => {
                tracing::warn!(collection = %collection, error = %err, "Skipping malformed row");
                None
            }
        })
        .collect()
}
