use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use super::decode_rows;
use crate::errors::StoreError;
use crate::models::{Company, CompanyStatus, from_record, to_record};
use crate::store::{DataStore, Filter, Record};

const COLLECTION: &str = "companies";

/// Caller-supplied fields for a new workspace.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NewCompany {
    pub name: String,
    pub owner_id: String,
}

#[derive(Clone)]
pub struct CompanyService {
    store: Arc<dyn DataStore>,
}

impl CompanyService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Company>, StoreError> {
        let row = self.store.fetch_one(COLLECTION, &[Filter::eq("id", id)]).await?;
        row.map(from_record).transpose()
    }

    /// Workspaces the user owns. Fail-soft read.
    pub async fn list_for_user(&self, user_id: &str) -> Vec<Company> {
        let rows = crate::store::fetch_many_or_default(
            self.store.as_ref(),
            COLLECTION,
            &[Filter::eq("owner_id", user_id)],
            None,
        )
        .await;
        decode_rows(COLLECTION, rows)
    }

    /// Created on signup or invitation acceptance; the owner is the
    /// first member.
    pub async fn create(&self, input: NewCompany) -> Result<Company, StoreError> {
        if input.name.trim().is_empty() {
            return Err(StoreError::Validation("company name must not be empty".into()));
        }
        let mut payload = to_record(&input)?;
        payload.insert("member_ids".into(), json!([input.owner_id]));
        payload.insert("feature_flags".into(), json!(HashMap::<String, bool>::new()));
        payload.insert("status".into(), json!(CompanyStatus::Active.as_str()));
        let row = self.store.create(COLLECTION, payload).await?;
        from_record(row)
    }

    pub async fn update_settings(&self, id: &str, patch: Record) -> Result<Company, StoreError> {
        // Lifecycle fields are not settings; reject patches that try to
        // sneak a status change through this path.
        if patch.contains_key("status") || patch.contains_key("id") {
            return Err(StoreError::Validation(
                "settings updates cannot change id or status".into(),
            ));
        }
        let row = self.store.update(COLLECTION, id, patch).await?;
        from_record(row)
    }

    /// Companies are never hard-deleted: deactivation is a status write.
    pub async fn deactivate(&self, id: &str) -> Result<Company, StoreError> {
        let mut patch = Record::new();
        patch.insert("status".into(), json!(CompanyStatus::Deactivated.as_str()));
        let row = self.store.update(COLLECTION, id, patch).await?;
        from_record(row)
    }
}
