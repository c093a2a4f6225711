use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::decode_rows;
use crate::errors::StoreError;
use crate::models::{NewTask, Task, TaskStatus, from_record, to_record};
use crate::store::{DataStore, Filter, Record, RetryPolicy, Sort, fetch_with_retry};
use crate::sync::CollectionBackend;

const COLLECTION: &str = "tasks";

/// Partial update for a task. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn DataStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// All tasks in a company, newest first. Fail-soft: a store failure
    /// yields an empty list (logged) rather than a crashed screen.
    pub async fn list_for_company(&self, company_id: &str) -> Vec<Task> {
        let rows = crate::store::fetch_many_or_default(
            self.store.as_ref(),
            COLLECTION,
            &[Filter::eq("company_id", company_id)],
            Some(&Sort::desc("created_at")),
        )
        .await;
        decode_rows(COLLECTION, rows)
    }

    /// The resilient loading path: bounded retries with per-attempt and
    /// overall timeouts, resolving to an empty list when the bound is
    /// exceeded. Used where availability beats completeness.
    pub async fn list_resilient(&self, company_id: &str, policy: RetryPolicy) -> Vec<Task> {
        let filters = [Filter::eq("company_id", company_id)];
        let sort = Sort::desc("created_at");
        let rows = fetch_with_retry(
            policy,
            "tasks.list_for_company",
            || self.store.fetch_many(COLLECTION, &filters, Some(&sort), None),
            Vec::new(),
        )
        .await;
        decode_rows(COLLECTION, rows)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let row = self.store.fetch_one(COLLECTION, &[Filter::eq("id", id)]).await?;
        row.map(from_record).transpose()
    }

    pub async fn create(&self, input: NewTask) -> Result<Task, StoreError> {
        if input.title.trim().is_empty() {
            return Err(StoreError::Validation("task title must not be empty".into()));
        }
        let mut payload = to_record(&input)?;
        payload.insert("status".into(), json!(TaskStatus::Active.as_str()));
        payload.insert("updated_at".into(), json!(chrono::Utc::now().to_rfc3339()));
        let row = self.store.create(COLLECTION, payload).await?;
        from_record(row)
    }

    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        let mut payload = to_record(&patch)?;
        payload.insert("updated_at".into(), json!(chrono::Utc::now().to_rfc3339()));
        let row = self.store.update(COLLECTION, id, payload).await?;
        from_record(row)
    }

    pub async fn set_status(&self, id: &str, status: TaskStatus) -> Result<Task, StoreError> {
        self.update(
            id,
            TaskPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.remove(COLLECTION, id).await
    }
}

/// Backend seam for the synchronized task collection, scoped by company id.
#[async_trait]
impl CollectionBackend<Task> for TaskService {
    async fn fetch(&self, scope: &str) -> Result<Vec<Task>, StoreError> {
        let rows = self
            .store
            .fetch_many(
                COLLECTION,
                &[Filter::eq("company_id", scope)],
                Some(&Sort::desc("created_at")),
                None,
            )
            .await?;
        Ok(decode_rows(COLLECTION, rows))
    }

    async fn create(&self, input: Record) -> Result<Task, StoreError> {
        let input: NewTask = from_record(input)?;
        TaskService::create(self, input).await
    }

    async fn update(&self, id: &str, patch: Record) -> Result<Task, StoreError> {
        let patch: TaskPatch = from_record(patch)?;
        TaskService::update(self, id, patch).await
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.delete(id).await
    }
}
