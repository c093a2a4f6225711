use std::sync::Arc;

use serde_json::json;

use super::decode_rows;
use crate::errors::StoreError;
use crate::models::{Reaction, Reply, Thread, from_record};
use crate::store::{DataStore, Filter, Record, Sort};

const THREADS: &str = "threads";
const REPLIES: &str = "replies";
const REACTIONS: &str = "reactions";

/// Discussion threads with replies and reactions.
///
/// Counters (`view_count`, `reply_count`, `reaction_count`) are owned by
/// the store and mutated only through the atomic `increment_counter` /
/// `decrement_counter` procedures, coupled to the child-row write they
/// account for. The client never computes `current + delta`.
#[derive(Clone)]
pub struct DiscussionService {
    store: Arc<dyn DataStore>,
}

impl DiscussionService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn create_thread(
        &self,
        author_id: &str,
        title: &str,
        body: &str,
    ) -> Result<Thread, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::Validation("thread title must not be empty".into()));
        }
        let mut payload = Record::new();
        payload.insert("author_id".into(), json!(author_id));
        payload.insert("title".into(), json!(title));
        payload.insert("body".into(), json!(body));
        payload.insert("view_count".into(), json!(0));
        payload.insert("reply_count".into(), json!(0));
        payload.insert("reaction_count".into(), json!(0));
        let row = self.store.create(THREADS, payload).await?;
        from_record(row)
    }

    pub async fn get_thread(&self, id: &str) -> Result<Option<Thread>, StoreError> {
        let row = self.store.fetch_one(THREADS, &[Filter::eq("id", id)]).await?;
        row.map(from_record).transpose()
    }

    /// Newest threads first. Fail-soft read.
    pub async fn list_threads(&self) -> Vec<Thread> {
        let rows = crate::store::fetch_many_or_default(
            self.store.as_ref(),
            THREADS,
            &[],
            Some(&Sort::desc("created_at")),
        )
        .await;
        decode_rows(THREADS, rows)
    }

    pub async fn replies_for_thread(&self, thread_id: &str) -> Vec<Reply> {
        let rows = crate::store::fetch_many_or_default(
            self.store.as_ref(),
            REPLIES,
            &[Filter::eq("thread_id", thread_id)],
            Some(&Sort::asc("created_at")),
        )
        .await;
        decode_rows(REPLIES, rows)
    }

    /// Create the reply, then bump the parent counter atomically. If the
    /// counter bump fails the reply still exists — the drift is logged
    /// and repaired by the next server-side recount, not by unwinding a
    /// user-visible write.
    pub async fn add_reply(
        &self,
        thread_id: &str,
        author_id: &str,
        body: &str,
    ) -> Result<Reply, StoreError> {
        let mut payload = Record::new();
        payload.insert("thread_id".into(), json!(thread_id));
        payload.insert("author_id".into(), json!(author_id));
        payload.insert("body".into(), json!(body));
        payload.insert("reaction_count".into(), json!(0));
        let row = self.store.create(REPLIES, payload).await?;
        let reply: Reply = from_record(row)?;

        self.bump(THREADS, thread_id, "reply_count", true).await;
        Ok(reply)
    }

    pub async fn remove_reply(&self, reply_id: &str) -> Result<bool, StoreError> {
        let existing = self
            .store
            .fetch_one(REPLIES, &[Filter::eq("id", reply_id)])
            .await?;
        let Some(existing) = existing else {
            return Ok(false);
        };
        let thread_id = existing
            .get("thread_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        let removed = self.store.remove(REPLIES, reply_id).await?;
        if removed && !thread_id.is_empty() {
            self.bump(THREADS, &thread_id, "reply_count", false).await;
        }
        Ok(removed)
    }

    pub async fn record_view(&self, thread_id: &str) {
        self.bump(THREADS, thread_id, "view_count", true).await;
    }

    pub async fn add_reaction(
        &self,
        reply_id: &str,
        user_id: &str,
        kind: &str,
    ) -> Result<Reaction, StoreError> {
        let mut payload = Record::new();
        payload.insert("reply_id".into(), json!(reply_id));
        payload.insert("user_id".into(), json!(user_id));
        payload.insert("kind".into(), json!(kind));
        let row = self.store.create(REACTIONS, payload).await?;
        let reaction: Reaction = from_record(row)?;

        self.bump(REPLIES, reply_id, "reaction_count", true).await;
        Ok(reaction)
    }

    pub async fn remove_reaction(&self, reaction_id: &str) -> Result<bool, StoreError> {
        let existing = self
            .store
            .fetch_one(REACTIONS, &[Filter::eq("id", reaction_id)])
            .await?;
        let Some(existing) = existing else {
            return Ok(false);
        };
        let reply_id = existing
            .get("reply_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        let removed = self.store.remove(REACTIONS, reaction_id).await?;
        if removed && !reply_id.is_empty() {
            self.bump(REPLIES, &reply_id, "reaction_count", false).await;
        }
        Ok(removed)
    }

    async fn bump(&self, collection: &str, id: &str, column: &str, up: bool) {
        let procedure = if up { "increment_counter" } else { "decrement_counter" };
        let args = json!({ "collection": collection, "id": id, "column": column, "delta": 1 });
        if let Err(err) = self.store.invoke(procedure, args).await {
            tracing::warn!(
                collection = %collection,
                id = %id,
                column = %column,
                error = %err,
                "Counter update failed; counter may lag until recount"
            );
        }
    }
}
