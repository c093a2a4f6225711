use std::sync::Arc;

use super::{CollectionBackend, SessionSnapshot};
use crate::errors::StoreError;
use crate::models::Entity;
use crate::store::Record;

/// A synchronized, scope-keyed cache of entities.
///
/// Mutations go remote-first: the cache is spliced only after the
/// backend call succeeds (prepend on create, map-replace on update,
/// filter-out on remove). A failed call leaves the cache untouched and
/// re-throws, so no optimistic rollback is ever needed.
pub struct SyncedCollection<T: Entity> {
    backend: Arc<dyn CollectionBackend<T>>,
    scope: String,
    items: Vec<T>,
    selected_id: Option<String>,
    current_step: u32,
    is_loading: bool,
    error: Option<String>,
}

impl<T: Entity> SyncedCollection<T> {
    pub fn new(backend: Arc<dyn CollectionBackend<T>>, scope: &str) -> Self {
        Self {
            backend,
            scope: scope.to_string(),
            items: Vec::new(),
            selected_id: None,
            current_step: 0,
            is_loading: false,
            error: None,
        }
    }

    /// Replace the cache wholesale from the backend. On failure the
    /// cache becomes empty with `error` set — never stale-and-silently-
    /// wrong. The loading flag is cleared on every exit path.
    pub async fn load(&mut self) {
        self.is_loading = true;
        self.error = None;
        match self.backend.fetch(&self.scope).await {
            Ok(items) => {
                self.items = items;
                // An absent pointer, or a rehydrated one referencing an
                // entity the remote no longer has, falls back to the
                // first entity.
                if !self.selection_is_valid() {
                    self.selected_id = self.items.first().map(|e| e.id().to_string());
                }
            }
            Err(err) => {
                tracing::warn!(scope = %self.scope, error = %err, "Collection load failed");
                self.items = Vec::new();
                self.selected_id = None;
                self.error = Some(err.to_string());
            }
        }
        self.is_loading = false;
    }

    /// Switch to a new scope key: the old cache is dropped and reloaded.
    pub async fn set_scope(&mut self, scope: &str) {
        if self.scope == scope {
            return;
        }
        self.scope = scope.to_string();
        self.items = Vec::new();
        self.selected_id = None;
        self.load().await;
    }

    /// Remote-first create; the echoed entity is prepended.
    pub async fn create(&mut self, input: Record) -> Result<&T, StoreError> {
        let created = self.backend.create(input).await?;
        self.items.insert(0, created);
        Ok(&self.items[0])
    }

    /// Remote-first update; the cached entity (and the selection's
    /// referenced object, if it is the one) is replaced in place.
    pub async fn update(&mut self, id: &str, patch: Record) -> Result<&T, StoreError> {
        let updated = self.backend.update(id, patch).await?;
        if let Some(pos) = self.items.iter().position(|e| e.id() == id) {
            self.items[pos] = updated;
            Ok(&self.items[pos])
        } else {
            // Updated an entity the cache never held (e.g. created from
            // another screen); adopt it.
            self.items.insert(0, updated);
            Ok(&self.items[0])
        }
    }

    /// Remote-first remove; a removed selection falls back to the first
    /// remaining entity or clears.
    pub async fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self.backend.remove(id).await?;
        self.items.retain(|e| e.id() != id);
        if self.selected_id.as_deref() == Some(id) {
            self.selected_id = self.items.first().map(|e| e.id().to_string());
        }
        Ok(removed)
    }

    /// Point the selection at a cached entity. Unknown ids are ignored.
    pub fn select(&mut self, id: &str) {
        if self.items.iter().any(|e| e.id() == id) {
            self.selected_id = Some(id.to_string());
        }
    }

    pub fn selected(&self) -> Option<&T> {
        let id = self.selected_id.as_deref()?;
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn set_step(&mut self, step: u32) {
        self.current_step = step;
    }

    /// Seed pointer state from a persisted session before the remote
    /// load completes. Only the selection pointer and wizard step are
    /// taken; content always comes from the remote answer, which wins
    /// over the snapshot on any disagreement.
    pub fn rehydrate(&mut self, snapshot: &SessionSnapshot) {
        self.selected_id = snapshot.selected_id.clone();
        self.current_step = snapshot.current_step;
    }

    /// Current pointer state, ready to persist.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            selected_id: self.selected_id.clone(),
            current_step: self.current_step,
        }
    }

    fn selection_is_valid(&self) -> bool {
        match self.selected_id.as_deref() {
            Some(id) => self.items.iter().any(|e| e.id() == id),
            None => self.items.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        title: String,
    }

    impl Entity for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    /// Scripted backend: serves a fixed list, fails on demand.
    struct FakeBackend {
        items: Mutex<Vec<Item>>,
        fail_fetch: bool,
        next_id: Mutex<u32>,
    }

    impl FakeBackend {
        fn with_items(items: Vec<Item>) -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(items),
                fail_fetch: false,
                next_id: Mutex::new(100),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(Vec::new()),
                fail_fetch: true,
                next_id: Mutex::new(100),
            })
        }
    }

    #[async_trait]
    impl CollectionBackend<Item> for FakeBackend {
        async fn fetch(&self, _scope: &str) -> Result<Vec<Item>, StoreError> {
            if self.fail_fetch {
                return Err(StoreError::Validation("fetch refused".into()));
            }
            Ok(self.items.lock().unwrap().clone())
        }

        async fn create(&self, input: Record) -> Result<Item, StoreError> {
            let title = input
                .get("title")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| StoreError::Validation("missing title".into()))?
                .to_string();
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let item = Item {
                id: format!("i{}", *next),
                title,
            };
            self.items.lock().unwrap().push(item.clone());
            Ok(item)
        }

        async fn update(&self, id: &str, patch: Record) -> Result<Item, StoreError> {
            let mut items = self.items.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| StoreError::Validation(format!("no item '{}'", id)))?;
            if let Some(title) = patch.get("title").and_then(serde_json::Value::as_str) {
                item.title = title.to_string();
            }
            Ok(item.clone())
        }

        async fn remove(&self, id: &str) -> Result<bool, StoreError> {
            let mut items = self.items.lock().unwrap();
            let before = items.len();
            items.retain(|i| i.id != id);
            Ok(items.len() != before)
        }
    }

    fn item(id: &str, title: &str) -> Item {
        Item {
            id: id.into(),
            title: title.into(),
        }
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()
    }

    #[tokio::test]
    async fn empty_backend_load_is_clean() {
        let mut col = SyncedCollection::new(FakeBackend::with_items(vec![]), "acme");
        col.load().await;
        assert!(col.items().is_empty());
        assert!(!col.is_loading());
        assert!(col.error().is_none());
    }

    #[tokio::test]
    async fn failed_load_sets_error_and_empties_cache() {
        let mut col = SyncedCollection::new(FakeBackend::failing(), "acme");
        col.load().await;
        assert!(col.items().is_empty());
        assert!(!col.is_loading());
        assert!(col.error().is_some());
    }

    #[tokio::test]
    async fn create_prepends_echoed_entity() {
        let backend = FakeBackend::with_items(vec![item("a", "existing")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.load().await;

        let created = col.create(record(&[("title", "Ship v1")])).await.unwrap();
        assert_eq!(created.title, "Ship v1");
        assert_eq!(col.items().len(), 2);
        assert_eq!(col.items()[0].title, "Ship v1");
        assert_eq!(col.items()[1].id, "a");
    }

    #[tokio::test]
    async fn failed_create_leaves_cache_untouched() {
        let backend = FakeBackend::with_items(vec![item("a", "existing")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.load().await;

        let err = col.create(Record::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(col.items().len(), 1);
    }

    #[tokio::test]
    async fn update_refreshes_selected_object_in_place() {
        let backend = FakeBackend::with_items(vec![item("a", "old"), item("b", "other")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.load().await;
        col.select("a");

        col.update("a", record(&[("title", "new")])).await.unwrap();
        assert_eq!(col.selected().unwrap().title, "new");
        assert_eq!(col.items().len(), 2);
    }

    #[tokio::test]
    async fn removing_selected_falls_back_to_first_remaining() {
        let backend = FakeBackend::with_items(vec![item("a", "x"), item("b", "y")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.load().await;
        col.select("b");

        assert!(col.remove("b").await.unwrap());
        assert_eq!(col.selected_id(), Some("a"));

        assert!(!col.remove("b").await.unwrap());
        assert!(col.remove("a").await.unwrap());
        assert_eq!(col.selected_id(), None);
    }

    #[tokio::test]
    async fn select_ignores_unknown_ids() {
        let backend = FakeBackend::with_items(vec![item("a", "x")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.load().await;
        col.select("ghost");
        // Load already selected the first item; a bogus select must not
        // clobber it.
        assert_eq!(col.selected_id(), Some("a"));
    }

    #[tokio::test]
    async fn rehydrated_selection_survives_load_when_still_present() {
        let backend = FakeBackend::with_items(vec![item("a", "x"), item("b", "y")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.rehydrate(&SessionSnapshot {
            selected_id: Some("b".into()),
            current_step: 3,
        });
        col.load().await;
        assert_eq!(col.selected_id(), Some("b"));
        assert_eq!(col.current_step(), 3);
    }

    #[tokio::test]
    async fn rehydrated_selection_of_vanished_entity_falls_back() {
        let backend = FakeBackend::with_items(vec![item("a", "x")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.rehydrate(&SessionSnapshot {
            selected_id: Some("deleted-elsewhere".into()),
            current_step: 1,
        });
        col.load().await;
        assert_eq!(col.selected_id(), Some("a"));
    }

    #[tokio::test]
    async fn scope_change_reloads() {
        let backend = FakeBackend::with_items(vec![item("a", "x")]);
        let mut col = SyncedCollection::new(backend, "acme");
        col.load().await;
        col.select("a");

        col.set_scope("globex").await;
        assert_eq!(col.scope(), "globex");
        // FakeBackend ignores scope, but the selection was reset and
        // re-derived from the fresh load.
        assert_eq!(col.selected_id(), Some("a"));

        col.set_scope("globex").await; // same scope: no-op
        assert_eq!(col.items().len(), 1);
    }
}
