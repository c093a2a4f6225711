//! Durable per-user session state.
//!
//! A small JSON snapshot (selection pointer, wizard step) written to a
//! namespaced file so a resumed session starts at the last position
//! immediately, before any remote data arrives. The snapshot never
//! carries entity content — the remote answer always wins on content.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub selected_id: Option<String>,
    #[serde(default)]
    pub current_step: u32,
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Platform data directory, `<data_dir>/waypoint/sessions`.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir()
            .context("No platform data directory available")?
            .join("waypoint")
            .join("sessions");
        Ok(Self::new(&dir))
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        // One file per user keeps sessions isolated across accounts on
        // a shared machine.
        self.dir.join(format!("{}.json", user_id))
    }

    /// Read the user's snapshot. A missing file is `Ok(None)`; a corrupt
    /// file is treated the same way (logged), since session state is
    /// best-effort by design.
    pub fn load(&self, user_id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).context("Failed to read session file")?;
        match serde_json::from_str::<SessionSnapshot>(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "Discarding corrupt session snapshot");
                Ok(None)
            }
        }
    }

    pub fn save(&self, user_id: &str, snapshot: &SessionSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create session directory")?;
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize session snapshot")?;
        fs::write(self.path_for(user_id), json).context("Failed to write session file")?;
        Ok(())
    }

    pub fn clear(&self, user_id: &str) -> Result<()> {
        let path = self.path_for(user_id);
        if path.exists() {
            fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Persist on an interval. The caller keeps the handle, aborts it when
/// the owning view goes away, and performs one final `save` itself —
/// mirroring the interval-plus-unmount write policy of the source.
pub fn spawn_autosave<F>(
    store: SessionStore,
    user_id: String,
    period: Duration,
    snapshot_fn: F,
) -> JoinHandle<()>
where
    F: Fn() -> SessionSnapshot + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The immediate first tick would just rewrite the rehydrated state.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = snapshot_fn();
            if let Err(err) = store.save(&user_id, &snapshot) {
                tracing::warn!(user_id = %user_id, error = %err, "Session autosave failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = store();
        let snapshot = SessionSnapshot {
            selected_id: Some("task-9".into()),
            current_step: 4,
        };
        store.save("u1", &snapshot).unwrap();
        assert_eq!(store.load("u1").unwrap(), Some(snapshot));
    }

    #[test]
    fn missing_file_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.load("nobody").unwrap(), None);
    }

    #[test]
    fn sessions_are_namespaced_per_user() {
        let (_dir, store) = store();
        store
            .save("u1", &SessionSnapshot { selected_id: Some("a".into()), current_step: 1 })
            .unwrap();
        store
            .save("u2", &SessionSnapshot { selected_id: Some("b".into()), current_step: 2 })
            .unwrap();
        assert_eq!(store.load("u1").unwrap().unwrap().selected_id.as_deref(), Some("a"));
        assert_eq!(store.load("u2").unwrap().unwrap().selected_id.as_deref(), Some("b"));
    }

    #[test]
    fn corrupt_snapshot_is_discarded_not_fatal() {
        let (_dir, store) = store();
        fs::create_dir_all(&store.dir).unwrap();
        fs::write(store.path_for("u1"), "{not json").unwrap();
        assert_eq!(store.load("u1").unwrap(), None);
    }

    #[test]
    fn clear_removes_snapshot() {
        let (_dir, store) = store();
        store.save("u1", &SessionSnapshot::default()).unwrap();
        store.clear("u1").unwrap();
        assert_eq!(store.load("u1").unwrap(), None);
        // Clearing again is fine.
        store.clear("u1").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_writes_on_interval() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let reader = SessionStore::new(dir.path());

        let state = Arc::new(Mutex::new(SessionSnapshot {
            selected_id: Some("t1".into()),
            current_step: 2,
        }));
        let state_for_task = state.clone();
        let handle = spawn_autosave(store, "u1".into(), Duration::from_secs(30), move || {
            state_for_task.lock().unwrap().clone()
        });
        // Let the task start its interval (and swallow the immediate
        // first tick) before the clock moves.
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            reader.load("u1").unwrap().unwrap().selected_id.as_deref(),
            Some("t1")
        );

        state.lock().unwrap().current_step = 7;
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(reader.load("u1").unwrap().unwrap().current_step, 7);

        handle.abort();
    }
}
