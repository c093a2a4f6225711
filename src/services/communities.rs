use std::sync::Arc;

use serde_json::{Value, json};

use super::decode_rows;
use crate::errors::StoreError;
use crate::models::{Group, Membership, MembershipStatus, from_record};
use crate::store::{DataStore, Filter};

const GROUPS: &str = "groups";
const MEMBERSHIPS: &str = "memberships";

/// Community groups and memberships.
///
/// The at-most-one-active-membership invariant lives in the store's
/// `join_group` procedure (atomic check-and-insert), not in a client-side
/// read-then-write — there is no race window for duplicate rows.
#[derive(Clone)]
pub struct CommunityService {
    store: Arc<dyn DataStore>,
}

impl CommunityService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>, StoreError> {
        let row = self.store.fetch_one(GROUPS, &[Filter::eq("id", id)]).await?;
        row.map(from_record).transpose()
    }

    /// Fail-soft directory listing.
    pub async fn list_groups(&self) -> Vec<Group> {
        let rows =
            crate::store::fetch_many_or_default(self.store.as_ref(), GROUPS, &[], None).await;
        decode_rows(GROUPS, rows)
    }

    /// Join a group. The resulting membership is Active, or Pending when
    /// the group requires approval. Joining twice returns the existing
    /// membership unchanged.
    pub async fn join_group(&self, group_id: &str, user_id: &str) -> Result<Membership, StoreError> {
        let result = self
            .store
            .invoke("join_group", json!({ "group_id": group_id, "user_id": user_id }))
            .await?;
        match result {
            Value::Object(record) => from_record(record),
            other => Err(StoreError::Validation(format!(
                "join_group returned a non-record result: {}",
                other
            ))),
        }
    }

    /// Leaving flips the membership to Inactive; the row is kept for
    /// history, and a later re-join mints a fresh membership.
    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let existing = self
            .store
            .fetch_one(
                MEMBERSHIPS,
                &[
                    Filter::eq("group_id", group_id),
                    Filter::eq("user_id", user_id),
                    Filter::new("status", crate::store::FilterOp::Neq, "inactive"),
                ],
            )
            .await?;
        let Some(existing) = existing else {
            return Ok(false);
        };
        let id = existing
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Validation("membership row missing id".into()))?
            .to_string();

        let mut patch = crate::store::Record::new();
        patch.insert("status".into(), json!(MembershipStatus::Inactive.as_str()));
        self.store.update(MEMBERSHIPS, &id, patch).await?;
        Ok(true)
    }

    pub async fn memberships_for_user(&self, user_id: &str) -> Vec<Membership> {
        let rows = crate::store::fetch_many_or_default(
            self.store.as_ref(),
            MEMBERSHIPS,
            &[Filter::eq("user_id", user_id)],
            None,
        )
        .await;
        decode_rows(MEMBERSHIPS, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seeded_service() -> CommunityService {
        let store = MemoryStore::new();
        store.seed(
            GROUPS,
            vec![
                json!({ "id": "open", "name": "Open Group", "access_level": "public", "requires_approval": false })
                    .as_object()
                    .cloned()
                    .unwrap(),
                json!({ "id": "vetted", "name": "Vetted Group", "access_level": "private", "requires_approval": true })
                    .as_object()
                    .cloned()
                    .unwrap(),
            ],
        );
        CommunityService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn join_open_group_is_immediately_active() {
        let svc = seeded_service();
        let membership = svc.join_group("open", "u1").await.unwrap();
        assert_eq!(membership.status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn join_vetted_group_lands_pending() {
        let svc = seeded_service();
        let membership = svc.join_group("vetted", "u1").await.unwrap();
        assert_eq!(membership.status, MembershipStatus::Pending);
    }

    #[tokio::test]
    async fn double_join_returns_same_membership() {
        let svc = seeded_service();
        let first = svc.join_group("open", "u1").await.unwrap();
        let second = svc.join_group("open", "u1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(svc.memberships_for_user("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn leave_then_rejoin_mints_new_membership() {
        let svc = seeded_service();
        let first = svc.join_group("open", "u1").await.unwrap();
        assert!(svc.leave_group("open", "u1").await.unwrap());

        let rejoined = svc.join_group("open", "u1").await.unwrap();
        assert_ne!(first.id, rejoined.id);

        // History row retained: one inactive, one active.
        let memberships = svc.memberships_for_user("u1").await;
        assert_eq!(memberships.len(), 2);
    }

    #[tokio::test]
    async fn leave_without_membership_is_false_not_error() {
        let svc = seeded_service();
        assert!(!svc.leave_group("open", "stranger").await.unwrap());
    }
}
