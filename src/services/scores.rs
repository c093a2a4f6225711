use std::sync::Arc;

use serde_json::{Value, json};

use super::decode_rows;
use crate::errors::StoreError;
use crate::models::ContributionScore;
use crate::store::{DataStore, Filter};

const COLLECTION: &str = "contribution_scores";

/// Tiered contribution scores per user and category.
///
/// Accumulation and the derived `all_time` aggregate are a single
/// server-side procedure, never a client-side read-modify-write.
#[derive(Clone)]
pub struct ScoreService {
    store: Arc<dyn DataStore>,
}

/// Result of recording a contribution: the period total and the
/// recomputed lifetime total.
#[derive(Debug, Clone, PartialEq)]
pub struct ContributionResult {
    pub period_score: i64,
    pub all_time_score: i64,
}

impl ScoreService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn record_contribution(
        &self,
        user_id: &str,
        category: &str,
        period: &str,
        delta: i64,
    ) -> Result<ContributionResult, StoreError> {
        if period == "all_time" {
            return Err(StoreError::Validation(
                "'all_time' is derived from period rows and cannot be written".into(),
            ));
        }
        let result = self
            .store
            .invoke(
                "record_contribution",
                json!({
                    "user_id": user_id,
                    "category": category,
                    "period": period,
                    "delta": delta,
                }),
            )
            .await?;
        let period_score = result
            .get("period_score")
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Validation("procedure result missing period_score".into()))?;
        let all_time_score = result
            .get("all_time_score")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                StoreError::Validation("procedure result missing all_time_score".into())
            })?;
        Ok(ContributionResult {
            period_score,
            all_time_score,
        })
    }

    /// All score rows for a user, period rows and the all_time aggregate
    /// alike. Fail-soft read.
    pub async fn scores_for_user(&self, user_id: &str) -> Vec<ContributionScore> {
        let rows = crate::store::fetch_many_or_default(
            self.store.as_ref(),
            COLLECTION,
            &[Filter::eq("user_id", user_id)],
            None,
        )
        .await;
        decode_rows(COLLECTION, rows)
    }

    pub async fn all_time_score(
        &self,
        user_id: &str,
        category: &str,
    ) -> Result<Option<ContributionScore>, StoreError> {
        let row = self
            .store
            .fetch_one(
                COLLECTION,
                &[
                    Filter::eq("user_id", user_id),
                    Filter::eq("category", category),
                    Filter::eq("period", "all_time"),
                ],
            )
            .await?;
        row.map(crate::models::from_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;
    use crate::store::MemoryStore;

    fn service() -> ScoreService {
        ScoreService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn contributions_accumulate_across_periods() {
        let svc = service();
        svc.record_contribution("u1", "discussions", "2026-07", 60).await.unwrap();
        let result = svc
            .record_contribution("u1", "discussions", "2026-08", 70)
            .await
            .unwrap();
        assert_eq!(result.period_score, 70);
        assert_eq!(result.all_time_score, 130);

        let all_time = svc.all_time_score("u1", "discussions").await.unwrap().unwrap();
        assert_eq!(all_time.score, 130);
        assert_eq!(all_time.tier, Tier::Silver);
    }

    #[tokio::test]
    async fn repeated_deltas_in_one_period_sum() {
        let svc = service();
        svc.record_contribution("u1", "events", "2026-08", 10).await.unwrap();
        let result = svc.record_contribution("u1", "events", "2026-08", 15).await.unwrap();
        assert_eq!(result.period_score, 25);
        assert_eq!(result.all_time_score, 25);
    }

    #[tokio::test]
    async fn writing_all_time_directly_is_rejected() {
        let svc = service();
        let err = svc
            .record_contribution("u1", "events", "all_time", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn categories_are_scored_independently() {
        let svc = service();
        svc.record_contribution("u1", "events", "2026-08", 600).await.unwrap();
        svc.record_contribution("u1", "discussions", "2026-08", 5).await.unwrap();

        let events = svc.all_time_score("u1", "events").await.unwrap().unwrap();
        let discussions = svc.all_time_score("u1", "discussions").await.unwrap().unwrap();
        assert_eq!(events.tier, Tier::Gold);
        assert_eq!(discussions.tier, Tier::Bronze);
    }
}
