use std::sync::Arc;

use serde_json::json;

use super::decode_rows;
use crate::errors::StoreError;
use crate::models::{JourneyStep, StepStatus, StepTemplate, from_record};
use crate::store::{DataStore, Filter, Record};

const STEPS: &str = "company_journey_steps";
const TEMPLATES: &str = "journey_step_templates";

#[derive(Clone)]
pub struct JourneyService {
    store: Arc<dyn DataStore>,
}

impl JourneyService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// The company's journey steps, instantiating missing ones from the
    /// canonical templates on first access. A company that has never
    /// touched its journey gets a full NotStarted copy; companies with
    /// partial copies get only the gaps filled. Copies then evolve
    /// independently of their templates.
    pub async fn steps_for_company(&self, company_id: &str) -> Result<Vec<JourneyStep>, StoreError> {
        let existing_rows = self
            .store
            .fetch_many(STEPS, &[Filter::eq("company_id", company_id)], None, None)
            .await?;
        let mut steps: Vec<JourneyStep> = decode_rows(STEPS, existing_rows);

        let template_rows = self.store.fetch_many(TEMPLATES, &[], None, None).await?;
        let templates: Vec<StepTemplate> = decode_rows(TEMPLATES, template_rows);

        for template in templates {
            let covered = steps
                .iter()
                .any(|s| s.template_id.as_deref() == Some(template.id.as_str()));
            if covered {
                continue;
            }
            let created = self
                .store
                .create(
                    STEPS,
                    record(&[
                        ("company_id", json!(company_id)),
                        ("template_id", json!(template.id)),
                        ("phase", json!(template.phase)),
                        ("domain", json!(template.domain)),
                        ("title", json!(template.title)),
                        ("status", json!(StepStatus::NotStarted.as_str())),
                        ("started_at", json!(null)),
                        ("completed_at", json!(null)),
                    ]),
                )
                .await?;
            steps.push(from_record(created)?);
        }

        Ok(steps)
    }

    /// Status transition with timestamp stamping: entering Active sets
    /// `started_at` (once), entering Complete or Skipped sets
    /// `completed_at`, leaving a terminal status clears it.
    pub async fn set_step_status(
        &self,
        step_id: &str,
        status: StepStatus,
    ) -> Result<JourneyStep, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut patch = Record::new();
        patch.insert("status".into(), json!(status.as_str()));
        match status {
            StepStatus::Active => {
                patch.insert("started_at".into(), json!(now));
                patch.insert("completed_at".into(), json!(null));
            }
            StepStatus::Complete | StepStatus::Skipped => {
                patch.insert("completed_at".into(), json!(now));
            }
            StepStatus::NotStarted => {
                patch.insert("started_at".into(), json!(null));
                patch.insert("completed_at".into(), json!(null));
            }
        }
        let row = self.store.update(STEPS, step_id, patch).await?;
        from_record(row)
    }

    /// Ad hoc step with no backing template.
    pub async fn add_custom_step(
        &self,
        company_id: &str,
        phase: &str,
        domain: &str,
        title: &str,
    ) -> Result<JourneyStep, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::Validation("step title must not be empty".into()));
        }
        let row = self
            .store
            .create(
                STEPS,
                record(&[
                    ("company_id", json!(company_id)),
                    ("template_id", json!(null)),
                    ("phase", json!(phase)),
                    ("domain", json!(domain)),
                    ("title", json!(title)),
                    ("status", json!(StepStatus::NotStarted.as_str())),
                    ("started_at", json!(null)),
                    ("completed_at", json!(null)),
                ]),
            )
            .await?;
        from_record(row)
    }
}

fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
