use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreError;
use crate::store::Record;

/// Anything the sync layer can cache: a record with an opaque string id.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Convert a raw store record into a typed entity, failing on shape mismatch.
pub fn from_record<T: for<'de> Deserialize<'de>>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Convert a typed payload into a raw store record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Validation(format!(
            "expected an object payload, got {}",
            match other {
                Value::Null => "null",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                Value::Object(_) => unreachable!(),
            }
        ))),
    }
}

// ── Company ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Active,
    Suspended,
    Deactivated,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deactivated => "deactivated",
        }
    }
}

impl FromStr for CompanyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "deactivated" => Ok(Self::Deactivated),
            _ => Err(format!("Invalid company status: {}", s)),
        }
    }
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workspace. Never hard-deleted — deactivation flips `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub feature_flags: HashMap<String, bool>,
    pub status: CompanyStatus,
    pub created_at: String,
}

impl Entity for Company {
    fn id(&self) -> &str {
        &self.id
    }
}

// ── Task ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Completed,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub company_id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Optional grouping parent (standup entry, journey step).
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Caller-supplied fields for a new task; the store assigns id/timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub company_id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub parent_id: Option<String>,
}

// ── Journey steps ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    Active,
    Complete,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "active" => Ok(Self::Active),
            "complete" => Ok(Self::Complete),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid step status: {}", s)),
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A company-scoped copy of a canonical journey step template.
///
/// `template_id` is None for ad hoc steps created directly by a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyStep {
    pub id: String,
    pub company_id: String,
    pub template_id: Option<String>,
    pub phase: String,
    pub domain: String,
    pub title: String,
    pub status: StepStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl Entity for JourneyStep {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Canonical template a company step is instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub id: String,
    pub phase: String,
    pub domain: String,
    pub title: String,
}

// ── Discussions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default)]
    pub reaction_count: i64,
    pub created_at: String,
}

impl Entity for Thread {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub body: String,
    #[serde(default)]
    pub reaction_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    pub reply_id: String,
    pub user_id: String,
    pub kind: String,
}

// ── Community groups ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Active,
    Inactive,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Invalid membership status: {}", s)),
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub access_level: String,
    /// When true, new joins land in Pending until approved.
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub status: MembershipStatus,
    pub role: String,
}

impl Entity for Membership {
    fn id(&self) -> &str {
        &self.id
    }
}

// ── Contribution scores ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }

    /// Tier thresholds: bronze < 100 ≤ silver < 500 ≤ gold < 2000 ≤ platinum.
    pub fn for_score(score: i64) -> Self {
        match score {
            s if s >= 2000 => Self::Platinum,
            s if s >= 500 => Self::Gold,
            s if s >= 100 => Self::Silver,
            _ => Self::Bronze,
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            _ => Err(format!("Invalid tier: {}", s)),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scoring period for one user/category, plus the derived `all_time`
/// row the store recomputes from all periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionScore {
    pub id: String,
    pub user_id: String,
    pub category: String,
    /// Period key such as "2026-08", or "all_time" for the aggregate row.
    pub period: String,
    pub score: i64,
    pub tier: Tier,
}

impl Entity for ContributionScore {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_round_trips_through_strings() {
        for status in [TaskStatus::Active, TaskStatus::Completed, TaskStatus::Archived] {
            let parsed = TaskStatus::from_str(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(TaskStatus::from_str("bogus").is_err());
    }

    #[test]
    fn status_enums_display_their_tokens() {
        assert_eq!(CompanyStatus::Suspended.to_string(), "suspended");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
        assert_eq!(StepStatus::NotStarted.to_string(), "not_started");
        assert_eq!(MembershipStatus::Pending.to_string(), "pending");
        assert_eq!(Tier::Platinum.to_string(), "platinum");
    }

    #[test]
    fn step_status_parses_not_started() {
        assert_eq!(StepStatus::from_str("not_started").unwrap(), StepStatus::NotStarted);
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(Tier::for_score(0), Tier::Bronze);
        assert_eq!(Tier::for_score(99), Tier::Bronze);
        assert_eq!(Tier::for_score(100), Tier::Silver);
        assert_eq!(Tier::for_score(499), Tier::Silver);
        assert_eq!(Tier::for_score(500), Tier::Gold);
        assert_eq!(Tier::for_score(1999), Tier::Gold);
        assert_eq!(Tier::for_score(2000), Tier::Platinum);
    }

    #[test]
    fn from_record_rejects_shape_mismatch() {
        let mut record = Record::new();
        record.insert("id".into(), serde_json::json!("t1"));
        // Missing required fields
        assert!(from_record::<Task>(record).is_err());
    }

    #[test]
    fn to_record_rejects_non_object() {
        assert!(to_record(&"just a string").is_err());
        assert!(to_record(&42).is_err());
    }
}
