//! In-process implementation of the data-access contract.
//!
//! Serves as the substitution point in tests and as the reference
//! semantics for the contract: server-assigned ids/timestamps on create,
//! `None`/`false` for absence, and atomic built-in procedures for the
//! invariants the remote backend enforces transactionally
//! (counter deltas, at-most-one-active-membership, capacity-bounded
//! registration, contribution accumulation).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{DataStore, Filter, FilterOp, Page, Record, Sort};
use crate::errors::StoreError;
use crate::models::Tier;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with pre-built records (tests and fixtures).
    pub fn seed(&self, collection: &str, records: Vec<Record>) {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables.entry(collection.to_string()).or_default().extend(records);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Record>>> {
        self.tables.lock().expect("store lock poisoned")
    }
}

fn matches(record: &Record, filter: &Filter) -> bool {
    let field = record.get(&filter.column).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => field == &filter.value,
        FilterOp::Neq => field != &filter.value,
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            compare(field, &filter.value).is_some_and(|ord| match filter.op {
                FilterOp::Gt => ord.is_gt(),
                FilterOp::Gte => ord.is_ge(),
                FilterOp::Lt => ord.is_lt(),
                FilterOp::Lte => ord.is_le(),
                _ => unreachable!(),
            })
        }
        FilterOp::In => filter
            .value
            .as_array()
            .is_some_and(|candidates| candidates.contains(field)),
        FilterOp::Like => like_matches(field, &filter.value),
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn like_matches(field: &Value, pattern: &Value) -> bool {
    let (Value::String(field), Value::String(pattern)) = (field, pattern) else {
        return false;
    };
    match (pattern.strip_prefix('%'), pattern.strip_suffix('%')) {
        (Some(rest), Some(_)) => field.contains(rest.trim_end_matches('%')),
        (Some(suffix), None) => field.ends_with(suffix),
        (None, Some(prefix)) => field.starts_with(prefix),
        (None, None) => field == pattern,
    }
}

fn sort_records(records: &mut [Record], sort: &Sort) {
    records.sort_by(|a, b| {
        let av = a.get(&sort.column).unwrap_or(&Value::Null);
        let bv = b.get(&sort.column).unwrap_or(&Value::Null);
        let ord = compare(av, bv).unwrap_or(std::cmp::Ordering::Equal);
        if sort.ascending { ord } else { ord.reverse() }
    });
}

fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

fn str_arg(args: &Value, key: &str) -> Result<String, StoreError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Validation(format!("missing procedure argument '{}'", key)))
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn fetch_many(
        &self,
        collection: &str,
        filters: &[Filter],
        sort: Option<&Sort>,
        page: Option<Page>,
    ) -> Result<Vec<Record>, StoreError> {
        let tables = self.lock();
        let mut records: Vec<Record> = tables
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filters.iter().all(|f| matches(r, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(sort) = sort {
            sort_records(&mut records, sort);
        }
        if let Some(page) = page {
            records = records.into_iter().skip(page.offset).take(page.limit).collect();
        }
        Ok(records)
    }

    async fn fetch_one(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Option<Record>, StoreError> {
        let tables = self.lock();
        Ok(tables.get(collection).and_then(|rows| {
            rows.iter()
                .find(|r| filters.iter().all(|f| matches(r, f)))
                .cloned()
        }))
    }

    async fn create(&self, collection: &str, mut payload: Record) -> Result<Record, StoreError> {
        // Server-assigned fields, merged over the caller's payload.
        if !payload.contains_key("id") {
            payload.insert("id".into(), json!(uuid::Uuid::new_v4().to_string()));
        }
        payload
            .entry("created_at")
            .or_insert_with(|| json!(chrono::Utc::now().to_rfc3339()));
        let mut tables = self.lock();
        tables.entry(collection.to_string()).or_default().push(payload.clone());
        Ok(payload)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Record,
    ) -> Result<Record, StoreError> {
        let mut tables = self.lock();
        let rows = tables.get_mut(collection).ok_or_else(|| StoreError::Store {
            collection: collection.to_string(),
            status: 404,
            message: format!("unknown collection '{}'", collection),
        })?;
        let row = rows
            .iter_mut()
            .find(|r| record_id(r) == Some(id))
            .ok_or_else(|| StoreError::Store {
                collection: collection.to_string(),
                status: 404,
                message: format!("no row with id '{}'", id),
            })?;
        for (key, value) in patch {
            row.insert(key, value);
        }
        row.insert("updated_at".into(), json!(chrono::Utc::now().to_rfc3339()));
        Ok(row.clone())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let Some(rows) = tables.get_mut(collection) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| record_id(r) != Some(id));
        Ok(rows.len() != before)
    }

    async fn invoke(&self, procedure: &str, args: Value) -> Result<Value, StoreError> {
        match procedure {
            "increment_counter" => self.apply_counter_delta(&args, 1),
            "decrement_counter" => self.apply_counter_delta(&args, -1),
            "join_group" => self.join_group(&args),
            "register_for_event" => self.register_for_event(&args),
            "record_contribution" => self.record_contribution(&args),
            other => Err(StoreError::Validation(format!(
                "unknown procedure '{}'",
                other
            ))),
        }
    }
}

impl MemoryStore {
    /// Atomic counter delta on one column of one row, floored at zero.
    /// Runs entirely under the table lock — there is no read-modify-write
    /// window for concurrent callers to race through.
    fn apply_counter_delta(&self, args: &Value, sign: i64) -> Result<Value, StoreError> {
        let collection = str_arg(args, "collection")?;
        let id = str_arg(args, "id")?;
        let column = str_arg(args, "column")?;
        let delta = args.get("delta").and_then(Value::as_i64).unwrap_or(1) * sign;

        let mut tables = self.lock();
        let rows = tables.get_mut(&collection).ok_or_else(|| StoreError::Store {
            collection: collection.clone(),
            status: 404,
            message: format!("unknown collection '{}'", collection),
        })?;
        let row = rows
            .iter_mut()
            .find(|r| record_id(r) == Some(&id))
            .ok_or_else(|| StoreError::Store {
                collection: collection.clone(),
                status: 404,
                message: format!("no row with id '{}'", id),
            })?;
        let current = row.get(&column).and_then(Value::as_i64).unwrap_or(0);
        let next = (current + delta).max(0);
        row.insert(column, json!(next));
        Ok(json!(next))
    }

    /// Atomic check-and-insert for group membership: at most one
    /// non-inactive membership per (group, user). A duplicate join
    /// returns the existing row unchanged.
    fn join_group(&self, args: &Value) -> Result<Value, StoreError> {
        let group_id = str_arg(args, "group_id")?;
        let user_id = str_arg(args, "user_id")?;
        let role = args
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("member")
            .to_string();

        let mut tables = self.lock();

        let requires_approval = tables
            .get("groups")
            .and_then(|rows| rows.iter().find(|r| record_id(r) == Some(&group_id)))
            .and_then(|g| g.get("requires_approval"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let memberships = tables.entry("memberships".to_string()).or_default();
        if let Some(existing) = memberships.iter().find(|r| {
            r.get("group_id").and_then(Value::as_str) == Some(&group_id)
                && r.get("user_id").and_then(Value::as_str) == Some(&user_id)
                && r.get("status").and_then(Value::as_str) != Some("inactive")
        }) {
            return Ok(Value::Object(existing.clone()));
        }

        let status = if requires_approval { "pending" } else { "active" };
        let membership = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "group_id": group_id,
            "user_id": user_id,
            "status": status,
            "role": role,
        });
        let Value::Object(record) = membership.clone() else {
            unreachable!()
        };
        memberships.push(record);
        Ok(membership)
    }

    /// Capacity-bounded registration: count-and-insert under one lock.
    fn register_for_event(&self, args: &Value) -> Result<Value, StoreError> {
        let event_id = str_arg(args, "event_id")?;
        let user_id = str_arg(args, "user_id")?;
        let capacity = args.get("capacity").and_then(Value::as_u64);

        let mut tables = self.lock();
        let registrations = tables.entry("event_registrations".to_string()).or_default();

        let already = registrations.iter().any(|r| {
            r.get("event_id").and_then(Value::as_str) == Some(&event_id)
                && r.get("user_id").and_then(Value::as_str) == Some(&user_id)
        });
        if already {
            return Ok(json!({ "registered": true, "duplicate": true }));
        }

        let taken = registrations
            .iter()
            .filter(|r| r.get("event_id").and_then(Value::as_str) == Some(&event_id))
            .count() as u64;
        if let Some(capacity) = capacity
            && taken >= capacity
        {
            return Ok(json!({ "registered": false, "reason": "full" }));
        }

        registrations.push(
            json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "event_id": event_id,
                "user_id": user_id,
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        );
        Ok(json!({ "registered": true }))
    }

    /// Accumulate a period score and recompute the derived all_time row
    /// from every period, in one atomic step.
    fn record_contribution(&self, args: &Value) -> Result<Value, StoreError> {
        let user_id = str_arg(args, "user_id")?;
        let category = str_arg(args, "category")?;
        let period = str_arg(args, "period")?;
        if period == "all_time" {
            return Err(StoreError::Validation(
                "'all_time' is derived and cannot be written directly".into(),
            ));
        }
        let delta = args.get("delta").and_then(Value::as_i64).unwrap_or(0);

        let mut tables = self.lock();
        let scores = tables.entry("contribution_scores".to_string()).or_default();

        let key_matches = |r: &Record, p: &str| {
            r.get("user_id").and_then(Value::as_str) == Some(&user_id)
                && r.get("category").and_then(Value::as_str) == Some(&category)
                && r.get("period").and_then(Value::as_str) == Some(p)
        };

        let period_score = match scores.iter_mut().find(|r| key_matches(r, &period)) {
            Some(row) => {
                let next = row.get("score").and_then(Value::as_i64).unwrap_or(0) + delta;
                row.insert("score".into(), json!(next));
                row.insert("tier".into(), json!(Tier::for_score(next).as_str()));
                next
            }
            None => {
                scores.push(
                    json!({
                        "id": uuid::Uuid::new_v4().to_string(),
                        "user_id": user_id,
                        "category": category,
                        "period": period,
                        "score": delta,
                        "tier": Tier::for_score(delta).as_str(),
                    })
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                );
                delta
            }
        };

        let all_time: i64 = scores
            .iter()
            .filter(|r| {
                r.get("user_id").and_then(Value::as_str) == Some(&user_id)
                    && r.get("category").and_then(Value::as_str) == Some(&category)
                    && r.get("period").and_then(Value::as_str) != Some("all_time")
            })
            .filter_map(|r| r.get("score").and_then(Value::as_i64))
            .sum();

        match scores.iter_mut().find(|r| key_matches(r, "all_time")) {
            Some(row) => {
                row.insert("score".into(), json!(all_time));
                row.insert("tier".into(), json!(Tier::for_score(all_time).as_str()));
            }
            None => {
                scores.push(
                    json!({
                        "id": uuid::Uuid::new_v4().to_string(),
                        "user_id": user_id,
                        "category": category,
                        "period": "all_time",
                        "score": all_time,
                        "tier": Tier::for_score(all_time).as_str(),
                    })
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                );
            }
        }

        Ok(json!({ "period_score": period_score, "all_time_score": all_time }))
    }
}
