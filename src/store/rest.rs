//! REST implementation of the data-access contract.
//!
//! Speaks the PostgREST dialect the hosted backend exposes: column
//! predicates in the query string (`status=eq.active`), `order=` /
//! `limit=` / `offset=` for shaping, `Prefer: return=representation` so
//! writes echo the stored row, and `POST /rpc/{name}` for procedures.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{DataStore, Filter, FilterOp, Page, Record, Sort};
use crate::errors::StoreError;

#[derive(Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    /// Build a store client. One instance is constructed at application
    /// startup and shared; `reqwest::Client` is internally pooled so the
    /// handle is cheap to clone.
    pub fn new(base_url: &str, api_key: &str, request_timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| StoreError::Transport {
                collection: "<client>".to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn check_status(
        &self,
        collection: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        tracing::error!(
            collection = %collection,
            status = status.as_u16(),
            message = %message,
            "Store rejected operation"
        );
        Err(StoreError::Store {
            collection: collection.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    fn transport_err(&self, collection: &str, source: reqwest::Error) -> StoreError {
        tracing::error!(collection = %collection, error = %source, "Store transport failure");
        StoreError::Transport {
            collection: collection.to_string(),
            source,
        }
    }
}

/// Render a filter value as a PostgREST query-string token.
fn value_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Filters as query pairs, `column -> "op.token"`. Handed to reqwest's
/// `.query()` so reserved characters in values are percent-encoded
/// instead of corrupting the predicate.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| {
            // `in` takes a parenthesized list, every other operator a scalar.
            let token = match (filter.op, filter.value.as_array()) {
                (FilterOp::In, Some(values)) => format!(
                    "({})",
                    values.iter().map(value_token).collect::<Vec<_>>().join(",")
                ),
                _ => value_token(&filter.value),
            };
            (
                filter.column.clone(),
                format!("{}.{}", filter.op.as_str(), token),
            )
        })
        .collect()
}

#[async_trait]
impl DataStore for RestStore {
    async fn fetch_many(
        &self,
        collection: &str,
        filters: &[Filter],
        sort: Option<&Sort>,
        page: Option<Page>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut params = filter_params(filters);
        if let Some(sort) = sort {
            let dir = if sort.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", sort.column, dir)));
        }
        if let Some(page) = page {
            params.push(("limit".to_string(), page.limit.to_string()));
            params.push(("offset".to_string(), page.offset.to_string()));
        }

        let url = format!("{}/{}", self.base_url, collection);
        let resp = self
            .authed(self.client.get(&url).query(&params))
            .send()
            .await
            .map_err(|e| self.transport_err(collection, e))?;
        let resp = self.check_status(collection, resp).await?;
        resp.json::<Vec<Record>>()
            .await
            .map_err(|e| self.transport_err(collection, e))
    }

    async fn fetch_one(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Option<Record>, StoreError> {
        let rows = self
            .fetch_many(collection, filters, None, Some(Page { limit: 1, offset: 0 }))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create(&self, collection: &str, payload: Record) -> Result<Record, StoreError> {
        let url = format!("{}/{}", self.base_url, collection);
        let resp = self
            .authed(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(&Value::Object(payload))
            .send()
            .await
            .map_err(|e| self.transport_err(collection, e))?;
        let resp = self.check_status(collection, resp).await?;
        // PostgREST echoes inserts as a one-element array.
        let mut rows = resp
            .json::<Vec<Record>>()
            .await
            .map_err(|e| self.transport_err(collection, e))?;
        rows.pop().ok_or_else(|| StoreError::Store {
            collection: collection.to_string(),
            status: 200,
            message: "insert echoed no row".to_string(),
        })
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Record,
    ) -> Result<Record, StoreError> {
        let url = format!("{}/{}", self.base_url, collection);
        let resp = self
            .authed(self.client.patch(&url).query(&[("id", format!("eq.{}", id))]))
            .header("Prefer", "return=representation")
            .json(&Value::Object(patch))
            .send()
            .await
            .map_err(|e| self.transport_err(collection, e))?;
        let resp = self.check_status(collection, resp).await?;
        let mut rows = resp
            .json::<Vec<Record>>()
            .await
            .map_err(|e| self.transport_err(collection, e))?;
        rows.pop().ok_or_else(|| StoreError::Store {
            collection: collection.to_string(),
            status: 200,
            message: format!("update matched no row with id '{}'", id),
        })
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let url = format!("{}/{}", self.base_url, collection);
        let resp = self
            .authed(self.client.delete(&url).query(&[("id", format!("eq.{}", id))]))
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(|e| self.transport_err(collection, e))?;
        let resp = self.check_status(collection, resp).await?;
        let rows = resp
            .json::<Vec<Record>>()
            .await
            .map_err(|e| self.transport_err(collection, e))?;
        Ok(!rows.is_empty())
    }

    async fn invoke(&self, procedure: &str, args: Value) -> Result<Value, StoreError> {
        let url = format!("{}/rpc/{}", self.base_url, procedure);
        let resp = self
            .authed(self.client.post(&url))
            .json(&args)
            .send()
            .await
            .map_err(|e| self.transport_err(procedure, e))?;
        let resp = self.check_status(procedure, resp).await?;
        resp.json::<Value>()
            .await
            .map_err(|e| self.transport_err(procedure, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FilterOp;

    fn store() -> RestStore {
        RestStore::new("https://db.example.com/rest/v1/", "key", Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let s = store();
        assert_eq!(s.base_url, "https://db.example.com/rest/v1");
    }

    #[test]
    fn filter_params_render_operator_tokens() {
        let params = filter_params(&[
            Filter::eq("company_id", "acme"),
            Filter::new("status", FilterOp::Neq, "archived"),
        ]);
        assert_eq!(
            params,
            vec![
                ("company_id".to_string(), "eq.acme".to_string()),
                ("status".to_string(), "neq.archived".to_string()),
            ]
        );
    }

    #[test]
    fn filter_params_render_in_lists() {
        let params = filter_params(&[Filter::new(
            "status",
            FilterOp::In,
            serde_json::json!(["active", "completed"]),
        )]);
        assert_eq!(
            params,
            vec![("status".to_string(), "in.(active,completed)".to_string())]
        );
    }

    #[test]
    fn filter_values_with_reserved_characters_stay_one_parameter() {
        let s = store();
        let req = s
            .client
            .get(format!("{}/tasks", s.base_url))
            .query(&filter_params(&[Filter::eq("title", "R&D plan")]))
            .build()
            .unwrap();
        let pairs: Vec<(String, String)> = req
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs, vec![("title".to_string(), "eq.R&D plan".to_string())]);
    }

    #[test]
    fn value_token_handles_non_strings() {
        assert_eq!(value_token(&serde_json::json!(42)), "42");
        assert_eq!(value_token(&serde_json::json!(true)), "true");
        assert_eq!(value_token(&serde_json::json!("plain")), "plain");
        assert_eq!(value_token(&Value::Null), "null");
    }
}
