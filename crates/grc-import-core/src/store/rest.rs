//! A [`Store`] backed by a PostgREST-style HTTP API.
//!
//! Tables live under `<base>/rest/v1/<table>`. Filters are query parameters
//! (`column=eq.value`, `column=ilike.*needle*`), writes ask for the stored
//! representation back, and upserts send `on_conflict` with
//! `Prefer: resolution=merge-duplicates`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Method, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde_json::Value;
use url::Url;

use crate::{
    Config,
    store::{Filter, Query, Row, Store, StoreError, Table},
};

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// HTTP client for the persistence service.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base: Url,
}

impl RestStore {
    /// Creates a store for the service at `base_url`, authenticating every
    /// request with `api_key` when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL or key is unusable.
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, StoreError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("invalid store URL '{base_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let invalid = |_| StoreError::Config("API key contains invalid characters".to_string());
            headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        Ok(Self { client, base })
    }

    /// Creates a store from configuration, reading the API key from the
    /// configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if no store URL is configured.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let url = config
            .store_url()
            .ok_or_else(|| StoreError::Config("store_url is not set".to_string()))?;
        let key = std::env::var(config.store_key_env()).ok();
        if key.is_none() {
            tracing::warn!(
                variable = config.store_key_env(),
                "no API key in environment; requests are unauthenticated"
            );
        }
        Self::new(url, key.as_deref(), config.fetch_timeout())
    }

    fn table_url(&self, table: Table) -> Result<Url, StoreError> {
        self.base
            .join(&format!("rest/v1/{}", table.name()))
            .map_err(|e| StoreError::Config(e.to_string()))
    }

    #[tracing::instrument(level = "debug", skip(self, params, body), fields(table = table.name()))]
    async fn send(
        &self,
        method: Method,
        table: Table,
        params: Vec<(String, String)>,
        prefer: Option<&str>,
        body: Option<Value>,
    ) -> Result<Vec<Row>, StoreError> {
        let transport = |source| StoreError::Transport {
            table: table.name(),
            source,
        };

        let mut request = self
            .client
            .request(method, self.table_url(table)?)
            .query(&params);
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::CONFLICT {
                StoreError::Conflict {
                    table: table.name(),
                    columns: vec![message],
                }
            } else {
                StoreError::Service {
                    table: table.name(),
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let rows: Vec<Value> = response.json().await.map_err(transport)?;
        rows.into_iter()
            .map(|row| match row {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::MalformedRow {
                    table: table.name(),
                    reason: format!("expected an object, got {other}"),
                }),
            })
            .collect()
    }
}

fn first_row(table: Table, rows: Vec<Row>) -> Result<Row, StoreError> {
    rows.into_iter().next().ok_or_else(|| StoreError::MalformedRow {
        table: table.name(),
        reason: "no row returned".to_string(),
    })
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn escape_pattern(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('*', "\\*")
}

/// Renders a query as PostgREST parameters.
pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, Value::Null) => (column.clone(), "is.null".to_string()),
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", literal(value))),
            Filter::EqIgnoreCase(column, value) => {
                (column.clone(), format!("ilike.{}", escape_pattern(value)))
            }
            Filter::ContainsIgnoreCase(column, needle) => {
                (column.clone(), format!("ilike.*{}*", escape_pattern(needle)))
            }
        })
        .collect();
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl Store for RestStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(query_params(query));
        self.send(Method::GET, table, params, None, None).await
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        let rows = self
            .send(
                Method::POST,
                table,
                Vec::new(),
                Some(RETURN_REPRESENTATION),
                Some(Value::Array(vec![Value::Object(row)])),
            )
            .await?;
        first_row(table, rows)
    }

    async fn update(&self, table: Table, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        self.send(
            Method::PATCH,
            table,
            query_params(query),
            Some(RETURN_REPRESENTATION),
            Some(Value::Object(patch)),
        )
        .await
    }

    async fn upsert(&self, table: Table, row: Row, on_conflict: &[&str]) -> Result<Row, StoreError> {
        let params = if on_conflict.is_empty() {
            Vec::new()
        } else {
            vec![("on_conflict".to_string(), on_conflict.join(","))]
        };
        let rows = self
            .send(
                Method::POST,
                table,
                params,
                Some(MERGE_DUPLICATES),
                Some(Value::Array(vec![Value::Object(row)])),
            )
            .await?;
        first_row(table, rows)
    }
}
