//! Hosted REST API provider
//!
//! Talks to a PostgREST-compatible endpoint (`{url}/rest/v1/{view}`) with
//! reqwest. The API key is sent both as `apikey` and as a bearer token.

use crate::config::RestConfig;
use crate::db::memory::rows_from_value;
use crate::db::types::Record;
use crate::db::{Database, ViewQuery};
use crate::error::{DbError, DbResult};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

/// Characters escaped in a URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// PostgREST provider
pub struct RestProvider {
    client: reqwest::Client,
    base_url: String,
}

impl RestProvider {
    /// Build a client with the API key baked into its default headers.
    pub fn new(config: &RestConfig) -> DbResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| DbError::ConnectionFailed("API key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| DbError::ConnectionFailed("API key is not a valid header value".into()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn relation_url(&self, relation: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url,
            utf8_percent_encode(relation, PATH_SEGMENT)
        )
    }
}

impl Database for RestProvider {
    async fn fetch(&self, query: &ViewQuery) -> DbResult<Option<Vec<Record>>> {
        let resp = self
            .client
            .get(self.relation_url(&query.view))
            .query(&query.to_postgrest_params())
            .send()
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(DbError::QueryFailed(format!(
                "{}: {}",
                status.as_u16(),
                error_message(&body, status)
            )));
        }
        parse_rows(&body)
    }

    async fn upsert(&self, table: &str, key_column: &str, records: &[Record]) -> DbResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let resp = self
            .client
            .post(self.relation_url(table))
            .query(&[("on_conflict", key_column)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records)
            .send()
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DbError::QueryFailed(format!(
                "{}: {}",
                status.as_u16(),
                error_message(&body, status)
            )));
        }
        Ok(records.len())
    }
}

/// Parse a successful response body. An empty body or `null` means no data.
fn parse_rows(body: &str) -> DbResult<Option<Vec<Record>>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| DbError::InvalidResponse(e.to_string()))?;
    rows_from_value(value)
}

/// Pull the human-readable message out of a PostgREST error body.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(serde_json::Value::Object(err)) = serde_json::from_str(body) {
        let field = |k: &str| err.get(k).and_then(|v| v.as_str()).filter(|s| !s.is_empty());
        if let Some(message) = field("message") {
            return match (field("code"), field("hint")) {
                (Some(code), Some(hint)) => format!("{} ({}; hint: {})", message, code, hint),
                (Some(code), None) => format!("{} ({})", message, code),
                (None, Some(hint)) => format!("{} (hint: {})", message, hint),
                (None, None) => message.to_string(),
            };
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
