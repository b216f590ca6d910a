//! WAX chain table reader
//!
//! Reads rows from a contract's table storage through the node's
//! `POST /v1/chain/get_table_rows` endpoint. Rows come out of
//! [`get_table_rows`] as a lazy stream: a page is only requested once the
//! consumer has drained the rows buffered from the previous one.

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

use crate::settings::Tables;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// No row for the requested key
    NotFound { table: String, key: String },
    /// Network, connection or timeout failure talking to the node
    Transport(String),
    /// The node answered with a non-success status
    Api { status: u16, body: String },
    /// Malformed page or row payload
    Decode(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::NotFound { table, key } => {
                write!(f, "No row with key {} in table {}", key, table)
            }
            ChainError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ChainError::Api { status, body } => write!(f, "WAX node error {}: {}", status, body),
            ChainError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ChainError::Decode(e.to_string())
        } else {
            ChainError::Transport(e.to_string())
        }
    }
}

/// Parameters of a `get_table_rows` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRowsQuery {
    pub code: String,
    pub scope: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Ask the node to ABI-decode rows; sent as `json`
    #[serde(rename = "json")]
    pub full: bool,
}

impl TableRowsQuery {
    pub fn new(code: impl Into<String>, scope: impl Into<String>, table: Tables) -> Self {
        Self {
            code: code.into(),
            scope: scope.into(),
            table: table.as_str().to_string(),
            lower_bound: None,
            upper_bound: None,
            limit: None,
            full: false,
        }
    }

    pub fn key_range(mut self, lower: impl ToString, upper: impl ToString) -> Self {
        self.lower_bound = Some(lower.to_string());
        self.upper_bound = Some(upper.to_string());
        self
    }

    /// Bound the range to exactly one primary key
    pub fn single_key(self, key: impl ToString) -> Self {
        let key = key.to_string();
        self.key_range(key.clone(), key)
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }
}

/// One page as returned by the node
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableRowsPage {
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub more: bool,
    #[serde(default, deserialize_with = "deserialize_next_key")]
    pub next_key: Option<String>,
}

fn deserialize_next_key<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Empty string means "no next page"; some nodes send a bare number
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A single table row
///
/// `Decoded` is returned for `full == true` queries, `Raw` holds the
/// hex-decoded binary row otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRow {
    Raw(Vec<u8>),
    Decoded(serde_json::Value),
}

impl TableRow {
    fn from_value(value: serde_json::Value, full: bool) -> Result<Self, ChainError> {
        if full {
            return Ok(TableRow::Decoded(value));
        }

        // With show_payer the node wraps rows as {"data": ..., "payer": ...}
        let hex_data = match &value {
            serde_json::Value::String(s) => s.as_str(),
            serde_json::Value::Object(map) => map
                .get("data")
                .and_then(|d| d.as_str())
                .ok_or_else(|| ChainError::Decode("raw row without data field".to_string()))?,
            other => {
                return Err(ChainError::Decode(format!(
                    "expected hex string for raw row, got {}",
                    other
                )));
            }
        };

        hex::decode(hex_data)
            .map(TableRow::Raw)
            .map_err(|e| ChainError::Decode(format!("invalid hex row: {}", e)))
    }

    /// Null, `{}`, `[]`, `""` and zero-length raw rows carry no data
    pub fn is_empty(&self) -> bool {
        match self {
            TableRow::Raw(bytes) => bytes.is_empty(),
            TableRow::Decoded(value) => match value {
                serde_json::Value::Null => true,
                serde_json::Value::Object(map) => map.is_empty(),
                serde_json::Value::Array(items) => items.is_empty(),
                serde_json::Value::String(s) => s.is_empty(),
                _ => false,
            },
        }
    }

    pub fn into_decoded(self) -> Result<serde_json::Value, ChainError> {
        match self {
            TableRow::Decoded(value) => Ok(value),
            TableRow::Raw(_) => Err(ChainError::Decode(
                "raw row cannot be decoded without the contract ABI".to_string(),
            )),
        }
    }
}

/// Anything able to answer one `get_table_rows` round trip
#[async_trait]
pub trait TableRowsSource: Send + Sync {
    async fn fetch_page(&self, query: &TableRowsQuery) -> Result<TableRowsPage, ChainError>;
}

/// HTTP client for a WAX node
#[derive(Clone)]
pub struct WaxChainClient {
    client: Client,
    rpc_url: String,
}

impl WaxChainClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn table_rows_url(&self) -> String {
        format!("{}/v1/chain/get_table_rows", self.rpc_url)
    }
}

#[async_trait]
impl TableRowsSource for WaxChainClient {
    async fn fetch_page(&self, query: &TableRowsQuery) -> Result<TableRowsPage, ChainError> {
        debug!(
            code = %query.code,
            scope = %query.scope,
            table = %query.table,
            lower_bound = ?query.lower_bound,
            upper_bound = ?query.upper_bound,
            limit = ?query.limit,
            "Fetching table rows"
        );

        let response = self
            .client
            .post(self.table_rows_url())
            .header("accept", "application/json")
            .json(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let page: TableRowsPage = response.json().await?;

        debug!(
            table = %query.table,
            rows = page.rows.len(),
            more = page.more,
            "Fetched table rows"
        );

        Ok(page)
    }
}

struct RowCursor {
    query: TableRowsQuery,
    buffered: VecDeque<serde_json::Value>,
    yielded: u32,
    exhausted: bool,
}

impl RowCursor {
    fn limit_reached(&self) -> bool {
        self.query.limit.is_some_and(|limit| self.yielded >= limit)
    }

    fn next_request(&self) -> TableRowsQuery {
        let mut request = self.query.clone();
        if let Some(limit) = self.query.limit {
            request.limit = Some(limit - self.yielded);
        }
        request
    }

    fn advance(&mut self, page: TableRowsPage) {
        self.buffered.extend(page.rows);

        match page.next_key {
            // A next_key equal to the current bound would loop forever
            Some(next_key) if page.more && self.query.lower_bound.as_ref() != Some(&next_key) => {
                self.query.lower_bound = Some(next_key);
            }
            _ => self.exhausted = true,
        }
    }
}

/// Stream the rows matching `query`
///
/// The stream is finite: it ends when the node reports no further rows or
/// once `query.limit` rows were produced. Errors are yielded as-is and end
/// the useful part of the stream; nothing is retried.
pub fn get_table_rows<'a>(
    source: &'a dyn TableRowsSource,
    query: TableRowsQuery,
) -> impl Stream<Item = Result<TableRow, ChainError>> + Send + 'a {
    let cursor = RowCursor {
        query,
        buffered: VecDeque::new(),
        yielded: 0,
        exhausted: false,
    };

    stream::try_unfold(cursor, move |cursor| next_row(source, cursor))
}

async fn next_row(
    source: &dyn TableRowsSource,
    mut cursor: RowCursor,
) -> Result<Option<(TableRow, RowCursor)>, ChainError> {
    loop {
        if cursor.limit_reached() {
            return Ok(None);
        }

        if let Some(value) = cursor.buffered.pop_front() {
            let row = TableRow::from_value(value, cursor.query.full)?;
            cursor.yielded += 1;
            return Ok(Some((row, cursor)));
        }

        if cursor.exhausted {
            return Ok(None);
        }

        let page = source.fetch_page(&cursor.next_request()).await?;
        cursor.advance(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wax::testing::ScriptedSource;
    use futures_util::TryStreamExt;
    use serde_json::json;

    fn proposals_query() -> TableRowsQuery {
        TableRowsQuery::new("labs.decide", "labs.decide", Tables::Proposals)
    }

    #[test]
    fn test_query_serializes_like_the_node_expects() {
        let body = serde_json::to_value(proposals_query().single_key(42).limit(1).full(true)).unwrap();

        assert_eq!(
            body,
            json!({
                "code": "labs.decide",
                "scope": "labs.decide",
                "table": "proposals",
                "lower_bound": "42",
                "upper_bound": "42",
                "limit": 1,
                "json": true
            })
        );
    }

    #[test]
    fn test_query_defaults_omit_optional_fields() {
        let body = serde_json::to_value(proposals_query()).unwrap();

        assert_eq!(
            body,
            json!({
                "code": "labs.decide",
                "scope": "labs.decide",
                "table": "proposals",
                "json": false
            })
        );
    }

    #[test]
    fn test_page_next_key_variants() {
        let page: TableRowsPage =
            serde_json::from_value(json!({"rows": [], "more": true, "next_key": "17"})).unwrap();
        assert_eq!(page.next_key.as_deref(), Some("17"));

        let page: TableRowsPage =
            serde_json::from_value(json!({"rows": [], "more": false, "next_key": ""})).unwrap();
        assert_eq!(page.next_key, None);

        let page: TableRowsPage = serde_json::from_value(json!({"rows": [{"a": 1}]})).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert!(!page.more);
    }

    #[test]
    fn test_row_emptiness() {
        assert!(TableRow::Decoded(json!(null)).is_empty());
        assert!(TableRow::Decoded(json!({})).is_empty());
        assert!(TableRow::Decoded(json!([])).is_empty());
        assert!(TableRow::Decoded(json!("")).is_empty());
        assert!(TableRow::Raw(vec![]).is_empty());
        assert!(!TableRow::Decoded(json!({"proposal_id": 1})).is_empty());
        assert!(!TableRow::Decoded(json!(0)).is_empty());
        assert!(!TableRow::Raw(vec![0]).is_empty());
    }

    #[tokio::test]
    async fn test_stream_follows_next_key_until_exhausted() {
        let source = ScriptedSource::new(vec![
            Ok(TableRowsPage {
                rows: vec![json!({"id": 1}), json!({"id": 2})],
                more: true,
                next_key: Some("3".to_string()),
            }),
            Ok(TableRowsPage {
                rows: vec![json!({"id": 3})],
                more: false,
                next_key: None,
            }),
        ]);

        let rows: Vec<TableRow> = get_table_rows(&source, proposals_query().full(true))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], TableRow::Decoded(json!({"id": 3})));

        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].lower_bound, None);
        assert_eq!(requests[1].lower_bound.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_bounded_range_pages_forward_from_next_key() {
        let source = ScriptedSource::new(vec![
            Ok(TableRowsPage {
                rows: vec![json!({"id": 1}), json!({"id": 2})],
                more: true,
                next_key: Some("8".to_string()),
            }),
            Ok(TableRowsPage {
                rows: vec![json!({"id": 8})],
                more: false,
                next_key: None,
            }),
        ]);

        let rows: Vec<TableRow> = get_table_rows(&source, proposals_query().key_range(1, 10).full(true))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].lower_bound.as_deref(), Some("8"));
        assert_eq!(requests[1].upper_bound.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_stream_respects_limit_across_pages() {
        let source = ScriptedSource::new(vec![
            Ok(TableRowsPage {
                rows: vec![json!({"id": 1}), json!({"id": 2})],
                more: true,
                next_key: Some("3".to_string()),
            }),
            Ok(TableRowsPage {
                rows: vec![json!({"id": 3}), json!({"id": 4})],
                more: true,
                next_key: Some("5".to_string()),
            }),
        ]);

        let rows: Vec<TableRow> = get_table_rows(&source, proposals_query().limit(3).full(true))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        let requests = source.requests();
        assert_eq!(requests[0].limit, Some(3));
        assert_eq!(requests[1].limit, Some(1));
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let source = ScriptedSource::new(vec![Ok(TableRowsPage {
            rows: vec![json!({"id": 1})],
            more: false,
            next_key: None,
        })]);

        let rows = get_table_rows(&source, proposals_query().full(true));
        assert!(source.requests().is_empty());
        drop(rows);
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_stream_stops_when_next_key_does_not_advance() {
        let source = ScriptedSource::new(vec![Ok(TableRowsPage {
            rows: vec![json!({"id": 1})],
            more: true,
            next_key: Some("1".to_string()),
        })]);

        let rows: Vec<TableRow> = get_table_rows(&source, proposals_query().single_key(1).full(true))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_raw_rows_are_hex_decoded() {
        let source = ScriptedSource::new(vec![Ok(TableRowsPage {
            rows: vec![json!("2a00000000000000"), json!({"data": "ff", "payer": "labs.decide"})],
            more: false,
            next_key: None,
        })]);

        let rows: Vec<TableRow> = get_table_rows(&source, proposals_query())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rows[0], TableRow::Raw(vec![0x2a, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(rows[1], TableRow::Raw(vec![0xff]));
    }

    #[tokio::test]
    async fn test_malformed_raw_row_is_a_decode_error() {
        let source = ScriptedSource::new(vec![Ok(TableRowsPage {
            rows: vec![json!("not-hex")],
            more: false,
            next_key: None,
        })]);

        let result: Result<Vec<TableRow>, ChainError> =
            get_table_rows(&source, proposals_query()).try_collect().await;

        assert!(matches!(result, Err(ChainError::Decode(_))));
    }

    #[tokio::test]
    async fn test_transport_error_propagates_unchanged() {
        let source = ScriptedSource::new(vec![Err(ChainError::Transport("timed out".to_string()))]);

        let result: Result<Vec<TableRow>, ChainError> =
            get_table_rows(&source, proposals_query().full(true)).try_collect().await;

        assert_eq!(result, Err(ChainError::Transport("timed out".to_string())));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = WaxChainClient::new("https://wax.example/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.table_rows_url(), "https://wax.example/v1/chain/get_table_rows");
    }
}
