use crate::dataset::{Column, Dataset, DatasetKind, Row};
use crate::error::DirectoryError;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Bulk read access to the customer directory. No filtering is pushed down:
/// every fetch returns the whole dataset.
#[async_trait]
pub trait DirectoryGateway: Send + Sync {
    async fn fetch(&self, kind: DatasetKind) -> Result<Dataset>;
}

/// A saved Redash query and the key allowed to read its results.
#[derive(Debug, Clone)]
pub struct RedashQuery {
    pub query_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct RedashDirectory {
    http: reqwest::Client,
    base_url: String,
    primary: RedashQuery,
    unavailable: RedashQuery,
}

impl RedashDirectory {
    pub fn new(
        base_url: &str,
        primary: RedashQuery,
        unavailable: RedashQuery,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(DirectoryError::Misconfigured(
                "redash base url is empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            primary,
            unavailable,
        })
    }

    fn query(&self, kind: DatasetKind) -> &RedashQuery {
        match kind {
            DatasetKind::Primary => &self.primary,
            DatasetKind::Unavailable => &self.unavailable,
        }
    }

    fn results_url(&self, query: &RedashQuery) -> Result<Url> {
        let raw = format!(
            "{}/api/queries/{}/results.json",
            self.base_url, query.query_id
        );
        Url::parse_with_params(&raw, &[("api_key", query.api_key.as_str())])
            .map_err(|e| DirectoryError::Misconfigured(format!("invalid redash url: {e}")))
    }
}

#[async_trait]
impl DirectoryGateway for RedashDirectory {
    #[tracing::instrument(level = "info", skip(self), fields(dataset = %kind))]
    async fn fetch(&self, kind: DatasetKind) -> Result<Dataset> {
        let query = self.query(kind);
        let url = self.results_url(query)?;
        let started = std::time::Instant::now();
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        let dataset = parse_query_results(&bytes)?;
        tracing::info!(
            rows = dataset.rows.len(),
            columns = dataset.columns.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "directory dataset fetched"
        );
        Ok(dataset)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResultsEnvelope {
    #[serde(default)]
    query_result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    rows: Vec<serde_json::Value>,
    #[serde(default)]
    columns: Vec<Column>,
}

/// Decode a `results.json` payload into a dataset snapshot. A payload without
/// `query_result.data` is an empty dataset; rows that are not flat JSON
/// objects are skipped.
pub fn parse_query_results(body: &[u8]) -> Result<Dataset> {
    let envelope: QueryResultsEnvelope = serde_json::from_slice(body)?;
    let Some(data) = envelope.query_result.and_then(|result| result.data) else {
        tracing::warn!("results payload has no query_result.data; using an empty dataset");
        return Ok(Dataset::default());
    };
    let received = data.rows.len();
    let rows: Vec<Row> = data
        .rows
        .into_iter()
        .filter(serde_json::Value::is_object)
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect();
    if rows.len() < received {
        tracing::warn!(
            received,
            skipped = received - rows.len(),
            "skipped malformed directory rows"
        );
    }
    Ok(Dataset::new(data.columns, rows))
}

#[cfg(test)]
mod tests {
    use super::{RedashDirectory, RedashQuery, parse_query_results};
    use crate::dataset::{CellValue, DatasetKind};
    use crate::error::DirectoryError;
    use std::time::Duration;

    fn query(id: &str, key: &str) -> RedashQuery {
        RedashQuery {
            query_id: id.to_string(),
            api_key: key.to_string(),
        }
    }

    #[test]
    fn results_payload_decodes_rows_and_columns() {
        let body = serde_json::json!({
            "query_result": {
                "id": 9,
                "data": {
                    "columns": [
                        { "name": "nit", "type": "string", "friendly_name": "nit" },
                        { "name": "razon_social", "type": "string" }
                    ],
                    "rows": [
                        { "nit": "901.234.567", "razon_social": "ACME" },
                        { "nit": 800123456, "razon_social": null }
                    ]
                }
            }
        });
        let dataset = parse_query_results(body.to_string().as_bytes()).expect("decode");
        assert_eq!(dataset.len(), 2);
        assert_eq!(
            dataset.column_names().collect::<Vec<_>>(),
            vec!["nit", "razon_social"]
        );
        assert_eq!(dataset.rows[1].get("razon_social"), Some(&CellValue::Null));
    }

    #[test]
    fn payload_without_data_is_an_empty_dataset() {
        let body = serde_json::json!({ "job": { "status": 2 } });
        let dataset = parse_query_results(body.to_string().as_bytes()).expect("decode");
        assert!(dataset.is_empty());
        assert!(dataset.columns.is_empty());
    }

    #[test]
    fn non_object_rows_are_skipped() {
        let body = serde_json::json!({
            "query_result": {
                "data": {
                    "columns": [{ "name": "nit" }],
                    "rows": [
                        { "nit": "901234567" },
                        "901234568",
                        null,
                        { "nit": ["nested"] },
                        { "nit": 800123456 }
                    ]
                }
            }
        });
        let dataset = parse_query_results(body.to_string().as_bytes()).expect("decode");
        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.rows[1].get("nit"),
            Some(&CellValue::Text(r#"["nested"]"#.to_string()))
        );
        assert_eq!(dataset.rows[2].get("nit"), Some(&CellValue::from(800123456_i64)));
    }

    #[test]
    fn non_json_body_is_a_format_error() {
        let err = parse_query_results(b"<html>502</html>").expect_err("must fail");
        assert!(matches!(err, DirectoryError::ResponseFormat(_)));
    }

    #[test]
    fn each_dataset_uses_its_own_query_and_key() {
        let directory = RedashDirectory::new(
            "https://redash.example.com/",
            query("101", "primary-key"),
            query("202", "unavailable key"),
            Duration::from_secs(30),
        )
        .expect("directory");

        let primary = directory
            .results_url(directory.query(DatasetKind::Primary))
            .expect("url");
        assert_eq!(
            primary.as_str(),
            "https://redash.example.com/api/queries/101/results.json?api_key=primary-key"
        );
        let unavailable = directory
            .results_url(directory.query(DatasetKind::Unavailable))
            .expect("url");
        assert_eq!(
            unavailable.as_str(),
            "https://redash.example.com/api/queries/202/results.json?api_key=unavailable+key"
        );
    }
}
