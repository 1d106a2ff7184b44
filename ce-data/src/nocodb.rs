use crate::error::RegistryError;
use crate::registry::{Agent, Assignment, Lookup, NewAgent, Order, RegistryGateway, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

type Record = Map<String, Value>;

/// Table ids inside the NocoDB base.
#[derive(Debug, Clone)]
pub struct RegistryTables {
    pub agents: String,
    pub orders: String,
    pub assignments: String,
}

/// Column names that differ between deployments.
#[derive(Debug, Clone)]
pub struct RegistryFields {
    pub order_number: String,
    pub assignment_agent: String,
}

impl Default for RegistryFields {
    fn default() -> Self {
        Self {
            order_number: "order_number".to_string(),
            assignment_agent: "comercial_id".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NocoDbRegistry {
    http: reqwest::Client,
    base_url: String,
    token: String,
    tables: RegistryTables,
    fields: RegistryFields,
}

impl NocoDbRegistry {
    pub fn new(
        base_url: &str,
        token: &str,
        tables: RegistryTables,
        fields: RegistryFields,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(RegistryError::InvalidInput(
                "nocodb base url is empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            token: token.trim().to_string(),
            tables,
            fields,
        })
    }

    fn records_url(&self, table: &str) -> Result<Url> {
        Url::parse(&format!("{}/tables/{}/records", self.base_url, table))
            .map_err(|e| RegistryError::InvalidInput(format!("invalid nocodb url: {e}")))
    }

    /// Records of `table` whose `field` equals `value`, first page of one.
    async fn find_one(&self, table: &str, field: &str, value: &str) -> Result<FilteredPage> {
        let mut url = self.records_url(table)?;
        url.query_pairs_mut()
            .append_pair("where", &eq_filter(field, value))
            .append_pair("limit", "1")
            .append_pair("shuffle", "0")
            .append_pair("offset", "0");

        let response = self
            .http
            .get(url)
            .header("accept", "application/json")
            .header("xc-token", &self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        parse_filtered_page(&bytes)
    }

    async fn insert(&self, table: &str, payload: &Value) -> Result<Record> {
        let url = self.records_url(table)?;
        let response = self
            .http
            .post(url)
            .header("accept", "application/json")
            .header("xc-token", &self.token)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(record) => Ok(record),
            // Bulk-style responses wrap the created record in a list.
            Value::Array(mut records) if !records.is_empty() => match records.swap_remove(0) {
                Value::Object(record) => Ok(record),
                other => Err(RegistryError::ResponseFormat(format!(
                    "expected created record, got {other}"
                ))),
            },
            other => Err(RegistryError::ResponseFormat(format!(
                "expected created record, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl RegistryGateway for NocoDbRegistry {
    #[tracing::instrument(level = "info", skip(self))]
    async fn find_agent_by_cedula(&self, cedula: &str) -> Result<Lookup<Agent>> {
        let page = self.find_one(&self.tables.agents, "cedula", cedula).await?;
        let lookup: Lookup<Agent> = page
            .into_record("agent")?
            .map(|r| agent_from_record(&r))
            .transpose()?
            .into();
        tracing::info!(found = lookup.is_found(), "agent lookup finished");
        Ok(lookup)
    }

    #[tracing::instrument(level = "info", skip_all, fields(cedula = %agent.cedula))]
    async fn create_agent(&self, agent: &NewAgent) -> Result<Agent> {
        let existing = self
            .find_one(&self.tables.agents, "cedula", &agent.cedula)
            .await?;
        if existing.exists() {
            return Err(RegistryError::Duplicate {
                cedula: agent.cedula.clone(),
            });
        }
        let payload = serde_json::to_value(agent)?;
        let created = self.insert(&self.tables.agents, &payload).await?;
        let id = record_id(&created).ok_or_else(|| {
            RegistryError::ResponseFormat("created agent has no id".to_string())
        })?;
        tracing::info!(agent_id = %id, "agent created");
        Ok(Agent {
            id,
            cedula: agent.cedula.clone(),
            email: Some(agent.email.clone()),
            name: Some(agent.name.clone()),
            phone: Some(agent.phone.clone()),
            created_at: text_field(&created, &["created_at", "CreatedAt"]),
        })
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn find_order_by_number(&self, order_number: &str) -> Result<Lookup<Order>> {
        let field = self.fields.order_number.as_str();
        let page = self.find_one(&self.tables.orders, field, order_number).await?;
        let Some(record) = page.into_record("order")? else {
            return Ok(Lookup::NotFound);
        };
        let id = record_id(&record)
            .ok_or_else(|| RegistryError::ResponseFormat("order record has no id".to_string()))?;
        Ok(Lookup::Found(Order {
            id,
            order_number: text_field(&record, &[field]).unwrap_or_else(|| order_number.to_string()),
            fields: record,
        }))
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn create_assignment(&self, order_number: &str, agent_id: &str) -> Result<Assignment> {
        let mut payload = Map::new();
        payload.insert(
            self.fields.order_number.clone(),
            Value::String(order_number.to_string()),
        );
        payload.insert(
            self.fields.assignment_agent.clone(),
            Value::String(agent_id.to_string()),
        );
        let created = self
            .insert(&self.tables.assignments, &Value::Object(payload))
            .await?;
        Ok(Assignment {
            id: record_id(&created),
            order_number: order_number.to_string(),
            agent_id: agent_id.to_string(),
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut url = self.records_url(&self.tables.agents)?;
        url.query_pairs_mut().append_pair("limit", "1");
        let response = self
            .http
            .get(url)
            .header("xc-token", &self.token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RegistryError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

fn eq_filter(field: &str, value: &str) -> String {
    format!("({field},eq,{value})")
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    list: Vec<Record>,
    #[serde(default, rename = "pageInfo")]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default, rename = "totalRows")]
    total_rows: u64,
}

/// First row of a filtered listing and the match count NocoDB reported.
#[derive(Debug, Default)]
struct FilteredPage {
    first: Option<Record>,
    total_rows: u64,
}

impl FilteredPage {
    /// A positive count with no rows on the page still means a match.
    fn exists(&self) -> bool {
        self.first.is_some() || self.total_rows > 0
    }

    fn into_record(self, what: &str) -> Result<Option<Record>> {
        match self.first {
            Some(record) => Ok(Some(record)),
            None if self.total_rows > 0 => Err(RegistryError::ResponseFormat(format!(
                "{} {what} record(s) match but the page returned none",
                self.total_rows
            ))),
            None => Ok(None),
        }
    }
}

fn parse_filtered_page(body: &[u8]) -> Result<FilteredPage> {
    let page: RecordPage = serde_json::from_slice(body)?;
    Ok(FilteredPage {
        first: page.list.into_iter().next(),
        total_rows: page.page_info.map_or(0, |p| p.total_rows),
    })
}

fn record_id(record: &Record) -> Option<String> {
    ["Id", "id", "ID"]
        .iter()
        .find_map(|key| record.get(*key))
        .and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(record: &Record, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| record.get(*key))
        .and_then(scalar_text)
}

fn agent_from_record(record: &Record) -> Result<Agent> {
    let id = record_id(record)
        .ok_or_else(|| RegistryError::ResponseFormat("agent record has no id".to_string()))?;
    Ok(Agent {
        id,
        cedula: text_field(record, &["cedula"]).unwrap_or_default(),
        email: text_field(record, &["email"]),
        name: text_field(record, &["name"]),
        phone: text_field(record, &["phone"]),
        created_at: text_field(record, &["created_at", "CreatedAt"]),
    })
}
