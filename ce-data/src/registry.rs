use crate::error::RegistryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Outcome of a keyed lookup. Absence is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

/// A commercial agent as stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub cedula: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Already-validated fields for a new agent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgent {
    pub cedula: String,
    pub email: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Option<String>,
    pub order_number: String,
    pub agent_id: String,
}

/// CRUD access to agents, orders and order assignments.
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    async fn find_agent_by_cedula(&self, cedula: &str) -> Result<Lookup<Agent>>;

    /// Fails with [`RegistryError::Duplicate`] when the cedula is taken.
    async fn create_agent(&self, agent: &NewAgent) -> Result<Agent>;

    async fn find_order_by_number(&self, order_number: &str) -> Result<Lookup<Order>>;

    async fn create_assignment(&self, order_number: &str, agent_id: &str) -> Result<Assignment>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
