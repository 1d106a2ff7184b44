//! Assign an order to a commercial agent: resolve agent, verify order, link.

use crate::validation::{ValidationError, normalize_order_number};
use ce_data::{Lookup, RegistryError, RegistryGateway};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentDetails {
    pub order_number: String,
    pub agent_id: String,
    pub agent_name: Option<String>,
    pub agent_cedula: String,
    pub assignment_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("invalid order number: {0}")]
    InvalidOrderNumber(#[from] ValidationError),
    #[error("no agent registered with cedula {cedula}")]
    AgentNotFound { cedula: String },
    #[error("agent lookup failed: {0}")]
    AgentLookup(#[source] RegistryError),
    #[error("order {order_number} does not exist")]
    OrderNotFound { order_number: String },
    #[error("order lookup failed: {0}")]
    OrderLookup(#[source] RegistryError),
    #[error("assignment could not be created: {0}")]
    Create(#[source] RegistryError),
}

#[derive(Clone)]
pub struct AssignmentOrchestrator {
    registry: Arc<dyn RegistryGateway>,
}

impl AssignmentOrchestrator {
    pub fn new(registry: Arc<dyn RegistryGateway>) -> Self {
        Self { registry }
    }

    /// Three sequential calls, each gating the next. Only the last one writes.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn assign(
        &self,
        cedula: &str,
        order_number: &str,
    ) -> Result<AssignmentDetails, AssignmentError> {
        let order_number = normalize_order_number(order_number)?;

        let agent = match self.registry.find_agent_by_cedula(cedula).await {
            Ok(Lookup::Found(agent)) => agent,
            Ok(Lookup::NotFound) => {
                return Err(AssignmentError::AgentNotFound {
                    cedula: cedula.to_string(),
                });
            }
            Err(error) => return Err(AssignmentError::AgentLookup(error)),
        };

        match self.registry.find_order_by_number(&order_number).await {
            Ok(Lookup::Found(_)) => {}
            Ok(Lookup::NotFound) => return Err(AssignmentError::OrderNotFound { order_number }),
            Err(error) => return Err(AssignmentError::OrderLookup(error)),
        }

        let assignment = self
            .registry
            .create_assignment(&order_number, &agent.id)
            .await
            .map_err(AssignmentError::Create)?;
        tracing::info!(
            order_number = %order_number,
            agent_id = %agent.id,
            "order assigned"
        );

        Ok(AssignmentDetails {
            order_number,
            agent_id: agent.id,
            agent_name: agent.name,
            agent_cedula: agent.cedula,
            assignment_id: assignment.id,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{AssignmentError, AssignmentOrchestrator};
    use async_trait::async_trait;
    use ce_data::{Agent, Assignment, Lookup, NewAgent, Order, RegistryError, RegistryGateway};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory registry that counts every call. While `offline` is set all
    /// calls fail with a timeout.
    #[derive(Default)]
    pub(crate) struct FixtureRegistry {
        pub agents: Mutex<Vec<Agent>>,
        pub orders: Vec<String>,
        pub offline: AtomicBool,
        pub created_agents: Mutex<Vec<NewAgent>>,
        pub assignments: Mutex<Vec<(String, String)>>,
        pub agent_lookups: AtomicUsize,
        pub order_lookups: AtomicUsize,
    }

    impl FixtureRegistry {
        pub fn with_agent(self, id: &str, cedula: &str, name: &str) -> Self {
            self.agents.lock().unwrap().push(Agent {
                id: id.to_string(),
                cedula: cedula.to_string(),
                email: None,
                name: Some(name.to_string()),
                phone: None,
                created_at: Some("2024-05-01T10:00:00Z".to_string()),
            });
            self
        }

        pub fn with_order(mut self, order_number: &str) -> Self {
            self.orders.push(order_number.to_string());
            self
        }

        pub fn offline() -> Self {
            Self {
                offline: AtomicBool::new(true),
                ..Self::default()
            }
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub fn create_calls(&self) -> usize {
            self.created_agents.lock().unwrap().len()
        }

        pub fn assignment_calls(&self) -> usize {
            self.assignments.lock().unwrap().len()
        }

        fn check_online(&self) -> Result<(), RegistryError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(RegistryError::Timeout("registry fixture offline".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RegistryGateway for FixtureRegistry {
        async fn find_agent_by_cedula(&self, cedula: &str) -> Result<Lookup<Agent>, RegistryError> {
            self.agent_lookups.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            let agents = self.agents.lock().unwrap();
            Ok(agents.iter().find(|a| a.cedula == cedula).cloned().into())
        }

        async fn create_agent(&self, agent: &NewAgent) -> Result<Agent, RegistryError> {
            self.created_agents.lock().unwrap().push(agent.clone());
            self.check_online()?;
            let mut agents = self.agents.lock().unwrap();
            if agents.iter().any(|a| a.cedula == agent.cedula) {
                return Err(RegistryError::Duplicate {
                    cedula: agent.cedula.clone(),
                });
            }
            let created = Agent {
                id: (agents.len() + 1).to_string(),
                cedula: agent.cedula.clone(),
                email: Some(agent.email.clone()),
                name: Some(agent.name.clone()),
                phone: Some(agent.phone.clone()),
                created_at: None,
            };
            agents.push(created.clone());
            Ok(created)
        }

        async fn find_order_by_number(
            &self,
            order_number: &str,
        ) -> Result<Lookup<Order>, RegistryError> {
            self.order_lookups.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            Ok(self
                .orders
                .iter()
                .position(|o| o == order_number)
                .map(|index| Order {
                    id: (index + 1).to_string(),
                    order_number: order_number.to_string(),
                    fields: serde_json::Map::new(),
                })
                .into())
        }

        async fn create_assignment(
            &self,
            order_number: &str,
            agent_id: &str,
        ) -> Result<Assignment, RegistryError> {
            self.assignments
                .lock()
                .unwrap()
                .push((order_number.to_string(), agent_id.to_string()));
            self.check_online()?;
            Ok(Assignment {
                id: Some("77".to_string()),
                order_number: order_number.to_string(),
                agent_id: agent_id.to_string(),
            })
        }

        async fn ping(&self) -> Result<(), RegistryError> {
            self.check_online()
        }
    }

    #[tokio::test]
    async fn assigns_after_resolving_agent_and_order() {
        let registry = Arc::new(
            FixtureRegistry::default()
                .with_agent("9", "12345678", "Ana Pérez")
                .with_order("MP-0003"),
        );
        let details = AssignmentOrchestrator::new(registry.clone())
            .assign("12345678", "mp-0003")
            .await
            .expect("assign");
        assert_eq!(details.order_number, "MP-0003");
        assert_eq!(details.agent_id, "9");
        assert_eq!(details.agent_name.as_deref(), Some("Ana Pérez"));
        assert_eq!(details.agent_cedula, "12345678");
        assert_eq!(
            registry.assignments.lock().unwrap().as_slice(),
            &[("MP-0003".to_string(), "9".to_string())]
        );
    }

    #[tokio::test]
    async fn missing_agent_short_circuits_remaining_calls() {
        let registry = Arc::new(FixtureRegistry::default().with_order("MP-0003"));
        let err = AssignmentOrchestrator::new(registry.clone())
            .assign("12345678", "MP-0003")
            .await
            .expect_err("agent is missing");
        assert!(matches!(err, AssignmentError::AgentNotFound { .. }));
        assert_eq!(registry.agent_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(registry.order_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(registry.assignment_calls(), 0);
    }

    #[tokio::test]
    async fn failing_agent_lookup_short_circuits_remaining_calls() {
        let registry = Arc::new(FixtureRegistry::offline());
        let err = AssignmentOrchestrator::new(registry.clone())
            .assign("12345678", "MP-0003")
            .await
            .expect_err("registry offline");
        assert!(matches!(err, AssignmentError::AgentLookup(RegistryError::Timeout(_))));
        assert_eq!(registry.order_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(registry.assignment_calls(), 0);
    }

    #[tokio::test]
    async fn missing_order_skips_assignment_creation() {
        let registry = Arc::new(FixtureRegistry::default().with_agent("9", "12345678", "Ana"));
        let err = AssignmentOrchestrator::new(registry.clone())
            .assign("12345678", "0004")
            .await
            .expect_err("order is missing");
        match err {
            AssignmentError::OrderNotFound { order_number } => assert_eq!(order_number, "MP-0004"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(registry.assignment_calls(), 0);
    }

    #[tokio::test]
    async fn malformed_order_number_makes_no_remote_call() {
        let registry = Arc::new(FixtureRegistry::default());
        let err = AssignmentOrchestrator::new(registry.clone())
            .assign("12345678", "MP-ABC")
            .await
            .expect_err("invalid order");
        assert!(matches!(err, AssignmentError::InvalidOrderNumber(_)));
        assert_eq!(registry.agent_lookups.load(Ordering::SeqCst), 0);
    }
}
