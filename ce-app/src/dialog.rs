//! Per-user dialog state for the guided multi-step flows.

use ce_channels::SenderId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Process {
    ClientSearch,
    CreateAgent,
    AssignOrder,
}

impl Process {
    pub fn initial_step(self) -> Step {
        match self {
            Self::ClientSearch => Step::DocumentType,
            Self::CreateAgent => Step::Cedula,
            Self::AssignOrder => Step::ComercialCedula,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    DocumentType,
    DocumentNumber,
    Cedula,
    Email,
    Name,
    Phone,
    Confirm,
    ComercialCedula,
    OrderNumber,
    AssignmentConfirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    DocType,
    Cedula,
    Email,
    Name,
    Phone,
    AgentId,
    AgentName,
    OrderNumber,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatUserState {
    pub id: Uuid,
    pub process: Process,
    pub step: Step,
    pub fields: BTreeMap<FieldKey, String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatUserState {
    pub fn new(process: Process) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            process,
            step: process.initial_step(),
            fields: BTreeMap::new(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn field(&self, key: FieldKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        self.fields.insert(key, value.into());
    }

    pub fn advance(&mut self, step: Step) {
        self.step = step;
        self.updated_at = Utc::now();
    }
}

/// At most one active dialog per sender. Nothing here outlives the process.
#[derive(Default)]
pub struct DialogStore {
    states: DashMap<SenderId, ChatUserState>,
}

impl DialogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin `process` for `sender`, discarding any dialog already in progress.
    pub fn start(&self, sender: &SenderId, process: Process) -> ChatUserState {
        let state = ChatUserState::new(process);
        if let Some(previous) = self.states.insert(sender.clone(), state.clone()) {
            tracing::debug!(
                sender_id = %sender,
                previous_process = ?previous.process,
                previous_step = ?previous.step,
                "dialog replaced"
            );
        }
        state
    }

    /// A snapshot of the sender's dialog; write changes back with [`Self::put`].
    pub fn get(&self, sender: &SenderId) -> Option<ChatUserState> {
        self.states.get(sender).map(|entry| entry.value().clone())
    }

    pub fn put(&self, sender: &SenderId, state: ChatUserState) {
        self.states.insert(sender.clone(), state);
    }

    pub fn clear(&self, sender: &SenderId) -> Option<ChatUserState> {
        self.states.remove(sender).map(|(_, state)| state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
