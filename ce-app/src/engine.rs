//! The dialog state machine. Each inbound text yields exactly one reply.

use crate::assignment::AssignmentOrchestrator;
use crate::commands::Command;
use crate::dialog::{ChatUserState, DialogStore, FieldKey, Process, Step};
use crate::replies::{self, Reply};
use crate::resolver::AvailabilityResolver;
use crate::validation::{
    DocumentType, Validators, normalize_order_number, validate_cedula, validate_document,
};
use ce_channels::SenderId;
use ce_data::{Lookup, NewAgent, RegistryError, RegistryGateway};
use std::sync::Arc;

const AFFIRMATIVE: [&str; 7] = ["si", "sí", "yes", "confirmar", "confirmo", "ok", "vale"];
const NEGATIVE: [&str; 5] = ["no", "cancelar", "cancel", "salir", "exit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Affirmative,
    Negative,
    Unrecognized,
}

impl Confirmation {
    pub fn parse(text: &str) -> Self {
        let token = text.trim().to_lowercase();
        if AFFIRMATIVE.contains(&token.as_str()) {
            Self::Affirmative
        } else if NEGATIVE.contains(&token.as_str()) {
            Self::Negative
        } else {
            Self::Unrecognized
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub preregister_url: String,
    pub max_results_shown: usize,
}

pub struct ConversationEngine {
    dialogs: Arc<DialogStore>,
    resolver: AvailabilityResolver,
    registry: Arc<dyn RegistryGateway>,
    orchestrator: AssignmentOrchestrator,
    validators: Validators,
    settings: EngineSettings,
}

impl ConversationEngine {
    pub fn new(
        dialogs: Arc<DialogStore>,
        resolver: AvailabilityResolver,
        registry: Arc<dyn RegistryGateway>,
        settings: EngineSettings,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            dialogs,
            resolver,
            orchestrator: AssignmentOrchestrator::new(registry.clone()),
            registry,
            validators: Validators::new()?,
            settings,
        })
    }

    pub fn dialogs(&self) -> &Arc<DialogStore> {
        &self.dialogs
    }

    #[tracing::instrument(level = "info", skip_all, fields(sender_id = %sender))]
    pub async fn handle(&self, sender: &SenderId, text: &str) -> Reply {
        let text = text.trim();
        if let Some(command) = Command::parse(text) {
            tracing::info!(?command, "command received");
            return self.run_command(sender, command).await;
        }

        let Some(state) = self.dialogs.get(sender) else {
            return replies::unknown_command(text);
        };
        let choosing_document_type =
            state.process == Process::ClientSearch && state.step == Step::DocumentType;
        if DocumentType::parse(text).is_some() && !choosing_document_type {
            return replies::unknown_command(text);
        }

        tracing::debug!(process = ?state.process, step = ?state.step, dialog_id = %state.id, "dialog input");
        self.dispatch(sender, state, text).await
    }

    async fn run_command(&self, sender: &SenderId, command: Command) -> Reply {
        let abandoned = self.dialogs.clear(sender);
        if let Some(previous) = &abandoned
            && command != Command::Cancel
        {
            tracing::info!(process = ?previous.process, step = ?previous.step, "dialog abandoned by command");
        }

        match command {
            Command::Start => replies::start(),
            Command::Help => replies::help(),
            Command::Info => replies::info(),
            Command::Cancel => match abandoned {
                Some(_) => replies::cancelled(),
                None => replies::nothing_to_cancel(),
            },
            Command::SearchStart => {
                self.dialogs.start(sender, Process::ClientSearch);
                replies::search_start()
            }
            Command::CreateAgentStart => {
                self.dialogs.start(sender, Process::CreateAgent);
                replies::create_agent_start()
            }
            Command::AssignOrderStart => {
                self.dialogs.start(sender, Process::AssignOrder);
                replies::assign_start()
            }
            Command::Stats => match self.resolver.summary(0).await {
                Ok(summary) => replies::stats(&summary),
                Err(error) => {
                    tracing::warn!(%error, "directory summary failed");
                    replies::stats_failed()
                }
            },
        }
    }

    async fn dispatch(&self, sender: &SenderId, state: ChatUserState, text: &str) -> Reply {
        match (state.process, state.step) {
            (Process::ClientSearch, Step::DocumentType) => self.on_document_type(sender, state, text),
            (Process::ClientSearch, Step::DocumentNumber) => {
                self.on_document_number(sender, state, text).await
            }
            (Process::CreateAgent, Step::Cedula) => self.on_agent_cedula(sender, state, text).await,
            (Process::CreateAgent, Step::Email) => {
                self.collect(sender, state, text, FieldKey::Email, Step::Name)
            }
            (Process::CreateAgent, Step::Name) => {
                self.collect(sender, state, text, FieldKey::Name, Step::Phone)
            }
            (Process::CreateAgent, Step::Phone) => {
                self.collect(sender, state, text, FieldKey::Phone, Step::Confirm)
            }
            (Process::CreateAgent, Step::Confirm) => self.on_agent_confirm(sender, state, text).await,
            (Process::AssignOrder, Step::ComercialCedula) => {
                self.on_assign_cedula(sender, state, text).await
            }
            (Process::AssignOrder, Step::OrderNumber) => {
                self.on_order_number(sender, state, text).await
            }
            (Process::AssignOrder, Step::AssignmentConfirm) => {
                self.on_assignment_confirm(sender, state, text).await
            }
            _ => self.invalid_state(sender, &state),
        }
    }

    fn invalid_state(&self, sender: &SenderId, state: &ChatUserState) -> Reply {
        tracing::error!(
            process = ?state.process,
            step = ?state.step,
            dialog_id = %state.id,
            "dialog reached an invalid state"
        );
        self.dialogs.clear(sender);
        replies::invalid_state()
    }

    fn remote_failure(&self, sender: &SenderId, error: &RegistryError) -> Reply {
        tracing::warn!(%error, "registry call failed; dialog aborted");
        self.dialogs.clear(sender);
        replies::remote_failure()
    }

    fn on_document_type(&self, sender: &SenderId, mut state: ChatUserState, text: &str) -> Reply {
        let Some(doc_type) = DocumentType::parse(text) else {
            return replies::invalid_document_type(text);
        };
        state.set(FieldKey::DocType, doc_type.as_str());
        state.advance(Step::DocumentNumber);
        self.dialogs.put(sender, state);
        replies::document_type_selected(doc_type)
    }

    async fn on_document_number(&self, sender: &SenderId, state: ChatUserState, text: &str) -> Reply {
        let Some(doc_type) = state.field(FieldKey::DocType).and_then(DocumentType::parse) else {
            return self.invalid_state(sender, &state);
        };
        if let Err(error) = validate_document(doc_type, text) {
            return replies::invalid_document_number(error.message());
        }

        // One-shot: the dialog ends whatever the lookup returns.
        self.dialogs.clear(sender);
        match self.resolver.resolve(doc_type, text).await {
            Ok(resolution) => replies::search_result(
                &resolution,
                &self.settings.preregister_url,
                self.settings.max_results_shown,
            ),
            Err(error) => {
                tracing::warn!(%error, "client lookup failed");
                replies::search_failed()
            }
        }
    }

    async fn on_agent_cedula(&self, sender: &SenderId, mut state: ChatUserState, text: &str) -> Reply {
        let cedula = match validate_cedula(text) {
            Ok(cedula) => cedula,
            Err(error) => return replies::invalid_field(error.message()),
        };
        match self.registry.find_agent_by_cedula(&cedula).await {
            Ok(Lookup::Found(agent)) => {
                self.dialogs.clear(sender);
                replies::agent_already_registered(&agent)
            }
            Ok(Lookup::NotFound) => {
                state.set(FieldKey::Cedula, cedula);
                state.advance(Step::Email);
                self.dialogs.put(sender, state);
                replies::ask_email()
            }
            Err(error) => self.remote_failure(sender, &error),
        }
    }

    /// Validate one local-only field, store it and move to `next`.
    fn collect(
        &self,
        sender: &SenderId,
        mut state: ChatUserState,
        text: &str,
        key: FieldKey,
        next: Step,
    ) -> Reply {
        let validated = match key {
            FieldKey::Email => self.validators.email(text),
            FieldKey::Name => self.validators.name(text),
            FieldKey::Phone => self.validators.phone(text),
            _ => return self.invalid_state(sender, &state),
        };
        let value = match validated {
            Ok(value) => value,
            Err(error) => return replies::invalid_field(error.message()),
        };
        state.set(key, value);
        state.advance(next);

        let reply = match next {
            Step::Name => replies::ask_name(),
            Step::Phone => replies::ask_phone(),
            Step::Confirm => match new_agent(&state) {
                Some(agent) => replies::confirm_agent(&agent),
                None => return self.invalid_state(sender, &state),
            },
            _ => return self.invalid_state(sender, &state),
        };
        self.dialogs.put(sender, state);
        reply
    }

    async fn on_agent_confirm(&self, sender: &SenderId, state: ChatUserState, text: &str) -> Reply {
        match Confirmation::parse(text) {
            Confirmation::Unrecognized => replies::confirmation_reprompt(),
            Confirmation::Negative => {
                self.dialogs.clear(sender);
                replies::cancelled()
            }
            Confirmation::Affirmative => {
                let Some(agent) = new_agent(&state) else {
                    return self.invalid_state(sender, &state);
                };
                self.dialogs.clear(sender);
                match self.registry.create_agent(&agent).await {
                    Ok(created) => {
                        tracing::info!(agent_id = %created.id, "commercial agent created");
                        replies::agent_created(&created)
                    }
                    Err(RegistryError::Duplicate { cedula }) => {
                        tracing::info!(%cedula, "agent registered concurrently; showing existing record");
                        match self.registry.find_agent_by_cedula(&cedula).await {
                            Ok(Lookup::Found(existing)) => replies::agent_already_registered(&existing),
                            _ => replies::agent_duplicate(&cedula),
                        }
                    }
                    Err(error) => self.remote_failure(sender, &error),
                }
            }
        }
    }

    async fn on_assign_cedula(&self, sender: &SenderId, mut state: ChatUserState, text: &str) -> Reply {
        let cedula = match validate_cedula(text) {
            Ok(cedula) => cedula,
            Err(error) => return replies::invalid_field(error.message()),
        };
        match self.registry.find_agent_by_cedula(&cedula).await {
            Ok(Lookup::Found(agent)) => {
                let reply = replies::ask_order_number(&agent);
                let agent_name = agent.name.unwrap_or_else(|| cedula.clone());
                state.set(FieldKey::Cedula, cedula);
                state.set(FieldKey::AgentId, agent.id);
                state.set(FieldKey::AgentName, agent_name);
                state.advance(Step::OrderNumber);
                self.dialogs.put(sender, state);
                reply
            }
            Ok(Lookup::NotFound) => replies::agent_not_found(&cedula),
            Err(error) => self.remote_failure(sender, &error),
        }
    }

    async fn on_order_number(&self, sender: &SenderId, mut state: ChatUserState, text: &str) -> Reply {
        let order_number = match normalize_order_number(text) {
            Ok(order_number) => order_number,
            Err(error) => return replies::invalid_field(error.message()),
        };
        match self.registry.find_order_by_number(&order_number).await {
            Ok(Lookup::Found(_)) => {
                let (Some(agent_name), Some(cedula)) =
                    (state.field(FieldKey::AgentName), state.field(FieldKey::Cedula))
                else {
                    return self.invalid_state(sender, &state);
                };
                let reply = replies::confirm_assignment(&order_number, agent_name, cedula);
                state.set(FieldKey::OrderNumber, order_number);
                state.advance(Step::AssignmentConfirm);
                self.dialogs.put(sender, state);
                reply
            }
            Ok(Lookup::NotFound) => replies::order_not_found(&order_number),
            Err(error) => self.remote_failure(sender, &error),
        }
    }

    async fn on_assignment_confirm(&self, sender: &SenderId, state: ChatUserState, text: &str) -> Reply {
        match Confirmation::parse(text) {
            Confirmation::Unrecognized => replies::confirmation_reprompt(),
            Confirmation::Negative => {
                self.dialogs.clear(sender);
                replies::cancelled()
            }
            Confirmation::Affirmative => {
                let (Some(cedula), Some(order_number)) =
                    (state.field(FieldKey::Cedula), state.field(FieldKey::OrderNumber))
                else {
                    return self.invalid_state(sender, &state);
                };
                self.dialogs.clear(sender);
                match self.orchestrator.assign(cedula, order_number).await {
                    Ok(details) => replies::assignment_done(&details),
                    Err(error) => {
                        tracing::warn!(%error, "order assignment failed");
                        replies::assignment_failed(&error)
                    }
                }
            }
        }
    }
}

fn new_agent(state: &ChatUserState) -> Option<NewAgent> {
    Some(NewAgent {
        cedula: state.field(FieldKey::Cedula)?.to_string(),
        email: state.field(FieldKey::Email)?.to_string(),
        name: state.field(FieldKey::Name)?.to_string(),
        phone: state.field(FieldKey::Phone)?.to_string(),
    })
}
