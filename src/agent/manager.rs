use std::sync::Arc;

use log::{debug, info, warn};

use crate::agent::config::{AgentDescriptor, AgentSettings};
use crate::agent::controller::{Completion, RequestController, RequestTicket};
use crate::agent::inspector::{InspectorSnapshot, InspectorState};
use crate::agent::message::{MessageId, Role, WebhookRequest};
use crate::agent::normalize::Normalized;
use crate::agent::observer::ChatObserver;
use crate::agent::policy::Decision;
use crate::agent::providers::{PolicyTransport, RequestError};
use crate::agent::session::{ConversationStore, Notice, StoreError};

/// Errors surfaced to the caller of [`AgentManager`]. Transport failures are
/// not among them: those become notices in the conversation instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("agent {agent} has no prompt named {key}")]
    UnknownPrompt { agent: String, key: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one completion handed back by the request controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// The policy result was applied to the agent's conversation.
    Applied { agent_id: String, decision: Decision },
    /// The request failed and an error notice was recorded.
    Failed { agent_id: String },
    /// A newer request (or a clear) superseded this one; nothing changed.
    Discarded,
}

/// Owns every piece of chat state and routes requests through the controller.
///
/// `AgentManager` is responsible for:
/// - Holding the agent catalogue and tracking which agent is active.
/// - Appending user turns synchronously and dispatching their requests.
/// - Applying accepted responses in a fixed order: rewrite, policy event,
///   inspector snapshot, assistant reply.
/// - Turning transport failures into notices so the session stays usable.
pub struct AgentManager {
    settings: AgentSettings,
    store: ConversationStore,
    inspector: InspectorState,
    controller: RequestController,
    observer: Box<dyn ChatObserver>,
    active: String,
}

impl AgentManager {
    pub fn new(
        settings: AgentSettings,
        transport: Arc<dyn PolicyTransport>,
        observer: Box<dyn ChatObserver>,
    ) -> Result<Self, ChatError> {
        let active = settings
            .default_agent()
            .map(|agent| agent.id.clone())
            .ok_or_else(|| ChatError::Validation("no agents configured".into()))?;
        let store = ConversationStore::new(settings.agent_ids(), settings.welcome_message.clone());
        info!(
            "Chat session ready: {} agents via {} transport",
            settings.agents.len(),
            transport.name()
        );
        let controller = RequestController::new(transport, settings.request_timeout());
        Ok(Self {
            settings,
            store,
            inspector: InspectorState::new(),
            controller,
            observer,
            active,
        })
    }

    /// The agent catalogue this session was built from.
    pub fn registry(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn inspector(&self) -> &InspectorState {
        &self.inspector
    }

    pub fn active_agent(&self) -> &AgentDescriptor {
        // `active` is only ever set to an id that passed `descriptor`.
        self.settings
            .agent(&self.active)
            .unwrap_or(&self.settings.agents[0])
    }

    pub fn active_id(&self) -> &str {
        &self.active
    }

    /// Switches the active tab. Outstanding requests of other agents keep running.
    pub fn activate(&mut self, agent_id: &str) -> Result<(), ChatError> {
        self.descriptor(agent_id)?;
        self.active = agent_id.to_string();
        let snapshot = self.inspector.get(agent_id);
        self.observer.on_inspector_update(agent_id, &snapshot);
        Ok(())
    }

    /// Sends user text to an agent. Returns the id of the appended user message.
    pub fn submit(&mut self, agent_id: &str, text: &str) -> Result<MessageId, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Validation("message cannot be empty".into()));
        }
        let descriptor = self.descriptor(agent_id)?;
        let target = descriptor.target();

        let message_id = self.store.append(agent_id, Role::User, text)?;
        let message = self.store.message(agent_id, message_id)?;
        self.observer.on_message_appended(agent_id, message);

        let request = WebhookRequest::new(
            agent_id,
            text,
            self.store.conversation_id(agent_id)?,
            &self.settings.source,
            self.settings.include_meta,
        );
        let dispatched = self.controller.send(RequestTicket {
            agent_id: agent_id.to_string(),
            user_message_id: message_id,
            target,
            request,
        });
        if let Some(previous) = dispatched.superseded {
            self.observer.on_typing_end(agent_id, previous);
        }
        self.observer.on_typing_start(agent_id, dispatched.token);
        Ok(message_id)
    }

    /// Sends one of the agent's predefined prompts.
    pub fn submit_prompt(&mut self, agent_id: &str, key: &str) -> Result<MessageId, ChatError> {
        let text = self
            .descriptor(agent_id)?
            .prompt(key)
            .map(|prompt| prompt.text.clone())
            .ok_or_else(|| ChatError::UnknownPrompt {
                agent: agent_id.to_string(),
                key: key.to_string(),
            })?;
        self.submit(agent_id, &text)
    }

    /// Cancels the agent's outstanding request and starts the conversation over.
    pub fn clear(&mut self, agent_id: &str) -> Result<(), ChatError> {
        self.descriptor(agent_id)?;
        if let Some(token) = self.controller.cancel(agent_id) {
            self.observer.on_typing_end(agent_id, token);
        }
        self.store.clear(agent_id)?;
        self.inspector.reset(agent_id);
        self.observer.on_conversation_cleared(agent_id);
        let snapshot = self.inspector.get(agent_id);
        self.observer.on_inspector_update(agent_id, &snapshot);
        debug!("Conversation of {} cleared", agent_id);
        Ok(())
    }

    pub fn is_pending(&self, agent_id: &str) -> bool {
        self.controller.is_pending(agent_id)
    }

    pub fn has_pending(&self) -> bool {
        self.controller.has_pending()
    }

    pub fn snapshot(&self, agent_id: &str) -> InspectorSnapshot {
        self.inspector.get(agent_id)
    }

    /// Applies every completion that has already arrived. Never blocks.
    pub fn poll_completions(&mut self) -> Result<Vec<Settled>, ChatError> {
        let mut settled = Vec::new();
        while let Some(completion) = self.controller.try_next() {
            settled.push(self.apply(completion)?);
        }
        Ok(settled)
    }

    /// Waits for the next completion and applies it.
    pub async fn next_completion(&mut self) -> Result<Option<Settled>, ChatError> {
        match self.controller.next().await {
            Some(completion) => self.apply(completion).map(Some),
            None => Ok(None),
        }
    }

    /// Waits until no agent has a request outstanding.
    pub async fn settle(&mut self) -> Result<Vec<Settled>, ChatError> {
        let mut settled = Vec::new();
        while self.controller.has_pending() {
            match self.next_completion().await? {
                Some(outcome) => settled.push(outcome),
                None => break,
            }
        }
        Ok(settled)
    }

    fn descriptor(&self, agent_id: &str) -> Result<&AgentDescriptor, ChatError> {
        self.settings
            .agent(agent_id)
            .ok_or_else(|| ChatError::UnknownAgent(agent_id.to_string()))
    }

    fn apply(&mut self, completion: Completion) -> Result<Settled, ChatError> {
        let Some(accepted) = self.controller.accept(completion) else {
            return Ok(Settled::Discarded);
        };
        let agent_id = accepted.agent_id;
        self.observer.on_typing_end(&agent_id, accepted.token);

        match accepted.outcome {
            Ok(normalized) => {
                let decision = normalized.event.decision;
                self.apply_result(&agent_id, accepted.user_message_id, normalized)?;
                Ok(Settled::Applied { agent_id, decision })
            }
            // Cancelled calls always carry a superseded generation.
            Err(RequestError::Cancelled) => Ok(Settled::Discarded),
            Err(err) => {
                self.record_failure(&agent_id, &accepted.endpoint, &err)?;
                Ok(Settled::Failed { agent_id })
            }
        }
    }

    fn apply_result(
        &mut self,
        agent_id: &str,
        user_message_id: MessageId,
        normalized: Normalized,
    ) -> Result<(), ChatError> {
        let Normalized { event, reply } = normalized;
        debug!(
            "Agent {}: decision {} at stage {:?}",
            agent_id, event.decision, event.stage
        );

        if event.decision == Decision::Rewritten
            && let Some(text) = event.rewritten_text.as_deref()
        {
            match self.store.rewrite(agent_id, user_message_id, text) {
                Ok(message) => self.observer.on_message_rewritten(agent_id, message),
                Err(err) => warn!("Agent {}: rewrite not applied: {}", agent_id, err),
            }
        }

        self.store.record_policy(agent_id, event.clone())?;
        self.observer.on_policy_event(agent_id, &event);

        let snapshot = self.inspector.update(agent_id, event);
        self.observer.on_inspector_update(agent_id, snapshot);

        if let Some(reply) = reply {
            let id = self.store.append(agent_id, Role::Assistant, reply)?;
            let message = self.store.message(agent_id, id)?;
            self.observer.on_message_appended(agent_id, message);
        }
        Ok(())
    }

    fn record_failure(
        &mut self,
        agent_id: &str,
        endpoint: &str,
        err: &RequestError,
    ) -> Result<(), ChatError> {
        warn!("Agent {}: request to {} failed: {}", agent_id, endpoint, err);
        let notice = failure_notice(endpoint, err);
        self.store.record_notice(agent_id, notice.clone())?;
        self.observer.on_notice(agent_id, &notice);
        Ok(())
    }
}

fn failure_notice(endpoint: &str, err: &RequestError) -> Notice {
    let mut details = vec![format!("Endpoint: {endpoint}")];
    if err.is_network() {
        details.push("Check the webhook address and that the policy service is running.".into());
        return Notice::error(
            "Connection Error",
            format!("Could not reach the policy endpoint ({err})."),
            details,
        );
    }
    if let RequestError::Backend { body, .. } = err
        && !body.is_empty()
    {
        details.push(format!("Body: {body}"));
    }
    Notice::error(
        "Unexpected Response",
        format!("The policy endpoint returned something unusable ({err})."),
        details,
    )
}
