//! Callback surface between the chat core and whatever renders it.

use tokio::sync::mpsc::UnboundedSender;

use super::controller::TypingToken;
use super::inspector::InspectorSnapshot;
use super::message::Message;
use super::policy::PolicyEvent;
use super::session::Notice;

/// Receives state changes from [`AgentManager`](super::AgentManager).
///
/// Every method defaults to a no-op, so implementors pick what they render.
/// Calls happen on the thread that owns the manager, after the store has
/// already been updated.
pub trait ChatObserver: Send {
    fn on_message_appended(&mut self, _agent_id: &str, _message: &Message) {}

    fn on_message_rewritten(&mut self, _agent_id: &str, _message: &Message) {}

    fn on_policy_event(&mut self, _agent_id: &str, _event: &PolicyEvent) {}

    fn on_typing_start(&mut self, _agent_id: &str, _token: TypingToken) {}

    fn on_typing_end(&mut self, _agent_id: &str, _token: TypingToken) {}

    fn on_inspector_update(&mut self, _agent_id: &str, _snapshot: &InspectorSnapshot) {}

    fn on_notice(&mut self, _agent_id: &str, _notice: &Notice) {}

    fn on_conversation_cleared(&mut self, _agent_id: &str) {}
}

impl ChatObserver for () {}

/// Owned copy of an observer callback, for sending across a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageAppended { agent_id: String, message: Message },
    MessageRewritten { agent_id: String, message: Message },
    Policy { agent_id: String, event: PolicyEvent },
    TypingStarted { agent_id: String, token: TypingToken },
    TypingEnded { agent_id: String, token: TypingToken },
    Inspector { agent_id: String, snapshot: InspectorSnapshot },
    Notice { agent_id: String, notice: Notice },
    Cleared { agent_id: String },
}

impl ChatEvent {
    pub fn agent_id(&self) -> &str {
        match self {
            ChatEvent::MessageAppended { agent_id, .. }
            | ChatEvent::MessageRewritten { agent_id, .. }
            | ChatEvent::Policy { agent_id, .. }
            | ChatEvent::TypingStarted { agent_id, .. }
            | ChatEvent::TypingEnded { agent_id, .. }
            | ChatEvent::Inspector { agent_id, .. }
            | ChatEvent::Notice { agent_id, .. }
            | ChatEvent::Cleared { agent_id } => agent_id,
        }
    }
}

// A closed receiver means the UI is gone; events are dropped.
impl ChatObserver for UnboundedSender<ChatEvent> {
    fn on_message_appended(&mut self, agent_id: &str, message: &Message) {
        let _ = self.send(ChatEvent::MessageAppended {
            agent_id: agent_id.to_string(),
            message: message.clone(),
        });
    }

    fn on_message_rewritten(&mut self, agent_id: &str, message: &Message) {
        let _ = self.send(ChatEvent::MessageRewritten {
            agent_id: agent_id.to_string(),
            message: message.clone(),
        });
    }

    fn on_policy_event(&mut self, agent_id: &str, event: &PolicyEvent) {
        let _ = self.send(ChatEvent::Policy {
            agent_id: agent_id.to_string(),
            event: event.clone(),
        });
    }

    fn on_typing_start(&mut self, agent_id: &str, token: TypingToken) {
        let _ = self.send(ChatEvent::TypingStarted {
            agent_id: agent_id.to_string(),
            token,
        });
    }

    fn on_typing_end(&mut self, agent_id: &str, token: TypingToken) {
        let _ = self.send(ChatEvent::TypingEnded {
            agent_id: agent_id.to_string(),
            token,
        });
    }

    fn on_inspector_update(&mut self, agent_id: &str, snapshot: &InspectorSnapshot) {
        let _ = self.send(ChatEvent::Inspector {
            agent_id: agent_id.to_string(),
            snapshot: snapshot.clone(),
        });
    }

    fn on_notice(&mut self, agent_id: &str, notice: &Notice) {
        let _ = self.send(ChatEvent::Notice {
            agent_id: agent_id.to_string(),
            notice: notice.clone(),
        });
    }

    fn on_conversation_cleared(&mut self, agent_id: &str) {
        let _ = self.send(ChatEvent::Cleared {
            agent_id: agent_id.to_string(),
        });
    }
}
