//! Per-agent cache of the last applied policy evaluation.
//!
//! Switching tabs redisplays whatever is cached here instead of asking the
//! backend again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::policy::{Decision, PolicyEvent};

/// Placeholder shown before the first evaluation and after a clear.
pub const AWAITING_REASON: &str = "Awaiting input. Send a message to see the policy evaluation.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InspectorSnapshot {
    event: Option<PolicyEvent>,
    updated_at: Option<DateTime<Utc>>,
}

impl InspectorSnapshot {
    /// The "awaiting input" sentinel.
    pub fn awaiting() -> Self {
        Self::default()
    }

    pub fn is_awaiting(&self) -> bool {
        self.event.is_none()
    }

    pub fn event(&self) -> Option<&PolicyEvent> {
        self.event.as_ref()
    }

    pub fn decision(&self) -> Option<Decision> {
        self.event.as_ref().map(|event| event.decision)
    }

    pub fn reason(&self) -> &str {
        match &self.event {
            Some(event) => event.reason.as_deref().unwrap_or_default(),
            None => AWAITING_REASON,
        }
    }

    pub fn stage(&self) -> Option<&str> {
        self.event.as_ref().and_then(|event| event.stage.as_deref())
    }

    pub fn dlp_signals(&self) -> &[String] {
        self.event
            .as_ref()
            .map(|event| event.dlp_signals.as_slice())
            .unwrap_or_default()
    }

    pub fn ai_signals(&self) -> &[String] {
        self.event
            .as_ref()
            .map(|event| event.ai_signals.as_slice())
            .unwrap_or_default()
    }

    pub fn rewritten_text(&self) -> Option<&str> {
        self.event
            .as_ref()
            .and_then(|event| event.rewritten_text.as_deref())
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

#[derive(Debug, Default)]
pub struct InspectorState {
    snapshots: HashMap<String, InspectorSnapshot>,
}

impl InspectorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached snapshot. No merging with earlier signals.
    pub fn update(&mut self, agent_id: &str, event: PolicyEvent) -> &InspectorSnapshot {
        let snapshot = InspectorSnapshot {
            event: Some(event),
            updated_at: Some(Utc::now()),
        };
        self.snapshots.insert(agent_id.to_string(), snapshot);
        &self.snapshots[agent_id]
    }

    pub fn reset(&mut self, agent_id: &str) {
        self.snapshots
            .insert(agent_id.to_string(), InspectorSnapshot::awaiting());
    }

    pub fn get(&self, agent_id: &str) -> InspectorSnapshot {
        self.snapshots.get(agent_id).cloned().unwrap_or_default()
    }
}
