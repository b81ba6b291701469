//! Canonical policy decision model shared by the store, inspector and renderers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one backend evaluation of a user turn.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[default]
    Allowed,
    Blocked,
    Rewritten,
    NeedsApproval,
}

impl Decision {
    /// Parses the loose spellings different backend deployments have used.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "allowed" | "allow" | "ok" => Some(Decision::Allowed),
            "blocked" | "block" | "denied" => Some(Decision::Blocked),
            "rewritten" | "rewrite" => Some(Decision::Rewritten),
            "needs_approval" | "approval" | "needs-approval" => Some(Decision::NeedsApproval),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::Blocked => "blocked",
            Decision::Rewritten => "rewritten",
            Decision::NeedsApproval => "needs_approval",
        }
    }

    /// Heading used when the decision is shown as a policy card.
    pub fn heading(&self) -> &'static str {
        match self {
            Decision::Allowed => "Allowed",
            Decision::Blocked => "Blocked by policy",
            Decision::Rewritten => "Query Rewritten",
            Decision::NeedsApproval => "Approval Required",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized result of one policy evaluation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyEvent {
    pub decision: Decision,
    pub reason: Option<String>,
    pub stage: Option<String>,
    /// Sensitive-data categories detected in the turn (e.g. `SSN`).
    #[serde(default)]
    pub dlp_signals: Vec<String>,
    /// Prompt-attack / risk categories (e.g. OWASP or ASI classes).
    #[serde(default)]
    pub ai_signals: Vec<String>,
    pub rewritten_text: Option<String>,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub owasp: Option<String>,
    #[serde(default)]
    pub owasp_title: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl PolicyEvent {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            ..Self::default()
        }
    }

    /// Detail lines for a policy card, in the order operators expect to read them.
    pub fn details(&self) -> Vec<String> {
        let labelled = [
            ("OWASP", &self.owasp),
            ("ASI Title", &self.owasp_title),
            ("Policy", &self.policy),
            ("Action", &self.action),
            ("Stage", &self.stage),
        ];
        let mut lines: Vec<String> = labelled
            .iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
            .collect();
        if !self.dlp_signals.is_empty() {
            lines.push(format!("DLP: {}", self.dlp_signals.join(", ")));
        }
        if !self.ai_signals.is_empty() {
            lines.push(format!("AI: {}", self.ai_signals.join(", ")));
        }
        if let Some(trace) = &self.trace_id {
            lines.push(format!("Trace ID: {trace}"));
        }
        lines
    }
}
