//! Maps the policy backend's response bodies onto [`PolicyEvent`].
//!
//! Deployed backends disagree on the wire contract. Some return a single
//! object, newer ones return an ordered pair `[policyResult, llmResult]`, and
//! field names drifted between revisions (`decision` vs `status`,
//! `rewritten_prompt` vs `rewrite`, a bare `allowed` boolean). The shape is
//! resolved once into [`ResponseShape`] and every field is then picked by a
//! fixed priority list with explicit defaults.

use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::policy::{Decision, PolicyEvent};

/// Reason recorded when the backend gives none.
pub const DEFAULT_REASON: &str = "Policy evaluated successfully.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("unsupported response shape: {0}")]
    UnsupportedShape(String),
    #[error("malformed policy result: {0}")]
    Malformed(String),
}

/// Normalizer output: the policy event plus the assistant reply, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub event: PolicyEvent,
    pub reply: Option<String>,
}

/// The response shapes the backend is known to produce.
#[derive(Debug)]
pub enum ResponseShape {
    Single(PolicyResult),
    Pair(PolicyResult, LlmResult),
}

/// Policy half of a response. Every field is optional and unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct PolicyResult {
    #[serde(default, deserialize_with = "loose_string")]
    decision: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "loose_bool")]
    allowed: Option<bool>,
    #[serde(default, deserialize_with = "loose_string")]
    reason: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    policy: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    stage: Option<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    dlp: Vec<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    ai: Vec<String>,
    #[serde(default, deserialize_with = "loose_string")]
    rewritten_prompt: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    rewrite: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    message: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    response: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    action: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    owasp: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    owasp_title: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    trace_id: Option<String>,
}

/// Generated-reply half of a pair response.
#[derive(Debug, Default, Deserialize)]
pub struct LlmResult {
    #[serde(default, deserialize_with = "loose_string")]
    text: Option<String>,
}

impl ResponseShape {
    pub fn from_value(value: &Value) -> Result<Self, NormalizeError> {
        match value {
            Value::Object(_) => Ok(ResponseShape::Single(policy_result(value)?)),
            Value::Array(items) => match items.as_slice() {
                [single] => Ok(ResponseShape::Single(policy_result(single)?)),
                [policy, llm] => Ok(ResponseShape::Pair(policy_result(policy)?, llm_result(llm)?)),
                other => Err(NormalizeError::UnsupportedShape(format!(
                    "array of {} elements",
                    other.len()
                ))),
            },
            other => Err(NormalizeError::UnsupportedShape(value_kind(other).into())),
        }
    }
}

/// Normalizes a parsed response body.
pub fn normalize(value: &Value) -> Result<Normalized, NormalizeError> {
    Ok(match ResponseShape::from_value(value)? {
        ResponseShape::Single(policy) => resolve(policy, None),
        ResponseShape::Pair(policy, llm) => resolve(policy, Some(llm)),
    })
}

fn resolve(policy: PolicyResult, llm: Option<LlmResult>) -> Normalized {
    let decision = resolve_decision(&policy);

    let mut message = non_blank(policy.message);
    let rewritten_text = non_blank(policy.rewritten_prompt)
        .or_else(|| non_blank(policy.rewrite))
        .or_else(|| {
            if decision == Decision::Rewritten {
                message.take()
            } else {
                None
            }
        });

    let policy_name = non_blank(policy.policy);
    let reason = non_blank(policy.reason)
        .or_else(|| policy_name.clone())
        .unwrap_or_else(|| DEFAULT_REASON.to_string());

    let reply = match llm {
        Some(llm) => non_blank(llm.text),
        None => non_blank(policy.response).or(message),
    };

    let event = PolicyEvent {
        decision,
        reason: Some(reason),
        stage: non_blank(policy.stage),
        dlp_signals: policy.dlp,
        ai_signals: policy.ai,
        rewritten_text,
        policy: policy_name,
        action: non_blank(policy.action),
        owasp: non_blank(policy.owasp),
        owasp_title: non_blank(policy.owasp_title),
        trace_id: non_blank(policy.trace_id),
    };
    Normalized { event, reply }
}

fn resolve_decision(policy: &PolicyResult) -> Decision {
    for (field, raw) in [("decision", &policy.decision), ("status", &policy.status)] {
        let Some(raw) = raw.as_deref().filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        match Decision::parse(raw) {
            Some(decision) => return decision,
            None => warn!("Ignoring unrecognized {field} value from policy backend: {raw:?}"),
        }
    }
    match policy.allowed {
        Some(true) => Decision::Allowed,
        Some(false) => Decision::Blocked,
        None => Decision::Allowed,
    }
}

fn policy_result(value: &Value) -> Result<PolicyResult, NormalizeError> {
    if !value.is_object() {
        return Err(NormalizeError::Malformed(format!(
            "expected an object, found {}",
            value_kind(value)
        )));
    }
    PolicyResult::deserialize(value).map_err(|err| NormalizeError::Malformed(err.to_string()))
}

fn llm_result(value: &Value) -> Result<LlmResult, NormalizeError> {
    match value {
        Value::String(text) => Ok(LlmResult {
            text: Some(text.clone()),
        }),
        Value::Null => Ok(LlmResult::default()),
        Value::Object(_) => {
            LlmResult::deserialize(value).map_err(|err| NormalizeError::Malformed(err.to_string()))
        }
        other => Err(NormalizeError::Malformed(format!(
            "expected a reply object, found {}",
            value_kind(other)
        ))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_text))
}

fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// Signal lists: a bare string counts as a one-item list, null as empty.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(scalar_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(other) => scalar_text(other)
            .filter(|s| !s.trim().is_empty())
            .into_iter()
            .collect(),
    })
}
