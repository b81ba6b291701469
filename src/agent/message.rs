use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 對話中單一條目的識別碼，在同一個代理的對話內唯一。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 訊息的發言者。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// 代表對話紀錄中的一則訊息。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    /// 目前顯示的文字。若後端回傳了淨化後的版本，這裡會是改寫後的內容。
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// 文字是否已被後端回傳的淨化版本取代。
    #[serde(default)]
    pub rewritten: bool,
    /// 改寫前的原始文字，只有在 `rewritten` 為真時才會存在。
    #[serde(default)]
    pub original_text: Option<String>,
}

impl Message {
    /// 建立一則尚未改寫的新訊息，時間戳記為當下。
    pub fn new(id: MessageId, role: Role, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            timestamp: Utc::now(),
            rewritten: false,
            original_text: None,
        }
    }
}

/// 發送到代理 webhook 的請求本體。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    /// 代理的 ID。
    pub agent: String,
    /// 使用者輸入的文字。
    pub message: String,
    /// 對話識別碼，讓後端可以串接同一個對話的多輪內容。
    pub conversation_id: String,
    /// 請求的來源標記，例如 `guardchat-tui`。
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
}

/// 附加在請求上的稽核用中繼資料。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RequestMeta {
    /// ISO 8601 格式的發送時間。
    pub ts: String,
}

impl RequestMeta {
    pub fn now() -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl WebhookRequest {
    /// `WebhookRequest` 的建構函式。
    pub fn new(
        agent: impl Into<String>,
        message: impl Into<String>,
        conversation_id: impl Into<String>,
        source: impl Into<String>,
        include_meta: bool,
    ) -> Self {
        Self {
            agent: agent.into(),
            message: message.into(),
            conversation_id: conversation_id.into(),
            source: source.into(),
            meta: include_meta.then(RequestMeta::now),
        }
    }
}
