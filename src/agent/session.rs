use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::message::{Message, MessageId, Role};
use super::policy::PolicyEvent;

/// 對話紀錄操作可能發生的錯誤。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("message {id} not found in conversation of {agent}")]
    NotFound { agent: String, id: MessageId },
    #[error("message text cannot be empty")]
    EmptyMessage,
    #[error("message {0} is not a user message and cannot be rewritten")]
    NotRewritable(MessageId),
    #[error("message {0} was already rewritten")]
    AlreadyRewritten(MessageId),
}

/// 通知的嚴重程度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// 系統產生的提示，例如連線失敗。不屬於任何一輪使用者對話。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: String,
    pub details: Vec<String>,
}

impl Notice {
    pub fn error(title: impl Into<String>, detail: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            detail: detail.into(),
            details,
        }
    }

    pub fn info(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            detail: detail.into(),
            details: Vec::new(),
        }
    }
}

/// 已記錄在對話中的政策評估結果。
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRecord {
    pub id: MessageId,
    pub event: PolicyEvent,
    pub timestamp: DateTime<Utc>,
}

/// 已記錄在對話中的系統提示。
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeRecord {
    pub id: MessageId,
    pub notice: Notice,
    pub timestamp: DateTime<Utc>,
}

/// 代表對話紀錄中單一可顯示的條目。
///
/// 將訊息、政策事件與系統提示統一為單一類型，讓渲染端只需依序走訪一份清單。
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEntry {
    Message(Message),
    Policy(PolicyRecord),
    Notice(NoticeRecord),
}

impl ConversationEntry {
    pub fn id(&self) -> MessageId {
        match self {
            ConversationEntry::Message(message) => message.id,
            ConversationEntry::Policy(record) => record.id,
            ConversationEntry::Notice(record) => record.id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ConversationEntry::Message(message) => message.timestamp,
            ConversationEntry::Policy(record) => record.timestamp,
            ConversationEntry::Notice(record) => record.timestamp,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            ConversationEntry::Message(message) => Some(message),
            _ => None,
        }
    }
}

/// 單一代理的對話狀態：穩定的對話識別碼與有序的紀錄。
#[derive(Debug)]
pub struct ConversationSession {
    agent_id: String,
    conversation_id: String,
    entries: Vec<ConversationEntry>,
    next_id: u64,
}

impl ConversationSession {
    /// 建立新的對話，並產生一次性的對話識別碼。
    fn new(agent_id: String, welcome: &str) -> Self {
        let mut session = Self {
            agent_id,
            conversation_id: Uuid::new_v4().to_string(),
            entries: Vec::new(),
            next_id: 1,
        };
        session.seed_welcome(welcome);
        session
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    fn seed_welcome(&mut self, welcome: &str) {
        let id = self.allocate_id();
        self.entries
            .push(ConversationEntry::Message(Message::new(id, Role::System, welcome)));
    }

    fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.entries.iter_mut().find_map(|entry| match entry {
            ConversationEntry::Message(message) if message.id == id => Some(message),
            _ => None,
        })
    }
}

/// 所有代理的對話紀錄。每個代理在啟動時建立一個對話，程序存活期間不會移除。
///
/// 訊息 ID 在清除對話後不會重複使用，因此舊請求持有的 ID 永遠不會指到新的訊息。
#[derive(Debug)]
pub struct ConversationStore {
    sessions: HashMap<String, ConversationSession>,
    welcome: String,
}

impl ConversationStore {
    /// 為每個代理 ID 建立一個對話，並放入歡迎訊息。
    pub fn new<I, S>(agent_ids: I, welcome: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let welcome = welcome.into();
        let sessions = agent_ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                (id.clone(), ConversationSession::new(id, &welcome))
            })
            .collect();
        Self { sessions, welcome }
    }

    pub fn session(&self, agent_id: &str) -> Result<&ConversationSession, StoreError> {
        self.sessions
            .get(agent_id)
            .ok_or_else(|| StoreError::UnknownAgent(agent_id.to_string()))
    }

    fn session_mut(&mut self, agent_id: &str) -> Result<&mut ConversationSession, StoreError> {
        self.sessions
            .get_mut(agent_id)
            .ok_or_else(|| StoreError::UnknownAgent(agent_id.to_string()))
    }

    pub fn conversation_id(&self, agent_id: &str) -> Result<&str, StoreError> {
        Ok(self.session(agent_id)?.conversation_id())
    }

    /// 在對話尾端加入一則訊息並回傳其 ID。使用者訊息不可為空白。
    pub fn append(
        &mut self,
        agent_id: &str,
        role: Role,
        text: impl Into<String>,
    ) -> Result<MessageId, StoreError> {
        let text = text.into();
        if role == Role::User && text.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        let session = self.session_mut(agent_id)?;
        let id = session.allocate_id();
        session
            .entries
            .push(ConversationEntry::Message(Message::new(id, role, text)));
        Ok(id)
    }

    /// 以後端回傳的淨化版本取代使用者訊息的文字。
    ///
    /// 同樣的文字重複呼叫不會改變結果；已改寫過的訊息不接受不同的文字。
    pub fn rewrite(
        &mut self,
        agent_id: &str,
        id: MessageId,
        new_text: impl Into<String>,
    ) -> Result<&Message, StoreError> {
        let new_text = new_text.into();
        let session = self.session_mut(agent_id)?;
        let agent = session.agent_id.clone();
        let message = session
            .message_mut(id)
            .ok_or(StoreError::NotFound { agent, id })?;
        if message.role != Role::User {
            return Err(StoreError::NotRewritable(id));
        }
        if message.rewritten {
            if message.text == new_text {
                return Ok(message);
            }
            return Err(StoreError::AlreadyRewritten(id));
        }
        let original = std::mem::replace(&mut message.text, new_text);
        message.original_text = Some(original);
        message.rewritten = true;
        Ok(message)
    }

    /// 記錄一筆政策評估結果。
    pub fn record_policy(
        &mut self,
        agent_id: &str,
        event: PolicyEvent,
    ) -> Result<MessageId, StoreError> {
        let session = self.session_mut(agent_id)?;
        let id = session.allocate_id();
        session.entries.push(ConversationEntry::Policy(PolicyRecord {
            id,
            event,
            timestamp: Utc::now(),
        }));
        Ok(id)
    }

    /// 記錄一筆系統提示。
    pub fn record_notice(&mut self, agent_id: &str, notice: Notice) -> Result<MessageId, StoreError> {
        let session = self.session_mut(agent_id)?;
        let id = session.allocate_id();
        session.entries.push(ConversationEntry::Notice(NoticeRecord {
            id,
            notice,
            timestamp: Utc::now(),
        }));
        Ok(id)
    }

    /// 清空對話並重新放入歡迎訊息，對話識別碼保持不變。
    pub fn clear(&mut self, agent_id: &str) -> Result<(), StoreError> {
        let welcome = self.welcome.clone();
        let session = self.session_mut(agent_id)?;
        session.entries.clear();
        session.seed_welcome(&welcome);
        Ok(())
    }

    /// 依序回傳對話條目，供渲染使用。
    pub fn list(&self, agent_id: &str) -> Result<&[ConversationEntry], StoreError> {
        Ok(self.session(agent_id)?.entries())
    }

    pub fn message(&self, agent_id: &str, id: MessageId) -> Result<&Message, StoreError> {
        self.session(agent_id)?
            .entries()
            .iter()
            .filter_map(ConversationEntry::as_message)
            .find(|message| message.id == id)
            .ok_or_else(|| StoreError::NotFound {
                agent: agent_id.to_string(),
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::policy::Decision;

    const WELCOME: &str = "Welcome.";

    fn store() -> ConversationStore {
        ConversationStore::new(["support", "banking"], WELCOME)
    }

    #[test]
    fn sessions_start_with_welcome_message() {
        let store = store();
        let entries = store.list("support").unwrap();
        assert_eq!(entries.len(), 1);
        let welcome = entries[0].as_message().unwrap();
        assert_eq!(welcome.role, Role::System);
        assert_eq!(welcome.text, WELCOME);
    }

    #[test]
    fn conversation_ids_are_distinct_per_agent() {
        let store = store();
        assert_ne!(
            store.conversation_id("support").unwrap(),
            store.conversation_id("banking").unwrap()
        );
    }

    #[test]
    fn append_preserves_insertion_order() {
        let mut store = store();
        let first = store.append("support", Role::User, "one").unwrap();
        store
            .record_policy("support", PolicyEvent::new(Decision::Allowed))
            .unwrap();
        let second = store.append("support", Role::Assistant, "two").unwrap();
        assert!(first < second);
        let ids: Vec<_> = store
            .list("support")
            .unwrap()
            .iter()
            .map(ConversationEntry::id)
            .collect();
        assert_eq!(ids, vec![MessageId(1), first, MessageId(3), second]);
    }

    #[test]
    fn rejects_blank_user_text() {
        let mut store = store();
        assert_eq!(
            store.append("support", Role::User, "   "),
            Err(StoreError::EmptyMessage)
        );
        assert_eq!(store.list("support").unwrap().len(), 1);
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let mut store = store();
        assert_eq!(
            store.append("nobody", Role::User, "hi"),
            Err(StoreError::UnknownAgent("nobody".into()))
        );
    }

    #[test]
    fn rewrite_keeps_original_and_is_idempotent() {
        let mut store = store();
        let id = store.append("support", Role::User, "My SSN is 172-07-7645").unwrap();
        store.rewrite("support", id, "My SSN is [REDACTED]").unwrap();
        let once = store.message("support", id).unwrap().clone();
        store.rewrite("support", id, "My SSN is [REDACTED]").unwrap();
        let twice = store.message("support", id).unwrap().clone();
        assert_eq!(once, twice);
        assert!(twice.rewritten);
        assert_eq!(twice.text, "My SSN is [REDACTED]");
        assert_eq!(twice.original_text.as_deref(), Some("My SSN is 172-07-7645"));
    }

    #[test]
    fn rewrite_rejects_second_different_text() {
        let mut store = store();
        let id = store.append("support", Role::User, "secret").unwrap();
        store.rewrite("support", id, "[REDACTED]").unwrap();
        assert_eq!(
            store.rewrite("support", id, "something else"),
            Err(StoreError::AlreadyRewritten(id))
        );
    }

    #[test]
    fn rewrite_only_applies_to_user_messages() {
        let mut store = store();
        let id = store.append("support", Role::Assistant, "reply").unwrap();
        assert_eq!(
            store.rewrite("support", id, "x"),
            Err(StoreError::NotRewritable(id))
        );
    }

    #[test]
    fn rewrite_after_clear_is_not_found() {
        let mut store = store();
        let id = store.append("support", Role::User, "hello").unwrap();
        store.clear("support").unwrap();
        assert!(matches!(
            store.rewrite("support", id, "x"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn clear_reseeds_welcome_and_keeps_conversation_id() {
        let mut store = store();
        let before = store.conversation_id("support").unwrap().to_string();
        store.append("support", Role::User, "hello").unwrap();
        store
            .record_notice("support", Notice::info("Note", "detail"))
            .unwrap();
        store.clear("support").unwrap();
        let entries = store.list("support").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_message().unwrap().text, WELCOME);
        assert_eq!(store.conversation_id("support").unwrap(), before);
    }

    #[test]
    fn ids_are_not_reused_after_clear() {
        let mut store = store();
        let before = store.append("support", Role::User, "hello").unwrap();
        store.clear("support").unwrap();
        let after = store.append("support", Role::User, "again").unwrap();
        assert!(after > before);
    }
}
