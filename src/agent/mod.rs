//! 多代理政策聊天的核心。
//!
//! 此模組描述聊天流程的核心組件，包括訊息與請求格式、各代理的對話紀錄、
//! 政策回應的正規化、請求的世代控制，以及檢視面板的快取狀態。
//! 所有狀態都由 `AgentManager` 持有，並在單一事件迴圈執行緒上修改。

// --- 子模組宣告 ---

/// `config` 模組：負責 `config/agents.toml` 的解析格式，
/// 包括每個代理的顯示資訊、webhook 位址與預設提示。
pub mod config;

/// `controller` 模組：每個代理同時只有一個進行中的請求，
/// 並以世代計數丟棄過期的回應。
pub mod controller;

/// `inspector` 模組：每個代理最近一次的政策評估快照。
pub mod inspector;

/// `manager` 模組：提供 `AgentManager`，串接設定、對話紀錄、檢視面板與請求控制器。
pub mod manager;

/// `message` 模組：定義對話訊息與送往 webhook 的請求本體。
pub mod message;

/// `normalize` 模組：把後端回傳的各種 JSON 形狀整理成統一的政策事件。
pub mod normalize;

/// `observer` 模組：渲染層接收狀態變化的回呼介面。
pub mod observer;

/// `policy` 模組：政策決策與評估事件。
pub mod policy;

/// `providers` 模組：與政策後端通訊的具體實作（HTTP webhook、腳本化的記憶體後端）。
pub mod providers;

/// `session` 模組：管理每個代理的對話紀錄 (`ConversationStore`)。
pub mod session;

// --- 公共 API 重新導出 ---

pub use config::{AgentDescriptor, AgentSettings, PromptTemplate};
pub use controller::{RequestController, TypingToken};
pub use inspector::{InspectorSnapshot, InspectorState};
pub use manager::{AgentManager, ChatError, Settled};
pub use message::{Message, MessageId, Role, WebhookRequest};
pub use normalize::{Normalized, normalize};
pub use observer::{ChatEvent, ChatObserver};
pub use policy::{Decision, PolicyEvent};
pub use session::{ConversationEntry, ConversationStore, Notice, NoticeLevel};
