use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::providers::WebhookTarget;

/// 內建的代理目錄，在工作區沒有 `config/agents.toml` 時使用。
const BUILT_IN_AGENTS: &str = include_str!("default_agents.toml");

/// 代理設定的頂層結構，通常從 `config/agents.toml` 載入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// 請求本體中 `source` 欄位的值。
    #[serde(default = "default_source")]
    pub source: String,
    /// 單一請求的逾時秒數，`0` 表示不設逾時。
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 是否在請求中附帶 `meta.ts`。
    #[serde(default = "default_include_meta")]
    pub include_meta: bool,
    /// 每個對話開頭（以及清除後）的歡迎訊息。
    #[serde(default = "default_welcome")]
    pub welcome_message: String,
    /// 啟動時預設選取的代理 ID。如果為 `None`，則使用列表中的第一個。
    #[serde(default)]
    pub default_agent: Option<String>,
    /// 所有已定義的代理。
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
}

fn default_source() -> String {
    String::from("guardchat-tui")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_include_meta() -> bool {
    true
}

fn default_welcome() -> String {
    String::from(
        "Welcome. Select an agent tab and try a request. \
         For risky prompts, you'll see Block / Rewrite / Approval behaviors.",
    )
}

impl AgentSettings {
    /// 從指定的工作區目錄讀取設定。
    /// 如果 `config/agents.toml` 不存在，則使用內建的代理目錄。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join("config/agents.toml");
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Self::built_in()
        }
    }

    /// 讀取並驗證指定路徑的設定檔。
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("讀取代理設定失敗: {}", config_path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("解析代理設定失敗: {}", config_path.display()))
    }

    /// 解析 TOML 字串並驗證內容。
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let parsed: AgentSettings = toml::from_str(raw)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// 內建的六個示範代理。
    pub fn built_in() -> Result<Self> {
        Self::from_toml_str(BUILT_IN_AGENTS).context("內建代理目錄無效")
    }

    fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            bail!("至少需要定義一個代理");
        }
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                bail!("代理 ID 不可為空");
            }
            if !seen.insert(agent.id.as_str()) {
                bail!("重複的代理 ID: {}", agent.id);
            }
            let mut keys = HashSet::new();
            for prompt in &agent.prompts {
                if !keys.insert(prompt.key.as_str()) {
                    bail!("代理 {} 有重複的提示鍵: {}", agent.id, prompt.key);
                }
            }
        }
        if let Some(id) = &self.default_agent
            && self.agent(id).is_none()
        {
            bail!("default_agent 指向不存在的代理: {}", id);
        }
        Ok(())
    }

    /// 取得預設的代理。
    /// 如果 `default_agent` 有指定，則回傳對應的代理；否則回傳列表中的第一個。
    pub fn default_agent(&self) -> Option<&AgentDescriptor> {
        if let Some(id) = &self.default_agent {
            self.agent(id)
        } else {
            self.agents.first()
        }
    }

    /// 根據 ID 尋找並回傳一個代理。
    pub fn agent(&self, id: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|agent| agent.id.as_str())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// 無介面模式等待回覆的上限：逾時的兩倍；未設逾時時為一分鐘。
    pub fn settle_deadline(&self) -> Duration {
        self.request_timeout()
            .unwrap_or(Duration::from_secs(30))
            .saturating_mul(2)
    }
}

/// 描述一個代理的顯示資訊、webhook 與預設提示。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// 唯一的識別碼，也是請求中 `agent` 欄位的值。
    pub id: String,
    /// 顯示在分頁上的名稱。
    pub label: String,
    /// 分頁旁的分類標籤，例如 `External`、`Finance`。
    #[serde(default)]
    pub badge: Option<String>,
    /// 對此代理的簡短描述。
    #[serde(default)]
    pub subtitle: Option<String>,
    /// 兩個字母的頭像縮寫。
    #[serde(default)]
    pub avatar: Option<String>,
    /// 政策後端的 webhook 位址。
    pub webhook: String,
    /// 用於覆寫 webhook 位址的環境變數名稱。
    #[serde(default)]
    pub webhook_env: Option<String>,
    /// 附加到請求中的額外 HTTP 標頭。
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    /// 預先定義的提示，依宣告順序排列。
    #[serde(default)]
    pub prompts: Vec<PromptTemplate>,
}

impl AgentDescriptor {
    /// 解析並回傳最終的 webhook 位址。
    /// 優先順序：`webhook_env` 環境變數（非空白時）> `webhook` 欄位。
    pub fn resolved_webhook(&self) -> String {
        self.webhook_env
            .as_deref()
            .and_then(|var| env::var(var).ok())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.webhook.clone())
    }

    pub fn target(&self) -> WebhookTarget {
        WebhookTarget {
            endpoint: self.resolved_webhook(),
            headers: self.headers.clone(),
        }
    }

    pub fn prompt(&self, key: &str) -> Option<&PromptTemplate> {
        self.prompts.iter().find(|prompt| prompt.key == key)
    }

    /// 頭像縮寫；未設定時取名稱中各單字的首字母。
    pub fn initials(&self) -> String {
        if let Some(avatar) = self.avatar.as_deref().filter(|a| !a.trim().is_empty()) {
            return avatar.to_string();
        }
        self.label
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

/// 預先定義的提示（UI 上的提示晶片）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptTemplate {
    pub key: String,
    pub label: String,
    pub text: String,
}
