//! `providers` 模組負責與代理的政策後端進行實際通訊。
//!
//! 每個實作都遵守 `PolicyTransport` trait，讓請求控制器不需要知道底層是
//! HTTP webhook 還是測試用的記憶體後端。

/// `http` 模組：透過 HTTP POST 將請求送到代理 webhook 的實作。
pub mod http;
/// `memory` 模組：依腳本回應的記憶體傳輸，用於測試與離線示範。
pub mod memory;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::WebhookRequest;

/// 請求在傳輸或套用過程中可能發生的失敗類別。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// 請求已被同一代理的新請求取代。不會顯示給使用者。
    #[error("request superseded by a newer one")]
    Cancelled,
    /// 連線失敗、DNS 錯誤或連線被拒。
    #[error("network error: {0}")]
    Network(String),
    /// HTTP 成功但本體不是 JSON，或格式無法解讀。
    #[error("protocol error: {0}")]
    Protocol(String),
    /// 後端回傳 2xx 以外的狀態碼。
    #[error("backend returned HTTP {status}")]
    Backend { status: u16, body: String },
    /// 超過設定的請求逾時。
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl RequestError {
    /// 是否屬於網路層的失敗（連線或逾時）。
    pub fn is_network(&self) -> bool {
        matches!(self, RequestError::Network(_) | RequestError::Timeout(_))
    }
}

/// 一個代理 webhook 的位址與附加標頭。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
}

/// 定義所有政策後端傳輸方式都必須遵守的介面。
///
/// 回傳值是已解析的 JSON 本體；形狀的正規化由呼叫端負責。
#[async_trait]
pub trait PolicyTransport: Send + Sync {
    /// 回傳此傳輸方式的名稱，用於日誌記錄。
    fn name(&self) -> &str;

    /// 將請求送到指定的 webhook，並回傳解析後的 JSON。
    async fn deliver(
        &self,
        target: &WebhookTarget,
        request: &WebhookRequest,
    ) -> Result<serde_json::Value, RequestError>;
}
