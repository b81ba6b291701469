use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::agent::WebhookRequest;

use super::{PolicyTransport, RequestError, WebhookTarget};

/// 預先排好回應順序的傳輸實作，供測試與離線示範使用。
///
/// 每次 `deliver` 依序取出一個回應；`gate()` 建立的回應會一直等到呼叫端
/// 手動放行，用來模擬回應的先後順序。
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<(WebhookTarget, WebhookRequest)>>,
}

enum Scripted {
    Ready(Result<Value, RequestError>),
    Gated(oneshot::Receiver<Result<Value, RequestError>>),
}

/// 手動放行的一個回應。丟棄時視為網路中斷。
pub struct ReplyGate {
    tx: oneshot::Sender<Result<Value, RequestError>>,
}

impl ReplyGate {
    pub fn resolve(self, body: Value) {
        // 請求已被取消時接收端已經不在了
        let _ = self.tx.send(Ok(body));
    }

    pub fn fail(self, err: RequestError) {
        let _ = self.tx.send(Err(err));
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 排入一個立即回傳的 JSON 本體。
    pub fn reply(&self, body: Value) {
        self.push(Scripted::Ready(Ok(body)));
    }

    /// 排入一個立即回傳的失敗。
    pub fn fail(&self, err: RequestError) {
        self.push(Scripted::Ready(Err(err)));
    }

    /// 排入一個需要手動放行的回應。
    pub fn gate(&self) -> ReplyGate {
        let (tx, rx) = oneshot::channel();
        self.push(Scripted::Gated(rx));
        ReplyGate { tx }
    }

    /// 目前為止收到的所有請求，依到達順序排列。
    pub fn requests(&self) -> Vec<(WebhookTarget, WebhookRequest)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 讓出執行權，直到至少收到 `count` 個請求。
    pub async fn delivered(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }

    fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, scripted: Scripted) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(scripted);
    }
}

#[async_trait]
impl PolicyTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn deliver(
        &self,
        target: &WebhookTarget,
        request: &WebhookRequest,
    ) -> Result<Value, RequestError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((target.clone(), request.clone()));
        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(RequestError::Network("connection reset".into()))),
            None => Err(RequestError::Network(format!(
                "no scripted reply for {}",
                target.endpoint
            ))),
        }
    }
}
