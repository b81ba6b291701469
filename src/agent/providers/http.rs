use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::agent::WebhookRequest;

use super::{PolicyTransport, RequestError, WebhookTarget};

/// 錯誤訊息中保留的回應本體長度上限（字元數）。
const BODY_SNIPPET_CHARS: usize = 500;

/// `PolicyTransport` 的 HTTP 實作，以 JSON POST 呼叫代理 webhook。
#[derive(Clone)]
pub struct HttpTransport {
    /// `reqwest` 的非同步 HTTP 客戶端，內部共用連線池，可以低成本複製。
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("guardchat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PolicyTransport for HttpTransport {
    fn name(&self) -> &str {
        "http-webhook"
    }

    async fn deliver(
        &self,
        target: &WebhookTarget,
        request: &WebhookRequest,
    ) -> Result<serde_json::Value, RequestError> {
        let headers = build_headers(target)?;
        debug!(
            "POST {} (agent {}, conversation {})",
            target.endpoint, request.agent, request.conversation_id
        );
        let response = self
            .client
            .post(&target.endpoint)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|err| RequestError::Network(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| RequestError::Network(err.to_string()))?;

        if !status.is_success() {
            return Err(RequestError::Backend {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        serde_json::from_str(&body).map_err(|_| {
            RequestError::Protocol(format!(
                "non-JSON response ({}): {}",
                status.as_u16(),
                snippet(&body)
            ))
        })
    }
}

/// 根據 webhook 設定建構 HTTP 標頭。
fn build_headers(target: &WebhookTarget) -> Result<HeaderMap, RequestError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (key, value) in target.headers.iter() {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| RequestError::Protocol(format!("invalid header name {key}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| RequestError::Protocol(format!("invalid value for {key}: {err}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn snippet(body: &str) -> String {
    body.trim().chars().take(BODY_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn extra_headers_are_attached() {
        let mut extra = BTreeMap::new();
        extra.insert("x-demo-tenant".to_string(), "acme".to_string());
        let target = WebhookTarget {
            endpoint: "http://localhost/hook".into(),
            headers: extra,
        };
        let headers = build_headers(&target).unwrap();
        assert_eq!(headers.get("x-demo-tenant").unwrap(), "acme");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn invalid_header_name_is_protocol_error() {
        let mut extra = BTreeMap::new();
        extra.insert("bad header".to_string(), "x".to_string());
        let target = WebhookTarget {
            endpoint: "http://localhost/hook".into(),
            headers: extra,
        };
        assert!(matches!(
            build_headers(&target),
            Err(RequestError::Protocol(_))
        ));
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "x".repeat(2_000);
        assert_eq!(snippet(&long).len(), BODY_SNIPPET_CHARS);
    }
}
