use std::collections::BTreeMap;
use std::sync::Arc;

use mockito::{Matcher, Server};
use serde_json::json;

use guardchat::agent::providers::http::HttpTransport;
use guardchat::agent::providers::{PolicyTransport, RequestError, WebhookTarget};
use guardchat::agent::{
    AgentManager, AgentSettings, ConversationEntry, Decision, Role, Settled, WebhookRequest,
};

fn target(url: String) -> WebhookTarget {
    let mut headers = BTreeMap::new();
    headers.insert("x-demo-tenant".to_string(), "acme".to_string());
    WebhookTarget {
        endpoint: url,
        headers,
    }
}

fn settings_for(endpoint: &str) -> AgentSettings {
    let raw = format!(
        r#"
        source = "integration"
        request_timeout_secs = 5

        [[agents]]
        id = "care-coordination-agent"
        label = "Care Coordination"
        webhook = "{endpoint}"
        "#
    );
    AgentSettings::from_toml_str(&raw).unwrap()
}

#[tokio::test]
async fn posts_json_body_with_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/webhook/care")
        .match_header("content-type", "application/json")
        .match_header("x-demo-tenant", "acme")
        .match_body(Matcher::PartialJson(json!({
            "agent": "care-coordination-agent",
            "message": "hello",
            "conversation_id": "conv-1",
            "source": "integration"
        })))
        .with_status(200)
        .with_body(r#"{"decision":"allowed","response":"hi"}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new().unwrap();
    let request = WebhookRequest::new(
        "care-coordination-agent",
        "hello",
        "conv-1",
        "integration",
        true,
    );
    let body = transport
        .deliver(&target(format!("{}/webhook/care", server.url())), &request)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(body["response"], "hi");
}

#[tokio::test]
async fn non_success_status_is_backend_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let transport = HttpTransport::new().unwrap();
    let request = WebhookRequest::new("a", "hello", "c", "s", false);
    let err = transport
        .deliver(&target(format!("{}/hook", server.url())), &request)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RequestError::Backend {
            status: 503,
            body: "upstream unavailable".into()
        }
    );
}

#[tokio::test]
async fn non_json_body_is_protocol_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(200)
        .with_body("<html>ok</html>")
        .create_async()
        .await;

    let transport = HttpTransport::new().unwrap();
    let request = WebhookRequest::new("a", "hello", "c", "s", false);
    let err = transport
        .deliver(&target(format!("{}/hook", server.url())), &request)
        .await
        .unwrap_err();
    match err {
        RequestError::Protocol(detail) => assert!(detail.contains("<html>ok</html>")),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    let transport = HttpTransport::new().unwrap();
    let request = WebhookRequest::new("a", "hello", "c", "s", false);
    let err = transport
        .deliver(&target("http://127.0.0.1:9/hook".into()), &request)
        .await
        .unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn manager_applies_pair_response_end_to_end() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/webhook/care")
        .match_body(Matcher::PartialJson(json!({
            "agent": "care-coordination-agent",
            "source": "integration"
        })))
        .with_status(200)
        .with_body(
            json!([
                {
                    "status": "rewrite",
                    "rewrite": "Can you access my medical records? My SSN is [REDACTED].",
                    "policy": "PII redaction",
                    "stage": "input",
                    "dlp": "US_SSN",
                    "owasp": "LLM02"
                },
                {"text": "I can help you request your records."}
            ])
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let endpoint = format!("{}/webhook/care", server.url());
    let transport = Arc::new(HttpTransport::new().unwrap());
    let mut manager =
        AgentManager::new(settings_for(&endpoint), transport, Box::new(())).unwrap();

    let agent = "care-coordination-agent";
    let user_id = manager
        .submit(agent, "Can you access my medical records? My SSN is 172-07-7645.")
        .unwrap();
    let settled = manager.settle().await.unwrap();
    assert_eq!(
        settled,
        vec![Settled::Applied {
            agent_id: agent.into(),
            decision: Decision::Rewritten
        }]
    );

    let user = manager.store().message(agent, user_id).unwrap();
    assert!(user.rewritten);
    assert!(user.text.contains("[REDACTED]"));

    let entries = manager.store().list(agent).unwrap();
    match &entries[2] {
        ConversationEntry::Policy(record) => {
            assert_eq!(record.event.reason.as_deref(), Some("PII redaction"));
            assert_eq!(record.event.dlp_signals, vec!["US_SSN".to_string()]);
        }
        other => panic!("expected policy entry, got {other:?}"),
    }
    let reply = entries[3].as_message().unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.text, "I can help you request your records.");

    // The mock answers the second turn the same way; only the id matters here.
    let conversation = manager.store().conversation_id(agent).unwrap().to_string();
    manager.submit(agent, "And my lab results?").unwrap();
    manager.settle().await.unwrap();
    assert_eq!(manager.store().conversation_id(agent).unwrap(), conversation);

    mock.assert_async().await;
}
