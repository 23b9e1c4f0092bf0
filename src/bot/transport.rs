use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;

pub const SLACK_API_URL: &str = "https://slack.com/api";

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    /// Reply inside an existing thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostedMessage {
    pub message_id: String,
    pub channel_id: String,
}

/// Outbound half of a chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<PostedMessage, TransportError>;
}

/// Posts through Slack's `chat.postMessage` Web API.
#[derive(Clone)]
pub struct SlackTransport {
    client: reqwest::Client,
    token: Option<String>,
    api_url: String,
}

impl SlackTransport {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("promogate/0.1")
            .build()?;
        Ok(Self {
            client,
            token,
            api_url: SLACK_API_URL.to_string(),
        })
    }

    /// Point at a different API root (tests, Slack-compatible servers).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(flatten)]
    options: &'a PostOptions,
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl ChatTransport for SlackTransport {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<PostedMessage, TransportError> {
        let token = match &self.token {
            Some(t) => t,
            None => {
                // No token configured: the chat side is disabled, approvals still work.
                tracing::debug!(channel, "No Slack token configured, skipping message");
                return Ok(PostedMessage::default());
            }
        };

        let resp = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(token)
            .json(&SlackMessage {
                channel,
                text,
                options,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Api(format!(
                "slack returned error: status={}, body={}",
                status, body
            )));
        }

        let body: SlackResponse = resp.json().await?;
        if !body.ok {
            return Err(TransportError::Api(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        tracing::debug!(channel, "Sent Slack message");
        Ok(PostedMessage {
            message_id: body.ts.unwrap_or_default(),
            channel_id: body.channel.unwrap_or_else(|| channel.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_message_sends_bearer_and_channel() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(serde_json::json!({
                "channel": "deploys",
                "text": "hello",
                "username": "promogate",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "channel": "C123",
                "ts": "1700000000.000100",
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = SlackTransport::new(Some("xoxb-test".into()), Duration::from_secs(5))
            .unwrap()
            .with_api_url(mock_server.uri());
        let options = PostOptions {
            username: Some("promogate".into()),
            ..Default::default()
        };

        let posted = transport
            .post_message("deploys", "hello", &options)
            .await
            .unwrap();
        assert_eq!(posted.channel_id, "C123");
        assert_eq!(posted.message_id, "1700000000.000100");
    }

    #[tokio::test]
    async fn test_slack_error_body_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "error": "channel_not_found",
            })))
            .mount(&mock_server)
            .await;

        let transport = SlackTransport::new(Some("xoxb-test".into()), Duration::from_secs(5))
            .unwrap()
            .with_api_url(mock_server.uri());
        let err = transport
            .post_message("nowhere", "hello", &PostOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Api(ref e) if e == "channel_not_found"));
    }

    #[tokio::test]
    async fn test_without_token_is_noop() {
        let transport = SlackTransport::new(None, Duration::from_secs(5)).unwrap();
        let posted = transport
            .post_message("deploys", "hello", &PostOptions::default())
            .await
            .unwrap();
        assert_eq!(posted, PostedMessage::default());
    }

    #[tokio::test]
    async fn test_client_applies_configured_timeout_and_agent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("user-agent", "promogate/0.1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "ok": true }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let transport = SlackTransport::new(Some("xoxb-test".into()), Duration::from_millis(100))
            .unwrap()
            .with_api_url(mock_server.uri());
        let err = transport
            .post_message("deploys", "hello", &PostOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(ref e) if e.is_timeout()));
    }
}
