//! Thin client for the handful of Slack Web API methods the bot needs.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tiperc20_config::SlackConfig;
use tracing::debug;

use crate::error::SlackApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

pub struct SlackApi {
    http_client: Client,
    base_url: String,
    bot_token: String,
    app_token: String,
}

impl SlackApi {
    pub fn new(config: &SlackConfig) -> anyhow::Result<Self> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
        })
    }

    async fn call(
        &self,
        method: &str,
        token: &str,
        body: Option<Value>,
    ) -> Result<serde_json::Map<String, Value>, SlackApiError> {
        debug!(method, "slack api call");

        let mut request = self
            .http_client
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Http(format!("{method} returned HTTP {status}")));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|error| SlackApiError::InvalidResponse(format!("{method}: {error}")))?;

        if !envelope.ok {
            let code = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(SlackApiError::from_code(&code));
        }

        Ok(envelope.rest)
    }

    /// The bot's own user id, as reported by `auth.test`.
    pub async fn auth_test(&self) -> Result<String, SlackApiError> {
        let body = self.call("auth.test", &self.bot_token, None).await?;
        string_field(&body, "user_id")
    }

    /// Ask for a fresh Socket Mode websocket URL.
    pub async fn open_connection(&self) -> Result<String, SlackApiError> {
        let body = self
            .call("apps.connections.open", &self.app_token, None)
            .await?;
        string_field(&body, "url")
    }

    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackApiError> {
        self.call(
            "chat.postMessage",
            &self.bot_token,
            Some(json!({ "channel": channel, "text": text })),
        )
        .await
        .map(|_| ())
    }
}

fn string_field(
    body: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, SlackApiError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SlackApiError::InvalidResponse(format!("missing `{field}`")))
}
