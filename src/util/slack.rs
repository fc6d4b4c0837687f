use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::model::notification::Notification;
use crate::service::relay::NotificationRelay;

pub async fn send_slack_alert(client: &Client, webhook_url: &str, message: &str) -> Result<(), reqwest::Error> {
    let payload = json!({ "text": message });

    client
        .post(webhook_url)
        .json(&payload)
        .send()
        .await?
        .error_for_status()?; // non-2xx is an error

    Ok(())
}

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Mirrors notifications into a Slack channel through an incoming webhook.
pub struct SlackRelay {
    webhook_url: String,
    client: Client,
}

impl SlackRelay {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(webhook_url, WEBHOOK_TIMEOUT)
    }

    /// A webhook that does not answer within `timeout` counts as failed.
    pub fn with_timeout(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { webhook_url: webhook_url.into(), client })
    }
}

#[async_trait]
impl NotificationRelay for SlackRelay {
    async fn relay(&self, notification: &Notification) -> anyhow::Result<()> {
        let text = format!("[{}] {}", notification.user_id, notification.message);
        send_slack_alert(&self.client, &self.webhook_url, &text)
            .await
            .with_context(|| format!("slack relay failed for notification {}", notification.id))
    }
}
