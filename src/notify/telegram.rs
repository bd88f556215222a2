use super::{NoticeKind, Notifier};
use crate::ledger::ActionReference;
use async_trait::async_trait;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram notifier — posts operator notices through the Bot API.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            api_base: TELEGRAM_API_BASE.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the notifier at a different API host (tests, proxies).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
            anyhow::bail!("Telegram sendMessage failed ({status}): {err}");
        }

        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        self.client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

fn render(kind: NoticeKind, text: &str, reference: Option<&ActionReference>) -> String {
    let prefix = match kind {
        NoticeKind::Success => "✅",
        NoticeKind::Error => "⚠️",
        NoticeKind::Info => "ℹ️",
    };
    match reference {
        Some(reference) => format!("{prefix} {text}\ntx: {reference}"),
        None => format!("{prefix} {text}"),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, kind: NoticeKind, text: &str, reference: Option<&ActionReference>) {
        let message = render(kind, text, reference);
        if let Err(error) = self.send(&message).await {
            tracing::warn!(%error, kind = kind.label(), "telegram delivery failed");
        }
    }
}
