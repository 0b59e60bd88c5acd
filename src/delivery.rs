// 📣 Delivery - Sends formatted message bodies, one at a time, in order
//
// Live mode posts to the Telegram Bot API; dry-run echoes the same bodies to
// the console. The first failed send stops the loop: nothing after it goes out.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Request never got a response (DNS, connect, TLS, timeout)
    #[error("delivery transport failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Channel answered with a non-success status
    #[error("delivery rejected with status {status}: {description}")]
    Rejected { status: u16, description: String },
}

// ============================================================================
// NOTIFIER TRAIT
// ============================================================================

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, body: &str) -> Result<(), DeliveryError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Send every message in order, stopping at the first failure.
/// Returns how many were sent.
pub async fn deliver_all(notifier: &dyn Notifier, messages: &[String]) -> Result<usize, DeliveryError> {
    for (index, body) in messages.iter().enumerate() {
        debug!(notifier = notifier.name(), index, bytes = body.len(), "sending message");
        notifier.send(body).await?;
    }

    info!(notifier = notifier.name(), sent = messages.len(), "messages delivered");
    Ok(messages.len())
}

// ============================================================================
// CONSOLE (DRY-RUN)
// ============================================================================

/// ConsoleNotifier - Echoes bodies to stdout, never touches the real channel
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, body: &str) -> Result<(), DeliveryError> {
        println!("{}", body);
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

// ============================================================================
// TELEGRAM
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// TelegramNotifier - Bot API `sendMessage` with Markdown parse mode
///
/// Holds its own HTTP client; build one per cycle and drop it at the end.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: reqwest::Client, api_base: &str, token: &str, chat_id: &str) -> Self {
        TelegramNotifier {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, body: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.payload(body))
            .send()
            .await
            // The URL carries the bot token; keep it out of error messages
            .map_err(|e| DeliveryError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let description = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description,
            });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records bodies in memory; fails every send from `fail_at` onwards
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<String>>,
        pub fail_at: Option<usize>,
    }

    impl RecordingNotifier {
        pub fn failing_at(index: usize) -> Self {
            RecordingNotifier {
                sent: Mutex::new(Vec::new()),
                fail_at: Some(index),
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, body: &str) -> Result<(), DeliveryError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_at.is_some_and(|i| sent.len() >= i) {
                return Err(DeliveryError::Rejected {
                    status: 429,
                    description: "Too Many Requests".to_string(),
                });
            }
            sent.push(body.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn bodies(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("message {}", i)).collect()
    }

    #[tokio::test]
    async fn test_deliver_all_in_order() {
        let notifier = RecordingNotifier::default();

        let sent = deliver_all(&notifier, &bodies(3)).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(notifier.sent(), bodies(3));
    }

    #[tokio::test]
    async fn test_deliver_all_stops_at_first_failure() {
        let notifier = RecordingNotifier::failing_at(1);

        let err = deliver_all(&notifier, &bodies(3)).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Rejected { status: 429, .. }));
        assert_eq!(notifier.sent(), vec!["message 1".to_string()]);
    }

    #[tokio::test]
    async fn test_console_never_fails() {
        assert_eq!(deliver_all(&ConsoleNotifier, &bodies(2)).await.unwrap(), 2);
    }

    #[test]
    fn test_telegram_endpoint_and_payload() {
        let notifier = TelegramNotifier::new(
            reqwest::Client::new(),
            "https://api.telegram.org/",
            "123:abc",
            "@new_releases",
        );

        assert_eq!(notifier.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");
        assert_eq!(
            serde_json::to_value(notifier.payload("*Now Playing*")).unwrap(),
            serde_json::json!({
                "chat_id": "@new_releases",
                "text": "*Now Playing*",
                "parse_mode": "Markdown"
            })
        );
    }

    #[tokio::test]
    async fn test_telegram_unreachable_is_transport_error_without_token() {
        let notifier = TelegramNotifier::new(reqwest::Client::new(), "http://127.0.0.1:1", "secret-token", "1");

        let err = notifier.send("hello").await.unwrap_err();

        assert!(matches!(err, DeliveryError::Transport(_)));
        assert!(!err.to_string().contains("secret-token"));
    }
}
