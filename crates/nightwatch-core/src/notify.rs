//! Outbound notification sink.
//!
//! The chat transport is external; the core only needs a fire-and-forget
//! `send`. Delivery is best-effort with no exactly-once guarantee.

use log::{info, warn};
use serde_json::json;

/// Delivers a text message to a participant. Fire-and-forget: failures are
/// logged, never propagated into the state machine.
pub trait Notifier: Send + Sync {
    fn send(&self, participant_id: &str, text: &str);
}

/// Posts messages as JSON to a chat-bridge webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, participant_id: &str, text: &str) {
        let client = self.client.clone();
        let url = self.url.clone();
        let body = json!({ "to": participant_id, "text": text });
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!("webhook notify returned {}", resp.status());
                }
                Ok(_) => {}
                Err(e) => warn!("webhook notify failed: {e}"),
            }
        });
    }
}

/// Logs outbound messages instead of delivering them. Used when no bridge
/// URL is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, participant_id: &str, text: &str) {
        info!("[notify -> {participant_id}] {text}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Notifier;
    use std::sync::Mutex;

    /// Records every send for assertions.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub fn messages_to(&self, participant_id: &str) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(to, _)| to == participant_id)
                .map(|(_, text)| text.clone())
                .collect()
        }

        pub fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, participant_id: &str, text: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((participant_id.to_string(), text.to_string()));
        }
    }
}
