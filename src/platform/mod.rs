pub mod client;
pub mod requests;

use serde::Deserialize;

/// A message event delivered to the webhook.
///
/// Every part is optional on the wire so that partial or empty payloads
/// still decode; the handler decides what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundNotification {
    #[serde(default)]
    pub message: Option<InboundMessage>,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub recipient: Option<InboundRecipient>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundRecipient {
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl InboundNotification {
    /// Message text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.recipient.as_ref().and_then(|r| r.chat_id.as_deref())
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.sender.as_ref().and_then(|s| s.user_id.as_deref())
    }
}
