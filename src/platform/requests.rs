use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::client::{ApiError, ApiPost, ApiRequest};

// ── Subscriptions ──────────────────────────────────────────────────────────────

pub struct GetSubscriptionsRequest {
    endpoint: String,
}

impl GetSubscriptionsRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl ApiRequest for GetSubscriptionsRequest {
    type Response = GetSubscriptionsResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.endpoint)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetSubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Option<Vec<Subscription>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub url: String,
}

impl GetSubscriptionsResponse {
    pub fn contains_url(&self, url: &str) -> bool {
        self.subscriptions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|s| s.url == url)
    }
}

pub struct SubscribeRequest {
    endpoint: String,
    payload: SubscribePayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribePayload {
    pub url: String,
    pub phrase: String,
}

impl SubscribeRequest {
    pub fn new(endpoint: impl Into<String>, url: &str, phrase: &str) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload: SubscribePayload {
                url: url.to_string(),
                phrase: phrase.to_string(),
            },
        }
    }
}

impl ApiRequest for SubscribeRequest {
    type Response = SubscribeResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.endpoint)
    }
}

impl ApiPost for SubscribeRequest {
    type Payload = SubscribePayload;

    fn payload(&self) -> &SubscribePayload {
        &self.payload
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeResponse {
    #[serde(default)]
    pub success: bool,
}

// ── Messages ───────────────────────────────────────────────────────────────────

/// Placeholder substituted with the target chat id in the send endpoint.
pub const CHAT_ID_PLACEHOLDER: &str = "{chat_id}";

pub struct SendMessageRequest {
    endpoint: String,
    chat_id: String,
    payload: SendMessagePayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessagePayload {
    pub recipient: SendRecipient,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendRecipient {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub text: String,
}

impl SendMessageRequest {
    pub fn new(endpoint: impl Into<String>, chat_id: &str, user_id: &str, text: &str) -> Self {
        Self {
            endpoint: endpoint.into(),
            chat_id: chat_id.to_string(),
            payload: SendMessagePayload {
                recipient: SendRecipient {
                    user_id: user_id.to_string(),
                },
                message: OutboundMessage {
                    text: text.to_string(),
                },
            },
        }
    }
}

impl ApiRequest for SendMessageRequest {
    type Response = SendMessageResponse;

    /// The chat id comes from the inbound payload and always lands in a
    /// single path segment.
    fn endpoint(&self) -> Cow<'_, str> {
        if self.endpoint.is_empty() {
            return Cow::Borrowed("");
        }
        let chat_id = urlencoding::encode(&self.chat_id);
        if self.endpoint.contains(CHAT_ID_PLACEHOLDER) {
            Cow::Owned(self.endpoint.replace(CHAT_ID_PLACEHOLDER, &chat_id))
        } else {
            Cow::Owned(format!(
                "{}/{}",
                self.endpoint.trim_end_matches('/'),
                chat_id
            ))
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        // Dot segments survive percent-encoding and would be resolved away
        match self.chat_id.as_str() {
            "" | "." | ".." => Err(ApiError::InvalidRequest(format!(
                "invalid chat id: {:?}",
                self.chat_id
            ))),
            _ => Ok(()),
        }
    }
}

impl ApiPost for SendMessageRequest {
    type Payload = SendMessagePayload;

    fn payload(&self) -> &SendMessagePayload {
        &self.payload
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub message_id: Option<String>,
}
