use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::{ApiConfig, BotConfig};
use crate::platform::client::{ApiError, PlatformClient};
use crate::platform::requests::SendMessageRequest;
use crate::platform::InboundNotification;

/// Something that reacts to inbound notifications. The webhook server only
/// knows this trait.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, notification: InboundNotification) -> Outcome;
}

/// Result of handling one notification. Never an error: a bad notification
/// must not take the listener down.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to do.
    Skipped(SkipReason),
    Replied { message_id: String },
    Failed(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoText,
    NoMatch,
}

#[derive(Debug)]
pub enum FailureReason {
    MissingChatId,
    MissingSender,
    /// The platform accepted the call but assigned no message id.
    NoMessageId,
    Send(ApiError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingChatId => write!(f, "notification has no chat id"),
            FailureReason::MissingSender => write!(f, "notification has no sender"),
            FailureReason::NoMessageId => write!(f, "platform returned no message id"),
            FailureReason::Send(e) => write!(f, "failed to send reply: {}", e),
        }
    }
}

/// Replies with a canned text to every message starting with the trigger
/// phrase.
pub struct NotificationHandler {
    client: Arc<PlatformClient>,
    phrase: String,
    reply: String,
    send_endpoint: String,
}

impl NotificationHandler {
    pub fn new(
        client: Arc<PlatformClient>,
        phrase: impl Into<String>,
        reply: impl Into<String>,
        send_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            phrase: phrase.into(),
            reply: reply.into(),
            send_endpoint: send_endpoint.into(),
        }
    }

    pub fn from_config(client: Arc<PlatformClient>, api: &ApiConfig, bot: &BotConfig) -> Self {
        Self::new(client, &bot.phrase, &bot.reply, &api.send_endpoint)
    }
}

#[async_trait]
impl MessageHandler for NotificationHandler {
    async fn handle(&self, notification: InboundNotification) -> Outcome {
        let text = match notification.text() {
            Some(t) => t,
            None => {
                info!("Message notification contains no text <{:?}>", notification);
                return Outcome::Skipped(SkipReason::NoText);
            }
        };

        if !text.starts_with(&self.phrase) {
            info!("Message notification does not contain phrase <{:?}>", notification);
            return Outcome::Skipped(SkipReason::NoMatch);
        }

        let chat_id = match notification.chat_id() {
            Some(id) => id,
            None => {
                warn!("Message notification does not contain chat id <{:?}>", notification);
                return Outcome::Failed(FailureReason::MissingChatId);
            }
        };

        let user_id = match notification.sender_id() {
            Some(id) => id,
            None => {
                warn!("Message notification does not contain sender <{:?}>", notification);
                return Outcome::Failed(FailureReason::MissingSender);
            }
        };

        debug!("Replying to user {} in chat {}", user_id, chat_id);

        let request = SendMessageRequest::new(&self.send_endpoint, chat_id, user_id, &self.reply);
        match self.client.post(&request).await {
            Ok(response) => match response.message_id {
                Some(message_id) => {
                    info!("Reply {} sent to chat {}", message_id, chat_id);
                    Outcome::Replied { message_id }
                }
                None => {
                    warn!("Platform assigned no message id for reply to chat {}", chat_id);
                    Outcome::Failed(FailureReason::NoMessageId)
                }
            },
            Err(e) => {
                error!("Failed to send message: {:?}", e);
                Outcome::Failed(FailureReason::Send(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::client::tests::test_client;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JOKE: &str = "Why don't pirates take baths? They just wash up on shore.";

    fn handler(server: &MockServer) -> NotificationHandler {
        NotificationHandler::new(
            Arc::new(test_client(server)),
            "/joke",
            JOKE,
            "/me/messages/{chat_id}",
        )
    }

    fn notification(body: serde_json::Value) -> InboundNotification {
        serde_json::from_value(body).unwrap()
    }

    async fn expect_no_sends(server: &MockServer) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "x"})))
            .expect(0)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_reply_sent_to_sender_in_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages/42"))
            .and(body_json(json!({
                "recipient": {"user_id": "7"},
                "message": {"text": JOKE}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "abc"})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "/joke please"}
            })))
            .await;

        assert!(outcome.is_success());
        assert!(matches!(outcome, Outcome::Replied { ref message_id } if message_id == "abc"));
    }

    #[tokio::test]
    async fn test_null_message_id_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": null})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "/joke please"}
            })))
            .await;

        assert!(!outcome.is_success());
        assert!(matches!(outcome, Outcome::Failed(FailureReason::NoMessageId)));
    }

    #[tokio::test]
    async fn test_non_matching_text_ignored() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "hello"}
            })))
            .await;

        assert!(outcome.is_success());
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::NoMatch)));
    }

    #[tokio::test]
    async fn test_prefix_match_is_case_sensitive() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "/JOKE please"}
            })))
            .await;

        assert!(matches!(outcome, Outcome::Skipped(SkipReason::NoMatch)));
    }

    #[tokio::test]
    async fn test_phrase_must_be_prefix() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "tell me a /joke"}
            })))
            .await;

        assert!(matches!(outcome, Outcome::Skipped(SkipReason::NoMatch)));
    }

    #[tokio::test]
    async fn test_missing_text_ignored() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;
        let handler = handler(&server);

        let empty = handler.handle(InboundNotification::default()).await;
        assert!(matches!(empty, Outcome::Skipped(SkipReason::NoText)));

        let no_text = handler
            .handle(notification(json!({
                "recipient": {"chat_id": "42"},
                "message": {}
            })))
            .await;
        assert!(no_text.is_success());
        assert!(matches!(no_text, Outcome::Skipped(SkipReason::NoText)));
    }

    #[tokio::test]
    async fn test_missing_chat_id_fails_without_send() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;
        let handler = handler(&server);

        let no_recipient = handler
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "message": {"text": "/joke"}
            })))
            .await;
        assert!(!no_recipient.is_success());
        assert!(matches!(no_recipient, Outcome::Failed(FailureReason::MissingChatId)));

        let null_chat = handler
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": null},
                "message": {"text": "/joke"}
            })))
            .await;
        assert!(matches!(null_chat, Outcome::Failed(FailureReason::MissingChatId)));
    }

    #[tokio::test]
    async fn test_missing_sender_fails_without_send() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "recipient": {"chat_id": "42"},
                "message": {"text": "/joke"}
            })))
            .await;
        assert!(matches!(outcome, Outcome::Failed(FailureReason::MissingSender)));
    }

    #[tokio::test]
    async fn test_chat_id_cannot_escape_send_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/subscribe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "hit"})))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": "../subscribe"},
                "message": {"text": "/joke"}
            })))
            .await;
        assert!(!outcome.is_success());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.path(), "/me/messages/..%2Fsubscribe");
    }

    #[tokio::test]
    async fn test_dot_chat_id_fails_without_send() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": ".."},
                "message": {"text": "/joke"}
            })))
            .await;
        assert!(matches!(
            outcome,
            Outcome::Failed(FailureReason::Send(ApiError::InvalidRequest(_)))
        ));
    }

    #[tokio::test]
    async fn test_sender_without_user_id() {
        let server = MockServer::start().await;
        expect_no_sends(&server).await;
        let handler = handler(&server);

        let no_match = handler
            .handle(notification(json!({
                "sender": {"name": "x"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "hello"}
            })))
            .await;
        assert!(matches!(no_match, Outcome::Skipped(SkipReason::NoMatch)));

        let matched = handler
            .handle(notification(json!({
                "sender": {"name": "x"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "/joke"}
            })))
            .await;
        assert!(matches!(matched, Outcome::Failed(FailureReason::MissingSender)));
    }

    #[tokio::test]
    async fn test_send_error_becomes_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = handler(&server)
            .handle(notification(json!({
                "sender": {"user_id": "7"},
                "recipient": {"chat_id": "42"},
                "message": {"text": "/joke"}
            })))
            .await;
        assert!(matches!(
            outcome,
            Outcome::Failed(FailureReason::Send(ApiError::Status { .. }))
        ));
    }
}
