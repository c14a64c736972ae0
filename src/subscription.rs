use thiserror::Error;
use tracing::info;

use crate::config::ApiConfig;
use crate::platform::client::{ApiError, PlatformClient};
use crate::platform::requests::{GetSubscriptionsRequest, SubscribeRequest};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("platform rejected subscription for {url}")]
    Rejected { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    AlreadySubscribed,
    Subscribed,
}

/// Makes sure the platform delivers message events to the bot's webhook.
pub struct SubscriptionManager {
    subscriptions_endpoint: String,
    subscribe_endpoint: String,
}

impl SubscriptionManager {
    pub fn new(subscriptions_endpoint: impl Into<String>, subscribe_endpoint: impl Into<String>) -> Self {
        Self {
            subscriptions_endpoint: subscriptions_endpoint.into(),
            subscribe_endpoint: subscribe_endpoint.into(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.subscriptions_endpoint, &config.subscribe_endpoint)
    }

    /// Subscribe `bot_endpoint` unless a subscription with exactly that URL
    /// already exists. Safe to run on every startup.
    pub async fn ensure_subscribed(
        &self,
        client: &PlatformClient,
        bot_endpoint: &str,
        phrase: &str,
    ) -> Result<SubscriptionState, SubscriptionError> {
        info!("Checking that bot is subscribed to messages...");
        let current = client
            .get(&GetSubscriptionsRequest::new(&self.subscriptions_endpoint))
            .await?;

        if current.contains_url(bot_endpoint) {
            info!("Subscription exists for {}", bot_endpoint);
            return Ok(SubscriptionState::AlreadySubscribed);
        }

        info!("Subscription does not exist. Subscribing {}...", bot_endpoint);
        let response = client
            .post(&SubscribeRequest::new(
                &self.subscribe_endpoint,
                bot_endpoint,
                phrase,
            ))
            .await?;

        if !response.success {
            return Err(SubscriptionError::Rejected {
                url: bot_endpoint.to_string(),
            });
        }

        info!("Subscription is ok");
        Ok(SubscriptionState::Subscribed)
    }
}
