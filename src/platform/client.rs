use std::borrow::Cow;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ApiConfig;

/// A typed call against the platform API.
pub trait ApiRequest {
    type Response: DeserializeOwned;

    /// Path relative to the API host, path parameters already resolved.
    fn endpoint(&self) -> Cow<'_, str>;

    /// Checked before any I/O.
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// A call that carries a JSON body.
pub trait ApiPost: ApiRequest {
    type Payload: Serialize;

    fn payload(&self) -> &Self::Payload;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("platform API error ({status}) at {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to parse response from {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("client is closed")]
    Closed,
}

/// Where the platform lives and how requests authenticate.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub scheme: String,
    pub host: String,
    pub token_param: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        token_param: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            token_param: token_param.into(),
            access_token: access_token.into(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            &config.scheme,
            &config.host,
            &config.token_param,
            &config.access_token,
        )
    }
}

/// Authenticated access to the platform API.
///
/// The underlying reqwest client is a pooled handle, so one `PlatformClient`
/// is shared (behind an `Arc`) by every concurrent request.
pub struct PlatformClient {
    http: RwLock<Option<reqwest::Client>>,
    base_url: Url,
    credentials: Credentials,
}

impl PlatformClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self, ApiError> {
        let raw = format!("{}://{}", credentials.scheme, credentials.host);
        let base_url = Url::parse(&raw)
            .map_err(|e| ApiError::InvalidRequest(format!("bad API base URL {}: {}", raw, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| transport_error(&raw, source))?;

        Ok(Self {
            http: RwLock::new(Some(http)),
            base_url,
            credentials,
        })
    }

    pub async fn get<R: ApiRequest>(&self, request: &R) -> Result<R::Response, ApiError> {
        request.validate()?;
        let endpoint = request.endpoint();
        let url = self.url_for(&endpoint)?;
        let http = self.http()?;

        debug!("GET {}", endpoint);

        let response = http
            .get(url)
            .query(&[(&self.credentials.token_param, &self.credentials.access_token)])
            .send()
            .await
            .map_err(|source| transport_error(&endpoint, source))?;

        decode_response(&endpoint, response).await
    }

    pub async fn post<R: ApiPost>(&self, request: &R) -> Result<R::Response, ApiError> {
        request.validate()?;
        let endpoint = request.endpoint();
        let url = self.url_for(&endpoint)?;
        let http = self.http()?;

        debug!("POST {}", endpoint);

        let response = http
            .post(url)
            .query(&[(&self.credentials.token_param, &self.credentials.access_token)])
            .json(request.payload())
            .send()
            .await
            .map_err(|source| transport_error(&endpoint, source))?;

        decode_response(&endpoint, response).await
    }

    /// Drop the connection pool. Safe to call more than once; in-flight
    /// requests keep their own handle and finish normally.
    ///
    /// Returns `false` if the client was already closed.
    pub fn close(&self) -> bool {
        let mut slot = self.http.write().unwrap_or_else(|e| e.into_inner());
        let closed = slot.take().is_some();
        if closed {
            info!("Platform client closed");
        } else {
            debug!("Platform client already closed");
        }
        closed
    }

    fn http(&self) -> Result<reqwest::Client, ApiError> {
        self.http
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ApiError::Closed)
    }

    fn url_for(&self, endpoint: &str) -> Result<Url, ApiError> {
        if endpoint.trim().is_empty() {
            return Err(ApiError::InvalidRequest("endpoint is empty".to_string()));
        }
        self.base_url
            .join(endpoint)
            .map_err(|e| ApiError::InvalidRequest(format!("bad endpoint {}: {}", endpoint, e)))
    }
}

/// The request URL carries the access token, so it is dropped from the error.
fn transport_error(endpoint: &str, source: reqwest::Error) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        source: source.without_url(),
    }
}

async fn decode_response<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status,
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| transport_error(endpoint, source))?;

    serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}
