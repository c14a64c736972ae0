//! Inbound webhook listener.
//!
//! The platform POSTs message notifications to the configured local path.
//! Each request body is decoded into an [`InboundNotification`] and passed
//! to a [`MessageHandler`]; the handler's outcome decides the HTTP status so
//! the platform can tell delivered notifications from failed ones.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bot::{MessageHandler, Outcome};
use crate::config::ListenEndpoint;
use crate::platform::InboundNotification;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind webhook listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns the listening socket and its serve task.
pub struct WebhookServer {
    endpoint: ListenEndpoint,
    handler: Arc<dyn MessageHandler>,
    running: Mutex<Option<Running>>,
}

impl WebhookServer {
    pub fn new(endpoint: ListenEndpoint, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            endpoint,
            handler,
            running: Mutex::new(None),
        }
    }

    /// Bind and start serving in a background task.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested. Calling this on a running server is a no-op.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            warn!("Webhook server already running on {}", current.local_addr);
            return Ok(current.local_addr);
        }

        let addr = self.endpoint.addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let app = router(&self.endpoint.path, self.handler.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("Webhook server error: {}", e);
            }
        });

        info!(
            "Webhook server listening on http://{}{}",
            local_addr, self.endpoint.path
        );

        *running = Some(Running {
            local_addr,
            shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    /// Stop accepting connections and wait for the serve task to finish.
    ///
    /// Returns `false` if the server was not running.
    pub async fn stop(&self) -> bool {
        let running = self.running.lock().await.take();
        let Some(running) = running else {
            debug!("Webhook server not running");
            return false;
        };

        let _ = running.shutdown_tx.send(());
        if let Err(e) = running.task.await {
            warn!("Webhook server task ended abnormally: {}", e);
        }
        info!("Webhook server on {} stopped", running.local_addr);
        true
    }
}

/// Router serving `POST <path>`.
pub fn router(path: &str, handler: Arc<dyn MessageHandler>) -> Router {
    Router::new()
        .route(path, post(handle_notification))
        .with_state(handler)
}

async fn handle_notification(
    State(handler): State<Arc<dyn MessageHandler>>,
    body: Bytes,
) -> StatusCode {
    let notification: InboundNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!("Rejecting undecodable notification: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match handler.handle(notification).await {
        Outcome::Failed(reason) => {
            warn!("Notification not processed: {}", reason);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        outcome => {
            debug!("Notification handled: {:?}", outcome);
            StatusCode::OK
        }
    }
}
