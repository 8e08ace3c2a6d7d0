//! Loopback OAuth callback server
//!
//! Listens on the redirect URI's loopback address and captures the first
//! request to its path. The query is handed over unvalidated as
//! [`CallbackParams`]; state checking belongs to the session manager.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use shopdesk_common::auth::CallbackParams;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::{Host, Url};

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Complete</title></head>
<body><h1>Sign-in received</h1><p>You can close this window and return to the terminal.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Failed</title></head>
<body><h1>Sign-in failed</h1><p>The authorization server returned an error. See the terminal for details.</p></body>
</html>"#;

/// Error type for the loopback server
#[derive(Debug, Error)]
pub enum CallbackServerError {
    #[error("redirect URI cannot be served locally: {0}")]
    InvalidRedirectUri(String),

    #[error("failed to bind callback server on {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    #[error("timed out after {0:?} waiting for the authorization callback")]
    Timeout(Duration),

    #[error("callback server stopped before a callback arrived")]
    Closed,

    #[error("callback server task failed: {0}")]
    Server(String),
}

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// Loopback HTTP server that receives the authorization redirect
pub struct CallbackServer {
    redirect_uri: Url,
    receiver: Option<oneshot::Receiver<CallbackParams>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind to the host and port of `redirect_uri`
    ///
    /// Port `0` binds an ephemeral port; [`CallbackServer::redirect_uri`]
    /// then reports the real one.
    ///
    /// # Errors
    /// - [`CallbackServerError::InvalidRedirectUri`] unless the URI is plain
    ///   `http` on a loopback host
    /// - [`CallbackServerError::Bind`] if the port is taken
    pub async fn bind(redirect_uri: &str) -> Result<Self, CallbackServerError> {
        let mut redirect_uri = Url::parse(redirect_uri)
            .map_err(|e| CallbackServerError::InvalidRedirectUri(format!("{redirect_uri}: {e}")))?;
        let addr = loopback_addr(&redirect_uri)?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CallbackServerError::Bind { addr, message: e.to_string() })?;
        let local = listener
            .local_addr()
            .map_err(|e| CallbackServerError::Bind { addr, message: e.to_string() })?;
        redirect_uri
            .set_port(Some(local.port()))
            .map_err(|()| CallbackServerError::InvalidRedirectUri(redirect_uri.to_string()))?;

        let (callback_tx, callback_rx) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(callback_tx)));
        let app = Router::new()
            .route(redirect_uri.path(), get(handle_callback))
            .with_state(slot);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "OAuth callback server error");
            }
        });

        info!(addr = %local, path = redirect_uri.path(), "callback server listening");
        Ok(Self {
            redirect_uri,
            receiver: Some(callback_rx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Redirect URI this server answers, with the bound port
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Wait for the redirect, at most `timeout`
    ///
    /// # Errors
    /// - [`CallbackServerError::Timeout`] if nothing arrived in time
    /// - [`CallbackServerError::Closed`] if called again after a result
    pub async fn wait_for_callback(
        &mut self,
        timeout: Duration,
    ) -> Result<CallbackParams, CallbackServerError> {
        let receiver = self.receiver.as_mut().ok_or(CallbackServerError::Closed)?;
        let received = tokio::time::timeout(timeout, receiver)
            .await
            .map_err(|_| CallbackServerError::Timeout(timeout))?;
        self.receiver = None;
        received.map_err(|_| CallbackServerError::Closed)
    }

    /// Shut down the server gracefully
    ///
    /// # Errors
    /// Returns [`CallbackServerError::Server`] if the server task panicked.
    pub async fn shutdown(mut self) -> Result<(), CallbackServerError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(CallbackServerError::Server(format!("panicked: {err}")));
                }
            }
        }

        debug!("callback server stopped");
        Ok(())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    Query(query): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let params = CallbackParams::from_pairs(query);
    let page = if params.error.is_some() { FAILURE_PAGE } else { SUCCESS_PAGE };

    match slot.lock().await.take() {
        Some(tx) => {
            debug!(
                has_code = params.code.is_some(),
                has_error = params.error.is_some(),
                "authorization callback received"
            );
            let _ = tx.send(params);
        }
        None => debug!("ignoring repeated callback request"),
    }
    Html(page)
}

fn loopback_addr(redirect_uri: &Url) -> Result<SocketAddr, CallbackServerError> {
    if redirect_uri.scheme() != "http" {
        return Err(CallbackServerError::InvalidRedirectUri(format!(
            "{redirect_uri}: only http loopback redirects can be served"
        )));
    }
    let port = redirect_uri.port_or_known_default().unwrap_or(80);
    match redirect_uri.host() {
        Some(Host::Domain("localhost")) => Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port))),
        Some(Host::Ipv4(ip)) if ip.is_loopback() => Ok(SocketAddr::from((ip, port))),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => Ok(SocketAddr::from((Ipv6Addr::LOCALHOST, port))),
        _ => Err(CallbackServerError::InvalidRedirectUri(format!(
            "{redirect_uri}: host is not a loopback address"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_code_and_state() {
        let mut server = CallbackServer::bind("http://127.0.0.1:0/callback").await.expect("bind");
        let url = format!("{}?code=abc&state=xyz", server.redirect_uri());

        let response = reqwest::get(&url).await.expect("request");
        assert_eq!(response.status(), 200);
        assert!(response.text().await.expect("body").contains("Sign-in received"));

        let params = server.wait_for_callback(Duration::from_secs(2)).await.expect("callback");
        assert_eq!(params, CallbackParams::new(Some("abc"), Some("xyz")));
        server.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_error_redirect_is_captured() {
        let mut server = CallbackServer::bind("http://localhost:0/cb").await.expect("bind");
        let url = format!(
            "{}?error=access_denied&error_description=User%20cancelled",
            server.redirect_uri()
        );

        let body = reqwest::get(&url).await.expect("request").text().await.expect("body");
        assert!(body.contains("Sign-in failed"));

        let params = server.wait_for_callback(Duration::from_secs(2)).await.expect("callback");
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User cancelled"));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let mut server = CallbackServer::bind("http://127.0.0.1:0/callback").await.expect("bind");
        let err = server.wait_for_callback(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, CallbackServerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_loopback_redirects() {
        for uri in ["https://localhost:4200/callback", "http://shop.example.com/callback", "nope"] {
            assert!(
                matches!(
                    CallbackServer::bind(uri).await,
                    Err(CallbackServerError::InvalidRedirectUri(_))
                ),
                "{uri}"
            );
        }
    }
}
