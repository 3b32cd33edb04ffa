//! WebSocket client for the realtime hold channel.
//!
//! The realtime listener runs on a port chosen at server startup, so
//! [`RealtimeClient`] normally asks the main HTTP API where it is
//! (`GET /api/v1/realtime`) before every connect.

use serde::Deserialize;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

use crate::error::ClientError;

pub type RealtimeStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Where the realtime endpoint is found.
#[derive(Debug, Clone)]
enum Endpoint {
    /// Discover the port through the HTTP side-channel at this base URL.
    Discover { http_base: String },
    /// Fixed WebSocket URL.
    Fixed(String),
}

/// Payload of `GET /api/v1/realtime`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStatus {
    pub status: String,
    pub port: u16,
    #[serde(default)]
    pub connected_clients: usize,
}

/// Configuration handle for the realtime endpoint.
pub struct RealtimeClient {
    endpoint: Endpoint,
    http: reqwest::Client,
}

/// A live connection to the realtime listener.
pub struct RealtimeConnection {
    /// The URL actually connected to.
    pub url: String,
    pub ws_stream: RealtimeStream,
}

impl RealtimeClient {
    /// Discover the realtime port through `{http_base}/api/v1/realtime`.
    pub fn discover(http_base: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::Discover {
                http_base: http_base.into().trim_end_matches('/').to_string(),
            },
            http: reqwest::Client::new(),
        }
    }

    /// Connect straight to a known `ws://host:port/ws` URL.
    pub fn fixed(ws_url: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::Fixed(ws_url.into()),
            http: reqwest::Client::new(),
        }
    }

    /// Resolve the WebSocket URL to connect to.
    pub async fn resolve_url(&self) -> Result<String, ClientError> {
        match &self.endpoint {
            Endpoint::Fixed(url) => Ok(url.clone()),
            Endpoint::Discover { http_base } => {
                let status = self.fetch_status(http_base).await?;
                if status.status != "running" {
                    return Err(ClientError::Connection(format!(
                        "Realtime service reports status '{}'",
                        status.status
                    )));
                }
                Ok(ws_url_for(http_base, status.port))
            }
        }
    }

    async fn fetch_status(&self, http_base: &str) -> Result<RealtimeStatus, ClientError> {
        let response = self
            .http
            .get(format!("{http_base}/api/v1/realtime"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Connect to the realtime WebSocket endpoint.
    pub async fn connect(&self) -> Result<RealtimeConnection, ClientError> {
        let url = self.resolve_url().await?;

        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Connection(format!("Failed to connect to {url}: {e}")))?;

        tracing::info!(url = %url, "Connected to realtime channel");

        Ok(RealtimeConnection { url, ws_stream })
    }
}

/// Build `ws(s)://host:port/ws` from the HTTP base URL and realtime port.
pub fn ws_url_for(http_base: &str, port: u16) -> String {
    let (scheme, rest) = match http_base.split_once("://") {
        Some(("https", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", http_base),
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    let host = match authority.rsplit_once(':') {
        // Keep bracketed IPv6 literals intact.
        Some((host, port)) if !port.contains(']') => host,
        _ => authority,
    };
    format!("{scheme}://{host}:{port}/ws")
}
