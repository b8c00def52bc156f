use bazaar_core::{Frame, Role};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::errors::ClientError;

/// Where and how to connect.
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// Hub WebSocket endpoint, e.g. `ws://127.0.0.1:8787/ws`.
    pub url: String,
    pub role: Role,
    /// Display name hint sent with the upgrade request.
    pub name: Option<String>,
}

impl ConnectOptions {
    pub fn participant(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            role: Role::Participant,
            name: None,
        }
    }

    pub fn observer(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            role: Role::Observer,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The endpoint with `role` and `name` query parameters appended.
    pub fn request_url(&self) -> Result<String, ClientError> {
        let mut url =
            Url::parse(&self.url).map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme `{}`",
                url.scheme()
            )));
        }
        {
            let mut query = url.query_pairs_mut();
            let _ = query.append_pair("role", self.role.as_str());
            if let Some(name) = &self.name {
                let _ = query.append_pair("name", name);
            }
        }
        Ok(url.into())
    }
}

/// An open hub connection.
pub struct HubClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl HubClient {
    pub async fn connect(options: &ConnectOptions) -> Result<Self, ClientError> {
        let url = options.request_url()?;
        let (stream, _response) = connect_async(url.as_str()).await?;
        debug!(url = %url, role = %options.role, "connected to hub");
        Ok(Self { stream })
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<(), ClientError> {
        let text = frame.encode()?;
        self.send_raw(&text).await
    }

    /// Send text as-is, without checking it is a valid frame.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), ClientError> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Next decodable frame from the hub. Control messages and undecodable
    /// text are skipped; `None` once the hub closes the connection.
    pub async fn next_frame(&mut self) -> Option<Result<Frame, ClientError>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => match Frame::decode(text.as_str()) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(e) => warn!(error = %e, "skipping undecodable frame"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
