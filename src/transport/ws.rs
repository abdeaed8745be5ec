//! Websocket implementation of the transport seam.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use super::{Connector, Link};
use crate::{Result, StreamError};

/// Connects [`WsLink`]s with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

/// One live websocket connection carrying text envelopes.
pub struct WsLink {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    type Link = WsLink;

    async fn connect(&self, url: &str) -> Result<WsLink> {
        let (inner, response) = connect_async(url).await.map_err(|e| {
            StreamError::connection_failed_with_source(url, "websocket handshake failed", Box::new(e))
        })?;
        debug!(%url, status = %response.status(), "websocket handshake complete");
        Ok(WsLink { inner })
    }
}

#[async_trait::async_trait]
impl Link for WsLink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket closed by remote");
                    return None;
                }
                // Pings are answered by tungstenite internally; nothing
                // else on this channel is meaningful to the protocol.
                Ok(other) => trace!(kind = ?other, "ignoring non-text websocket message"),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
