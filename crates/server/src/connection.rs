// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! WebSocket connection types.
//!
//! Frames carry JSON encoded events; a frame that does not decode into a
//! known event is rejected here and never reaches a lobby.
use anyhow::{Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    self as websocket, WebSocketStream,
    tungstenite::{Message as WsMessage, protocol::WebSocketConfig},
};

use blindrush_core::message::{ClientEvent, ServerEvent};

/// Maximum message length.
const MAX_MSG_LEN: usize = 16384;

/// A WebSocket connection carrying client and server events.
pub struct Connection {
    stream: WebSocketStream<TcpStream>,
}

impl Connection {
    /// Sends a [ServerEvent] as a JSON text frame.
    pub async fn send(&mut self, event: &ServerEvent) -> Result<()> {
        self.stream.send(WsMessage::text(event.to_json())).await?;

        Ok(())
    }

    /// Waits for a [ClientEvent].
    pub async fn recv(&mut self) -> Option<Result<ClientEvent>> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(payload))) => {
                    break Some(ClientEvent::from_json(payload.as_str()));
                }
                Some(Ok(WsMessage::Close(_))) => break None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => break Some(Err(anyhow!("Connection error: {e}"))),
                None => break None,
            }
        }
    }

    /// Closes this connection.
    pub async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Creates a [Connection] from a server stream.
pub async fn accept_async(stream: TcpStream) -> Result<Connection> {
    let config = WebSocketConfig::default().max_message_size(Some(MAX_MSG_LEN));
    let stream = websocket::accept_async_with_config(stream, Some(config)).await?;

    Ok(Connection { stream })
}
