//! WebSocket transport built on tokio-tungstenite.
//!
//! Each [`Transport::open`] spawns one session task on the tokio runtime the
//! transport was given.  The task:
//!
//! 1. Performs the WebSocket handshake (`connect_async`) and posts `Opened`
//!    or `Failed`.
//! 2. Forwards inbound text frames as `Message` notifications.
//! 3. Writes outbound text queued by [`Transport::send`].
//! 4. Posts `Closed` on a close frame or end of stream, `Failed` on a
//!    read/write error.
//!
//! `send` never blocks: it pushes onto an unbounded channel drained by the
//! session task.  Dropping the channel (a new `open`, or dropping the
//! transport) ends the session with a close frame.
//!
//! # Portability
//!
//! Uses only `tokio::net` through tokio-tungstenite, which works identically
//! on Windows, Linux, and macOS.

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest, handshake::client::Request, Message as WsMessage,
    },
};
use tracing::{debug, info};

use super::{Transport, TransportError, TransportEvents};

/// Work item for the session task.
#[derive(Debug)]
enum Outbound {
    /// A text frame to write.
    Text(String),
    /// Send a close frame and wait for the peer to finish.
    Close,
}

/// A [`Transport`] that speaks WebSocket to the device side.
pub struct WsTransport {
    url: String,
    runtime: Handle,
    outbound: Option<UnboundedSender<Outbound>>,
}

impl WsTransport {
    /// Creates a transport for `url` (`ws://` or `wss://`) whose session
    /// tasks run on `runtime`.  No connection is made until `open`.
    pub fn new(url: impl Into<String>, runtime: Handle) -> Self {
        Self {
            url: url.into(),
            runtime,
            outbound: None,
        }
    }

    /// The target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    fn open(&mut self, events: TransportEvents) -> Result<(), TransportError> {
        // Validate synchronously so a malformed URL fails `connect` at once.
        let request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Handshake(format!("invalid URL {:?}: {e}", self.url)))?;

        // Replacing the sender ends any previous session.
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);

        debug!(attempt = events.attempt(), "starting WebSocket handshake with {}", self.url);
        self.runtime.spawn(run_session(request, events, rx));
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let tx = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(Outbound::Text(text.to_string()))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self) {
        if let Some(tx) = self.outbound.as_ref() {
            // An error means the session already ended and reported why.
            let _ = tx.send(Outbound::Close);
        }
    }
}

// ── Session task ──────────────────────────────────────────────────────────────

/// Runs one WebSocket connection from handshake to closure.
async fn run_session(
    request: Request,
    events: TransportEvents,
    mut outbound: UnboundedReceiver<Outbound>,
) {
    let attempt = events.attempt();
    let uri = request.uri().to_string();

    // The handshake can be abandoned (close, or the transport dropped) while
    // it is still in flight.
    let stream = tokio::select! {
        result = connect_async(request) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                events.failed(format!("handshake with {uri} failed: {e}"));
                return;
            }
        },
        _ = outbound.recv() => {
            events.closed(None, "closed before handshake completed");
            return;
        }
    };

    info!(attempt, "WebSocket connected to {uri}");
    events.opened();

    let (mut write, mut read) = stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            outgoing = outbound.recv(), if !closing => match outgoing {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        events.failed(format!("write failed: {e}"));
                        return;
                    }
                }
                Some(Outbound::Close) => {
                    debug!(attempt, "sending close frame");
                    closing = true;
                    if write.send(WsMessage::Close(None)).await.is_err() {
                        events.closed(None, "connection lost while closing");
                        return;
                    }
                }
                None => {
                    // The transport moved on; close politely and stop reporting.
                    let _ = write.send(WsMessage::Close(None)).await;
                    events.closed(None, "transport released the connection");
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    events.message(text);
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    events.closed(code, reason);
                    return;
                }
                // Pings are answered by tungstenite itself; binary frames are
                // not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if closing {
                        events.closed(None, format!("closed with error: {e}"));
                    } else {
                        events.failed(format!("read failed: {e}"));
                    }
                    return;
                }
                None => {
                    events.closed(None, "stream ended");
                    return;
                }
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
