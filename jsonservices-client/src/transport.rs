//! Transport abstraction
//!
//! The engine only needs three operations from a transport: open a connection
//! to a URL, send a text frame, and close. Everything that happens afterwards
//! arrives as a [`TransportEvent`] through the [`TransportSink`] handed to
//! [`Transport::open`]:
//!
//! 1. `Open` once the connection is established, or `Error` if it never is
//! 2. any number of `Message` frames
//! 3. `Error` for failures after open, then exactly one `Close`
//!
//! Each sink is bound to one connection attempt. Events emitted through the
//! sink of a discarded attempt are ignored by the engine, so a transport never
//! needs to worry about late events.
//!
//! [`WebSocketTransport`] is the default implementation, on `tokio-tungstenite`.

use futures::{SinkExt, StreamExt};
use jsonservices_core::{codec, Error, Result, NORMAL_CLOSURE};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Close code reported when the connection dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the peer sent a close frame without a code
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Payload of an incoming frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text frame
    Text(String),
    /// Binary frame, decoded as UTF-8 before parsing
    Binary(Vec<u8>),
}

impl Payload {
    /// Frame content as text
    pub fn into_text(self) -> String {
        match self {
            Payload::Text(text) => text,
            Payload::Binary(data) => codec::text_from_binary(&data),
        }
    }
}

/// Something that happened on a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established
    Open,
    /// The connection failed, before or after open
    Error(String),
    /// A frame arrived
    Message(Payload),
    /// The connection is gone
    Close {
        /// WebSocket close code
        code: u16,
        /// Close reason, possibly empty
        reason: String,
    },
}

/// Event sent from a transport sink to the engine
#[derive(Debug)]
pub(crate) struct TaggedEvent {
    pub(crate) generation: u64,
    pub(crate) event: TransportEvent,
}

/// Delivers the events of one connection attempt to the engine
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl TransportSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    /// Report an event; silently dropped once the client is gone
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(TaggedEvent {
            generation: self.generation,
            event,
        });
    }
}

/// Opens connections
pub trait Transport: Send + Sync + 'static {
    /// Start connecting to `url`
    ///
    /// Must return immediately; the outcome is reported through `sink`.
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn TransportHandle>;
}

/// An open (or opening) connection
pub trait TransportHandle: Send {
    /// Queue a text frame
    fn send(&mut self, text: String) -> Result<()>;

    /// Close the connection with a normal close code
    fn close(&mut self);
}

/// WebSocket transport on `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

enum Outbound {
    Text(String),
    Close,
}

struct WebSocketHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl TransportHandle for WebSocketHandle {
    fn send(&mut self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| Error::NotConnected)
    }

    fn close(&mut self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn TransportHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_websocket(url.to_string(), sink, rx));
        Box::new(WebSocketHandle { tx })
    }
}

#[tracing::instrument(skip(sink, outbound))]
async fn run_websocket(url: String, sink: TransportSink, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::debug!(error = %e, "websocket connect failed");
            sink.emit(TransportEvent::Error(e.to_string()));
            return;
        }
    };
    sink.emit(TransportEvent::Open);

    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        sink.emit(TransportEvent::Error(e.to_string()));
                        sink.emit(TransportEvent::Close { code: ABNORMAL_CLOSURE, reason: String::new() });
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let frame = CloseFrame { code: CloseCode::Normal, reason: "".into() };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "close frame not sent");
                    }
                    sink.emit(TransportEvent::Close { code: NORMAL_CLOSURE, reason: String::new() });
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => sink.emit(TransportEvent::Message(Payload::Text(text))),
                Some(Ok(Message::Binary(data))) => sink.emit(TransportEvent::Message(Payload::Binary(data))),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                    tracing::debug!(code, reason = %reason, "websocket closed by peer");
                    sink.emit(TransportEvent::Close { code, reason });
                    return;
                }
                // ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.emit(TransportEvent::Error(e.to_string()));
                    sink.emit(TransportEvent::Close { code: ABNORMAL_CLOSURE, reason: String::new() });
                    return;
                }
                None => {
                    sink.emit(TransportEvent::Close { code: ABNORMAL_CLOSURE, reason: String::new() });
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_payload_decodes_as_text() {
        let payload = Payload::Binary(br#"{"method":"X"}"#.to_vec());
        assert_eq!(payload.into_text(), r#"{"method":"X"}"#);
    }

    #[tokio::test]
    async fn test_sink_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = TransportSink::new(7, tx);
        sink.emit(TransportEvent::Open);

        let tagged = rx.recv().await.unwrap();
        assert_eq!(tagged.generation, 7);
        assert_eq!(tagged.event, TransportEvent::Open);

        // the engine is gone: emitting is a no-op
        drop(rx);
        sink.emit(TransportEvent::Open);
    }

    #[tokio::test]
    async fn test_websocket_connect_failure_reports_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = WebSocketTransport.open("ws://127.0.0.1:1", TransportSink::new(1, tx));

        let tagged = rx.recv().await.unwrap();
        assert!(matches!(tagged.event, TransportEvent::Error(_)));
    }
}
