//! Common test utilities for jsonservices-client integration tests
//!
//! [`MockServer`] is an in-memory transport: it answers calls through a
//! responder function and lets tests push frames and close the connection at
//! will. [`MockWsServer`] is a real WebSocket server on a local port.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use jsonservices_client::{
    ClientBuilder, Payload, Transport, TransportEvent, TransportHandle, TransportSink, ABNORMAL_CLOSURE,
};
use jsonservices_core::{Error, Result, NORMAL_CLOSURE};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Produces the reply frame for a request, or `None` to stay silent
pub type Responder = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Success reply for the request's ID
pub fn mock_response(request: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": request["id"], "result": result})
}

/// Error reply for the request's ID
pub fn mock_error(request: &Value, code: i32, message: &str, data: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": {"code": code, "message": message, "data": data}
    })
}

/// Answers `rpc.authenticate` with session `abc` and `rpc.subscription` with `{}`
pub fn default_reply(request: &Value) -> Option<Value> {
    match request["method"].as_str() {
        Some("rpc.authenticate") => Some(mock_response(request, json!({"SessionId": "abc"}))),
        Some("rpc.subscription") => Some(mock_response(request, json!({}))),
        _ => None,
    }
}

struct ServerState {
    sinks: Vec<TransportSink>,
    frames: Vec<String>,
    responder: Responder,
    refuse: Option<String>,
    auto_open: bool,
    closes: usize,
    follow_ups: Vec<(String, Value)>,
}

/// In-memory transport with scripted replies
#[derive(Clone)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    /// Accept connections and answer with [`default_reply`]
    pub fn new() -> Self {
        Self::with_responder(default_reply)
    }

    /// Accept connections and answer with `responder`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                sinks: Vec::new(),
                frames: Vec::new(),
                responder: Arc::new(responder),
                refuse: None,
                auto_open: true,
                closes: 0,
                follow_ups: Vec::new(),
            })),
        }
    }

    /// Fail every connection attempt with `message`
    pub fn refusing(message: &str) -> Self {
        let server = Self::new();
        server.set_refuse(Some(message));
        server
    }

    /// Fail (or stop failing) connection attempts
    pub fn set_refuse(&self, message: Option<&str>) {
        self.state.lock().unwrap().refuse = message.map(str::to_string);
    }

    /// Hold connection attempts until [`MockServer::open`] is called
    pub fn set_auto_open(&self, auto_open: bool) {
        self.state.lock().unwrap().auto_open = auto_open;
    }

    /// Replace the responder
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.state.lock().unwrap().responder = Arc::new(responder);
    }

    /// Push `frame` right behind every reply to `method`
    pub fn push_after_reply(&self, method: &str, frame: Value) {
        self.state
            .lock()
            .unwrap()
            .follow_ups
            .push((method.to_string(), frame));
    }

    /// The transport to hand to the builder
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// A builder wired to this server, with a short reconnect interval
    pub fn builder(&self) -> ClientBuilder {
        ClientBuilder::new("mock://server")
            .transport(self.transport())
            .reconnect_interval(Duration::from_millis(20))
    }

    /// Number of connection attempts so far
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().sinks.len()
    }

    /// Number of times the client closed a connection
    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Raw frames sent by the client
    pub fn frames(&self) -> Vec<String> {
        self.state.lock().unwrap().frames.clone()
    }

    /// Frames sent by the client, parsed
    pub fn requests(&self) -> Vec<Value> {
        self.frames()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    /// Parsed frames with the given method
    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|request| request["method"] == method)
            .collect()
    }

    /// Report the latest connection attempt as open
    pub fn open(&self) {
        self.emit(TransportEvent::Open);
    }

    /// Push a text frame on the latest connection
    pub fn push(&self, frame: Value) {
        self.push_text(&frame.to_string());
    }

    /// Push raw text on the latest connection
    pub fn push_text(&self, text: &str) {
        self.emit(TransportEvent::Message(Payload::Text(text.to_string())));
    }

    /// Push a binary frame on the latest connection
    pub fn push_binary(&self, frame: Value) {
        self.emit(TransportEvent::Message(Payload::Binary(frame.to_string().into_bytes())));
    }

    /// Close the latest connection from the server side
    pub fn close(&self, code: u16) {
        self.emit(TransportEvent::Close {
            code,
            reason: String::new(),
        });
    }

    /// Drop the latest connection without a close frame
    pub fn abort(&self) {
        self.emit(TransportEvent::Error("connection reset".into()));
        self.close(ABNORMAL_CLOSURE);
    }

    fn emit(&self, event: TransportEvent) {
        let sink = self.state.lock().unwrap().sinks.last().cloned();
        sink.expect("no connection attempt yet").emit(event);
    }
}

impl Transport for MockServer {
    fn open(&self, _url: &str, sink: TransportSink) -> Box<dyn TransportHandle> {
        let mut state = self.state.lock().unwrap();
        state.sinks.push(sink.clone());
        if let Some(message) = &state.refuse {
            sink.emit(TransportEvent::Error(message.clone()));
            sink.emit(TransportEvent::Close {
                code: ABNORMAL_CLOSURE,
                reason: String::new(),
            });
        } else if state.auto_open {
            sink.emit(TransportEvent::Open);
        }
        Box::new(MockHandle {
            state: Arc::clone(&self.state),
            sink,
            closed: false,
        })
    }
}

struct MockHandle {
    state: Arc<Mutex<ServerState>>,
    sink: TransportSink,
    closed: bool,
}

impl TransportHandle for MockHandle {
    fn send(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        let request: Value = serde_json::from_str(&text).unwrap();
        let (responder, follow_ups) = {
            let mut state = self.state.lock().unwrap();
            state.frames.push(text.clone());
            let follow_ups: Vec<Value> = state
                .follow_ups
                .iter()
                .filter(|(method, _)| request["method"] == method.as_str())
                .map(|(_, frame)| frame.clone())
                .collect();
            (Arc::clone(&state.responder), follow_ups)
        };
        if request.get("id").is_some() {
            if let Some(reply) = responder(&request) {
                self.sink
                    .emit(TransportEvent::Message(Payload::Text(reply.to_string())));
                for frame in follow_ups {
                    self.sink
                        .emit(TransportEvent::Message(Payload::Text(frame.to_string())));
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.state.lock().unwrap().closes += 1;
        self.sink.emit(TransportEvent::Close {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        });
    }
}

/// Errors passed to the diagnostic hook
#[derive(Clone, Default)]
pub struct ErrorLog {
    errors: Arc<Mutex<Vec<Error>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the log as the builder's diagnostic hook
    pub fn install(&self, builder: ClientBuilder) -> ClientBuilder {
        let errors = Arc::clone(&self.errors);
        builder.on_error(move |e| errors.lock().unwrap().push(e.clone()))
    }

    pub fn errors(&self) -> Vec<Error> {
        self.errors.lock().unwrap().clone()
    }

    pub fn codes(&self) -> Vec<Option<i32>> {
        self.errors().iter().map(Error::code).collect()
    }
}

/// Wait until `condition` holds, failing the test after two seconds
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Mock WebSocket server for client testing
///
/// Every text frame is passed to the handler; a returned value is sent back.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::UnboundedReceiver<String>,
}

impl MockWsServer {
    /// Start a server answering with [`default_reply`]
    pub async fn new() -> Self {
        Self::with_handler(|request| async move { default_reply(&request) }).await
    }

    /// Start a server with a custom request handler
    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, message_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let handler = Arc::clone(&handler);
                        let msg_tx = msg_tx.clone();
                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();
                            while let Some(Ok(message)) = read.next().await {
                                let Message::Text(text) = message else { continue };
                                let _ = msg_tx.send(text.clone());
                                let Ok(request) = serde_json::from_str::<Value>(&text) else { continue };
                                if request.get("id").is_none() {
                                    continue;
                                }
                                if let Some(reply) = handler(request).await {
                                    if write.send(Message::Text(reply.to_string())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx,
        }
    }

    /// WebSocket URL of the server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next text frame received from any client
    pub async fn next_message(&mut self) -> Option<Value> {
        let text = tokio::time::timeout(Duration::from_secs(2), self.message_rx.recv())
            .await
            .ok()??;
        serde_json::from_str(&text).ok()
    }

    /// Stop accepting connections
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
