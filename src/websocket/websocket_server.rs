use futures::{SinkExt, StreamExt};
use http::HeaderMap;
use log::{debug, error, info, trace};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

use crate::error::fixture_error::FixtureServerError;
use crate::error::fixture_error_enums::FixtureServerErrorKind;

/// Greeting pushed to every client as soon as its upgrade completes.
pub const GREETING: &str = "incoming";

/// Request line and headers of the most recent upgrade request.
#[derive(Debug, Clone)]
pub struct ClientHandshake {
    pub path: String,
    pub headers: HeaderMap,
}

#[derive(Default)]
struct SocketTables {
    last_handshake: Option<ClientHandshake>,
    received: Vec<String>,
    peers: HashMap<u64, mpsc::UnboundedSender<Message>>,
    next_peer_id: u64,
}

#[derive(Default)]
struct SocketState {
    tables: Mutex<SocketTables>,
    message_received: Notify,
}

impl SocketState {
    fn lock(&self) -> MutexGuard<'_, SocketTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_handshake(&self, request: &Request) {
        self.lock().last_handshake = Some(ClientHandshake {
            path: request.uri().path().to_string(),
            headers: request.headers().clone(),
        });
    }

    fn record_message(&self, text: &str) {
        self.lock().received.push(text.to_string());
        self.message_received.notify_waiters();
    }

    fn register_peer(&self, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let mut tables = self.lock();
        let id = tables.next_peer_id;
        tables.next_peer_id += 1;
        tables.peers.insert(id, sender);
        id
    }

    fn unregister_peer(&self, id: u64) {
        self.lock().peers.remove(&id);
    }
}

/// Minimal WebSocket endpoint for tests that exercise browser WebSocket APIs.
pub struct WebSocketServer {
    port: u16,
    state: Arc<SocketState>,
    shutdown_token: CancellationToken,
}

impl WebSocketServer {
    pub async fn start(port: u16) -> Result<Self, FixtureServerError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FixtureServerError::new(FixtureServerErrorKind::Bind(e), format!("Failed to bind {}", addr)))?;
        let port = listener
            .local_addr()
            .map_err(|e| FixtureServerError::new(FixtureServerErrorKind::Bind(e), "Failed to read bound address"))?
            .port();

        let state = Arc::new(SocketState::default());
        let shutdown_token = CancellationToken::new();
        tokio::task::spawn(accept_sockets(listener, state.clone(), shutdown_token.clone()));

        info!("WebSocket test server listening on ws://localhost:{}", port);
        Ok(WebSocketServer { port, state, shutdown_token })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn prefix(&self) -> String {
        format!("ws://localhost:{}", self.port)
    }

    pub fn last_client_handshake(&self) -> Option<ClientHandshake> {
        self.state.lock().last_handshake.clone()
    }

    pub fn received_messages(&self) -> Vec<String> {
        self.state.lock().received.clone()
    }

    /// Resolves once at least `count` text messages have been received.
    pub async fn wait_for_messages(&self, count: usize) -> Vec<String> {
        loop {
            let notified = self.state.message_received.notified();
            {
                let tables = self.state.lock();
                if tables.received.len() >= count {
                    return tables.received.clone();
                }
            }
            notified.await;
        }
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Sends `text` to every open connection.
    pub fn broadcast(&self, text: &str) {
        let tables = self.state.lock();
        for sender in tables.peers.values() {
            let _ = sender.send(Message::text(text.to_string()));
        }
    }

    pub fn stop(&self) {
        if self.shutdown_token.is_cancelled() {
            return;
        }
        info!("Stopping WebSocket test server on port {}", self.port);
        self.shutdown_token.cancel();
        self.state.lock().peers.clear();
    }
}

impl Drop for WebSocketServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_sockets(listener: TcpListener, state: Arc<SocketState>, shutdown_token: CancellationToken) {
    loop {
        select! {
            _ = shutdown_token.cancelled() => {
                trace!("Termination signal received, stopping WebSocket listener");
                return;
            },
            result = listener.accept() => {
                match result {
                    Ok((tcp_stream, remote_addr)) => {
                        trace!("Accepted WebSocket connection from {}", remote_addr);
                        tokio::task::spawn(serve_socket(tcp_stream, state.clone(), shutdown_token.clone()));
                    }
                    Err(err) => {
                        error!("Failed to accept WebSocket connection: {:?}", err);
                    }
                }
            }
        }
    }
}

async fn serve_socket(tcp_stream: TcpStream, state: Arc<SocketState>, shutdown_token: CancellationToken) {
    let handshake_state = state.clone();
    let upgrade = tokio_tungstenite::accept_hdr_async(tcp_stream, move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        handshake_state.record_handshake(request);
        Ok(response)
    });
    let ws_stream = select! {
        _ = shutdown_token.cancelled() => return,
        result = upgrade => match result {
            Ok(ws_stream) => ws_stream,
            Err(err) => {
                debug!("WebSocket handshake failed: {}", err);
                return;
            }
        },
    };

    let (mut sink, mut stream) = ws_stream.split();
    let (sender, mut outgoing) = mpsc::unbounded_channel();
    let _ = sender.send(Message::text(GREETING.to_string()));
    let peer_id = state.register_peer(sender);

    let writer = async {
        while let Some(message) = outgoing.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    };

    let reader = async {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => state.record_message(text.as_str()),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!("WebSocket read error: {}", err);
                    break;
                }
            }
        }
    };

    select! {
        _ = shutdown_token.cancelled() => {},
        _ = writer => {},
        _ = reader => {},
    }

    state.unregister_peer(peer_id);
}
