//! WebSocket transport
//!
//! This file implements the WebSocket server that translates protocol JSON
//! frames into handler calls and subscription sessions. Responsibilities:
//! - Accept TCP/WebSocket connections, refusing those beyond `max_connections`
//! - Create a `Client` per connection whose outbound queue is drained by a
//!   dedicated send task
//! - Answer `write`/`read` synchronously on the same connection
//! - Run one `Session` task per subscribed channel, cancelled on
//!   `unsubscribe` or when the socket closes
//!
//! The core never sees the socket: sessions push into the `Client` queue, and
//! a failed socket write closes that queue so sessions end on their own.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::message::ChannelId;
use crate::client::Client;
use crate::config::Settings;
use crate::handlers::{ReadRequest, Services, WriteRequest};
use crate::session::{Session, TerminationReason};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::ServerError;

/// Bind `addr` and serve until the listener fails.
pub async fn start_websocket_server(
    addr: String,
    services: Services,
    settings: Settings,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    serve(listener, services, settings.server.max_connections).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    services: Services,
    max_connections: usize,
) -> Result<(), ServerError> {
    info!(addr = %listener.local_addr()?, "WebSocket server listening");

    let slots = Arc::new(Semaphore::new(max_connections));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let services = services.clone();
        let slots = slots.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, services, slots).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    services: Services,
    slots: Arc<Semaphore>,
) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    let Ok(_permit) = slots.try_acquire_owned() else {
        warn!(%peer, "connection refused: too many connections");
        if let Ok(text) = serde_json::to_string(&ServerMessage::error(
            "too_many_connections",
            "server is at its connection limit",
        )) {
            let _ = ws_stream.send(WsMessage::text(text)).await;
        }
        let _ = ws_stream.close(None).await;
        return;
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    let client_id = client.id.clone();
    info!(client = %client_id, %peer, "connected");

    let send_loop = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!(client = %client_id, error = %e, "failed to send frame");
                    break;
                }
            }
            // Dropping `rx` here makes every later push from a session fail.
            drop(rx);
            let _ = ws_sender.close().await;
            debug!(client = %client_id, "send loop closed");
        })
    };

    let mut connection = Connection::new(client, services);

    while let Some(frame) = ws_receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                debug!(client = %client_id, error = %e, "read failed");
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(request) => connection.handle(request),
            Err(err) => {
                warn!(
                    client = %client_id,
                    error = %err,
                    frame = %text.chars().take(100).collect::<String>(),
                    "invalid client message"
                );
                connection.reply(&ServerMessage::error("bad_request", err.to_string()));
            }
        }
        connection.reap();
    }

    connection.shutdown().await;
    if let Err(e) = send_loop.await {
        error!(client = %client_id, error = %e, "send loop panicked");
    }
    info!(client = %client_id, "disconnected");
}

/// Per-connection state: the client queue and its subscription sessions.
pub(super) struct Connection {
    client: Client,
    services: Services,
    cancel: CancellationToken,
    subscriptions: HashMap<ChannelId, (u64, CancellationToken)>,
    sessions: JoinSet<(ChannelId, u64, TerminationReason)>,
    next_seq: u64,
}

impl Connection {
    pub(super) fn new(client: Client, services: Services) -> Self {
        Self {
            client,
            services,
            cancel: CancellationToken::new(),
            subscriptions: HashMap::new(),
            sessions: JoinSet::new(),
            next_seq: 0,
        }
    }

    pub(super) fn reply(&self, msg: &ServerMessage) {
        if let Err(e) = self.client.send(msg) {
            debug!(client = %self.client.id, error = %e, "reply dropped");
        }
    }

    pub(super) fn handle(&mut self, request: ClientMessage) {
        match request {
            ClientMessage::Write {
                channel_id,
                content,
            } => match self
                .services
                .writer
                .write(WriteRequest { channel_id, content })
            {
                Ok(message) => self.reply(&ServerMessage::written(&message)),
                Err(e) => self.reply(&ServerMessage::from(&e)),
            },

            ClientMessage::Read { id } => match self.services.reader.read(ReadRequest { id }) {
                Ok(message) => self.reply(&ServerMessage::message(&message)),
                Err(e) => self.reply(&ServerMessage::from(&e)),
            },

            ClientMessage::Subscribe { channel_id } => self.subscribe(channel_id),

            ClientMessage::Unsubscribe { channel_id } => {
                if let Some((_, token)) = self.subscriptions.remove(&channel_id) {
                    token.cancel();
                }
                self.reply(&ServerMessage::Unsubscribed { channel_id });
            }
        }
    }

    pub(super) fn subscribe(&mut self, channel_id: ChannelId) {
        if self.subscriptions.contains_key(&channel_id) {
            self.reply(&ServerMessage::Subscribed { channel_id });
            return;
        }

        let mut session = Session::new(
            self.services.bus.clone(),
            self.services.routing,
            channel_id,
            self.client.clone(),
        );
        if let Err(e) = session.activate() {
            self.reply(&ServerMessage::error(e.as_label(), e.to_string()));
            return;
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let token = self.cancel.child_token();
        self.subscriptions.insert(channel_id, (seq, token.clone()));

        // Acknowledge before the session task can push its first event.
        self.reply(&ServerMessage::Subscribed { channel_id });

        self.sessions.spawn(async move {
            let reason = session.run(&token).await;
            (channel_id, seq, reason)
        });
    }

    pub(super) fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Forget sessions that ended on their own so the channel can be
    /// subscribed again.
    pub(super) fn reap(&mut self) {
        while let Some(joined) = self.sessions.try_join_next() {
            match joined {
                Ok((channel_id, seq, reason)) => {
                    if self
                        .subscriptions
                        .get(&channel_id)
                        .is_some_and(|(current, _)| *current == seq)
                    {
                        self.subscriptions.remove(&channel_id);
                    }
                    debug!(client = %self.client.id, channel_id, reason = reason.as_label(), "session reaped");
                }
                Err(e) => error!(client = %self.client.id, error = %e, "session task failed"),
            }
        }
    }

    /// Cancel every session and wait for them to release the bus.
    pub(super) async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(joined) = self.sessions.join_next().await {
            if let Err(e) = joined {
                error!(client = %self.client.id, error = %e, "session task failed");
            }
        }
        self.subscriptions.clear();
    }
}
