//! The one live channel to the coordination endpoint.
//!
//! A [`Connection`] owns a background actor task that holds the WebSocket,
//! reconnects with [`ReconnectPolicy`] when the handshake fails or the
//! socket drops, and hands inbound frames to a single consumer in arrival
//! order. Lifecycle transitions are delivered in the same stream as the
//! frames so a consumer sees `Connected`, the events of that session, then
//! `Disconnected`, never interleaved differently.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backoff::ReconnectPolicy;
use crate::endpoint::ConnectionEndpoint;
use crate::error::LinkError;
use crate::protocol::ChannelEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INBOX_CAPACITY: usize = 256;
const OUTBOUND_CAPACITY: usize = 64;
const LIFECYCLE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Connected,
    /// Waiting before retry; `failures` consecutive attempts have failed.
    Backoff { failures: u32 },
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLifecycle {
    /// `session` counts the channels this connection has opened, from 1.
    Connected { session: u64 },
    Disconnected { reason: String },
}

/// What the actor hands to the consumer, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(ChannelEvent),
    Lifecycle(LinkLifecycle),
}

struct Outbound {
    text: String,
    ack: oneshot::Sender<Result<(), LinkError>>,
}

struct Shared {
    endpoint: ConnectionEndpoint,
    outbound: mpsc::Sender<Outbound>,
    status: watch::Receiver<LinkStatus>,
    lifecycle: broadcast::Sender<LinkLifecycle>,
    cancel: CancellationToken,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to the channel. Cheap to clone; the actor stops when the last
/// clone is dropped or [`Connection::close`] is called.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.shared.endpoint)
            .field("status", &self.status())
            .finish()
    }
}

impl Connection {
    /// Start connecting in the background. Must be called inside a tokio
    /// runtime. The receiver yields every inbound frame and lifecycle
    /// transition; it ends once the connection is closed for good.
    pub fn connect(
        endpoint: ConnectionEndpoint,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<Inbound>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (status_tx, status_rx) = watch::channel(LinkStatus::Connecting);
        let (lifecycle_tx, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        let cancel = CancellationToken::new();

        let actor = Actor {
            endpoint: endpoint.clone(),
            policy,
            outbound: outbound_rx,
            status: status_tx,
            lifecycle: lifecycle_tx.clone(),
            inbox: inbox_tx,
            cancel: cancel.clone(),
            sessions: 0,
        };
        tokio::spawn(actor.run());

        let shared = Shared {
            endpoint,
            outbound: outbound_tx,
            status: status_rx,
            lifecycle: lifecycle_tx,
            cancel,
        };
        (
            Self {
                shared: Arc::new(shared),
            },
            inbox_rx,
        )
    }

    pub fn endpoint(&self) -> &ConnectionEndpoint {
        &self.shared.endpoint
    }

    pub fn status(&self) -> LinkStatus {
        *self.shared.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == LinkStatus::Connected
    }

    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.shared.status.clone()
    }

    /// Lifecycle transitions from now on, for observers other than the
    /// inbox consumer.
    pub fn lifecycle(&self) -> broadcast::Receiver<LinkLifecycle> {
        self.shared.lifecycle.subscribe()
    }

    /// Write one event to the live channel.
    ///
    /// Fails with [`LinkError::NotConnected`] when no channel is up. Nothing
    /// is buffered for later delivery.
    pub async fn send(&self, event: &ChannelEvent) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let text = event.to_json()?;
        let (ack, acked) = oneshot::channel();
        self.shared
            .outbound
            .send(Outbound { text, ack })
            .await
            .map_err(|_| LinkError::Closed)?;
        acked.await.map_err(|_| LinkError::Closed)?
    }

    /// Resolve once the channel is up. Fails if the connection closes first.
    pub async fn wait_connected(&self) -> Result<(), LinkError> {
        let mut status = self.watch_status();
        let reached = status
            .wait_for(|s| matches!(s, LinkStatus::Connected | LinkStatus::Closed))
            .await
            .map_err(|_| LinkError::Closed)?;
        match *reached {
            LinkStatus::Connected => Ok(()),
            _ => Err(LinkError::Closed),
        }
    }

    /// Stop reconnecting and close the socket.
    pub fn close(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.status() == LinkStatus::Closed
    }
}

enum Ended {
    Cancelled,
    Lost(String),
}

struct Actor {
    endpoint: ConnectionEndpoint,
    policy: ReconnectPolicy,
    outbound: mpsc::Receiver<Outbound>,
    status: watch::Sender<LinkStatus>,
    lifecycle: broadcast::Sender<LinkLifecycle>,
    inbox: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
    sessions: u64,
}

impl Actor {
    async fn run(mut self) {
        let mut failures = 0u32;

        'reconnect: loop {
            self.status.send_replace(LinkStatus::Connecting);
            self.reject_pending();
            debug!(endpoint = %self.endpoint, failures, "connecting");

            let attempt = {
                let handshake = tokio::time::timeout(
                    self.policy.connect_timeout,
                    tokio_tungstenite::connect_async(self.endpoint.as_str()),
                );
                tokio::pin!(handshake);
                loop {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break 'reconnect,
                        r = &mut handshake => break r,
                        Some(req) = self.outbound.recv() => {
                            let _ = req.ack.send(Err(LinkError::NotConnected));
                        }
                    }
                }
            };

            match attempt {
                Ok(Ok((ws, _))) => {
                    failures = 0;
                    self.sessions += 1;
                    // Commands queued before this session must not reach it.
                    self.reject_pending();
                    info!(
                        endpoint = %self.endpoint,
                        session = self.sessions,
                        "meet channel connected"
                    );
                    self.status.send_replace(LinkStatus::Connected);
                    self.signal(LinkLifecycle::Connected {
                        session: self.sessions,
                    })
                    .await;

                    match self.pump(ws).await {
                        Ended::Cancelled => {
                            info!(endpoint = %self.endpoint, "meet channel closed");
                            self.signal(LinkLifecycle::Disconnected {
                                reason: "closed".into(),
                            })
                            .await;
                            break 'reconnect;
                        }
                        Ended::Lost(reason) => {
                            self.status.send_replace(LinkStatus::Connecting);
                            self.reject_pending();
                            warn!(endpoint = %self.endpoint, %reason, "meet channel lost");
                            self.signal(LinkLifecycle::Disconnected { reason }).await;
                        }
                    }
                }
                Ok(Err(e)) => {
                    failures += 1;
                    debug!(endpoint = %self.endpoint, error = %e, failures, "connect failed");
                }
                Err(_) => {
                    failures += 1;
                    debug!(endpoint = %self.endpoint, failures, "connect timed out");
                }
            }

            if self.policy.exhausted(failures) {
                warn!(
                    endpoint = %self.endpoint,
                    failures,
                    "giving up on meet channel"
                );
                break 'reconnect;
            }

            let delay = self.policy.delay_after(failures);
            self.status.send_replace(LinkStatus::Backoff { failures });
            debug!(?delay, failures, "scheduling reconnect");

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break 'reconnect,
                    _ = &mut sleep => break,
                    Some(req) = self.outbound.recv() => {
                        let _ = req.ack.send(Err(LinkError::NotConnected));
                    }
                }
            }
        }

        self.status.send_replace(LinkStatus::Closed);
        self.outbound.close();
        while let Ok(req) = self.outbound.try_recv() {
            let _ = req.ack.send(Err(LinkError::Closed));
        }
    }

    async fn pump(&mut self, ws: WsStream) -> Ended {
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ended::Cancelled;
                }
                Some(req) = self.outbound.recv() => {
                    match write.send(Message::Text(req.text.into())).await {
                        Ok(()) => {
                            let _ = req.ack.send(Ok(()));
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            let _ = req.ack.send(Err(LinkError::Transport(reason.clone())));
                            return Ended::Lost(reason);
                        }
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => match ChannelEvent::from_json(text.as_str()) {
                        Ok(event) => {
                            trace!(event = %event.event, seq = ?event.seq, "inbound");
                            if self.inbox.send(Inbound::Event(event)).await.is_err() {
                                self.cancel.cancel();
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping malformed frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by endpoint".into());
                        return Ended::Lost(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Ended::Lost(e.to_string()),
                    None => return Ended::Lost("stream ended".into()),
                },
            }
        }
    }

    /// Fail every command still queued with `NotConnected`.
    fn reject_pending(&mut self) {
        while let Ok(req) = self.outbound.try_recv() {
            let _ = req.ack.send(Err(LinkError::NotConnected));
        }
    }

    async fn signal(&self, transition: LinkLifecycle) {
        let _ = self.lifecycle.send(transition.clone());
        let _ = self.inbox.send(Inbound::Lifecycle(transition)).await;
    }
}
