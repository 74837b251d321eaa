use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use meet_link::ChannelEvent;
use meet_link::protocol;

use crate::metrics::ServerMetrics;
use crate::service::MeetService;

use super::dispatch::dispatch;

/// Serve one client on the meet channel until either side hangs up.
pub async fn handle_channel(
    socket: WebSocket,
    service: Arc<MeetService>,
    metrics: Arc<ServerMetrics>,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "channel client connected");
    metrics.connection_opened();

    let subscription = match service.subscribe().await {
        Ok(s) => s,
        Err(e) => {
            error!(conn_id = %conn_id, "Failed to subscribe client: {}", e);
            metrics.connection_closed();
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to the WebSocket
    let (tx, mut rx) = mpsc::channel::<Arc<ChannelEvent>>(100);

    // The sync goes out before any broadcast is forwarded.
    if tx.send(Arc::new(subscription.sync)).await.is_err() {
        warn!(conn_id = %conn_id, "Failed to queue initial sync - channel closed");
    }

    let tx_broadcast = tx.clone();
    let service_broadcast = service.clone();
    let metrics_broadcast = metrics.clone();
    let conn_broadcast = conn_id.clone();
    let mut events = subscription.events;
    let broadcast_task = async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if tx_broadcast.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(conn_id = %conn_broadcast, "client lagged by {} events; resyncing", n);
                    metrics_broadcast.resync();
                    let resubscribed = match service_broadcast.subscribe().await {
                        Ok(s) => s,
                        Err(e) => {
                            error!(conn_id = %conn_broadcast, "Resync failed: {}", e);
                            break;
                        }
                    };
                    events = resubscribed.events;
                    if tx_broadcast
                        .send(Arc::new(resubscribed.sync))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    // Task to send messages to WebSocket
    let metrics_sender = metrics.clone();
    let sender_task = async move {
        while let Some(event) = rx.recv().await {
            let json = match event.to_json() {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            metrics_sender.message_sent();
        }
    };

    // Task to handle incoming commands
    let tx_input = tx;
    let metrics_input = metrics.clone();
    let conn_input = conn_id.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics_input.command_received();
                    // Spawned so a hang-up cannot cancel a command halfway.
                    let service = service.clone();
                    let command =
                        tokio::spawn(async move { dispatch(&service, text.as_str()).await });
                    let outcome = match command.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(conn_id = %conn_input, "Command task failed: {}", e);
                            continue;
                        }
                    };
                    if let Err(rejection) = outcome {
                        metrics_input.command_rejected();
                        debug!(
                            conn_id = %conn_input,
                            command = %rejection.command,
                            error = %rejection.error,
                            "command rejected"
                        );
                        match ChannelEvent::from_payload(protocol::COMMAND_REJECTED, &rejection) {
                            Ok(event) => {
                                if tx_input.send(Arc::new(event)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => error!("Failed to encode rejection: {}", e),
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    metrics_input.websocket_error();
                    debug!(conn_id = %conn_input, "WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = broadcast_task => debug!("Broadcast task ended"),
        _ = sender_task => debug!("Sender task ended"),
        _ = input_task => debug!("Input task ended"),
    }

    metrics.connection_closed();
    info!(conn_id = %conn_id, "channel client disconnected");
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use futures::{SinkExt, StreamExt};
    use meet_link::protocol::CommandRejected;
    use meet_link::{ConnectionEndpoint, MeetLink, ReconnectPolicy};
    use meet_model::{LiftStatus, NewLifter};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite;

    use super::*;
    use crate::test_helpers::{lifter_body, test_app_state};
    use crate::{AppState, build_router};

    const WAIT: Duration = Duration::from_secs(5);

    async fn serve(state: AppState) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        addr
    }

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: 0.0,
            max_attempts: None,
            connect_timeout: Duration::from_secs(2),
        }
    }

    fn endpoint(addr: SocketAddr) -> ConnectionEndpoint {
        ConnectionEndpoint::parse(&format!("ws://{addr}/ws")).unwrap()
    }

    async fn register(state: &AppState, name: &str, id_number: &str, weight: f64) {
        let new: NewLifter =
            serde_json::from_value(lifter_body(name, id_number, "Female", weight)).unwrap();
        state.service.create_lifter(new).await.unwrap();
    }

    #[tokio::test]
    async fn link_follows_a_judged_attempt() {
        let (state, _dir) = test_app_state().await;
        register(&state, "Ana", "A1", 61.0).await;
        let addr = serve(state.clone()).await;

        let link = MeetLink::connect(endpoint(addr), policy());
        let snap = timeout(WAIT, link.wait_synced()).await.unwrap().unwrap();
        assert_eq!(snap.meet_state.unwrap().current_attempt_number, 1);
        assert!(snap.active_lift.is_none());

        link.set_active_lift(None).await.unwrap();
        let mut reader = link.state();
        let snap = timeout(WAIT, reader.wait_for(|s| s.active_lift.is_some()))
            .await
            .unwrap()
            .unwrap();
        let lift = snap.active_lift.unwrap();
        assert_eq!(lift.lifter_name, "Ana");
        assert_eq!(lift.status, LiftStatus::Active);

        link.score_lift(lift.id, "1111", true).await.unwrap();
        link.score_lift(lift.id, "3333", true).await.unwrap();
        let snap = timeout(
            WAIT,
            reader.wait_for(|s| {
                s.active_lift
                    .as_ref()
                    .is_some_and(|l| l.status == LiftStatus::Completed)
            }),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(snap.is_current());
        assert_eq!(snap.active_lift.as_ref().unwrap().overall_result, Some(true));

        // A change made over HTTP reaches the link too.
        state.service.advance_attempt().await.unwrap();
        let head = state.service.hub().head();
        let snap = timeout(WAIT, reader.wait_for(|s| s.seq == head))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.meet_state.unwrap().current_attempt_number, 2);
        assert!(snap.active_lift.is_none());
        assert_eq!(snap.dropped, 0);

        link.close();
    }

    #[tokio::test]
    async fn rejection_reaches_only_the_sender() {
        let (state, _dir) = test_app_state().await;
        let addr = serve(state.clone()).await;

        let judge = MeetLink::connect(endpoint(addr), policy());
        let display = MeetLink::connect(endpoint(addr), policy());
        timeout(WAIT, judge.wait_synced()).await.unwrap().unwrap();
        timeout(WAIT, display.wait_synced()).await.unwrap().unwrap();

        let (judge_tx, mut judge_rx) = mpsc::unbounded_channel();
        judge.on(protocol::COMMAND_REJECTED, move |ev: &ChannelEvent| {
            let _ = judge_tx.send(ev.clone());
        });
        let (display_tx, mut display_rx) = mpsc::unbounded_channel();
        display.on(protocol::COMMAND_REJECTED, move |ev: &ChannelEvent| {
            let _ = display_tx.send(ev.clone());
        });

        judge.score_lift(404, "1111", true).await.unwrap();
        let ev = timeout(WAIT, judge_rx.recv()).await.unwrap().unwrap();
        assert_eq!(ev.seq, None);
        let rejection: CommandRejected = ev.payload().unwrap();
        assert_eq!(rejection.command, "score_lift");
        assert_eq!(rejection.error, "lift_not_found");

        // The display's own command round-trips after; nothing else arrived.
        display.advance_attempt().await.unwrap();
        let mut reader = display.state();
        timeout(
            WAIT,
            reader.wait_for(|s| {
                s.meet_state
                    .as_ref()
                    .is_some_and(|m| m.current_attempt_number == 2)
            }),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(display_rx.try_recv().is_err());

        judge.close();
        display.close();
    }

    #[tokio::test]
    async fn raw_client_gets_sync_then_rejection() {
        let (state, _dir) = test_app_state().await;
        let metrics = state.metrics.clone();
        let addr = serve(state).await;

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        let first = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        let sync = ChannelEvent::from_json(first.to_text().unwrap()).unwrap();
        assert_eq!(sync.event, protocol::SYNC);
        assert_eq!(sync.seq, Some(0));
        assert_eq!(sync.data["meet_state"]["current_lift_type"], "squat");

        socket
            .send(tungstenite::Message::Text(
                r#"{"event":"juggle","data":{}}"#.into(),
            ))
            .await
            .unwrap();
        let reply = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        let reply = ChannelEvent::from_json(reply.to_text().unwrap()).unwrap();
        assert_eq!(reply.event, protocol::COMMAND_REJECTED);
        assert_eq!(reply.data["command"], "juggle");
        assert_eq!(reply.data["error"], "invalid_request");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections.active, 1);
        assert_eq!(snapshot.channel.commands_rejected, 1);

        socket.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn command_finishes_after_the_client_hangs_up() {
        let (state, _dir) = test_app_state().await;
        let addr = serve(state.clone()).await;

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        socket
            .send(tungstenite::Message::Text(
                r#"{"event":"advance_attempt","data":{}}"#.into(),
            ))
            .await
            .unwrap();
        drop(socket);

        timeout(WAIT, async {
            loop {
                if state.service.meet_state().await.unwrap().current_attempt_number == 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
