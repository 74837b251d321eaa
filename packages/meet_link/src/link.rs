use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use meet_model::{DisplayMode, LiftType};

use crate::backoff::ReconnectPolicy;
use crate::connection::{Connection, LinkLifecycle, LinkStatus};
use crate::endpoint::ConnectionEndpoint;
use crate::error::LinkError;
use crate::protocol::{self, ChannelEvent, ScoreLift, SetActiveLift, SetDisplayMode, SetLiftType};
use crate::router::{EventRouter, Handler};
use crate::state::{MeetSnapshot, MeetStateReader, SharedMeetState};

/// Broadcasts that carry a `seq` and so feed the shared state.
const BROADCASTS: [&str; 8] = [
    protocol::SYNC,
    protocol::MEET_STATE_UPDATED,
    protocol::ACTIVE_LIFT_CHANGED,
    protocol::LIFT_UPDATED,
    protocol::LIFTER_ADDED,
    protocol::LIFTER_UPDATED,
    protocol::WEIGHT_CLASS_UPDATED,
    protocol::AGE_CLASS_UPDATED,
];

/// Everything a presentation surface needs: the live state, event
/// subscriptions, and the commands it may send.
///
/// Cloning is cheap and every clone shares one connection. Construct one per
/// process and hand clones to each surface.
#[derive(Clone)]
pub struct MeetLink {
    router: Arc<EventRouter>,
    state: SharedMeetState,
}

impl MeetLink {
    pub fn connect(endpoint: ConnectionEndpoint, policy: ReconnectPolicy) -> Self {
        let (connection, inbox) = Connection::connect(endpoint, policy);
        let state = SharedMeetState::new();

        let mut handlers: Vec<(String, Handler)> = BROADCASTS
            .iter()
            .map(|name| {
                let state = state.clone();
                let apply: Handler = Box::new(move |ev: &ChannelEvent| {
                    state.apply(ev);
                });
                (name.to_string(), apply)
            })
            .collect();
        let on_drop = state.clone();
        handlers.push((
            protocol::DISCONNECT.to_string(),
            Box::new(move |_: &ChannelEvent| on_drop.mark_disconnected()),
        ));

        let router = EventRouter::spawn_with(connection, inbox, handlers);
        Self {
            router: Arc::new(router),
            state,
        }
    }

    pub fn state(&self) -> MeetStateReader {
        self.state.reader()
    }

    pub fn snapshot(&self) -> MeetSnapshot {
        self.state.snapshot()
    }

    /// Register a handler. State handlers always run before user handlers
    /// for the same event, so a handler reading [`MeetLink::snapshot`] sees
    /// the event already applied.
    pub fn on<F>(&self, name: impl Into<String>, handler: F)
    where
        F: FnMut(&ChannelEvent) + Send + 'static,
    {
        self.router.on(name, handler);
    }

    pub async fn emit<T: Serialize + ?Sized>(&self, name: &str, payload: &T) -> Result<(), LinkError> {
        self.router.emit(name, payload).await
    }

    pub fn connection(&self) -> &Connection {
        self.router.connection()
    }

    pub fn status(&self) -> LinkStatus {
        self.connection().status()
    }

    pub fn lifecycle(&self) -> broadcast::Receiver<LinkLifecycle> {
        self.connection().lifecycle()
    }

    /// Resolve with the first snapshot that is synced and has no known gaps.
    pub async fn wait_synced(&self) -> Result<MeetSnapshot, LinkError> {
        let mut reader = self.state();
        let mut status = self.connection().watch_status();
        tokio::select! {
            snap = reader.wait_for(MeetSnapshot::is_current) => snap.map_err(|_| LinkError::Closed),
            _ = status.wait_for(|s| *s == LinkStatus::Closed) => Err(LinkError::Closed),
        }
    }

    pub fn close(&self) {
        self.connection().close();
    }

    pub async fn score_lift(
        &self,
        lift_id: i64,
        judge_pin: impl Into<String>,
        good: bool,
    ) -> Result<(), LinkError> {
        let cmd = ScoreLift {
            lift_id,
            judge_pin: judge_pin.into(),
            good,
        };
        self.emit(protocol::SCORE_LIFT, &cmd).await
    }

    /// `None` lets the endpoint pick the next lift in the queue.
    pub async fn set_active_lift(&self, lift_id: Option<i64>) -> Result<(), LinkError> {
        self.emit(protocol::SET_ACTIVE_LIFT, &SetActiveLift { lift_id })
            .await
    }

    pub async fn advance_attempt(&self) -> Result<(), LinkError> {
        self.emit(protocol::ADVANCE_ATTEMPT, &serde_json::json!({}))
            .await
    }

    pub async fn set_lift_type(&self, lift_type: LiftType) -> Result<(), LinkError> {
        self.emit(protocol::SET_LIFT_TYPE, &SetLiftType { lift_type })
            .await
    }

    pub async fn set_display_mode(&self, mode: DisplayMode) -> Result<(), LinkError> {
        self.emit(protocol::SET_DISPLAY_MODE, &SetDisplayMode { mode })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::{ServerWs, accept, dead_endpoint, fast_policy, listen};
    use crate::protocol::SyncPayload;
    use futures::{SinkExt, StreamExt};
    use meet_model::{Lift, MeetState};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;

    fn active_lift(id: i64) -> Lift {
        serde_json::from_value(json!({
            "id": id,
            "lifter_id": 1,
            "lifter_name": "Ion Popescu",
            "lifter_id_number": "RO-1",
            "gender": "Male",
            "weight_class_name": "Men's 93kg",
            "lift_type": "squat",
            "attempt_number": 1,
            "weight_lifted": 200.0,
            "status": "active",
            "judge1_score": null,
            "judge2_score": null,
            "judge3_score": null,
            "overall_result": null
        }))
        .unwrap()
    }

    async fn push(ws: &mut ServerWs, event: ChannelEvent) {
        ws.send(Message::Text(event.to_json().unwrap().into()))
            .await
            .unwrap();
    }

    async fn send_sync(ws: &mut ServerWs, seq: u64, lift: Option<Lift>) {
        let meet_state = MeetState {
            current_active_lift_id: lift.as_ref().map(|l| l.id),
            ..MeetState::default()
        };
        let payload = SyncPayload {
            meet_state,
            active_lift: lift,
            epoch: "test".into(),
        };
        push(ws, ChannelEvent::from_payload(protocol::SYNC, &payload).unwrap().with_seq(seq)).await;
    }

    async fn read_command(ws: &mut ServerWs) -> ChannelEvent {
        loop {
            let frame = timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("no command")
                .expect("socket closed")
                .unwrap();
            if let Message::Text(text) = frame {
                return ChannelEvent::from_json(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn state_follows_broadcasts() {
        let (listener, endpoint) = listen().await;
        let link = MeetLink::connect(endpoint, fast_policy());
        let mut server = accept(&listener).await;

        send_sync(&mut server, 4, Some(active_lift(11))).await;
        let snap = timeout(Duration::from_secs(5), link.wait_synced())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.seq, 4);
        assert_eq!(snap.active_lift.as_ref().map(|l| l.id), Some(11));

        let mut scored = active_lift(11);
        scored.decisions.judge2_score = Some(true);
        push(
            &mut server,
            ChannelEvent::from_payload(protocol::LIFT_UPDATED, &scored)
                .unwrap()
                .with_seq(5),
        )
        .await;

        let mut reader = link.state();
        let snap = timeout(
            Duration::from_secs(5),
            reader.wait_for(|s| s.seq == 5),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(snap.decisions().and_then(|d| d.judge2_score), Some(true));
    }

    #[tokio::test]
    async fn user_handlers_see_applied_state() {
        let (listener, endpoint) = listen().await;
        let link = MeetLink::connect(endpoint, fast_policy());
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let observer = link.clone();
        link.on(protocol::ACTIVE_LIFT_CHANGED, move |_| {
            let id = observer.snapshot().active_lift.map(|l| l.id);
            let _ = seen_tx.send(id);
        });

        let mut server = accept(&listener).await;
        send_sync(&mut server, 1, None).await;
        push(
            &mut server,
            ChannelEvent::from_payload(protocol::ACTIVE_LIFT_CHANGED, &Some(active_lift(3)))
                .unwrap()
                .with_seq(2),
        )
        .await;

        let id = timeout(Duration::from_secs(5), seen.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, Some(3));
    }

    #[tokio::test]
    async fn commands_reach_the_endpoint() {
        let (listener, endpoint) = listen().await;
        let link = MeetLink::connect(endpoint, fast_policy());
        let mut server = accept(&listener).await;
        link.connection().wait_connected().await.unwrap();

        link.score_lift(7, "1111", true).await.unwrap();
        let cmd = read_command(&mut server).await;
        assert_eq!(cmd.event, protocol::SCORE_LIFT);
        assert_eq!(cmd.data, json!({"lift_id": 7, "judge_pin": "1111", "good": true}));

        link.set_active_lift(None).await.unwrap();
        let cmd = read_command(&mut server).await;
        assert_eq!(cmd.event, protocol::SET_ACTIVE_LIFT);
        assert_eq!(cmd.data, json!({"lift_id": null}));

        link.set_lift_type(LiftType::Deadlift).await.unwrap();
        let cmd = read_command(&mut server).await;
        assert_eq!(cmd.data, json!({"lift_type": "deadlift"}));

        link.set_display_mode(DisplayMode::Intermission).await.unwrap();
        let cmd = read_command(&mut server).await;
        assert_eq!(cmd.data, json!({"mode": "intermission"}));

        link.advance_attempt().await.unwrap();
        let cmd = read_command(&mut server).await;
        assert_eq!(cmd.event, protocol::ADVANCE_ATTEMPT);
    }

    #[tokio::test]
    async fn disconnect_marks_state_stale() {
        let (listener, endpoint) = listen().await;
        let link = MeetLink::connect(endpoint, fast_policy());
        let mut server = accept(&listener).await;
        send_sync(&mut server, 1, None).await;
        timeout(Duration::from_secs(5), link.wait_synced())
            .await
            .unwrap()
            .unwrap();

        drop(server);
        let mut reader = link.state();
        let snap = timeout(Duration::from_secs(5), reader.wait_for(|s| s.stale))
            .await
            .unwrap()
            .unwrap();
        assert!(snap.synced);

        // Rejoining gets a fresh sync and the snapshot is current again.
        let mut server = accept(&listener).await;
        send_sync(&mut server, 9, None).await;
        let snap = timeout(Duration::from_secs(5), link.wait_synced())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.seq, 9);
    }

    #[tokio::test]
    async fn commands_fail_while_offline() {
        let link = MeetLink::connect(dead_endpoint().await, fast_policy());
        assert!(matches!(
            link.advance_attempt().await,
            Err(LinkError::NotConnected)
        ));
        assert!(matches!(
            link.score_lift(1, "1111", true).await,
            Err(LinkError::NotConnected)
        ));
        link.close();
    }
}
