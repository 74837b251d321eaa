//! Wire format of the meet channel.
//!
//! Every frame is one JSON text message:
//!
//! ```json
//! { "event": "active_lift_changed", "data": { ... }, "seq": 42 }
//! ```
//!
//! Broadcasts from the endpoint carry a strictly increasing `seq`. Commands
//! from clients and replies addressed to a single client carry none.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use meet_model::{DisplayMode, Lift, LiftType, MeetState};

// Broadcasts
pub const SYNC: &str = "sync";
pub const MEET_STATE_UPDATED: &str = "meet_state_updated";
pub const ACTIVE_LIFT_CHANGED: &str = "active_lift_changed";
pub const LIFT_UPDATED: &str = "lift_updated";
pub const LIFTER_ADDED: &str = "lifter_added";
pub const LIFTER_UPDATED: &str = "lifter_updated";
pub const WEIGHT_CLASS_UPDATED: &str = "weight_class_updated";
pub const AGE_CLASS_UPDATED: &str = "age_class_updated";

// Commands
pub const SCORE_LIFT: &str = "score_lift";
pub const SET_ACTIVE_LIFT: &str = "set_active_lift";
pub const ADVANCE_ATTEMPT: &str = "advance_attempt";
pub const SET_LIFT_TYPE: &str = "set_lift_type";
pub const SET_DISPLAY_MODE: &str = "set_display_mode";

// Replies
pub const COMMAND_REJECTED: &str = "command_rejected";

// Local lifecycle, never on the wire
pub const CONNECT: &str = "connect";
pub const DISCONNECT: &str = "disconnect";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl ChannelEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            seq: None,
        }
    }

    pub fn from_payload<T: Serialize + ?Sized>(
        event: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event, serde_json::to_value(payload)?))
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.event == name
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Full snapshot sent to each client when it joins, and again when it falls
/// behind the broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub meet_state: MeetState,
    pub active_lift: Option<Lift>,
    /// Identifies one run of the endpoint; `seq` restarts when it changes.
    pub epoch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreLift {
    pub lift_id: i64,
    pub judge_pin: String,
    pub good: bool,
}

/// `lift_id: None` asks the endpoint to pick the next lift in the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetActiveLift {
    #[serde(default)]
    pub lift_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLiftType {
    pub lift_type: LiftType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDisplayMode {
    pub mode: DisplayMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRejected {
    pub command: String,
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seq_is_omitted_when_absent() {
        let ev = ChannelEvent::new(ADVANCE_ATTEMPT, json!({}));
        assert_eq!(ev.to_json().unwrap(), r#"{"event":"advance_attempt","data":{}}"#);

        let ev = ev.with_seq(9);
        assert_eq!(
            ev.to_json().unwrap(),
            r#"{"event":"advance_attempt","data":{},"seq":9}"#
        );
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let ev = ChannelEvent::from_json(r#"{"event":"lifter_updated","seq":3}"#).unwrap();
        assert!(ev.is(LIFTER_UPDATED));
        assert_eq!(ev.data, Value::Null);
        assert_eq!(ev.seq, Some(3));
    }

    #[test]
    fn typed_payloads() {
        let ev = ChannelEvent::from_payload(
            SCORE_LIFT,
            &ScoreLift {
                lift_id: 4,
                judge_pin: "2222".into(),
                good: false,
            },
        )
        .unwrap();
        assert_eq!(
            ev.data,
            json!({"lift_id": 4, "judge_pin": "2222", "good": false})
        );
        let back: ScoreLift = ev.payload().unwrap();
        assert_eq!(back.lift_id, 4);

        let auto: SetActiveLift = ChannelEvent::new(SET_ACTIVE_LIFT, json!({}))
            .payload()
            .unwrap();
        assert_eq!(auto.lift_id, None);

        let mode: SetDisplayMode = ChannelEvent::new(SET_DISPLAY_MODE, json!({"mode": "standings"}))
            .payload()
            .unwrap();
        assert_eq!(mode.mode, DisplayMode::Standings);
    }

    #[test]
    fn bad_payload_is_an_error() {
        let ev = ChannelEvent::new(SET_LIFT_TYPE, json!({"lift_type": "clean"}));
        assert!(ev.payload::<SetLiftType>().is_err());
    }

    #[test]
    fn sync_payload_shape() {
        let sync = SyncPayload {
            meet_state: MeetState::default(),
            active_lift: None,
            epoch: "e1".into(),
        };
        let v = serde_json::to_value(&sync).unwrap();
        assert_eq!(v["meet_state"]["current_lift_type"], "squat");
        assert_eq!(v["meet_state"]["current_attempt_number"], 1);
        assert_eq!(v["active_lift"], Value::Null);
    }
}
