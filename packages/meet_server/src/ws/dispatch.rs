//! Decode client commands and run them against the service.

use meet_link::ChannelEvent;
use meet_link::protocol::{
    self, CommandRejected, ScoreLift, SetActiveLift, SetDisplayMode, SetLiftType,
};
use meet_model::MeetError;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::service::{MeetService, ServiceError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    ScoreLift(ScoreLift),
    SetActiveLift(SetActiveLift),
    AdvanceAttempt,
    SetLiftType(SetLiftType),
    SetDisplayMode(SetDisplayMode),
}

fn payload<T: DeserializeOwned>(event: &ChannelEvent) -> Result<T, MeetError> {
    event
        .payload()
        .map_err(|e| MeetError::invalid("data", e.to_string()))
}

impl Command {
    pub fn parse(event: &ChannelEvent) -> Result<Self, MeetError> {
        match event.event.as_str() {
            protocol::SCORE_LIFT => Ok(Self::ScoreLift(payload(event)?)),
            protocol::SET_ACTIVE_LIFT if event.data.is_null() => {
                Ok(Self::SetActiveLift(SetActiveLift::default()))
            }
            protocol::SET_ACTIVE_LIFT => Ok(Self::SetActiveLift(payload(event)?)),
            protocol::ADVANCE_ATTEMPT => Ok(Self::AdvanceAttempt),
            protocol::SET_LIFT_TYPE => Ok(Self::SetLiftType(payload(event)?)),
            protocol::SET_DISPLAY_MODE => Ok(Self::SetDisplayMode(payload(event)?)),
            other => Err(MeetError::invalid(
                "event",
                format!("unknown command {other:?}"),
            )),
        }
    }
}

fn rejected(command: &str, error: &ServiceError) -> CommandRejected {
    CommandRejected {
        command: command.to_string(),
        error: error.error_code().to_string(),
        message: error.to_string(),
    }
}

/// Run one text frame. Results reach every client through the broadcast, so
/// only failures come back from here.
pub(crate) async fn dispatch(service: &MeetService, text: &str) -> Result<(), CommandRejected> {
    let event = ChannelEvent::from_json(text).map_err(|e| CommandRejected {
        command: String::new(),
        error: "invalid_request".to_string(),
        message: format!("malformed event: {e}"),
    })?;
    let command = Command::parse(&event)
        .map_err(|e| rejected(&event.event, &ServiceError::from(e)))?;
    debug!(command = %event.event, "running channel command");

    let result = match command {
        Command::ScoreLift(cmd) => service
            .score_lift(cmd.lift_id, &cmd.judge_pin, cmd.good)
            .await
            .map(drop),
        Command::SetActiveLift(cmd) => service.set_active_lift(cmd.lift_id).await.map(drop),
        Command::AdvanceAttempt => service.advance_attempt().await.map(drop),
        Command::SetLiftType(cmd) => service.set_lift_type(cmd.lift_type).await.map(drop),
        Command::SetDisplayMode(cmd) => service.set_display_mode(cmd.mode).await.map(drop),
    };
    result.map_err(|e| rejected(&event.event, &e))
}
