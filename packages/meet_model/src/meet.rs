//! The meet-wide cursor: which lift, which attempt, who is on the platform.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MeetError;
use crate::lift::{ATTEMPTS_PER_LIFT, Lift, LiftStatus, LiftType};

/// What the public display is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Attempt,
    Standings,
    Intermission,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attempt => "attempt",
            Self::Standings => "standings",
            Self::Intermission => "intermission",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = MeetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attempt" => Ok(Self::Attempt),
            "standings" => Ok(Self::Standings),
            "intermission" => Ok(Self::Intermission),
            other => Err(MeetError::invalid(
                "display_mode",
                format!("unknown display mode {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetState {
    pub current_lift_type: LiftType,
    pub current_attempt_number: u8,
    pub current_active_lift_id: Option<i64>,
    #[serde(default)]
    pub display_mode: DisplayMode,
}

impl Default for MeetState {
    fn default() -> Self {
        Self {
            current_lift_type: LiftType::Squat,
            current_attempt_number: 1,
            current_active_lift_id: None,
            display_mode: DisplayMode::Attempt,
        }
    }
}

impl MeetState {
    /// Switch to another lift type. The attempt goes back to 1 and the
    /// platform is cleared; the id of the lift that was active is returned
    /// so the caller can put it back in the queue.
    pub fn set_lift_type(&mut self, lift_type: LiftType) -> Option<i64> {
        self.current_lift_type = lift_type;
        self.current_attempt_number = 1;
        self.current_active_lift_id.take()
    }

    /// Move to the next attempt round, clearing the platform.
    pub fn advance_attempt(&mut self) -> Result<Option<i64>, MeetError> {
        if self.current_attempt_number >= ATTEMPTS_PER_LIFT {
            return Err(MeetError::AttemptLimit {
                max: ATTEMPTS_PER_LIFT,
            });
        }
        self.current_attempt_number += 1;
        Ok(self.current_active_lift_id.take())
    }

    /// Next pending lift for the current lift type and attempt: lightest bar
    /// first, ties broken by lifter id so every caller picks the same one.
    pub fn next_pending<'a>(&self, lifts: &'a [Lift]) -> Option<&'a Lift> {
        lifts
            .iter()
            .filter(|l| {
                l.status == LiftStatus::Pending
                    && l.lift_type == self.current_lift_type
                    && l.attempt_number == self.current_attempt_number
            })
            .min_by(|a, b| {
                a.weight_lifted
                    .total_cmp(&b.weight_lifted)
                    .then(a.lifter_id.cmp(&b.lifter_id))
            })
    }
}
