use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::MeetError;

/// The three seats on a powerlifting panel. Serialized as 1, 2, 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum JudgeSeat {
    One,
    Two,
    Three,
}

impl JudgeSeat {
    pub const ALL: [JudgeSeat; 3] = [JudgeSeat::One, JudgeSeat::Two, JudgeSeat::Three];

    pub fn number(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    pub fn display_name(&self) -> String {
        format!("Judge {}", self.number())
    }
}

impl fmt::Display for JudgeSeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Judge {}", self.number())
    }
}

impl TryFrom<u8> for JudgeSeat {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(format!("judge seat must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<JudgeSeat> for u8 {
    fn from(seat: JudgeSeat) -> u8 {
        seat.number()
    }
}

/// PIN → seat lookup for the judges on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgePanel {
    pins: BTreeMap<String, JudgeSeat>,
}

impl JudgePanel {
    pub fn new(pins: BTreeMap<String, JudgeSeat>) -> Self {
        Self { pins }
    }

    pub fn seat_for(&self, pin: &str) -> Result<JudgeSeat, MeetError> {
        self.pins.get(pin).copied().ok_or(MeetError::InvalidJudgePin)
    }

    pub fn pins(&self) -> &BTreeMap<String, JudgeSeat> {
        &self.pins
    }
}

impl Default for JudgePanel {
    fn default() -> Self {
        Self::new(BTreeMap::from([
            ("1111".to_string(), JudgeSeat::One),
            ("2222".to_string(), JudgeSeat::Two),
            ("3333".to_string(), JudgeSeat::Three),
        ]))
    }
}
