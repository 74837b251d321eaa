use serde::{Deserialize, Serialize};

use meet_model::{DisplayMode, LiftType};

/// Body of `POST /api/meet_state`. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MeetStateUpdate {
    #[serde(default)]
    pub current_lift_type: Option<LiftType>,
    #[serde(default)]
    pub display_mode: Option<DisplayMode>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayModeRequest {
    pub mode: DisplayMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoreRequest {
    pub judge_pin: String,
    /// `true` for a good lift.
    #[serde(alias = "good")]
    pub score: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub pin: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub judge_id: String,
    pub seat: u8,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeightClassRef {
    pub weight_class_id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgeClassRef {
    pub age_class_id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
