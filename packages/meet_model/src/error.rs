//! Domain errors and their stable machine-readable codes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeetError {
    #[error("meet state not initialized")]
    MeetStateMissing,

    #[error("cannot advance beyond attempt {max}")]
    AttemptLimit { max: u8 },

    #[error("lift {0} not found")]
    LiftNotFound(i64),

    #[error("lifter {0} not found")]
    LifterNotFound(i64),

    #[error("weight class {0} not found")]
    WeightClassNotFound(i64),

    #[error("age class {0} not found")]
    AgeClassNotFound(i64),

    #[error("only pending lifts can be set as active (lift {id} is {status})")]
    LiftNotPending { id: i64, status: String },

    #[error("invalid judge PIN")]
    InvalidJudgePin,

    #[error("{what} already added")]
    AlreadyAssigned { what: &'static str },

    #[error("{what} not found on lifter")]
    NotAssigned { what: &'static str },

    #[error("lifter id number {0} is already registered")]
    DuplicateLifterIdNumber(String),

    #[error("class name {0} is already in use")]
    DuplicateClassName(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl MeetError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            Self::MeetStateMissing => "meet_state_missing",
            Self::AttemptLimit { .. } => "attempt_limit",
            Self::LiftNotFound(_) => "lift_not_found",
            Self::LifterNotFound(_) => "lifter_not_found",
            Self::WeightClassNotFound(_) => "weight_class_not_found",
            Self::AgeClassNotFound(_) => "age_class_not_found",
            Self::LiftNotPending { .. } => "lift_not_pending",
            Self::InvalidJudgePin => "invalid_judge_pin",
            Self::AlreadyAssigned { .. } => "already_assigned",
            Self::NotAssigned { .. } => "not_assigned",
            Self::DuplicateLifterIdNumber(_) => "duplicate_lifter_id_number",
            Self::DuplicateClassName(_) => "duplicate_class_name",
            Self::Invalid { .. } => "invalid_request",
        }
    }

    /// True for errors that mean "the thing you named does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MeetStateMissing
                | Self::LiftNotFound(_)
                | Self::LifterNotFound(_)
                | Self::WeightClassNotFound(_)
                | Self::AgeClassNotFound(_)
                | Self::NotAssigned { .. }
        )
    }
}

/// Serializable error body shared by HTTP responses and channel rejections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&MeetError> for ErrorBody {
    fn from(err: &MeetError) -> Self {
        Self {
            error: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}
