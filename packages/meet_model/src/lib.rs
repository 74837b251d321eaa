//! Lifters, classes, attempts and judging rules for a powerlifting meet.
//!
//! Everything here is pure: no I/O, no clocks other than the `today`
//! arguments callers pass in. The server persists these types and the
//! client caches them, but the rules live in one place.

pub mod classes;
pub mod error;
pub mod export;
pub mod judges;
pub mod lift;
pub mod lifter;
pub mod meet;

pub use classes::{AgeClass, NewAgeClass, NewWeightClass, WeightClass, WeightClassGender};
pub use error::{ErrorBody, MeetError};
pub use judges::{JudgePanel, JudgeSeat};
pub use lift::{Decisions, Lift, LiftStatus, LiftType, NewLift, Verdict};
pub use lifter::{Gender, Lifter, NewLifter};
pub use meet::{DisplayMode, MeetState};
