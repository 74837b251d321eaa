//! Attempts, their lifecycle, and the three-judge majority rule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MeetError;
use crate::judges::JudgeSeat;

/// Attempts per lift type.
pub const ATTEMPTS_PER_LIFT: u8 = 3;

/// Planned increase over the opener for attempts 1, 2 and 3.
pub const ATTEMPT_INCREMENTS_KG: [f64; ATTEMPTS_PER_LIFT as usize] = [0.0, 5.0, 10.0];

/// Decisions needed before a majority can be called.
pub const MIN_DECISIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiftType {
    Squat,
    Bench,
    Deadlift,
}

impl LiftType {
    pub const ALL: [LiftType; 3] = [LiftType::Squat, LiftType::Bench, LiftType::Deadlift];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Squat => "squat",
            Self::Bench => "bench",
            Self::Deadlift => "deadlift",
        }
    }
}

impl fmt::Display for LiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiftType {
    type Err = MeetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squat" => Ok(Self::Squat),
            "bench" => Ok(Self::Bench),
            "deadlift" => Ok(Self::Deadlift),
            other => Err(MeetError::invalid(
                "lift_type",
                format!("unknown lift type {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiftStatus {
    Pending,
    Active,
    Completed,
}

impl LiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for LiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiftStatus {
    type Err = MeetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(MeetError::invalid(
                "status",
                format!("unknown lift status {other:?}"),
            )),
        }
    }
}

/// Outcome of tallying the decisions recorded so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    GoodLift,
    NoLift,
    Undecided,
}

/// One decision slot per judge seat. `None` means the judge has not voted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decisions {
    pub judge1_score: Option<bool>,
    pub judge2_score: Option<bool>,
    pub judge3_score: Option<bool>,
}

impl Decisions {
    pub fn get(&self, seat: JudgeSeat) -> Option<bool> {
        match seat {
            JudgeSeat::One => self.judge1_score,
            JudgeSeat::Two => self.judge2_score,
            JudgeSeat::Three => self.judge3_score,
        }
    }

    pub fn set(&mut self, seat: JudgeSeat, good: bool) {
        let slot = match seat {
            JudgeSeat::One => &mut self.judge1_score,
            JudgeSeat::Two => &mut self.judge2_score,
            JudgeSeat::Three => &mut self.judge3_score,
        };
        *slot = Some(good);
    }

    pub fn recorded(&self) -> impl Iterator<Item = bool> + '_ {
        [self.judge1_score, self.judge2_score, self.judge3_score]
            .into_iter()
            .flatten()
    }

    /// Strict majority among the recorded decisions, once at least
    /// [`MIN_DECISIONS`] are in. A split stays undecided.
    pub fn verdict(&self) -> Verdict {
        let (good, total) = self
            .recorded()
            .fold((0usize, 0usize), |(g, t), d| (g + usize::from(d), t + 1));
        if total < MIN_DECISIONS {
            return Verdict::Undecided;
        }
        let no = total - good;
        match good.cmp(&no) {
            std::cmp::Ordering::Greater => Verdict::GoodLift,
            std::cmp::Ordering::Less => Verdict::NoLift,
            std::cmp::Ordering::Equal => Verdict::Undecided,
        }
    }
}

/// An attempt, with the lifter fields displays need denormalized onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lift {
    pub id: i64,
    pub lifter_id: i64,
    pub lifter_name: String,
    pub lifter_id_number: String,
    pub gender: String,
    pub weight_class_name: Option<String>,
    pub lift_type: LiftType,
    pub attempt_number: u8,
    pub weight_lifted: f64,
    pub status: LiftStatus,
    #[serde(flatten)]
    pub decisions: Decisions,
    pub overall_result: Option<bool>,
}

impl Lift {
    /// Put this lift on the platform with a clean slate.
    pub fn activate(&mut self) -> Result<(), MeetError> {
        if self.status != LiftStatus::Pending {
            return Err(MeetError::LiftNotPending {
                id: self.id,
                status: self.status.to_string(),
            });
        }
        self.status = LiftStatus::Active;
        self.decisions = Decisions::default();
        self.overall_result = None;
        Ok(())
    }

    /// Return an active lift to the queue. Completed lifts are left alone.
    pub fn deactivate(&mut self) -> bool {
        if self.status == LiftStatus::Active {
            self.status = LiftStatus::Pending;
            true
        } else {
            false
        }
    }

    /// Record one judge's decision and re-tally. Returns the verdict after
    /// the decision; a decided verdict completes the lift.
    pub fn record_decision(&mut self, seat: JudgeSeat, good: bool) -> Verdict {
        self.decisions.set(seat, good);
        let verdict = self.decisions.verdict();
        match verdict {
            Verdict::GoodLift => {
                self.overall_result = Some(true);
                self.status = LiftStatus::Completed;
            }
            Verdict::NoLift => {
                self.overall_result = Some(false);
                self.status = LiftStatus::Completed;
            }
            Verdict::Undecided => {}
        }
        verdict
    }
}

/// A lift to be inserted for a freshly registered lifter.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLift {
    pub lift_type: LiftType,
    pub attempt_number: u8,
    pub weight_lifted: f64,
}

/// Planned attempts for every lift type that has an opener.
pub fn generate_attempts(opener: impl Fn(LiftType) -> Option<f64>) -> Vec<NewLift> {
    LiftType::ALL
        .into_iter()
        .filter_map(|lift_type| opener(lift_type).map(|w| (lift_type, w)))
        .flat_map(|(lift_type, opener)| {
            ATTEMPT_INCREMENTS_KG
                .iter()
                .enumerate()
                .map(move |(i, inc)| NewLift {
                    lift_type,
                    attempt_number: i as u8 + 1,
                    weight_lifted: opener + inc,
                })
        })
        .collect()
}
