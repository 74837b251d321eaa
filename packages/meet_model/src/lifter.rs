use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MeetError;
use crate::lift::LiftType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = MeetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            other => Err(MeetError::invalid("gender", format!("unknown gender {other:?}"))),
        }
    }
}

/// Completed years between `born` and `today`.
pub fn age_on(born: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// A registered lifter as stored by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifter {
    pub id: i64,
    pub name: String,
    pub gender: Gender,
    pub lifter_id_number: String,
    pub actual_weight: f64,
    pub birth_date: NaiveDate,
    pub age: u32,
    pub opener_squat: Option<f64>,
    pub opener_bench: Option<f64>,
    pub opener_deadlift: Option<f64>,
    pub primary_weight_class_id: Option<i64>,
    pub primary_weight_class_name: Option<String>,
    pub primary_age_class_id: Option<i64>,
    pub primary_age_class_name: Option<String>,
    #[serde(default)]
    pub additional_weight_class_ids: Vec<i64>,
    #[serde(default)]
    pub additional_weight_class_names: Vec<String>,
    #[serde(default)]
    pub additional_age_class_ids: Vec<i64>,
    #[serde(default)]
    pub additional_age_class_names: Vec<String>,
}

impl Lifter {
    pub fn opener(&self, lift_type: LiftType) -> Option<f64> {
        match lift_type {
            LiftType::Squat => self.opener_squat,
            LiftType::Bench => self.opener_bench,
            LiftType::Deadlift => self.opener_deadlift,
        }
    }
}

/// Registration request for a new lifter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLifter {
    pub name: String,
    pub gender: Gender,
    pub lifter_id_number: String,
    pub actual_weight: f64,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub opener_squat: Option<f64>,
    #[serde(default)]
    pub opener_bench: Option<f64>,
    #[serde(default)]
    pub opener_deadlift: Option<f64>,
}

impl NewLifter {
    pub fn validate(&self) -> Result<(), MeetError> {
        if self.name.trim().is_empty() {
            return Err(MeetError::invalid("name", "must not be empty"));
        }
        if self.lifter_id_number.trim().is_empty() {
            return Err(MeetError::invalid("lifter_id_number", "must not be empty"));
        }
        if !(self.actual_weight.is_finite() && self.actual_weight > 0.0) {
            return Err(MeetError::invalid("actual_weight", "must be a positive number"));
        }
        for (field, opener) in [
            ("opener_squat", self.opener_squat),
            ("opener_bench", self.opener_bench),
            ("opener_deadlift", self.opener_deadlift),
        ] {
            if let Some(w) = opener {
                if !(w.is_finite() && w > 0.0) {
                    return Err(MeetError::invalid(field, "must be a positive number"));
                }
            }
        }
        Ok(())
    }

    pub fn opener(&self, lift_type: LiftType) -> Option<f64> {
        match lift_type {
            LiftType::Squat => self.opener_squat,
            LiftType::Bench => self.opener_bench,
            LiftType::Deadlift => self.opener_deadlift,
        }
    }
}
