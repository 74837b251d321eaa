//! CSV rendering of meet results.

use std::fmt::Write;

use crate::lift::Lift;
use crate::lifter::Lifter;

const LIFTERS_HEADER: &str =
    "Lifter ID,Name,Gender,Actual Weight,Age,Primary Weight Class,Primary Age Class";
const LIFTS_HEADER: &str =
    "Lift ID,Lifter Name,Lift Type,Attempt,Weight,Judge1,Judge2,Judge3,Overall Result";

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn decision(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "true",
        Some(false) => "false",
        None => "",
    }
}

pub fn lifters_csv(lifters: &[Lifter]) -> String {
    let mut out = String::from(LIFTERS_HEADER);
    out.push('\n');
    for l in lifters {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{}",
            field(&l.lifter_id_number),
            field(&l.name),
            l.gender,
            l.actual_weight,
            l.age,
            field(l.primary_weight_class_name.as_deref().unwrap_or("N/A")),
            field(l.primary_age_class_name.as_deref().unwrap_or("N/A")),
        );
    }
    out
}

pub fn lifts_csv(lifts: &[Lift]) -> String {
    let mut out = String::from(LIFTS_HEADER);
    out.push('\n');
    for l in lifts {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            l.id,
            field(&l.lifter_name),
            l.lift_type,
            l.attempt_number,
            l.weight_lifted,
            decision(l.decisions.judge1_score),
            decision(l.decisions.judge2_score),
            decision(l.decisions.judge3_score),
            decision(l.overall_result),
        );
    }
    out
}
