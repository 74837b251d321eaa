use maud::{Markup, html};

use meet_model::{DisplayMode, LiftType, Lifter};

use super::{PageData, attempt_summary, lift_card};

pub fn organizer_page(data: &PageData, lifters: &[Lifter]) -> Markup {
    let state = &data.meet_state;
    html! {
        h1 { "Organizer" }
        (attempt_summary(state))
        (lift_card(data.active_lift.as_ref()))

        div class="controls" {
            button data-command="set_active_lift" { "Next lifter" }
            button data-command="advance_attempt" { "Next attempt" }
            @for lift_type in LiftType::ALL {
                button data-command="set_lift_type"
                    data-payload=(format!(r#"{{"lift_type":"{}"}}"#, lift_type))
                    disabled[lift_type == state.current_lift_type] {
                    (lift_type)
                }
            }
            @for mode in [DisplayMode::Attempt, DisplayMode::Standings, DisplayMode::Intermission] {
                button data-command="set_display_mode"
                    data-payload=(format!(r#"{{"mode":"{}"}}"#, mode))
                    disabled[mode == state.display_mode] {
                    "Show " (mode)
                }
            }
        }

        h2 { "Lifters (" (lifters.len()) ")" }
        table {
            tr {
                th { "ID" } th { "Name" } th { "Bodyweight" } th { "Weight class" } th { "Age class" }
            }
            @for lifter in lifters {
                tr {
                    td { (lifter.lifter_id_number) }
                    td { (lifter.name) }
                    td { (format!("{:.1}", lifter.actual_weight)) }
                    td { (lifter.primary_weight_class_name.as_deref().unwrap_or("-")) }
                    td { (lifter.primary_age_class_name.as_deref().unwrap_or("-")) }
                }
            }
        }
    }
}
