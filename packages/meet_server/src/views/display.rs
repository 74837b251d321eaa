use maud::{Markup, html};

use meet_model::DisplayMode;

use super::{PageData, attempt_summary, lift_card};

pub fn display_page(data: &PageData) -> Markup {
    let state = &data.meet_state;
    html! {
        div class="display" data-mode=(state.display_mode) {
            @match state.display_mode {
                DisplayMode::Attempt => {
                    (attempt_summary(state))
                    (lift_card(data.active_lift.as_ref()))
                }
                DisplayMode::Standings => {
                    h1 { "Standings" }
                    (attempt_summary(state))
                }
                DisplayMode::Intermission => {
                    h1 { "Intermission" }
                }
            }
        }
    }
}
