use maud::{Markup, html};

use super::{PageData, lift_card};

pub fn judge_page(data: &PageData) -> Markup {
    html! {
        h1 { "Judge" }
        label { "PIN " input id="judge-pin" type="password" inputmode="numeric" autocomplete="off"; }
        (lift_card(data.active_lift.as_ref()))
        @if let Some(lift) = &data.active_lift {
            div class="verdict" {
                button data-command="score_lift"
                    data-payload=(format!(r#"{{"lift_id":{},"good":true}}"#, lift.id)) {
                    "Good lift"
                }
                button data-command="score_lift"
                    data-payload=(format!(r#"{{"lift_id":{},"good":false}}"#, lift.id)) {
                    "No lift"
                }
            }
        }
    }
}
