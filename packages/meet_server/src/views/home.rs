use maud::{Markup, html};

use super::{PageData, SURFACE_ROUTES, attempt_summary};

pub fn home_page(data: &PageData) -> Markup {
    html! {
        h1 { "Powerlifting meet" }
        (attempt_summary(&data.meet_state))
        @if let Some(lift) = &data.active_lift {
            p { "On the platform: " (lift.lifter_name) }
        }
        ul class="surfaces" {
            @for route in SURFACE_ROUTES.iter().filter(|r| r.path != "/") {
                li { a href=(route.path) { (route.surface.title()) " (" (route.path) ")" } }
            }
        }
    }
}
