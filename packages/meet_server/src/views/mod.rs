mod display;
mod home;
mod judge;
mod organizer;

use axum::response::Html;
use maud::{DOCTYPE, Markup, PreEscaped, html};

use meet_model::{JudgeSeat, Lift, MeetState};

use crate::AppState;
use crate::error::ApiError;

/// A presentation surface served by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Home,
    Organizer,
    Display,
    Judge,
}

impl Surface {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Home => "Meet",
            Self::Organizer => "Organizer",
            Self::Display => "Display",
            Self::Judge => "Judge",
        }
    }

    /// Where the nav bar links to.
    pub fn canonical_path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Organizer => "/organizer",
            Self::Display => "/display",
            Self::Judge => "/judge",
        }
    }
}

pub struct SurfaceRoute {
    pub path: &'static str,
    pub surface: Surface,
}

/// Every page route. `/public` is kept as an alias for the display.
pub const SURFACE_ROUTES: &[SurfaceRoute] = &[
    SurfaceRoute {
        path: "/",
        surface: Surface::Home,
    },
    SurfaceRoute {
        path: "/organizer",
        surface: Surface::Organizer,
    },
    SurfaceRoute {
        path: "/display",
        surface: Surface::Display,
    },
    SurfaceRoute {
        path: "/public",
        surface: Surface::Display,
    },
    SurfaceRoute {
        path: "/judge",
        surface: Surface::Judge,
    },
];

pub fn surface_for(path: &str) -> Option<Surface> {
    SURFACE_ROUTES
        .iter()
        .find(|r| r.path == path)
        .map(|r| r.surface)
}

/// What every surface renders on first load. Live updates come over `/ws`.
pub struct PageData {
    pub meet_state: MeetState,
    pub active_lift: Option<Lift>,
}

pub async fn render_surface(surface: Surface, state: AppState) -> Result<Html<String>, ApiError> {
    let data = PageData {
        meet_state: state.service.meet_state().await?,
        active_lift: state.service.current_lift().await?,
    };

    let body = match surface {
        Surface::Home => home::home_page(&data),
        Surface::Organizer => {
            let lifters = state.service.list_lifters().await?;
            organizer::organizer_page(&data, &lifters)
        }
        Surface::Display => display::display_page(&data),
        Surface::Judge => judge::judge_page(&data),
    };

    Ok(Html(layout(surface, body).into_string()))
}

fn layout(surface: Surface, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                title { "Meet - " (surface.title()) }
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                style { (PreEscaped(CSS)) }
            }
            body data-surface=(surface.title().to_lowercase()) data-channel="/ws" {
                (nav(surface))
                main { (body) }
                script { (PreEscaped(CHANNEL_JS)) }
            }
        }
    }
}

fn nav(current: Surface) -> Markup {
    let links = [
        Surface::Home,
        Surface::Organizer,
        Surface::Display,
        Surface::Judge,
    ];
    html! {
        nav {
            @for s in links {
                a href=(s.canonical_path()) class=(if s == current { "active" } else { "" }) {
                    (s.title())
                }
            }
            span id="channel-status" class="status" { "connecting" }
        }
    }
}

/// Attempt line shared by several surfaces.
pub(crate) fn attempt_summary(state: &MeetState) -> Markup {
    html! {
        p class="attempt" {
            (state.current_lift_type) " - attempt " (state.current_attempt_number)
        }
    }
}

pub(crate) fn lift_card(lift: Option<&Lift>) -> Markup {
    html! {
        @match lift {
            Some(lift) => {
                div class="lift" data-lift-id=(lift.id) {
                    h2 { (lift.lifter_name) }
                    p class="weight" { (format!("{:.1} kg", lift.weight_lifted)) }
                    p class="decisions" {
                        @for seat in JudgeSeat::ALL {
                            span title=(seat) class=(match lift.decisions.get(seat) {
                                Some(true) => "light good",
                                Some(false) => "light bad",
                                None => "light",
                            }) {}
                        }
                    }
                }
            }
            None => {
                div class="lift empty" { "No lifter on the platform" }
            }
        }
    }
}

const CSS: &str = r#"
    body { font-family: system-ui, sans-serif; margin: 0; background: #111; color: #eee; }
    nav { display: flex; gap: 1rem; padding: 0.75rem 1rem; background: #222; }
    nav a { color: #aaa; text-decoration: none; }
    nav a.active { color: #fff; font-weight: 600; }
    nav .status { margin-left: auto; color: #888; }
    main { padding: 1rem; }
    .lift h2 { font-size: 2.5rem; margin: 0.5rem 0; }
    .weight { font-size: 2rem; }
    .light { display: inline-block; width: 2rem; height: 2rem; border-radius: 50%; margin: 0.25rem; background: #333; }
    .light.good { background: #fff; }
    .light.bad { background: #d22; }
    table { border-collapse: collapse; }
    td, th { padding: 0.25rem 0.75rem; border-bottom: 1px solid #333; text-align: left; }
"#;

/// Keeps the page in step with the channel: reload on broadcasts, report
/// connection state, and send commands for buttons marked `data-command`.
const CHANNEL_JS: &str = r#"
(function () {
    var status = document.getElementById('channel-status');
    var url = (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + document.body.dataset.channel;
    var delay = 500;
    var socket = null;
    function connect() {
        socket = new WebSocket(url);
        socket.onopen = function () { delay = 500; status.textContent = 'connected'; };
        socket.onclose = function () {
            status.textContent = 'disconnected';
            setTimeout(connect, delay);
            delay = Math.min(delay * 2, 30000);
        };
        socket.onmessage = function (msg) {
            var ev = JSON.parse(msg.data);
            if (ev.event === 'command_rejected') { status.textContent = ev.data.message; return; }
            if (ev.event !== 'sync' && ev.seq !== undefined) { location.reload(); }
        };
    }
    document.addEventListener('click', function (e) {
        var el = e.target.closest('[data-command]');
        if (!el || !socket || socket.readyState !== 1) { return; }
        var data = JSON.parse(el.dataset.payload || '{}');
        var pin = document.getElementById('judge-pin');
        if (pin) { data.judge_pin = pin.value; }
        socket.send(JSON.stringify({ event: el.dataset.command, data: data }));
    });
    connect();
})();
"#;
