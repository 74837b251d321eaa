//! `meetd watch`: follow the meet from a terminal through a [`MeetLink`].

use anyhow::{Context, Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use meet_link::{LinkLifecycle, LinkStatus, MeetLink, MeetSnapshot};

use crate::config::{self, FileConfig};

pub async fn watch_command(file_config: &FileConfig, endpoint: Option<&str>) -> Result<()> {
    let endpoint = config::resolve_endpoint(endpoint, file_config)
        .context("Invalid channel endpoint")?;
    let policy = config::reconnect_policy(&file_config.link);
    info!("Watching meet at {}", endpoint);

    let link = MeetLink::connect(endpoint, policy);
    let mut lifecycle = link.lifecycle();
    let mut state = link.state();
    let mut status = link.connection().watch_status();

    loop {
        tokio::select! {
            signal = lifecycle.recv() => match signal {
                Ok(LinkLifecycle::Connected { session }) => info!(session, "connected"),
                Ok(LinkLifecycle::Disconnected { reason }) => warn!("disconnected: {}", reason),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            changed = state.changed() => match changed {
                Ok(snapshot) => println!("{}", describe(&snapshot)),
                Err(_) => break,
            },
            _ = status.wait_for(|s| *s == LinkStatus::Closed) => {
                bail!("Gave up on the meet channel at {}", link.connection().endpoint());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing channel");
                break;
            }
        }
    }

    link.close();
    Ok(())
}

/// One line per state change.
pub(crate) fn describe(snapshot: &MeetSnapshot) -> String {
    let Some(state) = &snapshot.meet_state else {
        return "waiting for sync".to_string();
    };
    let mut line = format!(
        "[seq {}] {} attempt {} ({})",
        snapshot.seq, state.current_lift_type, state.current_attempt_number, state.display_mode
    );
    match &snapshot.active_lift {
        Some(lift) => {
            let lights: String = meet_model::JudgeSeat::ALL
                .iter()
                .map(|seat| match lift.decisions.get(*seat) {
                    Some(true) => 'o',
                    Some(false) => 'x',
                    None => '.',
                })
                .collect();
            line.push_str(&format!(
                " | {} {:.1} kg [{}] {}",
                lift.lifter_name, lift.weight_lifted, lights, lift.status
            ));
        }
        None => line.push_str(" | platform empty"),
    }
    if snapshot.stale {
        line.push_str(" (stale)");
    }
    line
}
