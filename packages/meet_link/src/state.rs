//! Process-local copy of the authoritative meet state.
//!
//! Only [`SharedMeetState::apply`] changes it, and only the router calls
//! that. Readers take owned snapshots or wait on change notifications.
//!
//! Ordering: `sync` replaces everything and resets the high-water mark to
//! its `seq`. Any other broadcast with `seq <= last_seq` is dropped. A jump
//! past `last_seq + 1` is still applied, since events carry whole objects,
//! but flags the snapshot `stale` until the next `sync`. Losing the channel
//! also flags it stale; the endpoint sends a fresh `sync` on every join.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use meet_model::{Decisions, Lift, MeetState};

use crate::protocol::{self, ChannelEvent, SyncPayload};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetSnapshot {
    pub meet_state: Option<MeetState>,
    /// The lift on the platform, including the judges' decisions so far.
    pub active_lift: Option<Lift>,
    /// Highest broadcast `seq` seen.
    pub seq: u64,
    pub epoch: Option<String>,
    /// A `sync` has been received since start.
    pub synced: bool,
    /// Events may have been missed since the last `sync`.
    pub stale: bool,
    /// Duplicate or out-of-order events discarded.
    pub dropped: u64,
}

impl MeetSnapshot {
    pub fn decisions(&self) -> Option<Decisions> {
        self.active_lift.as_ref().map(|l| l.decisions)
    }

    /// Synced and not known to have missed anything.
    pub fn is_current(&self) -> bool {
        self.synced && !self.stale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// `seq` at or below the high-water mark.
    Duplicate,
    /// Not a state event, or not decodable.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct SharedMeetState {
    tx: Arc<watch::Sender<MeetSnapshot>>,
}

impl Default for SharedMeetState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMeetState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(MeetSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn reader(&self) -> MeetStateReader {
        MeetStateReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> MeetSnapshot {
        self.tx.borrow().clone()
    }

    pub fn apply(&self, event: &ChannelEvent) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::Ignored;
        self.tx.send_if_modified(|snap| {
            outcome = apply_to(snap, event);
            outcome != ApplyOutcome::Ignored
        });
        outcome
    }

    pub fn mark_disconnected(&self) {
        self.tx.send_if_modified(|snap| {
            let was = snap.stale;
            snap.stale = true;
            !was
        });
    }
}

fn apply_to(snap: &mut MeetSnapshot, event: &ChannelEvent) -> ApplyOutcome {
    if event.is(protocol::SYNC) {
        let sync: SyncPayload = match event.payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "undecodable sync");
                return ApplyOutcome::Ignored;
            }
        };
        if snap.epoch.as_deref().is_some_and(|e| e != sync.epoch) {
            debug!(old = ?snap.epoch, new = %sync.epoch, "endpoint restarted");
        }
        snap.meet_state = Some(sync.meet_state);
        snap.active_lift = sync.active_lift;
        snap.epoch = Some(sync.epoch);
        snap.seq = event.seq.unwrap_or(0);
        snap.synced = true;
        snap.stale = false;
        return ApplyOutcome::Applied;
    }

    let Some(seq) = event.seq else {
        return ApplyOutcome::Ignored;
    };
    if seq <= snap.seq {
        snap.dropped += 1;
        debug!(event = %event.event, seq, last = snap.seq, "dropping stale event");
        return ApplyOutcome::Duplicate;
    }
    if snap.synced && seq > snap.seq + 1 {
        debug!(event = %event.event, seq, last = snap.seq, "gap in event stream");
        snap.stale = true;
    }
    snap.seq = seq;

    let decoded = match event.event.as_str() {
        protocol::MEET_STATE_UPDATED => event.payload::<MeetState>().map(|state| {
            if snap
                .active_lift
                .as_ref()
                .is_some_and(|l| Some(l.id) != state.current_active_lift_id)
            {
                snap.active_lift = None;
            }
            snap.meet_state = Some(state);
        }),
        protocol::ACTIVE_LIFT_CHANGED => event.payload::<Option<Lift>>().map(|lift| {
            if let Some(state) = snap.meet_state.as_mut() {
                state.current_active_lift_id = lift.as_ref().map(|l| l.id);
            }
            snap.active_lift = lift;
        }),
        protocol::LIFT_UPDATED => event.payload::<Lift>().map(|lift| {
            if snap.active_lift.as_ref().is_some_and(|a| a.id == lift.id) {
                snap.active_lift = Some(lift);
            }
        }),
        _ => return ApplyOutcome::Ignored,
    };

    match decoded {
        Ok(()) => ApplyOutcome::Applied,
        Err(e) => {
            warn!(event = %event.event, error = %e, "undecodable event");
            ApplyOutcome::Ignored
        }
    }
}

/// Read side handed to presentation code.
#[derive(Debug, Clone)]
pub struct MeetStateReader {
    rx: watch::Receiver<MeetSnapshot>,
}

impl MeetStateReader {
    pub fn snapshot(&self) -> MeetSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. Errors once the state has been dropped.
    pub async fn changed(&mut self) -> Result<MeetSnapshot, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Wait until `pred` holds, returning the matching snapshot.
    pub async fn wait_for(
        &mut self,
        pred: impl FnMut(&MeetSnapshot) -> bool,
    ) -> Result<MeetSnapshot, watch::error::RecvError> {
        Ok(self.rx.wait_for(pred).await?.clone())
    }
}
