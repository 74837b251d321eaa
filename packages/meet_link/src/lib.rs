//! Live meet-state channel.
//!
//! One [`Connection`] per process keeps a WebSocket open to the
//! coordination endpoint and reconnects with backoff. An [`EventRouter`]
//! dispatches inbound events to handlers on a single task and sends
//! commands back out. [`SharedMeetState`] is the local copy of the meet,
//! patched only by inbound events. [`MeetLink`] wires the three together
//! and is what presentation code is handed.

pub mod backoff;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod link;
pub mod protocol;
pub mod router;
pub mod state;

pub use backoff::ReconnectPolicy;
pub use connection::{Connection, Inbound, LinkLifecycle, LinkStatus};
pub use endpoint::ConnectionEndpoint;
pub use error::LinkError;
pub use link::MeetLink;
pub use protocol::ChannelEvent;
pub use router::EventRouter;
pub use state::{ApplyOutcome, MeetSnapshot, MeetStateReader, SharedMeetState};
