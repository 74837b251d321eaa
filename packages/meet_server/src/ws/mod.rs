//! The meet channel over WebSocket.
//!
//! Each client gets a `sync` first, then every broadcast in `seq` order.
//! Commands it sends are run through [`crate::service::MeetService`]; a
//! failure is answered to that client alone with `command_rejected`.

pub(crate) mod dispatch;
mod handler;

pub use handler::handle_channel;
