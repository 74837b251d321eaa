mod export;
mod watch;

pub use export::export_command;
pub use watch::watch_command;
