mod classes;
mod export;
mod health;
mod judges;
mod lifters;
mod lifts;
mod meet;
mod websocket;

pub use classes::*;
pub use export::*;
pub use health::*;
pub use judges::*;
pub use lifters::*;
pub use lifts::*;
pub use meet::*;
pub use websocket::*;
