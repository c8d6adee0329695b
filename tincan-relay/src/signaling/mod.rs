mod output;
mod peer_sinks;
mod ws_handler;

pub use output::*;
pub use peer_sinks::*;
pub use ws_handler::*;
