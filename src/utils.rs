//! Helpers around the reload loop: serial ports, scratch storage and process
//! signals.

mod ports;
mod scratch;
mod signals;

pub(crate) use ports::device_present;
pub use scratch::Scratch;
pub use signals::install_shutdown_hook;
