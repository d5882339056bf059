//! Flashloop automates the edit-compile-flash-observe cycle of embedded
//! firmware development. It watches the firmware sources, rebuilds and
//! flashes the board on every change, then streams the serial output of the
//! board to the terminal until the next change.
//!
//! The compiler and the flasher (`arduino-cli`), the serial capture (GNU
//! `screen`) and the log follower (`tail`) are external programs. What
//! `flashloop` brings is the sequencing around them:
//!
//! * Only one build cycle runs at a time. Changes reported while building are
//!   dropped, not queued.
//! * The serial monitor is stopped before flashing, since the flasher needs
//!   the serial device, and restarted after a successful upload.
//! * The upload is never attempted when the compile step failed.
//! * Interrupting `flashloop` always releases the watcher, the capture
//!   session and the scratch directory, even in the middle of a build.
//!
//! The lifecycle is implemented as a state machine in terms of **states** and
//! **transitions** between them with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Data shared between **all** states travels with the state machine from
//!   one state to the next.
//! * Transitions between states are triggered via typed **events** and only
//!   explicitly defined transitions are permitted.
//!
//! The implementation of state transitions leverages `rust`'s `From` and
//! `Into` pattern: each target state implements `From` for the events that
//! lead to it. Any other transition is detected at compile-time as an error.

mod error;
mod monitor;
mod pipeline;
mod process;
mod reload;
mod settings;
mod utils;
mod watcher;

pub use error::{BuildError, Error, Step};
pub use monitor::{CaptureSessions, MonitorHandle, Screen, ScreenMonitor, SerialMonitor, Tail};
pub use pipeline::BuildPipeline;
pub use process::{Outcome, ProcessRunner, Runner, ToolCommand};
pub use reload::{factory, Collaborators, ReloadController, Signal};
pub use settings::{Settings, SettingsBuilder, Target};
pub use utils::{install_shutdown_hook, Scratch};
pub use watcher::{watch, Subscription};
