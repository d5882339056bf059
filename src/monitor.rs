//! Serial monitor: background capture of the board's serial output, printed
//! to the console while the developer edits.
//!
//! The capture itself is delegated to a terminal multiplexer session
//! ([`CaptureSessions`]) writing to a log file in the scratch directory, and a
//! follower process ([`Tail`]) prints that log to the console. At most one
//! capture session and one follower exist at any time: `start` always stops
//! the previous ones first.
//!
//! **Example**
//! ```ignore
//! let mut monitor = ScreenMonitor::new(Box::new(Screen::new("screen")), &settings, scratch.path());
//! let handle = monitor.start("/dev/ttyUSB0")?;
//! // ... rebuild ...
//! monitor.stop(Some(handle));
//! ```

mod sessions;
mod tail;

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use console::style;
use log::{debug, info, warn};

pub use sessions::{CaptureSessions, Screen};
pub use tail::Tail;

use crate::{error::Error, settings::Settings};

// =============================================================================
// Public Interface
// =============================================================================

/// Handle to a running capture session and its follower. Owned by the reload
/// controller.
#[derive(Debug)]
pub struct MonitorHandle {
    session: String,
    tail: Option<Tail>,
}
impl MonitorHandle {
    pub fn new(session: impl Into<String>, tail: Option<Tail>) -> Self {
        MonitorHandle {
            session: session.into(),
            tail,
        }
    }

    /// Name of the capture session.
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn tail_mut(&mut self) -> Option<&mut Tail> {
        self.tail.as_mut()
    }
}

/// Starts and stops the serial monitor.
pub trait SerialMonitor: Send {
    /// Start capturing `device` and following the capture on the console.
    fn start(&mut self, device: &str) -> Result<MonitorHandle, Error>;

    /// Tear down the capture session and the follower. Always succeeds: a
    /// missing session or a failed lookup simply means there is nothing to
    /// stop. Any session carrying our name is terminated even when `handle`
    /// is `None`.
    fn stop(&mut self, handle: Option<MonitorHandle>);
}

/// The [`SerialMonitor`] capturing with a [`CaptureSessions`] implementation
/// (GNU `screen` in practice) and following with `tail -f`.
pub struct ScreenMonitor {
    sessions: Box<dyn CaptureSessions>,
    session_name: String,
    baud_rate: u32,
    follower: String,
    dir: PathBuf,
}
impl ScreenMonitor {
    /// Create a monitor logging into `dir`, usually the scratch directory.
    pub fn new(sessions: Box<dyn CaptureSessions>, settings: &Settings, dir: &Path) -> Self {
        ScreenMonitor {
            sessions,
            session_name: settings.session_name.clone(),
            baud_rate: settings.baud_rate,
            follower: settings.follower.clone(),
            dir: dir.to_path_buf(),
        }
    }

    /// Path of the capture log.
    pub fn log_file(&self) -> PathBuf {
        self.dir.join(Screen::LOG_FILE)
    }

    fn terminate_session(&self, name: &str) {
        match self.sessions.find(name) {
            Ok(Some(id)) => {
                debug!("terminating capture session {}.{}", id, name);
                if let Err(e) = self.sessions.terminate(&id) {
                    warn!("could not terminate capture session {}: {}", id, e);
                }
            }
            Ok(None) => debug!("no capture session named `{}`", name),
            Err(e) => debug!("capture session lookup failed, nothing to stop: {}", e),
        }
    }
}
impl SerialMonitor for ScreenMonitor {
    fn start(&mut self, device: &str) -> Result<MonitorHandle, Error> {
        println!(
            "[FL] 📟 Monitoring serial interface {}",
            style(device).cyan()
        );

        self.stop(None);

        let log = self.log_file();
        clear_log(&log)?;
        self.sessions
            .start(&self.session_name, device, self.baud_rate, &self.dir)?;
        info!(
            "capture session `{}` started on {} at {} baud",
            self.session_name, device, self.baud_rate
        );

        let tail = Tail::follow(&self.follower, &log)?;
        Ok(MonitorHandle::new(self.session_name.as_str(), Some(tail)))
    }

    fn stop(&mut self, handle: Option<MonitorHandle>) {
        let name = handle
            .as_ref()
            .map_or_else(|| self.session_name.clone(), |h| h.session.clone());
        self.terminate_session(&name);

        if let Some(mut tail) = handle.and_then(|mut h| h.tail.take()) {
            tail.interrupt();
        }
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Start from an empty log so the console only shows output of the freshly
/// flashed firmware.
fn clear_log(log: &Path) -> io::Result<()> {
    match fs::remove_file(log) {
        Ok(()) => {}
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    File::create(log).map(|_| ())
}

// =============================================================================
// Unit Tests
// =============================================================================
