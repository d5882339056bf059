//! The follower process printing the capture log to the console.

use std::{
    io,
    path::Path,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::error::Error;

/// How long an interrupted follower gets to exit before it is killed.
const GRACE_PERIOD: Duration = Duration::from_secs(1);

/// A running `tail -f` on the capture log. Its output goes straight to our
/// console.
///
/// The follower is interrupted when dropped.
#[derive(Debug)]
pub struct Tail {
    child: Child,
}
impl Tail {
    pub fn follow(program: &str, log: &Path) -> Result<Self, Error> {
        debug!("following {} with `{}`", log.display(), program);
        let child = Command::new(program)
            .arg("-f")
            .arg(log)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| Error::Launch {
                program: program.into(),
                source,
            })?;
        Ok(Tail { child })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Whether the follower process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Send an interrupt to the follower and reap it. Falls back to killing
    /// it if it does not exit within the grace period. Calling this on an
    /// already stopped follower does nothing.
    pub fn interrupt(&mut self) {
        if !self.is_running() {
            return;
        }
        debug!("interrupting follower {}", self.id());
        if let Err(e) = send_interrupt(&mut self.child) {
            warn!("could not interrupt follower {}: {}", self.id(), e);
        }

        let deadline = Instant::now() + GRACE_PERIOD;
        while Instant::now() < deadline {
            if !self.is_running() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
impl Drop for Tail {
    fn drop(&mut self) {
        self.interrupt();
    }
}

#[cfg(unix)]
fn send_interrupt(child: &mut Child) -> io::Result<()> {
    #[allow(unsafe_code, clippy::cast_possible_wrap)]
    let rc = unsafe { libc::kill(child.id() as i32, libc::SIGINT) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_interrupt(child: &mut Child) -> io::Result<()> {
    child.kill()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(unix)]
#[test]
fn interrupt_stops_the_follower_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("screenlog.0");
    std::fs::write(&log, b"").unwrap();

    let mut tail = Tail::follow("tail", &log).unwrap();
    assert!(tail.is_running());

    tail.interrupt();
    assert!(!tail.is_running());
    tail.interrupt();
    assert!(!tail.is_running());
}

#[test]
fn missing_follower_is_a_launch_error() {
    let err = Tail::follow("flashloop-no-such-tail", Path::new("screenlog.0")).unwrap_err();
    assert!(matches!(err, Error::Launch { .. }));
}
