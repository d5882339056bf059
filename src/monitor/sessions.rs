//! Background capture sessions held by a terminal multiplexer.
//!
//! The session identifier is assigned by the multiplexer, so it can only be
//! discovered by listing the sessions and matching on the name we chose.

use std::{
    path::Path,
    process::{Command, Output},
};

use log::trace;

use crate::error::Error;

// =============================================================================
// Public Interface
// =============================================================================

/// The capabilities the serial monitor needs from the session manager.
pub trait CaptureSessions: Send {
    /// Start a detached session named `name` capturing `device` at
    /// `baud_rate`, logging into `dir`.
    fn start(&self, name: &str, device: &str, baud_rate: u32, dir: &Path) -> Result<(), Error>;

    /// Find the identifier of the session named `name`, if there is one.
    fn find(&self, name: &str) -> Result<Option<String>, Error>;

    /// Terminate the session with the given identifier.
    fn terminate(&self, id: &str) -> Result<(), Error>;
}

/// [`CaptureSessions`] backed by GNU `screen`. The log lands in
/// `screenlog.0` inside the session's working directory.
#[derive(Debug, Clone)]
pub struct Screen {
    program: String,
}
impl Screen {
    /// Name of the file `screen -L` logs into.
    pub const LOG_FILE: &'static str = "screenlog.0";

    pub fn new(program: impl Into<String>) -> Self {
        Screen {
            program: program.into(),
        }
    }

    fn output(&self, args: &[&str], dir: Option<&Path>) -> Result<Output, Error> {
        trace!("{} {}", self.program, args.join(" "));
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.output().map_err(|source| Error::Launch {
            program: self.program.clone(),
            source,
        })
    }

    fn exec(&self, args: &[&str], dir: Option<&Path>) -> Result<(), Error> {
        let output = self.output(args, dir)?;
        if output.status.success() {
            return Ok(());
        }
        Err(Error::Session {
            command: format!("{} {}", self.program, args.join(" ")),
            code: output.status.code().unwrap_or(-1),
            output: format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        })
    }
}
impl CaptureSessions for Screen {
    fn start(&self, name: &str, device: &str, baud_rate: u32, dir: &Path) -> Result<(), Error> {
        let baud_rate = baud_rate.to_string();
        self.exec(&["-L", "-dmS", name, device, &baud_rate], Some(dir))?;
        // Write the log as data arrives rather than in periodic batches.
        self.exec(&["-r", name, "-p0", "-X", "logfile", "flush", "0"], Some(dir))
    }

    fn find(&self, name: &str) -> Result<Option<String>, Error> {
        // `screen -ls` exits with a non-zero status even when it lists
        // sessions, only the listing matters.
        let output = self.output(&["-ls"], None)?;
        Ok(parse_session_id(
            &String::from_utf8_lossy(&output.stdout),
            name,
        ))
    }

    fn terminate(&self, id: &str) -> Result<(), Error> {
        self.exec(&["-XS", id, "quit"], None)
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Extract the identifier of the session named `name` from a `screen -ls`
/// listing. Session lines look like `\t4242.arduino-logs\t(Detached)`.
pub(crate) fn parse_session_id(listing: &str, name: &str) -> Option<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.split_once('.'))
        .find(|(id, session)| {
            *session == name && !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
        })
        .map(|(id, _)| id.to_owned())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn finds_the_named_session() {
    let listing = "There are screens on:\n\
                   \t1001.other\t(Detached)\n\
                   \t4242.arduino-logs\t(05/10/2026 10:12:01 AM)\t(Detached)\n\
                   2 Sockets in /run/screen/S-dev.\n";
    assert_eq!(
        parse_session_id(listing, "arduino-logs"),
        Some("4242".to_string())
    );
}

#[test]
fn no_session_in_listing() {
    let listing = "No Sockets found in /run/screen/S-dev.\n";
    assert_eq!(parse_session_id(listing, "arduino-logs"), None);
    assert_eq!(parse_session_id("", "arduino-logs"), None);
}

#[test]
fn name_must_match_exactly() {
    let listing = "\t77.arduino-logs-old\t(Detached)\n\t78.my-arduino-logs\t(Detached)\n";
    assert_eq!(parse_session_id(listing, "arduino-logs"), None);
}

#[test]
fn missing_screen_is_a_launch_error() {
    let screen = Screen::new("flashloop-no-such-screen");
    assert!(matches!(
        screen.find("arduino-logs"),
        Err(Error::Launch { .. })
    ));
}
