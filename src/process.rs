//! Execution of the external tools (compiler, flasher).
//!
//! The tool output is forwarded to our own `stdout`/`stderr` as it arrives,
//! so the developer sees the compiler progress live. A single invocation is a
//! single attempt; there is no retry at this level.

use std::{
    fmt,
    io::{self, Read, Write},
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
    sync::mpsc::{self, Sender},
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::error::Error;

// =============================================================================
// Public Interface
// =============================================================================

/// A fully specified invocation of an external program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherited from `flashloop` when `None`.
    pub cwd: Option<PathBuf>,
}
impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}
impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a tool run ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Outcome {
    Success,
    /// Non-zero exit code. A process terminated by a signal reports
    /// `128 + signal number`, like a shell would.
    Failure(i32),
}
impl From<ExitStatus> for Outcome {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return Outcome::Success;
        }
        match status.code() {
            Some(code) => Outcome::Failure(code),
            None => Outcome::Failure(signal_code(&status)),
        }
    }
}

/// Runs external tools on behalf of the build pipeline.
///
/// The trait is the seam used to replace the real tools with stubs.
pub trait Runner: Send + Sync {
    /// Run `command` to completion. `Err` is only returned when the program
    /// could not be started or waited on; a non-zero exit is a
    /// [`Outcome::Failure`].
    fn run(&self, command: &ToolCommand) -> Result<Outcome, Error>;
}

/// The [`Runner`] spawning real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;
impl Runner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> Result<Outcome, Error> {
        debug!("spawning `{}`", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| Error::Launch {
            program: command.program.clone(),
            source,
        })?;

        let (drained, forwarders) = mpsc::channel();
        let mut pending = 0;
        if let Some(out) = child.stdout.take() {
            forward(out, io::stdout(), drained.clone());
            pending += 1;
        }
        if let Some(err) = child.stderr.take() {
            forward(err, io::stderr(), drained);
            pending += 1;
        }

        let status = child.wait()?;

        // The pipes normally close when the child exits. A background process
        // left behind by the tool may keep them open: stop waiting for the
        // forwarders after a grace period and leave them detached.
        let deadline = Instant::now() + DRAIN_GRACE;
        while pending > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if forwarders.recv_timeout(left).is_err() {
                warn!(
                    "`{}` exited but its output is still open, not waiting for it",
                    command.program
                );
                break;
            }
            pending -= 1;
        }

        let outcome = Outcome::from(status);
        debug!("`{}` finished: {:?}", command.program, outcome);
        Ok(outcome)
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// How long to keep forwarding output once the tool itself has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Copy everything from `source` to `sink` chunk by chunk on a dedicated
/// thread, flushing after each chunk. `drained` is notified at end of stream.
fn forward<R, W>(mut source: R, mut sink: W, drained: Sender<()>)
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0_u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    trace!("forwarding {} bytes", n);
                    if sink.write_all(&buf[..n]).and_then(|_| sink.flush()).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = drained.send(());
    });
}

#[cfg(unix)]
fn signal_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map_or(-1, |signal| 128 + signal)
}

#[cfg(not(unix))]
fn signal_code(_status: &ExitStatus) -> i32 {
    -1
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn display_joins_program_and_args() {
    let cmd = ToolCommand::new("arduino-cli")
        .arg("compile")
        .arg("--fqbn")
        .arg("esp32:esp32:nodemcu-32s");
    assert_eq!(cmd.to_string(), "arduino-cli compile --fqbn esp32:esp32:nodemcu-32s");
}

#[cfg(unix)]
#[test]
fn zero_exit_is_success() {
    let outcome = ProcessRunner.run(&ToolCommand::new("true")).unwrap();
    assert_eq!(outcome, Outcome::Success);
}

#[cfg(unix)]
#[test]
fn non_zero_exit_is_failure_with_code() {
    let cmd = ToolCommand::new("sh").arg("-c").arg("echo oops >&2; exit 3");
    let outcome = ProcessRunner.run(&cmd).unwrap();
    assert_eq!(outcome, Outcome::Failure(3));
}

#[cfg(unix)]
#[test]
fn runs_in_the_requested_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker"), b"").unwrap();
    let cmd = ToolCommand::new("test")
        .arg("-f")
        .arg("marker")
        .current_dir(dir.path());
    assert_eq!(ProcessRunner.run(&cmd).unwrap(), Outcome::Success);
}

#[cfg(unix)]
#[test]
fn killed_process_reports_signal_code() {
    let cmd = ToolCommand::new("sh").arg("-c").arg("kill -9 $$");
    assert_eq!(ProcessRunner.run(&cmd).unwrap(), Outcome::Failure(128 + 9));
}

#[cfg(unix)]
#[test]
fn lingering_background_process_does_not_block_the_run() {
    // `sleep` inherits the output pipes and outlives the shell.
    let cmd = ToolCommand::new("sh").arg("-c").arg("sleep 10 & exit 0");
    let started = Instant::now();
    assert_eq!(ProcessRunner.run(&cmd).unwrap(), Outcome::Success);
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[test]
fn missing_program_is_a_launch_error() {
    let cmd = ToolCommand::new("flashloop-this-tool-does-not-exist");
    match ProcessRunner.run(&cmd) {
        Err(Error::Launch { program, .. }) => {
            assert_eq!(program, "flashloop-this-tool-does-not-exist")
        }
        other => panic!("expected a launch error, got {:?}", other),
    }
}
