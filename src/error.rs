//! Errors reported by `flashloop`.
//!
//! Only [`Error::Build`] is recoverable: the reload controller goes back to
//! waiting for the next change. Everything else terminates the run after the
//! shutdown teardown.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// The step of the build pipeline that failed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Step {
    Compile,
    Flash,
}
impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Compile => f.write_str("compile"),
            Step::Flash => f.write_str("upload"),
        }
    }
}

/// A pipeline step ran to completion with a non-zero exit code.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
#[error("{step} failed with exit code {code}")]
pub struct BuildError {
    pub step: Step,
    pub code: i32,
}

#[derive(Error, Debug)]
pub enum Error {
    /// The firmware source path given on the command line does not exist.
    #[error("source path `{}` does not exist", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error(transparent)]
    Build(#[from] BuildError),

    /// An external tool could not be started at all.
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A capture session command exited with an error. `output` holds what
    /// the command printed.
    #[error("`{command}` failed with exit code {code}\n{output}")]
    Session {
        command: String,
        code: i32,
        output: String,
    },

    #[error("failed to watch `{}`: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to install the Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn build_error_names_the_tool_verb() {
    let err = BuildError {
        step: Step::Flash,
        code: 2,
    };
    assert_eq!(err.to_string(), "upload failed with exit code 2");
}

#[test]
fn build_errors_display_transparently() {
    let build: Error = BuildError {
        step: Step::Compile,
        code: 1,
    }
    .into();
    assert_eq!(build.to_string(), "compile failed with exit code 1");

    let launch = Error::Launch {
        program: "arduino-cli".into(),
        source: io::Error::new(io::ErrorKind::NotFound, "not found"),
    };
    assert!(launch.to_string().contains("arduino-cli"));
}

#[test]
fn session_error_carries_captured_output() {
    let err = Error::Session {
        command: "screen -XS 42 quit".into(),
        code: 1,
        output: "No screen session found.".into(),
    };
    let text = err.to_string();
    assert!(text.starts_with("`screen -XS 42 quit` failed with exit code 1"));
    assert!(text.ends_with("No screen session found."));
}
