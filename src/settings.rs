//! Settings for the board target, the external tools and the reload policy.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::path::PathBuf;

// =============================================================================
// Public Interface
// =============================================================================

/// The firmware being developed and the board it runs on. Immutable for the
/// lifetime of a run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Target {
    /// Absolute path to the firmware sketch or project directory.
    pub source: PathBuf,
    /// Fully qualified board name passed to the compiler and the flasher.
    pub board: String,
    /// The serial device the board is attached to.
    pub device: String,
}

/// Groups all settings used by `flashloop` and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub target: Target,
    /// The baud rate the serial capture is opened with.
    pub baud_rate: u32,
    /// Program invoked with the `compile` verb.
    pub compiler: String,
    /// Program invoked with the `upload` verb.
    pub flasher: String,
    /// The terminal multiplexer holding the background capture session.
    pub capture: String,
    /// Program used to follow the capture log on the console.
    pub follower: String,
    /// Name of the background capture session. Any session with this name is
    /// considered ours and will be terminated before a new one starts.
    pub session_name: String,
    /// When `true`, a failed compile or upload terminates the run instead of
    /// waiting for the next change.
    pub fail_fast: bool,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set. The source path has no meaningful default and should
/// always be provided.
///
/// **Example**
///
/// ```ignore
/// let settings = SettingsBuilder::new().source("/work/blink").finalize();
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
impl SettingsBuilder {
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                target: Target {
                    source: PathBuf::new(),
                    board: "esp32:esp32:nodemcu-32s".into(),
                    device: "/dev/tty.usbserial-0001".into(),
                },
                baud_rate: 9_600,
                compiler: "arduino-cli".into(),
                flasher: "arduino-cli".into(),
                capture: "screen".into(),
                follower: "tail".into(),
                session_name: "arduino-logs".into(),
                fail_fast: false,
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the firmware sources
    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.settings.target.source = source.into();
        self
    }

    /// Set the fully qualified board name
    pub fn board<'a>(mut self, board: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.target.board = board.into().into_owned();
        self
    }

    /// Set the path to the serial device
    pub fn device<'a>(mut self, device: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.target.device = device.into().into_owned();
        self
    }

    /// Set the baud rate of the serial capture
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Use the same program for compiling and uploading
    pub fn toolchain<'a>(self, program: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        let program = program.into().into_owned();
        self.compiler(program.clone()).flasher(program)
    }

    pub fn compiler<'a>(mut self, program: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.compiler = program.into().into_owned();
        self
    }

    pub fn flasher<'a>(mut self, program: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.flasher = program.into().into_owned();
        self
    }

    pub fn capture<'a>(mut self, program: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.capture = program.into().into_owned();
        self
    }

    pub fn follower<'a>(mut self, program: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.follower = program.into().into_owned();
        self
    }

    pub fn session_name<'a>(mut self, name: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.session_name = name.into().into_owned();
        self
    }

    /// Make build failures fatal
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.settings.fail_fast = fail_fast;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            target: Target {
                source: PathBuf::new(),
                board: "esp32:esp32:nodemcu-32s".into(),
                device: "/dev/tty.usbserial-0001".into(),
            },
            baud_rate: 9_600,
            compiler: "arduino-cli".into(),
            flasher: "arduino-cli".into(),
            capture: "screen".into(),
            follower: "tail".into(),
            session_name: "arduino-logs".into(),
            fail_fast: false,
            _private_use_builder: (),
        }
    )
}

#[test]
fn source() {
    let settings = SettingsBuilder::new().source("/work/blink").finalize();
    assert_eq!(settings.target.source, PathBuf::from("/work/blink"));
}

#[test]
fn device() {
    let settings = SettingsBuilder::new().device("/dev/ttyUSB0").finalize();
    assert_eq!(settings.target.device, "/dev/ttyUSB0");
}

#[test]
fn board() {
    let settings = SettingsBuilder::new()
        .board("arduino:avr:uno")
        .finalize();
    assert_eq!(settings.target.board, "arduino:avr:uno");
}

#[test]
fn baud_rate() {
    let baud_rate = 115_200;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn toolchain_sets_compiler_and_flasher() {
    let settings = SettingsBuilder::new()
        .toolchain("/opt/arduino/arduino-cli")
        .finalize();
    assert_eq!(settings.compiler, "/opt/arduino/arduino-cli");
    assert_eq!(settings.flasher, "/opt/arduino/arduino-cli");
}

#[test]
fn fail_fast() {
    let settings = SettingsBuilder::new().fail_fast(true).finalize();
    assert!(settings.fail_fast);
}

#[test]
fn session_name() {
    let settings = SettingsBuilder::new().session_name("esp-logs").finalize();
    assert_eq!(settings.session_name, "esp-logs");
}
