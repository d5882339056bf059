//! The compile-then-flash build pipeline.
//!
//! Both steps go through a [`Runner`] and use the same [`Target`]. The
//! pipeline is all-or-nothing: the upload is never attempted when the compile
//! step failed.

use std::sync::Arc;

use console::style;
use log::info;

use crate::{
    error::{BuildError, Error, Step},
    process::{Outcome, Runner, ToolCommand},
    settings::{Settings, Target},
};

pub struct BuildPipeline {
    runner: Arc<dyn Runner>,
    target: Target,
    compiler: String,
    flasher: String,
}
impl BuildPipeline {
    pub fn new(runner: Arc<dyn Runner>, settings: &Settings) -> Self {
        BuildPipeline {
            runner,
            target: settings.target.clone(),
            compiler: settings.compiler.clone(),
            flasher: settings.flasher.clone(),
        }
    }

    /// `<compiler> compile --fqbn <board> <source>`
    pub fn compile_command(&self) -> ToolCommand {
        ToolCommand::new(self.compiler.as_str())
            .arg("compile")
            .arg("--fqbn")
            .arg(self.target.board.as_str())
            .arg(self.target.source.to_string_lossy())
    }

    /// `<flasher> upload -p <device> --fqbn <board> <source>`
    pub fn flash_command(&self) -> ToolCommand {
        ToolCommand::new(self.flasher.as_str())
            .arg("upload")
            .arg("-p")
            .arg(self.target.device.as_str())
            .arg("--fqbn")
            .arg(self.target.board.as_str())
            .arg(self.target.source.to_string_lossy())
    }

    pub fn compile(&self) -> Result<(), Error> {
        println!(
            "[FL] 🔨 Building {}",
            style(self.target.source.display()).cyan()
        );
        self.step(Step::Compile, &self.compile_command())
    }

    pub fn flash(&self) -> Result<(), Error> {
        println!(
            "[FL] ⏩ Uploading {} to {}",
            style(self.target.source.display()).cyan(),
            style(&self.target.device).cyan()
        );
        self.step(Step::Flash, &self.flash_command())
    }

    /// Compile then flash. Returns the first failure.
    pub fn run(&self) -> Result<(), Error> {
        self.compile()?;
        self.flash()
    }

    fn step(&self, step: Step, command: &ToolCommand) -> Result<(), Error> {
        match self.runner.run(command)? {
            Outcome::Success => {
                info!("{} step succeeded", step);
                Ok(())
            }
            Outcome::Failure(code) => Err(BuildError { step, code }.into()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::settings::SettingsBuilder;

    /// Answers each verb with a preset outcome and records every command.
    struct ScriptedRunner {
        compile: Outcome,
        upload: Outcome,
        calls: Mutex<Vec<ToolCommand>>,
    }
    impl ScriptedRunner {
        fn new(compile: Outcome, upload: Outcome) -> Arc<Self> {
            Arc::new(ScriptedRunner {
                compile,
                upload,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn verbs(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.args[0].clone())
                .collect()
        }
    }
    impl Runner for ScriptedRunner {
        fn run(&self, command: &ToolCommand) -> Result<Outcome, Error> {
            self.calls.lock().unwrap().push(command.clone());
            Ok(match command.args[0].as_str() {
                "compile" => self.compile,
                _ => self.upload,
            })
        }
    }

    fn settings() -> Settings {
        SettingsBuilder::new()
            .source("/work/blink")
            .device("/dev/ttyUSB0")
            .board("esp32:esp32:nodemcu-32s")
            .finalize()
    }

    #[test]
    fn commands_follow_the_tool_contract() {
        let pipeline = BuildPipeline::new(
            ScriptedRunner::new(Outcome::Success, Outcome::Success),
            &settings(),
        );
        assert_eq!(
            pipeline.compile_command().to_string(),
            "arduino-cli compile --fqbn esp32:esp32:nodemcu-32s /work/blink"
        );
        assert_eq!(
            pipeline.flash_command().to_string(),
            "arduino-cli upload -p /dev/ttyUSB0 --fqbn esp32:esp32:nodemcu-32s /work/blink"
        );
    }

    #[test]
    fn compile_then_flash_on_success() {
        let runner = ScriptedRunner::new(Outcome::Success, Outcome::Success);
        let pipeline = BuildPipeline::new(runner.clone(), &settings());
        pipeline.run().unwrap();
        assert_eq!(runner.verbs(), vec!["compile", "upload"]);
    }

    #[test]
    fn failed_compile_never_flashes() {
        let runner = ScriptedRunner::new(Outcome::Failure(1), Outcome::Success);
        let pipeline = BuildPipeline::new(runner.clone(), &settings());
        match pipeline.run() {
            Err(Error::Build(err)) => assert_eq!(
                err,
                BuildError {
                    step: Step::Compile,
                    code: 1
                }
            ),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(runner.verbs(), vec!["compile"]);
    }

    #[test]
    fn failed_flash_carries_its_exit_code() {
        let runner = ScriptedRunner::new(Outcome::Success, Outcome::Failure(2));
        let pipeline = BuildPipeline::new(runner, &settings());
        match pipeline.run() {
            Err(Error::Build(err)) => assert_eq!(
                err,
                BuildError {
                    step: Step::Flash,
                    code: 2
                }
            ),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
