//! Build, flash and monitor lifecycle.
//!
//! Every change under the watched source path rebuilds the firmware, flashes
//! it to the board and restarts the serial monitor. Only one build cycle can
//! be in flight: changes reported while building are dropped, not queued.
//! The next change after the cycle resolves starts a new one.
//!
//! The reload controller is a single-owner actor: one thread steps the state
//! machine and consumes the [`Signal`]s sent by the watcher, the Ctrl+C
//! handler and the build worker. The session state (busy flag and monitor
//! handle) is only ever touched from that thread.
//!
//! The following state diagram summarizes the different states and
//! transitions the reload controller goes through:
//!
//! ```text
//!                            START
//!                              |
//!                              v
//!                          .-------.
//!                          | Init  |
//!                          '-------'
//!                              |
//!                           initial
//!                            build
//!                              v
//!       .------.  failed  .----------.  flashed  .------------.
//!       | Idle |<---------| Building |---------->| Monitoring |
//!       '------'--------->'----------'<----------'------------'
//!          |     change        |         change         |
//!          |                   |                        |
//!          |    shutdown       | shutdown / fatal       | shutdown
//!          |                   v                        |
//!          |              .----------.                  |
//!          '------------->|   Done   |<-----------------'
//!                         '----------'
//!                              |
//!                              v
//!                             END
//! ```

use std::{
    fmt,
    sync::{
        mpsc::{Receiver, Sender},
        Arc,
    },
};

use log::debug;

use super::events::*;
use super::session::Session;
use super::states::*;
use crate::{
    error::Error, monitor::SerialMonitor, pipeline::BuildPipeline, process::Runner,
    settings::Settings, utils::Scratch, watcher::Subscription,
};

// =============================================================================
// Public Interface
// =============================================================================

/// Messages consumed by the reload controller.
#[derive(Debug)]
pub enum Signal {
    /// The watched sources changed.
    Trigger,
    /// The run must end; the teardown will be executed.
    Shutdown,
    /// Sent by the build worker when the pipeline resolved.
    CycleFinished(Result<(), Error>),
}

/// Everything the reload controller drives, injected at construction.
pub struct Collaborators {
    /// Runs the compiler and the flasher.
    pub runner: Arc<dyn Runner>,
    pub monitor: Box<dyn SerialMonitor>,
    /// Sending side of the signal channel, cloned for the build worker.
    pub notifier: Sender<Signal>,
    /// Receiving side of the signal channel.
    pub signals: Receiver<Signal>,
    /// The watcher subscription, released on shutdown.
    pub subscription: Option<Subscription>,
    /// Scratch storage, removed on shutdown.
    pub scratch: Option<Scratch>,
}

/// Represents the `flashloop` reload controller. Use the `factory()` function
/// to get an instance then run it by calling its `run()` method.
pub struct ReloadController {
    sm: ReloadStates,
}
impl ReloadController {
    /// The reload controller event loop runs until the `Done` state is reached
    /// and its `should_exit` flag is set. At such point, the event loop
    /// terminates and returns an exit code indicating no errors when equal to
    /// **`0`**; otherwise a termination with error.
    ///
    /// The returned status code could be used as an exit code from
    /// `flashloop`.
    pub fn run(self) -> i8 {
        let mut sm = self.sm;
        loop {
            sm = sm.step();
            if let ReloadStates::Done(done) = &sm {
                if done.state.should_exit {
                    return if done.state.with_error { 1 } else { 0 };
                }
            }
        }
    }
}

/// Factory function for the reload controller. The initial build starts as
/// soon as the returned controller is run.
pub fn factory(settings: Settings, collaborators: Collaborators) -> ReloadController {
    let pipeline = BuildPipeline::new(collaborators.runner, &settings);
    let ctx = Context {
        settings,
        session: Session::default(),
        pipeline: Arc::new(pipeline),
        monitor: collaborators.monitor,
        notifier: collaborators.notifier,
        signals: collaborators.signals,
        subscription: collaborators.subscription,
        scratch: collaborators.scratch,
    };
    ReloadController {
        sm: ReloadStates::Init(ReloadSM::new(ctx)),
    }
}

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Data shared by all the states, moved along with every transition.
pub(crate) struct Context {
    pub settings: Settings,
    pub session: Session,
    pub pipeline: Arc<BuildPipeline>,
    pub monitor: Box<dyn SerialMonitor>,
    pub notifier: Sender<Signal>,
    pub signals: Receiver<Signal>,
    pub subscription: Option<Subscription>,
    pub scratch: Option<Scratch>,
}
impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("target", &self.settings.target)
            .field("session", &self.session)
            .field("subscription", &self.subscription)
            .field("scratch", &self.scratch)
            .finish()
    }
}

// =============================================================================
// Private stuff
// =============================================================================

// -----------------------------------------------------------------------------
// The State Machine
// -----------------------------------------------------------------------------

/// The raw state machine implementing the reload lifecycle.
///
/// Using a generic type that holds the current state allows for having data
/// shared by all states (the `Context`) that is not really part of any state.
/// Additionally, it's nicer when debugging to see the state machine and the
/// current state it is holding at any time.
#[derive(Debug)]
struct ReloadSM<S: Runnable> {
    ctx: Context,
    state: S,
}
impl<S: Runnable> ReloadSM<S> {
    fn run(&mut self) -> Event {
        self.state.run(&mut self.ctx)
    }

    /// Move the shared context into the state machine for the next state.
    fn transition<T: Runnable>(self, state: T) -> ReloadSM<T> {
        ReloadSM {
            ctx: self.ctx,
            state,
        }
    }
}

/// The state machine starts in the `InitState`.
impl ReloadSM<InitState> {
    fn new(ctx: Context) -> Self {
        ReloadSM {
            ctx,
            state: InitState {},
        }
    }
}

/// Wraps the state machine and its various states into a simple enum, which can
/// also be used for pattern matching during state transitions.
enum ReloadStates {
    Init(ReloadSM<InitState>),
    Idle(ReloadSM<IdleState>),
    Building(ReloadSM<BuildingState>),
    Monitoring(ReloadSM<MonitoringState>),
    Done(ReloadSM<DoneState>),
}
impl ReloadStates {
    /// The unit of work in the state machine event loop. It runs the current
    /// state and decides the next transition from the event it returns. State
    /// transitions from events are implemented using the rust `From`/`Into`
    /// pattern.
    fn step(self) -> Self {
        match self {
            ReloadStates::Init(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Build(ev) => ReloadStates::Building(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            ReloadStates::Idle(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Build(ev) => ReloadStates::Building(sm.transition(ev.into())),
                    Event::Shutdown(ev) => ReloadStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            ReloadStates::Building(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Flashed(ev) => ReloadStates::Monitoring(sm.transition(ev.into())),
                    Event::BuildFailed(ev) => ReloadStates::Idle(sm.transition(ev.into())),
                    Event::Shutdown(ev) => ReloadStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            ReloadStates::Monitoring(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Build(ev) => ReloadStates::Building(sm.transition(ev.into())),
                    Event::Shutdown(ev) => ReloadStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            ReloadStates::Done(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(ev) => ReloadStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<BuildEvent> for BuildingState {
    fn from(event: BuildEvent) -> BuildingState {
        BuildingState {
            reload: event.reload,
        }
    }
}

impl From<FlashedEvent> for MonitoringState {
    fn from(_: FlashedEvent) -> MonitoringState {
        MonitoringState {}
    }
}

impl From<BuildFailedEvent> for IdleState {
    fn from(event: BuildFailedEvent) -> IdleState {
        debug!("cycle failed: {}", event.error);
        IdleState {}
    }
}

impl From<ShutdownEvent> for DoneState {
    fn from(event: ShutdownEvent) -> DoneState {
        DoneState {
            with_error: event.with_error,
            should_exit: false,
        }
    }
}
impl From<ExitEvent> for DoneState {
    fn from(event: ExitEvent) -> DoneState {
        DoneState {
            with_error: event.with_error,
            should_exit: true,
        }
    }
}
