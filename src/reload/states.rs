//! States for the `flashloop` reload controller state machine.
//!
//! This modules is private and restricted to the [`reload`](crate::reload)
//! scope. The public interface of the state machine is provided by
//! [`reload`](crate::reload).
//!
//! ```ignore
//! use super::states::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::{sync::Arc, thread};

use console::style;
use log::{debug, error, info, warn};

use super::events::*;
use super::state_machine::{Context, Signal};
use crate::{error::Error, utils};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state can do any work that needs to be done using
    /// the shared `ctx` and when finished, requests a transition to a new state
    /// by returning the appropriate `event`. The `event` is then consumed to
    /// create the new `state` using the corresponding [`From`] trait
    /// implementation (provided such implementation exists).
    fn run(&mut self, ctx: &mut Context) -> Event;
}

// Init State ==================================================================

/// Represents the initial state of the reload controller, with no monitor
/// active and no cycle in flight.
///
/// From the `InitState`, the state machine always evolves via
/// **`BuildEvent` => `BuildingState`** for the initial build.
#[derive(Debug)]
pub(crate) struct InitState {}
impl Runnable for InitState {
    fn run(&mut self, ctx: &mut Context) -> Event {
        info!("=> Init");
        println!(
            "[FL] 👀 Watching {}",
            style(ctx.settings.target.source.display()).cyan()
        );
        ctx.session.begin_cycle();
        Event::Build(BuildEvent { reload: false })
    }
}

// Idle State ==================================================================

/// Nothing is running: the last build failed and we wait for the developer
/// to fix the sources.
///
///  * **`BuildEvent` => `BuildingState`** on the next change,
///  * **`ShutdownEvent` => `DoneState`** on the shutdown signal.
#[derive(Debug)]
pub(crate) struct IdleState {}
impl Runnable for IdleState {
    fn run(&mut self, ctx: &mut Context) -> Event {
        info!("=> Idle");
        println!("[FL] ⌛ Waiting for changes...");
        wait_for_change(ctx)
    }
}

// Building State ==============================================================

/// A build cycle is in flight: the serial monitor is stopped and the
/// compile/upload pipeline runs on a worker thread. The `building` flag of
/// the session stays set for the whole cycle and triggers received meanwhile
/// are dropped.
///
///  * **`FlashedEvent` => `MonitoringState`** when the pipeline succeeded,
///  * **`BuildFailedEvent` => `IdleState`** when a step failed,
///  * **`ShutdownEvent` => `DoneState`** on the shutdown signal (without
///    waiting for the pipeline) or on an unrecoverable error.
#[derive(Debug)]
pub(crate) struct BuildingState {
    /// `true` when the cycle was started by a change rather than at startup.
    pub reload: bool,
}
impl Runnable for BuildingState {
    fn run(&mut self, ctx: &mut Context) -> Event {
        info!("=> Building (cycle #{})", ctx.session.cycles);
        debug_assert!(ctx.session.is_building());
        if self.reload {
            println!("[FL] 🔄 Reloading...");
        }

        // The previous capture must be gone before the flasher opens the
        // serial device.
        ctx.monitor.stop(ctx.session.monitor.take());

        let device = &ctx.settings.target.device;
        if !utils::device_present(device) {
            warn!("serial device {} not found", device);
            println!(
                "{}",
                style(format!("[FL] 🔌 {} is not connected, the upload will fail", device))
                    .yellow()
            );
        }

        if let Err(e) = spawn_pipeline(ctx) {
            ctx.session.finish_cycle();
            report_fatal(&e);
            return Event::Shutdown(ShutdownEvent { with_error: true });
        }

        loop {
            match ctx.signals.recv() {
                Ok(Signal::Trigger) => {
                    ctx.session.dropped += 1;
                    debug!(
                        "cycle in flight, trigger dropped ({} so far)",
                        ctx.session.dropped
                    );
                }
                Ok(Signal::CycleFinished(result)) => {
                    ctx.session.finish_cycle();
                    return on_cycle_finished(ctx, result);
                }
                Ok(Signal::Shutdown) | Err(_) => {
                    info!("shutdown while building, the pipeline is left to finish on its own");
                    return Event::Shutdown(ShutdownEvent { with_error: false });
                }
            }
        }
    }
}

// Monitoring State ============================================================

/// The freshly flashed firmware runs and its serial output is captured and
/// printed on the console.
///
///  * **`BuildEvent` => `BuildingState`** on the next change,
///  * **`ShutdownEvent` => `DoneState`** on the shutdown signal or when the
///    monitor could not be started.
#[derive(Debug)]
pub(crate) struct MonitoringState {}
impl Runnable for MonitoringState {
    fn run(&mut self, ctx: &mut Context) -> Event {
        info!("=> Monitoring");
        debug_assert!(ctx.session.monitor.is_none());
        match ctx.monitor.start(&ctx.settings.target.device) {
            Ok(handle) => ctx.session.monitor = Some(handle),
            Err(e) => {
                report_fatal(&e);
                return Event::Shutdown(ShutdownEvent { with_error: true });
            }
        }
        wait_for_change(ctx)
    }
}

// Done State ==================================================================

/// Reached when the run is over, normally or abnormally.
///
/// This state goes into a 2-phase execution. During the initial phase, it
/// runs the ordered teardown: unsubscribe the watcher, stop the serial
/// monitor and remove the scratch storage. It then triggers the `ExitEvent`
/// to cause the event loop to terminate.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_error: bool,
    /// When `true` instructs the event loop to exit.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, ctx: &mut Context) -> Event {
        info!(
            "=> Done with{}errors",
            if self.with_error { " " } else { " no " }
        );

        if let Some(subscription) = ctx.subscription.take() {
            debug!("unsubscribing from the watcher");
            subscription.unsubscribe();
        }
        ctx.monitor.stop(ctx.session.monitor.take());
        if let Some(scratch) = ctx.scratch.take() {
            if let Err(e) = scratch.remove() {
                warn!("could not remove the scratch directory: {}", e);
            }
        }

        debug!(
            "{} cycle(s) run, {} trigger(s) dropped",
            ctx.session.cycles, ctx.session.dropped
        );
        Event::Exit(ExitEvent {
            with_error: self.with_error,
        })
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Block until a change starts a new cycle or the run must end.
fn wait_for_change(ctx: &mut Context) -> Event {
    loop {
        match ctx.signals.recv() {
            Ok(Signal::Trigger) => {
                if ctx.session.begin_cycle() {
                    return Event::Build(BuildEvent { reload: true });
                }
                ctx.session.dropped += 1;
            }
            Ok(Signal::CycleFinished(result)) => {
                debug!("result of an abandoned cycle ignored: {:?}", result);
            }
            Ok(Signal::Shutdown) | Err(_) => {
                return Event::Shutdown(ShutdownEvent { with_error: false })
            }
        }
    }
}

/// Run the build pipeline on a worker thread which reports back with
/// [`Signal::CycleFinished`]. The worker is detached: nobody waits for it
/// when shutting down.
fn spawn_pipeline(ctx: &Context) -> Result<(), Error> {
    let pipeline = Arc::clone(&ctx.pipeline);
    let notifier = ctx.notifier.clone();
    thread::Builder::new()
        .name("build".into())
        .spawn(move || {
            let result = pipeline.run();
            let _ = notifier.send(Signal::CycleFinished(result));
        })?;
    Ok(())
}

fn on_cycle_finished(ctx: &Context, result: Result<(), Error>) -> Event {
    match result {
        Ok(()) => Event::Flashed(FlashedEvent {}),
        Err(Error::Build(error)) => {
            println!("{}", style(format!("[FL] 💥 {}", error)).red());
            if ctx.settings.fail_fast {
                return Event::Shutdown(ShutdownEvent { with_error: true });
            }
            println!("[FL] 🔧 Fix the sources and save to rebuild");
            Event::BuildFailed(BuildFailedEvent { error })
        }
        Err(e) => {
            report_fatal(&e);
            Event::Shutdown(ShutdownEvent { with_error: true })
        }
    }
}

fn report_fatal(e: &Error) {
    error!("{:?}", e);
    eprintln!("{}", style(format!("[FL] 💥 {}", e)).red());
}
