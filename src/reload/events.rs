//! Events for the `flashloop` reload controller state machine.
//!
//! This modules is private and restricted to the [`reload`](crate::reload)
//! scope. The public interface of the state machine is provided by
//! [`reload`](crate::reload).
//!
//! ```ignore
//! use super::events::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::error::BuildError;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// BuildEvent ==================================================================

/// Event fired to trigger a transition to the `Building` state.
///
/// This event can happen under one of the following circumstances:
///
///  1. At the `Init` state, for the initial build of the firmware.
///  2. At the `Idle` or `Monitoring` state when the watcher reported a change
///     and no cycle is in flight. In such case `reload` is `true`.
#[derive(Debug)]
pub(crate) struct BuildEvent {
    pub reload: bool,
}

// FlashedEvent ================================================================

/// Event fired when both the compile and the upload steps succeeded. It
/// triggers a transition to the `Monitoring` state.
#[derive(Debug)]
pub(crate) struct FlashedEvent {}

// BuildFailedEvent ============================================================

/// Event fired when the compile or the upload step exited with an error. It
/// triggers a transition back to the `Idle` state, waiting for the developer
/// to fix the sources.
#[derive(Debug)]
pub(crate) struct BuildFailedEvent {
    pub error: BuildError,
}

// ShutdownEvent ===============================================================

/// Event fired when the run must end. It triggers a transition to the `Done`
/// state, which will run the teardown.
///
/// This event can happen at any state after `Init`, either because the
/// shutdown signal was received (`with_error` is `false`) or because of an
/// unrecoverable error.
#[derive(Debug)]
pub(crate) struct ShutdownEvent {
    pub with_error: bool,
}

// ExitEvent ===================================================================

/// The last event that can be triggered in `flashloop` and will result in the
/// event loop terminating with an `exit status`, handing back the control to
/// the original caller that started the event loop.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub with_error: bool,
}

// Events enum ==================================================================

/// Events that can be triggered within the reload controller state machine.
#[derive(Debug)]
pub(crate) enum Event {
    Build(BuildEvent),
    Flashed(FlashedEvent),
    BuildFailed(BuildFailedEvent),
    Shutdown(ShutdownEvent),
    Exit(ExitEvent),
}
