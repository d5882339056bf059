//! The session state shared by all the states of the reload controller.

use crate::monitor::MonitorHandle;

/// Mutable state of a run: the busy flag guarding against overlapping build
/// cycles and the handle of the active serial monitor.
///
/// Only the reload controller touches it, from its own thread.
#[derive(Debug, Default)]
pub(crate) struct Session {
    building: bool,
    /// The active serial monitor, `None` before the first successful cycle
    /// and while building.
    pub monitor: Option<MonitorHandle>,
    /// Number of build cycles started so far.
    pub cycles: usize,
    /// Number of triggers dropped because a cycle was already in flight.
    pub dropped: usize,
}
impl Session {
    /// Try to start a new build cycle. Returns `false`, leaving the session
    /// untouched, when a cycle is already in flight.
    pub fn begin_cycle(&mut self) -> bool {
        if self.building {
            return false;
        }
        self.building = true;
        self.cycles += 1;
        true
    }

    /// Mark the current cycle as resolved, successfully or not.
    pub fn finish_cycle(&mut self) {
        self.building = false;
    }

    pub fn is_building(&self) -> bool {
        self.building
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn starts_idle() {
    let session = Session::default();
    assert!(!session.is_building());
    assert!(session.monitor.is_none());
    assert_eq!(session.cycles, 0);
}

#[test]
fn begin_cycle_is_guarded() {
    let mut session = Session::default();
    assert!(session.begin_cycle());
    assert!(session.is_building());
    assert!(!session.begin_cycle());
    assert!(!session.begin_cycle());
    assert_eq!(session.cycles, 1);

    session.finish_cycle();
    assert!(!session.is_building());
    assert!(session.begin_cycle());
    assert_eq!(session.cycles, 2);
}
