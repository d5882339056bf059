//! Filesystem watcher turning changes under the source path into
//! [`Signal::Trigger`] messages for the reload controller.

use std::{fmt, path::Path, sync::mpsc::Sender};

use log::{trace, warn};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::{error::Error, reload::Signal};

/// Keeps a subscription alive until [`unsubscribe`](Subscription::unsubscribe)
/// is called or it is dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}
impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}
impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Watch `path` recursively and send one [`Signal::Trigger`] per relevant
/// change to `notifier`. Events are not debounced; the reload controller
/// drops the ones arriving while a build is in flight.
pub fn watch(path: &Path, notifier: Sender<Signal>) -> Result<Subscription, Error> {
    let watch_error = |source| Error::Watch {
        path: path.to_path_buf(),
        source,
    };

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event) => {
                trace!("change detected: {:?}", event);
                let _ = notifier.send(Signal::Trigger);
            }
            Ok(_) => {}
            Err(e) => warn!("watch error: {}", e),
        },
        Config::default(),
    )
    .map_err(watch_error)?;
    watcher
        .watch(path, RecursiveMode::Recursive)
        .map_err(watch_error)?;

    Ok(Subscription::new(move || drop(watcher)))
}

/// Reads (the compiler opening the sources) must not trigger a rebuild.
pub(crate) fn is_relevant(event: &Event) -> bool {
    !matches!(event.kind, EventKind::Access(_))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Arc,
        },
        time::Duration,
    };

    use notify::event::{AccessKind, CreateKind, ModifyKind};

    use super::*;

    #[test]
    fn access_events_are_ignored() {
        assert!(!is_relevant(&Event::new(EventKind::Access(AccessKind::Any))));
        assert!(is_relevant(&Event::new(EventKind::Modify(ModifyKind::Any))));
        assert!(is_relevant(&Event::new(EventKind::Create(CreateKind::File))));
    }

    #[test]
    fn unsubscribe_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let subscription = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_unsubscribes() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn change_in_source_sends_a_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let subscription = watch(dir.path(), tx).unwrap();

        std::fs::write(dir.path().join("blink.ino"), b"void loop() {}").unwrap();
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Signal::Trigger) => {}
            other => panic!("expected a trigger, got {:?}", other),
        }
        subscription.unsubscribe();
    }

    #[test]
    fn missing_path_is_a_watch_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel();
        let err = watch(&dir.path().join("nope"), tx).unwrap_err();
        assert!(matches!(err, Error::Watch { .. }));
    }
}
