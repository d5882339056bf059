//! End-to-end scenarios of the reload controller with stubbed tools.

use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use flashloop::{
    self as fl, Collaborators, Error, MonitorHandle, Outcome, Runner, Scratch, SerialMonitor,
    Signal, Subscription, ToolCommand,
};

const TIMEOUT: Duration = Duration::from_secs(5);
const DEVICE: &str = "/dev/ttyUSB0";

/// Ordered record of what the controller asked its collaborators to do.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);
impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

/// Stands in for `arduino-cli`. The compile step can be held until the test
/// releases it.
struct StubToolchain {
    journal: Journal,
    events: Mutex<Sender<String>>,
    gate: Option<Mutex<Receiver<()>>>,
    compile: Outcome,
    upload: Outcome,
}
impl Runner for StubToolchain {
    fn run(&self, command: &ToolCommand) -> Result<Outcome, Error> {
        let verb = command.args[0].clone();
        self.journal.push(verb.as_str());
        let _ = self.events.lock().unwrap().send(verb.clone());

        if verb == "compile" {
            if let Some(gate) = &self.gate {
                // A closed gate releases the step as well.
                let _ = gate.lock().unwrap().recv();
            }
            return Ok(self.compile);
        }
        Ok(self.upload)
    }
}

struct StubMonitor {
    journal: Journal,
    events: Sender<String>,
}
impl SerialMonitor for StubMonitor {
    fn start(&mut self, device: &str) -> Result<MonitorHandle, Error> {
        let entry = format!("monitor start {}", device);
        self.journal.push(entry.as_str());
        let _ = self.events.send(entry);
        Ok(MonitorHandle::new("arduino-logs", None))
    }

    fn stop(&mut self, _handle: Option<MonitorHandle>) {
        self.journal.push("monitor stop");
        let _ = self.events.send("monitor stop".into());
    }
}

struct Harness {
    notifier: Sender<Signal>,
    journal: Journal,
    events: Receiver<String>,
    gate: Option<Sender<()>>,
    scratch: PathBuf,
    controller: JoinHandle<i8>,
}
impl Harness {
    fn launch(compile: i32, upload: i32, gated: bool, fail_fast: bool) -> Self {
        let settings = fl::SettingsBuilder::new()
            .source("/work/blink")
            .device(DEVICE)
            .fail_fast(fail_fast)
            .finalize();

        let journal = Journal::default();
        let (events_tx, events) = mpsc::channel();
        let (gate, gate_rx) = if gated {
            let (tx, rx) = mpsc::channel();
            (Some(tx), Some(Mutex::new(rx)))
        } else {
            (None, None)
        };

        let runner = StubToolchain {
            journal: journal.clone(),
            events: Mutex::new(events_tx.clone()),
            gate: gate_rx,
            compile: outcome(compile),
            upload: outcome(upload),
        };
        let monitor = StubMonitor {
            journal: journal.clone(),
            events: events_tx,
        };
        let unsubscribe_journal = journal.clone();
        let subscription = Subscription::new(move || unsubscribe_journal.push("unsubscribe"));
        let scratch = Scratch::create().unwrap();
        let scratch_path = scratch.path().to_path_buf();

        let (notifier, signals) = mpsc::channel();
        let controller = fl::factory(
            settings,
            Collaborators {
                runner: Arc::new(runner),
                monitor: Box::new(monitor),
                notifier: notifier.clone(),
                signals,
                subscription: Some(subscription),
                scratch: Some(scratch),
            },
        );

        Harness {
            notifier,
            journal,
            events,
            gate,
            scratch: scratch_path,
            controller: thread::spawn(move || controller.run()),
        }
    }

    fn expect(&self, event: &str) {
        assert_eq!(self.events.recv_timeout(TIMEOUT).unwrap(), event);
    }

    fn send(&self, signal: Signal) {
        self.notifier.send(signal).unwrap();
    }

    fn release(&self) {
        self.gate.as_ref().unwrap().send(()).unwrap();
    }

    fn initial_cycle(&self) {
        self.expect("monitor stop");
        self.expect("compile");
    }

    /// Wait for the controller to exit and return its status.
    fn join(self) -> (i8, Journal, PathBuf) {
        let Harness {
            journal,
            scratch,
            controller,
            gate,
            ..
        } = self;
        let status = controller.join().unwrap();
        // Let a still held compile step finish.
        drop(gate);
        (status, journal, scratch)
    }
}

fn outcome(code: i32) -> Outcome {
    if code == 0 {
        Outcome::Success
    } else {
        Outcome::Failure(code)
    }
}

fn assert_cleaned_up(journal: &Journal, scratch: &Path) {
    let entries = journal.entries();
    let n = entries.len();
    assert!(n >= 2);
    assert_eq!(entries[n - 2..], ["unsubscribe", "monitor stop"]);
    assert!(!scratch.exists());
}

#[test]
fn initial_cycle_starts_the_monitor_once() {
    let h = Harness::launch(0, 0, false, false);
    h.initial_cycle();
    h.expect("upload");
    h.expect(&format!("monitor start {}", DEVICE));

    h.send(Signal::Shutdown);
    let (status, journal, _) = h.join();
    assert_eq!(status, 0);
    assert_eq!(journal.count(&format!("monitor start {}", DEVICE)), 1);
}

#[test]
fn shutdown_while_monitoring_cleans_up() {
    let h = Harness::launch(0, 0, false, false);
    h.initial_cycle();
    h.expect("upload");
    h.expect(&format!("monitor start {}", DEVICE));

    h.send(Signal::Shutdown);
    let (status, journal, scratch) = h.join();
    assert_eq!(status, 0);
    assert_cleaned_up(&journal, &scratch);
}

#[test]
fn shutdown_while_building_cleans_up() {
    // A failing compile keeps the released worker from reaching the upload.
    let h = Harness::launch(1, 0, true, false);
    h.initial_cycle();

    // The compile step is still held: the pipeline has not resolved.
    h.send(Signal::Shutdown);
    let (status, journal, scratch) = h.join();
    assert_eq!(status, 0);
    assert_cleaned_up(&journal, &scratch);
    assert_eq!(journal.count(&format!("monitor start {}", DEVICE)), 0);
}

#[test]
fn failed_compile_never_flashes() {
    let h = Harness::launch(1, 0, false, true);
    let (status, journal, scratch) = h.join();

    assert_eq!(status, 1);
    assert_eq!(journal.count("compile"), 1);
    assert_eq!(journal.count("upload"), 0);
    assert_eq!(journal.count(&format!("monitor start {}", DEVICE)), 0);
    assert_cleaned_up(&journal, &scratch);
}

#[test]
fn failed_upload_is_fatal_with_fail_fast() {
    let h = Harness::launch(0, 2, false, true);
    let (status, journal, scratch) = h.join();

    assert_eq!(status, 1);
    assert_eq!(journal.count("upload"), 1);
    assert_eq!(journal.count(&format!("monitor start {}", DEVICE)), 0);
    assert_cleaned_up(&journal, &scratch);
}

#[test]
fn failed_build_waits_for_the_next_change() {
    let h = Harness::launch(1, 0, false, false);
    h.initial_cycle();

    // Triggers landing before the failure is processed are dropped; keep
    // poking until the next cycle starts.
    loop {
        h.send(Signal::Trigger);
        match h.events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                assert_eq!(event, "monitor stop");
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(e) => panic!("controller gone: {}", e),
        }
    }
    h.expect("compile");

    h.send(Signal::Shutdown);
    let (status, journal, _) = h.join();
    assert_eq!(status, 0);
    assert_eq!(journal.count("compile"), 2);
    assert_eq!(journal.count("upload"), 0);
}

#[test]
fn triggers_during_a_build_are_dropped() {
    let h = Harness::launch(0, 0, true, false);
    h.initial_cycle();

    for _ in 0..5 {
        h.send(Signal::Trigger);
    }
    h.release();
    h.expect("upload");
    h.expect(&format!("monitor start {}", DEVICE));

    // Only a change after the cycle resolved starts a new one.
    h.send(Signal::Trigger);
    h.expect("monitor stop");
    h.expect("compile");
    h.release();
    h.expect("upload");
    h.expect(&format!("monitor start {}", DEVICE));

    h.send(Signal::Shutdown);
    let (status, journal, _) = h.join();
    assert_eq!(status, 0);
    assert_eq!(journal.count("compile"), 2);
    assert_eq!(journal.count("upload"), 2);
}

#[test]
fn monitor_is_stopped_before_every_start() {
    let h = Harness::launch(0, 0, false, false);
    for _ in 0..3 {
        h.initial_cycle();
        h.expect("upload");
        h.expect(&format!("monitor start {}", DEVICE));
        h.send(Signal::Trigger);
    }
    h.initial_cycle();
    h.expect("upload");
    h.expect(&format!("monitor start {}", DEVICE));

    h.send(Signal::Shutdown);
    let (status, journal, _) = h.join();
    assert_eq!(status, 0);

    // Never two monitors at once: starts and stops alternate.
    let mut active = false;
    for entry in journal.entries() {
        if entry.starts_with("monitor start") {
            assert!(!active, "monitor started twice: {:?}", journal.entries());
            active = true;
        } else if entry == "monitor stop" {
            active = false;
        }
    }
    assert!(!active);
}
