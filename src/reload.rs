//! `flashloop` reload controller.
//!
//! **Example** - Executing the state machine the event loop:
//! ```no_run
//! use std::sync::{mpsc, Arc};
//! use flashloop::{self as fl, Collaborators, ProcessRunner, Screen, ScreenMonitor};
//!
//! let settings = fl::SettingsBuilder::new().source("/work/blink").finalize();
//! let scratch = fl::Scratch::create().unwrap();
//! let (notifier, signals) = mpsc::channel();
//! let subscription = fl::watch(&settings.target.source, notifier.clone()).unwrap();
//! let monitor = ScreenMonitor::new(Box::new(Screen::new("screen")), &settings, scratch.path());
//!
//! let controller = fl::factory(
//!     settings,
//!     Collaborators {
//!         runner: Arc::new(ProcessRunner),
//!         monitor: Box::new(monitor),
//!         notifier,
//!         signals,
//!         subscription: Some(subscription),
//!         scratch: Some(scratch),
//!     },
//! );
//! let status = controller.run(); // status code returned after the `Exit` event
//! std::process::exit(status.into());
//! ```

mod events;
mod session;
mod state_machine;
mod states;

pub use state_machine::{factory, Collaborators, ReloadController, Signal};
