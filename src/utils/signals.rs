//! Process interrupt handling.

use std::{
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
};

use console::style;
use log::debug;

use crate::{error::Error, reload::Signal};

/// Install the Ctrl+C handler. The first interrupt posts
/// [`Signal::Shutdown`] so the reload controller can run its teardown; a
/// second one exits immediately with an error status.
pub fn install_shutdown_hook(notifier: Sender<Signal>) -> Result<(), Error> {
    let requested = AtomicBool::new(false);
    ctrlc::set_handler(move || {
        if requested.swap(true, Ordering::SeqCst) {
            println!("{}", style("[FL] 🛑 forced exit").red());
            process::exit(1);
        }
        println!("[FL] 🛑 received Ctrl+C, cleaning up...");
        if notifier.send(Signal::Shutdown).is_err() {
            debug!("reload controller already gone");
            process::exit(0);
        }
    })?;
    Ok(())
}
