//! Flashloop command line interface.

use std::{fs, path::Path, process, sync::mpsc, sync::Arc};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg,
};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use flashloop::{self as fl, Collaborators, ProcessRunner, Screen, ScreenMonitor};

fn main() {
    println!("[FL] flashloop v{}", crate_version!());

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Flashloop watches the firmware sources at SOURCE_PATH. It builds \
            them and uploads the result to the board right away, then again \
            every time a file changes: \n\
               \t* stops the serial monitor \n\
               \t* compiles the sources \n\
               \t* uploads the firmware to the board \n\
               \t* starts the serial monitor and prints the board output \n\
            \n\
            Changes made while a build is running are ignored; save again \
            once it is done. A failed build waits for the next change.\n\
            \n\
            Press Ctrl+C to stop. The serial capture session and the \
            temporary files are cleaned up on exit.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the serial device the board is attached to")
                .short("-t")
                .long("--tty")
                .takes_value(true)
                .default_value("/dev/tty.usbserial-0001")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial monitor baud rate")
                .short("-b")
                .long("--baud-rate")
                .takes_value(true)
                .default_value("9600")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FQBN")
                .help("fully qualified board name")
                .long("--fqbn")
                .takes_value(true)
                .default_value("esp32:esp32:nodemcu-32s")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("CLI")
                .help("program used to compile and upload")
                .long("--cli")
                .takes_value(true)
                .default_value("arduino-cli")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FAIL_FAST")
                .help("exit when a build or upload fails")
                .long("--fail-fast"),
        )
        .arg(
            Arg::with_name("SOURCE_PATH")
                .help("path to the firmware sources to watch and build")
                .required(true)
                .index(1),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'flashloop -v -v -v' or 'flashloop -vvv' vs 'flashloop -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("logger initialization failed: {}", e);
    }

    trace!("{:#?}", matches);

    // Arguments with default values ===========================================

    // It's safe to call unwrap on all command line arguments with default
    // values, because the value with either be what the user input at runtime
    // or the default value

    let baud_rate = value_t!(matches.value_of("BAUD_RATE"), u32).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style("baud-rate").cyan()
        );
        println!(
            "   {} `{}` is not a valid value",
            style("-->").cyan(),
            style(matches.value_of("BAUD_RATE").unwrap()).on_red()
        );
        process::exit(1);
    });

    // END - Arguments with default values =====================================

    // `SOURCE_PATH` is required, clap already exited with the usage if missing.
    let source = matches.value_of("SOURCE_PATH").unwrap();
    let source = fs::canonicalize(source).unwrap_or_else(|_| {
        println!(
            "{}: {}",
            style("error").red(),
            fl::Error::SourceNotFound {
                path: Path::new(source).to_path_buf()
            }
        );
        process::exit(1);
    });

    let settings = fl::SettingsBuilder::new()
        .source(source)
        .device(matches.value_of("DEVICE_TTY").unwrap())
        .board(matches.value_of("FQBN").unwrap())
        .toolchain(matches.value_of("CLI").unwrap())
        .baud_rate(baud_rate)
        .fail_fast(matches.is_present("FAIL_FAST"))
        .finalize();

    // Run the reload loop =====================================================

    let exit_code = match run(settings) {
        Ok(code) => code,
        Err(e) => {
            println!("{}", style(format!("[FL] 💥 {}", e)).red());
            1
        }
    };
    debug!("exit code: {}", exit_code);
    process::exit(exit_code.into());
}

/// Wire the collaborators and run the reload controller until shutdown.
fn run(settings: fl::Settings) -> Result<i8, fl::Error> {
    let (notifier, signals) = mpsc::channel();
    fl::install_shutdown_hook(notifier.clone())?;

    let scratch = fl::Scratch::create()?;
    let subscription = fl::watch(&settings.target.source, notifier.clone())?;
    let monitor = ScreenMonitor::new(
        Box::new(Screen::new(settings.capture.as_str())),
        &settings,
        scratch.path(),
    );

    let controller = fl::factory(
        settings,
        Collaborators {
            runner: Arc::new(ProcessRunner),
            monitor: Box::new(monitor),
            notifier,
            signals,
            subscription: Some(subscription),
            scratch: Some(scratch),
        },
    );
    Ok(controller.run())
}
