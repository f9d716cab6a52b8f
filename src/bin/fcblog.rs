#![deny(clippy::unwrap_used)]

use chrono::Local;
use clap::{arg, command, value_parser};
use fcblog::acquisition::{RunError, Session, Status, Summary};
use fcblog::logbook::Logbook;
use fcblog::proto::command::Command;
use fcblog::proto::DeviceError;
use fcblog::{Device, DEFAULT_BAUDRATE, DEFAULT_TTY};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

enum Key {
    Start,
    Quit,
    Eof,
    Other,
}

async fn next_key(lines: &mut Lines<BufReader<Stdin>>) -> Key {
    match lines.next_line().await {
        Ok(Some(line)) => match line.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('s') => Key::Start,
            Some('q') => Key::Quit,
            _ => Key::Other,
        },
        Ok(None) | Err(_) => Key::Eof,
    }
}

struct Settings {
    port: PathBuf,
    baudrate: u32,
    output: PathBuf,
    command: Command,
    timeout: Duration,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let matches = command!() // requires `cargo` feature
        .arg(
            arg!(
                -p --device <PORT> "Serial port of the balance"
            )
            .default_value(DEFAULT_TTY)
            .required(false)
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(
                -b --baudrate <BAUDRATE> "Baudrate"
            )
            .default_value(DEFAULT_BAUDRATE.to_string())
            .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(
                -o --output <PATH> "Log file, opened in append mode (default: logs/fcb_data_<timestamp>.txt)"
            )
            .required(false)
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(
                -t --timeout <MILLIS> "Poll timeout in milliseconds"
            )
            .default_value("500")
            .value_parser(value_parser!(u64).range(10..)),
        )
        .arg(
            arg!(
                -m --mode <MODE> "Read-out command sent to the balance"
            )
            .required(false)
            .value_parser(value_parser!(Command)),
        )
        .arg(
            arg!(
                --seconds <SECONDS> "Log for a fixed number of seconds, then exit"
            )
            .required(false)
            .value_parser(value_parser!(u64).range(1..)),
        )
        .get_matches();

    let settings = Settings {
        port: matches
            .get_one::<PathBuf>("device")
            .expect("Requires device parameter")
            .clone(),
        baudrate: *matches
            .get_one::<u32>("baudrate")
            .expect("Requires baudrate parameter"),
        output: matches
            .get_one::<PathBuf>("output")
            .cloned()
            .unwrap_or_else(default_log_path),
        command: matches
            .get_one::<Command>("mode")
            .copied()
            .unwrap_or(Command::Weight),
        timeout: Duration::from_millis(
            *matches
                .get_one::<u64>("timeout")
                .expect("Requires timeout parameter"),
        ),
    };

    println!(
        "Kern FCB balance logger.\n\n\
         NOTE on the balance settings:\n\
           1) The baud rate (parameter 'bAUd') must match --baudrate.\n\
           2) The data transfer mode (parameter 'PR') must be set to 'rE CR'.\n"
    );

    let code = match matches.get_one::<u64>("seconds").copied() {
        Some(seconds) => run_timed(&settings, seconds).await,
        None => run_interactive(&settings).await,
    };
    exit(code);
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs").join(format!(
        "fcb_data_{}.txt",
        Local::now().format("%y%m%d_%H%M%S")
    ))
}

type Acquisition = JoinHandle<Result<Summary, RunError>>;

/// Open the port and the log sink, then hand both to a fresh session
/// task. Either failure is a startup error: it is reported before any
/// acquisition begins and nothing of the run is left behind.
fn start(settings: &Settings) -> Option<(Acquisition, watch::Sender<bool>, watch::Receiver<Status>)> {
    let device = match Device::new(settings.port.to_string_lossy(), settings.baudrate) {
        Ok(device) => device,
        Err(err) => {
            report_startup(&err, &settings.port);
            return None;
        }
    };
    let logbook = match Logbook::create(&settings.output) {
        Ok(logbook) => logbook,
        Err(err) => {
            eprintln!("{}: cannot open log file: {}", settings.output.display(), err);
            return None;
        }
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let (status_tx, status_rx) = watch::channel(Status::default());
    let session = Session::new(
        device,
        logbook,
        settings.command,
        settings.timeout,
        stop_rx,
        status_tx,
    );
    Some((tokio::spawn(session.run()), stop_tx, status_rx))
}

async fn run_interactive(settings: &Settings) -> i32 {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Press 's' + ENTER to start logging, 'q' + ENTER to quit.");
    loop {
        match next_key(&mut lines).await {
            Key::Quit | Key::Eof => {
                return 0;
            }
            Key::Start => {
                let Some((mut task, stop_tx, mut status_rx)) = start(settings) else {
                    return -1;
                };
                info!(log = %settings.output.display(), "session started");
                println!(
                    "Logging to: {}  ('s' + ENTER stops)\n",
                    settings.output.display()
                );

                let mut eof = false;
                let outcome = loop {
                    tokio::select! {
                        res = &mut task => break res,
                        changed = status_rx.changed() => match changed {
                            Ok(()) => println!("{}", status_rx.borrow_and_update().clone()),
                            // Channel closed: the session is over, pick
                            // up its result.
                            Err(_) => break (&mut task).await,
                        },
                        key = next_key(&mut lines), if !eof => match key {
                            Key::Start => {
                                let _ = stop_tx.send(true);
                            }
                            Key::Quit => println!("Logging is running, stop with 's' first."),
                            Key::Eof => {
                                eof = true;
                                let _ = stop_tx.send(true);
                            }
                            Key::Other => {}
                        },
                    }
                };

                match outcome {
                    Ok(Ok(summary)) => {
                        info!(
                            records = summary.records,
                            dropped = summary.dropped,
                            "session stopped"
                        );
                        println!(
                            "Stopped. {} records written, {} frames dropped.\n",
                            summary.records, summary.dropped
                        );
                        if eof {
                            return 0;
                        }
                        println!("Press 's' + ENTER to start logging, 'q' + ENTER to quit.");
                    }
                    Ok(Err(err)) => {
                        report_run(&err, &settings.port);
                        return -1;
                    }
                    Err(join) => {
                        eprintln!("Acquisition task failed: {join}");
                        return -1;
                    }
                }
            }
            Key::Other => {
                println!("Press 's' + ENTER to start logging, 'q' + ENTER to quit.");
            }
        }
    }
}

async fn run_timed(settings: &Settings, seconds: u64) -> i32 {
    let Some((mut task, stop_tx, mut status_rx)) = start(settings) else {
        return -1;
    };
    println!(
        "Logging to: {} for {} s\n",
        settings.output.display(),
        seconds
    );

    let timer = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(timer);
    let mut stopped = false;

    let outcome = loop {
        tokio::select! {
            res = &mut task => break res,
            () = &mut timer, if !stopped => {
                stopped = true;
                let _ = stop_tx.send(true);
            }
            changed = status_rx.changed() => match changed {
                Ok(()) => println!("{}", status_rx.borrow_and_update().clone()),
                Err(_) => break (&mut task).await,
            },
        }
    };

    match outcome {
        Ok(Ok(summary)) => {
            println!(
                "Stopped. {} records written, {} frames dropped.",
                summary.records, summary.dropped
            );
            0
        }
        Ok(Err(err)) => {
            report_run(&err, &settings.port);
            -1
        }
        Err(join) => {
            eprintln!("Acquisition task failed: {join}");
            -1
        }
    }
}

fn report_startup(err: &DeviceError, port: &Path) {
    match err {
        DeviceError::Serial(serr)
            if serr.kind() == tokio_serial::ErrorKind::NoDevice
                || matches!(
                    serr.kind(),
                    tokio_serial::ErrorKind::Io(ErrorKind::NotFound)
                ) =>
        {
            eprintln!("{}: File not found", port.display());
        }
        err => {
            eprintln!("Cannot open {}: {}", port.display(), err);
        }
    }
}

fn report_run(err: &RunError, port: &Path) {
    match err {
        RunError::Device(DeviceError::Abort) => {
            eprintln!(
                "Connection to the balance was lost [device: {}]",
                port.display()
            );
        }
        RunError::Device(err) => {
            eprintln!("I/O Error: {} [device: {}]", err, port.display());
        }
        RunError::Log(err) => {
            eprintln!("Writing the log failed: {err}");
        }
    }
}
