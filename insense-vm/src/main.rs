//! `insense-vm <program-directory> [<log-level>]`
//!
//! Runs the `Main` component of the program directory. Diagnostics go to
//! stderr; program output (`printString` and friends) goes to stdout.

use std::env;
use std::process;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::filter::LevelFilter;

use insense_vm::consts::{
    EXITCODE_INVALID_ARGUMENTS, EXITCODE_SUCCESS, EXITCODE_UNKNOWN_LOG_LEVEL,
};
use insense_vm::loader::DirectorySource;
use insense_vm::vm::Vm;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("usage: {} <program-directory> [<log-level>]", args[0]);
        process::exit(EXITCODE_INVALID_ARGUMENTS);
    }

    let level = match args.get(2).map(String::as_str) {
        None => LevelFilter::INFO,
        Some("DEBUG") => LevelFilter::DEBUG,
        Some("INFO") => LevelFilter::INFO,
        Some("WARNING") => LevelFilter::WARN,
        Some("ERROR") => LevelFilter::ERROR,
        // tracing has no FATAL level; fatal component faults log as errors.
        Some("FATAL") => LevelFilter::ERROR,
        Some(other) => {
            eprintln!("unknown log level `{other}`");
            process::exit(EXITCODE_UNKNOWN_LOG_LEVEL);
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let vm = Vm::new(Arc::new(DirectorySource::new(&args[1])));
    if let Err(e) = vm.run() {
        // Component faults are component-local; reaching here means the
        // entry component never started. Log it and exit cleanly.
        error!("{e}");
    }
    process::exit(EXITCODE_SUCCESS);
}
