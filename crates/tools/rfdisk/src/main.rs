use std::io;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use rfdisk_common::backend::SfdiskBackend;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::prompt::StdPrompter;
use crate::session::Session;

mod planner;
mod present;
mod prompt;
mod session;

/// Interactive editor for MBR partition tables.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Block device or disk image to edit.
    device: PathBuf,
}

/// Initialize logging to stderr, controllable via `RUST_LOG`.
fn init_logging() {
    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_target(false)
        .compact();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .event_format(format)
        .init();
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            exit(1);
        }
    };
    init_logging();
    let mut session = match Session::new(SfdiskBackend, &args.device, StdPrompter) {
        Ok(session) => session,
        Err(error) => {
            eprintln!("{error:#}");
            exit(1);
        }
    };
    match session.run() {
        Ok(code) => exit(code),
        Err(error) => {
            eprintln!("{error:#}");
            exit(1);
        }
    }
}
