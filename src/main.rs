// src/main.rs

//! Runs a command under a freshly started headless X display.
//!
//! Brings up an Xvfb server, exports `DISPLAY` and `XAUTHORITY`, runs
//! the given command to completion, shuts the server down, and exits
//! with the command's status.

use anyhow::{Context, Result};
use log::info;
use std::process::Command;

use xvfb_session::Xvfb;

fn main() -> Result<()> {
    // Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let mut args = std::env::args().skip(1);
    let program = args
        .next()
        .context("usage: xvfb-session <command> [args...]")?;
    let program_args: Vec<String> = args.collect();

    let mut server = Xvfb::spawn().context("failed to start the virtual X server")?;
    server.setup_env();
    info!(
        "Virtual display :{} ready, running '{}'",
        server.display(),
        program
    );

    let status = Command::new(&program)
        .args(&program_args)
        .status()
        .with_context(|| format!("failed to run '{}'", program))?;

    server
        .shutdown()
        .context("failed to shut down the virtual X server")?;
    // Release the handle (and its temporary directory) before exiting,
    // since process::exit skips destructors.
    drop(server);

    std::process::exit(status.code().unwrap_or(1));
}
