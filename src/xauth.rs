// src/xauth.rs

//! Authority-file mutation through the external `xauth` tool.

use anyhow::{bail, Context, Result};
use log::trace;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Program used to mutate authority files when none is configured.
pub const DEFAULT_XAUTH_PROGRAM: &str = "xauth";

/// Appends an authorization entry binding `display` to `cookie` in
/// `auth_file`, by running `<program> -f <auth_file> source -` and
/// feeding it a single `add` line on its stdin.
///
/// Authority setup is a security boundary: a missing tool, a partial
/// write of the entry, or a non-zero exit status is an error, never
/// silently ignored. The program name is a parameter so tests can
/// substitute a stand-in; production callers pass
/// [`DEFAULT_XAUTH_PROGRAM`].
pub fn add_entry(program: &str, auth_file: &Path, display: u32, cookie: &str) -> Result<()> {
    let mut child = Command::new(program)
        .arg("-f")
        .arg(auth_file)
        .arg("source")
        .arg("-")
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run {}", program))?;

    let entry = format!("add :{} . {}\n", display, cookie);
    child
        .stdin
        .as_mut()
        .context("no stdin pipe to the authority tool")?
        .write_all(entry.as_bytes())
        .with_context(|| format!("failed to write authority entry to {}", program))?;
    // Closing stdin lets the tool see end of input.
    drop(child.stdin.take());

    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {}", program))?;
    if !status.success() {
        bail!(
            "{} exited with {} while adding an entry for display :{}",
            program,
            status,
            display
        );
    }

    trace!(
        "Added authority entry for display :{} to {}",
        display,
        auth_file.display()
    );
    Ok(())
}
