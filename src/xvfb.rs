// src/xvfb.rs

//! Lifecycle management for a headless Xvfb X server child process.
//!
//! [`Xvfb`] owns the server process, the authority file holding its
//! authentication cookie, and the temporary directory the file lives in.
//! Construction brings the server up and learns the display number it
//! was assigned; shutdown (explicit or at drop) terminates the server
//! and removes the credential file.
//!
//! The bootstrap follows a fixed order: an authority entry for a
//! placeholder display is installed before the server is spawned, and
//! the entry clients actually use is installed after the assigned
//! display number is known. The placeholder closes the window in which
//! a freshly launched server without any authority entry would accept
//! unauthenticated connections.

use anyhow::{Context, Result};
use log::{error, info, warn};
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use tempfile::TempDir;

use crate::cookie::generate_cookie;
use crate::env::{ProcessEnv, RealEnv};
use crate::error::Error;
use crate::xauth;

/// Environment variable naming the display, e.g. `:7`.
pub const DISPLAY_ENV_VAR: &str = "DISPLAY";
/// Environment variable naming the authority file.
pub const XAUTHORITY_ENV_VAR: &str = "XAUTHORITY";

const AUTHORITY_FILE_NAME: &str = ".Xauthority";
const SCREEN_NUMBER: &str = "0";
const SCREEN_GEOMETRY: &str = "640x480x24";
// Display index the transient pre-spawn authority entry is written for.
const PLACEHOLDER_DISPLAY: u32 = 0;

/// Programs the handle invokes.
///
/// The defaults run the real `Xvfb` and `xauth` from `PATH`; tests
/// substitute script stand-ins.
#[derive(Debug, Clone)]
pub struct XvfbConfig {
    pub xvfb_program: String,
    pub xauth_program: String,
}

impl Default for XvfbConfig {
    fn default() -> Self {
        Self {
            xvfb_program: "Xvfb".to_string(),
            xauth_program: xauth::DEFAULT_XAUTH_PROGRAM.to_string(),
        }
    }
}

/// A running headless X server and its credentials.
///
/// Not internally synchronized; wrap it in a lock for shared use across
/// threads.
#[derive(Debug)]
pub struct Xvfb {
    // Held for its Drop: releasing it removes the backing directory.
    _temp_dir: TempDir,
    auth_path: PathBuf,
    child: Child,
    display: u32,
    running: bool,
}

impl Xvfb {
    /// Spawns an Xvfb server with the default programs.
    pub fn spawn() -> Result<Self, Error> {
        Self::spawn_with_config(&XvfbConfig::default())
    }

    /// Spawns the display server and synchronizes with it.
    ///
    /// By the time this returns `Ok`, the server is up, its display
    /// number is known, and the authority file contains the cookie
    /// clients authenticate with. On failure no usable handle and no
    /// stray child process is left behind.
    ///
    /// Blocks until the server reports readiness; a server that never
    /// reports and never exits will block indefinitely.
    pub fn spawn_with_config(config: &XvfbConfig) -> Result<Self, Error> {
        Self::bootstrap(config).map_err(|err| {
            error!("Starting {} failed: {:#}", config.xvfb_program, err);
            Error::Bootstrap(err)
        })
    }

    fn bootstrap(config: &XvfbConfig) -> Result<Self> {
        info!("Starting {} X server as child process", config.xvfb_program);

        let temp_dir = tempfile::tempdir()
            .context("failed to create temporary directory for the authority file")?;
        let auth_path = temp_dir.path().join(AUTHORITY_FILE_NAME);

        File::create(&auth_path)
            .with_context(|| format!("failed to create authority file {}", auth_path.display()))?;

        // Installed before the server starts, so it never runs without
        // an authority entry and falls back to accepting every
        // connection.
        xauth::add_entry(
            &config.xauth_program,
            &auth_path,
            PLACEHOLDER_DISPLAY,
            &generate_cookie(),
        )?;

        // Pipe through which the server reports its display number.
        let (display_read, display_write) =
            nix::unistd::pipe().context("failed to create display-number pipe")?;
        // Only the write end may cross into the child.
        fcntl(&display_read, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .context("failed to set close-on-exec on the pipe read end")?;

        let mut command = Command::new(&config.xvfb_program);
        command
            .arg("-displayfd")
            .arg(display_write.as_raw_fd().to_string())
            .arg("-auth")
            .arg(&auth_path)
            .arg("-screen")
            .arg(SCREEN_NUMBER)
            .arg(SCREEN_GEOMETRY)
            // Own process group, so a Ctrl+C sent to the parent's
            // terminal does not stop the X server before the parent has
            // time to orchestrate shutdown.
            .process_group(0);

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {}", config.xvfb_program))?;
        // The parent's copy of the write end must close for the read
        // loop below to observe end-of-stream.
        drop(display_write);

        match Self::synchronize(config, &auth_path, display_read) {
            Ok(display) => {
                info!(
                    "{} X server :{} successfully started",
                    config.xvfb_program, display
                );
                Ok(Self {
                    _temp_dir: temp_dir,
                    auth_path,
                    child,
                    display,
                    running: true,
                })
            }
            Err(err) => {
                // Reap the half-started server rather than leaking it.
                if let Err(kill_err) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
                    warn!(
                        "Could not send SIGTERM to the failed {} child: {}",
                        config.xvfb_program, kill_err
                    );
                }
                if let Err(wait_err) = child.wait() {
                    warn!(
                        "Could not wait for the failed {} child: {}",
                        config.xvfb_program, wait_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Reads the readiness message from the pipe, installs the real
    /// authority entry for the reported display, and returns the
    /// display number.
    fn synchronize(config: &XvfbConfig, auth_path: &Path, display_read: OwnedFd) -> Result<u32> {
        let mut raw = Vec::new();
        // read_to_end retries interrupted reads and stops at
        // end-of-stream, which the server signals by closing its write
        // end after reporting.
        File::from(display_read)
            .read_to_end(&mut raw)
            .context("failed to read the display number from the server")?;

        let display = parse_display(&raw).with_context(|| {
            format!(
                "server did not report a display number (got {:?})",
                String::from_utf8_lossy(&raw)
            )
        })?;

        // Now that the display number is known, install the entry
        // clients actually authenticate with.
        xauth::add_entry(&config.xauth_program, auth_path, display, &generate_cookie())?;

        Ok(display)
    }

    /// Display number assigned by the server.
    pub fn display(&self) -> u32 {
        self.display
    }

    /// Path to the authority file holding the server's cookie.
    pub fn authority_file(&self) -> &Path {
        &self.auth_path
    }

    /// Whether the server is still running, i.e. shutdown has not run.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Process id of the server child.
    pub fn child_id(&self) -> u32 {
        self.child.id()
    }

    /// Installs `DISPLAY` and `XAUTHORITY` into the real process
    /// environment, overwriting any existing values. Must be called
    /// before launching a client that should connect to this display.
    pub fn setup_env(&self) {
        self.setup_env_in(&mut RealEnv);
    }

    /// Same as [`setup_env`](Self::setup_env), but writing into an
    /// injected environment.
    pub fn setup_env_in(&self, env: &mut dyn ProcessEnv) {
        let display = format!(":{}", self.display);
        env.set_var(DISPLAY_ENV_VAR, OsStr::new(&display));
        env.set_var(XAUTHORITY_ENV_VAR, self.auth_path.as_os_str());
    }

    /// Terminates the server and removes the authority file.
    ///
    /// Idempotent: a second call is a no-op. A failed SIGTERM delivery
    /// and a failed authority-file removal are logged as warnings (the
    /// server may already be gone, and the file lives in a temporary
    /// directory that is cleaned up with the handle); a failed wait for
    /// the child is an error.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        if !self.running {
            return Ok(());
        }

        info!("Sending SIGTERM to the X server child process to shut it down");
        if let Err(err) = kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM) {
            warn!(
                "Could not send SIGTERM to the X server, maybe it has already shut down? ({})",
                err
            );
        }

        info!("Waiting for the X server child process to shut down");
        self.child.wait().map_err(Error::Wait)?;

        info!("Successfully shut down the X server");

        if let Err(err) = std::fs::remove_file(&self.auth_path) {
            warn!("Unlinking file {} failed: {}", self.auth_path.display(), err);
        }

        self.running = false;
        Ok(())
    }
}

impl Drop for Xvfb {
    fn drop(&mut self) {
        if self.running {
            if let Err(err) = self.shutdown() {
                error!("Shutting down the X server during drop failed: {}", err);
            }
        }
    }
}

/// Parses the readiness message: ASCII decimal digits followed by
/// exactly one trailing newline, nothing else.
fn parse_display(raw: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(raw).ok()?;
    let digits = text.strip_suffix('\n')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
