// src/lib.rs

//! Lifecycle management for a headless Xvfb X server.
//!
//! The [`Xvfb`] handle spawns the display server as a child process,
//! negotiates an authentication cookie through `xauth`, discovers the
//! display number the server was assigned, exposes the `DISPLAY` and
//! `XAUTHORITY` environment variables for consumers, and guarantees the
//! child process and credential file are cleaned up on shutdown or drop.
//!
//! Typical use:
//!
//! ```no_run
//! use xvfb_session::Xvfb;
//!
//! # fn run() -> Result<(), xvfb_session::Error> {
//! let mut server = Xvfb::spawn()?;
//! server.setup_env();
//! // ... launch clients that connect to the display ...
//! server.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod cookie;
pub mod env;
pub mod error;
pub mod xauth;
pub mod xvfb;

mod xvfb_tests;

pub use env::{MockEnv, ProcessEnv, RealEnv};
pub use error::Error;
pub use xvfb::{Xvfb, XvfbConfig, DISPLAY_ENV_VAR, XAUTHORITY_ENV_VAR};
