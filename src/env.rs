// src/env.rs

//! Injectable process-environment capability.
//!
//! Clients of a virtual display find it through the `DISPLAY` and
//! `XAUTHORITY` environment variables, which are process-global state.
//! The mutation sits behind a small trait so tests can observe the
//! writes without touching the real environment.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};

/// Destination for environment-variable writes.
pub trait ProcessEnv {
    /// Sets `name` to `value`, overwriting any existing value.
    fn set_var(&mut self, name: &str, value: &OsStr);
}

/// The real process environment.
#[derive(Debug, Default)]
pub struct RealEnv;

impl ProcessEnv for RealEnv {
    fn set_var(&mut self, name: &str, value: &OsStr) {
        std::env::set_var(name, value);
    }
}

/// In-memory environment that records writes into a map.
#[derive(Debug, Default)]
pub struct MockEnv {
    vars: HashMap<String, OsString>,
}

impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded value of `name`, if any.
    pub fn get(&self, name: &str) -> Option<&OsStr> {
        self.vars.get(name).map(OsString::as_os_str)
    }
}

impl ProcessEnv for MockEnv {
    fn set_var(&mut self, name: &str, value: &OsStr) {
        self.vars.insert(name.to_string(), value.to_os_string());
    }
}

#[cfg(test)]
mod tests {
    use super::{MockEnv, ProcessEnv};
    use std::ffi::OsStr;

    #[test]
    fn mock_env_records_and_overwrites() {
        let mut env = MockEnv::new();
        assert_eq!(env.get("DISPLAY"), None);

        env.set_var("DISPLAY", OsStr::new(":3"));
        assert_eq!(env.get("DISPLAY"), Some(OsStr::new(":3")));

        env.set_var("DISPLAY", OsStr::new(":7"));
        assert_eq!(env.get("DISPLAY"), Some(OsStr::new(":7")));
    }
}
