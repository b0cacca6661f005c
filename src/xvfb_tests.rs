// src/xvfb_tests.rs

#![cfg(test)]

//! Process-level tests for the `Xvfb` handle, run against shell-script
//! stand-ins for the Xvfb and xauth executables.

use crate::env::MockEnv;
use crate::error::Error;
use crate::xvfb::{Xvfb, XvfbConfig, DISPLAY_ENV_VAR, XAUTHORITY_ENV_VAR};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Stand-in for Xvfb: reports display 7 on the fd passed via
/// `-displayfd`, closes that fd, then stays alive until terminated.
const FAKE_XVFB: &str = "#!/bin/sh\n\
    eval \"printf '7\\n' >&$2\"\n\
    eval \"exec $2>&-\"\n\
    sleep 30\n";

/// Stand-in for Xvfb that exits without ever reporting a display.
const SILENT_XVFB: &str = "#!/bin/sh\nexit 0\n";

/// Stand-in for xauth: appends its stdin to the file passed via `-f`.
const FAKE_XAUTH: &str = "#!/bin/sh\ncat >> \"$2\"\n";

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn test_config(dir: &Path) -> XvfbConfig {
    XvfbConfig {
        xvfb_program: write_script(dir, "fake-xvfb", FAKE_XVFB)
            .to_str()
            .unwrap()
            .to_string(),
        xauth_program: write_script(dir, "fake-xauth", FAKE_XAUTH)
            .to_str()
            .unwrap()
            .to_string(),
    }
}

/// Asserts that `pid` no longer exists, polling because process exit is
/// asynchronous. Probes with signal 0, which delivers nothing.
fn assert_reaped(pid: u32) {
    let pid = Pid::from_raw(pid as i32);
    let deadline = Instant::now() + REAP_TIMEOUT;
    while kill(pid, None).is_ok() {
        assert!(Instant::now() < deadline, "child {} still alive", pid);
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test_log::test]
fn spawn_reports_display_and_installs_cookies() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Xvfb::spawn_with_config(&test_config(dir.path())).unwrap();

    assert!(server.is_running());
    assert_eq!(server.display(), 7);

    let entries = fs::read_to_string(server.authority_file()).unwrap();
    let lines: Vec<&str> = entries.lines().collect();
    assert_eq!(lines.len(), 2, "expected placeholder + real entry: {:?}", lines);
    assert!(lines[0].starts_with("add :0 . "));
    assert!(lines[1].starts_with("add :7 . "));

    let cookies: Vec<&str> = lines
        .iter()
        .map(|line| line.rsplit(' ').next().unwrap())
        .collect();
    for cookie in &cookies {
        assert_eq!(cookie.len(), 32);
        assert!(cookie.bytes().all(|b| b.is_ascii_hexdigit()));
    }
    // The placeholder and the real entry must not share a cookie.
    assert_ne!(cookies[0], cookies[1]);

    server.shutdown().unwrap();
    assert!(!server.is_running());
}

#[test_log::test]
fn setup_env_exposes_display_and_authority() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Xvfb::spawn_with_config(&test_config(dir.path())).unwrap();

    let mut env = MockEnv::new();
    server.setup_env_in(&mut env);
    assert_eq!(env.get(DISPLAY_ENV_VAR), Some(OsStr::new(":7")));
    assert_eq!(
        env.get(XAUTHORITY_ENV_VAR),
        Some(server.authority_file().as_os_str())
    );

    server.shutdown().unwrap();
}

#[test_log::test]
fn shutdown_removes_authority_file_and_reaps_child() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Xvfb::spawn_with_config(&test_config(dir.path())).unwrap();

    let auth_path = server.authority_file().to_path_buf();
    let pid = server.child_id();
    assert!(auth_path.exists());

    server.shutdown().unwrap();

    assert!(!auth_path.exists());
    assert_reaped(pid);
}

#[test_log::test]
fn shutdown_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Xvfb::spawn_with_config(&test_config(dir.path())).unwrap();

    let auth_path = server.authority_file().to_path_buf();
    server.shutdown().unwrap();
    assert!(!server.is_running());

    // A marker placed at the old path must survive the second call: the
    // no-op path must not attempt another removal.
    fs::write(&auth_path, "marker").unwrap();
    server.shutdown().unwrap();
    assert!(auth_path.exists());
    assert!(!server.is_running());
}

#[test_log::test]
fn drop_shuts_the_server_down() {
    let dir = tempfile::tempdir().unwrap();
    let server = Xvfb::spawn_with_config(&test_config(dir.path())).unwrap();

    let pid = server.child_id();
    let auth_path = server.authority_file().to_path_buf();
    drop(server);

    assert_reaped(pid);
    assert!(!auth_path.exists());
}

#[test_log::test]
fn bootstrap_fails_when_server_never_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config = XvfbConfig {
        xvfb_program: write_script(dir.path(), "silent-xvfb", SILENT_XVFB)
            .to_str()
            .unwrap()
            .to_string(),
        xauth_program: write_script(dir.path(), "fake-xauth", FAKE_XAUTH)
            .to_str()
            .unwrap()
            .to_string(),
    };

    let err = Xvfb::spawn_with_config(&config).unwrap_err();
    assert!(matches!(err, Error::Bootstrap(_)), "got: {}", err);
}

#[test_log::test]
fn bootstrap_fails_when_authority_tool_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config = XvfbConfig {
        xvfb_program: write_script(dir.path(), "fake-xvfb", FAKE_XVFB)
            .to_str()
            .unwrap()
            .to_string(),
        xauth_program: "/nonexistent/xauth-tool".to_string(),
    };

    let err = Xvfb::spawn_with_config(&config).unwrap_err();
    assert!(matches!(err, Error::Bootstrap(_)), "got: {}", err);
}
