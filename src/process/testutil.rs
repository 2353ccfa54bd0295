//! Shared fixtures for process tests.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

/// Writes an executable shell script `name` into `dir`.
pub(crate) fn script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
}

/// Config with short liveness polls and kill grace.
pub(crate) fn fast_config() -> Config {
    Config {
        kill_grace: Duration::from_millis(300),
        liveness_checks: 5,
        liveness_interval: Duration::from_millis(50),
        ..Config::default()
    }
}
