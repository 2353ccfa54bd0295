//! # Process specification.
//!
//! Defines [`ProcessSpec`] a configuration bundle that describes how one
//! external process is launched and how its startup is confirmed.
//!
//! A spec can be created:
//! - **Explicitly** with [`ProcessSpec::new`] and the `with_*` builders
//! - **For a backend component** with [`ProcessSpec::backend`]
//!
//! ## Rules
//! - `init_code` is an **application** code (e.g. `211`); the matcher waits for
//!   `origin * 1000 + init_code` published under the spec's name and origin.
//! - Without `init_code`, a start is confirmed by the process being alive.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::status::{MAX_APP_CODE, Origin, StatusCode, StatusMessage, bus_code};

/// Specification for launching a supervised process.
///
/// ## Example
/// ```rust
/// use simvisor::{Origin, ProcessSpec, StatusCode};
///
/// let spec = ProcessSpec::new("radar", Origin::SimNode, "/opt/sim", "radar_node")
///     .with_arg("--fast")
///     .with_init_code(StatusCode::CompInitFinished);
///
/// assert_eq!(spec.exec_path(), std::path::Path::new("/opt/sim/radar_node"));
/// let matcher = spec.init_matcher().unwrap();
/// assert_eq!(matcher.code, Some(5211));
/// ```
#[derive(Clone, Debug)]
pub struct ProcessSpec {
    name: String,
    origin: Origin,
    exec_dir: PathBuf,
    exec_name: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    init_code: Option<u32>,
}

impl ProcessSpec {
    /// Creates a spec without arguments and without an init code.
    ///
    /// ### Parameters
    /// - `name`: Component name; also the component the init event must carry
    /// - `origin`: Kind of process (prefix of its bus codes)
    /// - `exec_dir`: Directory holding the executable; also the working directory
    /// - `exec_name`: File name of the executable inside `exec_dir`
    pub fn new(
        name: impl Into<String>,
        origin: Origin,
        exec_dir: impl Into<PathBuf>,
        exec_name: impl Into<OsString>,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            exec_dir: exec_dir.into(),
            exec_name: exec_name.into(),
            args: Vec::new(),
            env: Vec::new(),
            init_code: None,
        }
    }

    /// Spec for a backend component living in `backend_dir`.
    ///
    /// Uses the origin's node name as component and executable name (with the
    /// platform executable suffix) and waits for [`StatusCode::CompInitFinished`].
    pub fn backend(origin: Origin, backend_dir: impl Into<PathBuf>) -> Self {
        let exec = format!("{}{}", origin.node_name(), std::env::consts::EXE_SUFFIX);
        Self::new(origin.node_name(), origin, backend_dir, exec)
            .with_init_code(StatusCode::CompInitFinished)
    }

    /// Appends one command-line argument.
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several command-line arguments.
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the process.
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the application code that signals finished initialization.
    ///
    /// # Panics
    /// Panics if the code is wider than three digits ([`MAX_APP_CODE`]).
    pub fn with_init_code(mut self, code: impl Into<u32>) -> Self {
        let code = code.into();
        assert!(
            code <= MAX_APP_CODE,
            "init code {code} is not a three-digit application code"
        );
        self.init_code = Some(code);
        self
    }

    /// Confirms starts by liveness only.
    pub fn without_init_code(mut self) -> Self {
        self.init_code = None;
        self
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Origin of the process.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Working directory and executable location.
    pub fn exec_dir(&self) -> &Path {
        &self.exec_dir
    }

    /// Executable file name.
    pub fn exec_name(&self) -> &OsString {
        &self.exec_name
    }

    /// Full path of the executable.
    pub fn exec_path(&self) -> PathBuf {
        self.exec_dir.join(&self.exec_name)
    }

    /// Command-line arguments.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Extra environment variables.
    pub fn env(&self) -> &[(OsString, OsString)] {
        &self.env
    }

    /// Application init code, if configured.
    pub fn init_code(&self) -> Option<u32> {
        self.init_code
    }

    /// Matcher for this process's status events with an optional application code.
    ///
    /// # Panics
    /// Panics if `code` is wider than three digits ([`MAX_APP_CODE`]).
    pub fn matcher(&self, code: Option<u32>) -> StatusMessage {
        let code = code.map(|c| match bus_code(self.origin, c) {
            Some(full) => full,
            None => panic!("status code {c} is not a three-digit application code"),
        });
        StatusMessage::matcher(Some(&self.name), Some(self.origin), code)
    }

    /// Matcher for the init event, if an init code is configured.
    pub fn init_matcher(&self) -> Option<StatusMessage> {
        self.init_code.map(|code| self.matcher(Some(code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_spec_uses_node_name() {
        let spec = ProcessSpec::backend(Origin::ControlBridge, "/srv/backend");
        assert_eq!(spec.name(), "next_controlbridge");
        assert_eq!(spec.init_code(), Some(211));
        let matcher = spec.init_matcher().expect("init code");
        assert_eq!(matcher.component.as_deref(), Some("next_controlbridge"));
        assert_eq!(matcher.origin, Some(Origin::ControlBridge));
        assert_eq!(matcher.code, Some(3211));
        assert_eq!(matcher.text, None);
    }

    #[test]
    fn liveness_only_spec_has_no_init_matcher() {
        let spec = ProcessSpec::new("n", Origin::SimNode, ".", "n")
            .with_init_code(211u32)
            .without_init_code();
        assert!(spec.init_matcher().is_none());
        assert_eq!(spec.matcher(None).code, None);
    }

    #[test]
    fn builders_accumulate_args_and_env() {
        let spec = ProcessSpec::new("n", Origin::SimNode, "/d", "exe")
            .with_arg("-a")
            .with_args(["-b", "-c"])
            .with_env("K", "V");
        assert_eq!(spec.args().len(), 3);
        assert_eq!(spec.env().len(), 1);
    }

    #[test]
    #[should_panic(expected = "three-digit application code")]
    fn oversized_init_code_is_rejected() {
        let _ = ProcessSpec::new("n", Origin::SimNode, "/d", "n").with_init_code(u32::MAX);
    }

    #[test]
    fn matcher_prefixes_three_digit_codes() {
        let spec = ProcessSpec::new("n", Origin::Player, "/d", "n");
        assert_eq!(spec.matcher(Some(MAX_APP_CODE)).code, Some(4999));
    }
}
