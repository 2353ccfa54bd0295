//! # ProcessGroup: a named set of process handles.
//!
//! Groups fan start/stop out over a bounded worker pool and report per-member
//! results.
//!
//! ## Architecture
//! ```text
//! start_all(timeout)
//!   ├─► snapshot members (group lock released)
//!   ├─► JoinSet ◄── one task per member
//!   │      └─► acquire Semaphore permit (workers_for(len)) ─► handle.start()
//!   └─► join all ─► GroupReport { name → Result }
//! ```
//!
//! ## Rules
//! - The member map is guarded by the group lock only; the lock is never held
//!   across an `.await`.
//! - A slow or failed member never blocks the others.
//! - `stop_all` always runs to completion; there is no early abort.
//! - A member that is already running counts as started.
//! - Overlapping `start_all` calls on one group must be serialized by the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::handle::ProcessHandle;
use super::spec::ProcessSpec;
use crate::bus::StatusBus;
use crate::config::Config;
use crate::error::{GroupError, StartError, StopError};

/// Per-member outcome of a group-wide operation.
#[derive(Debug)]
pub struct GroupReport<E> {
    group: String,
    results: BTreeMap<String, Result<(), E>>,
}

impl<E> GroupReport<E> {
    fn new(group: &str) -> Self {
        Self {
            group: group.to_owned(),
            results: BTreeMap::new(),
        }
    }

    /// Name of the group the report belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// True if every member succeeded (also true for an empty group).
    pub fn all_ok(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    /// Members that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &E)> {
        self.results
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
    }

    /// Result of one member.
    pub fn get(&self, name: &str) -> Option<&Result<(), E>> {
        self.results.get(name)
    }

    /// Number of members reported.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True if no member was reported.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// All results, ordered by member name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<(), E>)> {
        self.results.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Consumes the report into its result map.
    pub fn into_results(self) -> BTreeMap<String, Result<(), E>> {
        self.results
    }
}

/// Named collection of [`ProcessHandle`]s sharing one bus.
pub struct ProcessGroup {
    name: String,
    bus: StatusBus,
    cfg: Config,
    members: RwLock<BTreeMap<String, Arc<ProcessHandle>>>,
}

impl std::fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("name", &self.name)
            .field("members", &self.names())
            .finish()
    }
}

impl ProcessGroup {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>, bus: StatusBus, cfg: Config) -> Self {
        Self {
            name: name.into(),
            bus,
            cfg,
            members: RwLock::new(BTreeMap::new()),
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a member built from `spec`.
    ///
    /// Fails with [`GroupError::AlreadyExists`] if the name is taken.
    pub fn add_process(&self, spec: ProcessSpec) -> Result<Arc<ProcessHandle>, GroupError> {
        let mut members = self.members.write();
        if members.contains_key(spec.name()) {
            return Err(GroupError::AlreadyExists(spec.name().to_owned()));
        }
        let name = spec.name().to_owned();
        let handle = Arc::new(ProcessHandle::new(spec, self.bus.clone(), self.cfg.clone()));
        members.insert(name.clone(), Arc::clone(&handle));
        tracing::debug!(group = %self.name, process = %name, "process added");
        Ok(handle)
    }

    /// Stops a member, then removes it.
    ///
    /// The member is removed even if its stop fails; the stop error is returned.
    pub async fn remove_process(&self, name: &str, timeout: Duration) -> Result<(), GroupError> {
        let handle = self
            .get(name)
            .ok_or_else(|| GroupError::NotFound(name.to_owned()))?;
        let stopped = handle.stop(timeout).await;
        self.members.write().remove(name);
        tracing::debug!(group = %self.name, process = name, "process removed");
        stopped.map_err(GroupError::from)
    }

    /// Member by name.
    pub fn get(&self, name: &str) -> Option<Arc<ProcessHandle>> {
        self.members.read().get(name).cloned()
    }

    /// Member names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.members.read().keys().cloned().collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// True if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Drops every member without stopping it.
    ///
    /// Children still owned by dropped handles are killed when the last
    /// reference goes away.
    pub fn clear(&self) {
        self.members.write().clear();
    }

    fn snapshot(&self) -> Vec<Arc<ProcessHandle>> {
        self.members.read().values().cloned().collect()
    }

    /// Starts every member concurrently and waits for all of them.
    pub async fn start_all(&self, timeout: Option<Duration>) -> GroupReport<StartError> {
        let report = self
            .fan_out(|handle| async move {
                match handle.start(timeout).await {
                    Err(StartError::AlreadyRunning) => Ok(()),
                    other => other,
                }
            })
            .await;
        self.log_report("start", &report);
        report
    }

    /// Stops every member concurrently and waits for all of them.
    pub async fn stop_all(&self, timeout: Duration) -> GroupReport<StopError> {
        let report = self
            .fan_out(|handle| async move { handle.stop(timeout).await })
            .await;
        self.log_report("stop", &report);
        report
    }

    async fn fan_out<E, F, Fut>(&self, op: F) -> GroupReport<E>
    where
        E: Send + 'static,
        F: Fn(Arc<ProcessHandle>) -> Fut,
        Fut: std::future::Future<Output = Result<(), E>> + Send + 'static,
    {
        let members = self.snapshot();
        let mut report = GroupReport::new(&self.name);
        if members.is_empty() {
            return report;
        }

        let permits = Arc::new(Semaphore::new(self.cfg.workers_for(members.len())));
        let mut set = JoinSet::new();
        for handle in members {
            let name = handle.name().to_owned();
            let permits = Arc::clone(&permits);
            let fut = op(handle);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (name, fut.await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, result)) => {
                    report.results.insert(name, result);
                }
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => {
                    tracing::error!(group = %self.name, error = %err, "group worker cancelled");
                }
            }
        }
        report
    }

    fn log_report<E: std::fmt::Display>(&self, op: &str, report: &GroupReport<E>) {
        if report.all_ok() {
            tracing::info!(group = %self.name, op, members = report.len(), "group operation succeeded");
            return;
        }
        for (name, err) in report.failures() {
            tracing::error!(group = %self.name, op, process = name, error = %err, "group member failed");
        }
    }
}

/// Starts several groups concurrently.
///
/// If any group reports a failure, every group is stopped (with
/// `stop_timeout`) before returning, so no half-started system is left behind.
pub async fn start_groups_in_parallel(
    groups: &[&ProcessGroup],
    start_timeout: Option<Duration>,
    stop_timeout: Duration,
) -> Vec<GroupReport<StartError>> {
    let reports =
        futures::future::join_all(groups.iter().map(|g| g.start_all(start_timeout))).await;
    if reports.iter().any(|r| !r.all_ok()) {
        tracing::warn!(groups = groups.len(), "group start failed, stopping all groups");
        stop_groups_in_parallel(groups, stop_timeout).await;
    }
    reports
}

/// Stops several groups concurrently; always runs to completion.
pub async fn stop_groups_in_parallel(
    groups: &[&ProcessGroup],
    timeout: Duration,
) -> Vec<GroupReport<StopError>> {
    futures::future::join_all(groups.iter().map(|g| g.stop_all(timeout))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Origin;

    #[test]
    fn names_are_unique() {
        let group = ProcessGroup::new("g", StatusBus::new(), Config::default());
        group
            .add_process(ProcessSpec::new("a", Origin::SimNode, "/x", "a"))
            .expect("first add");
        let err = group
            .add_process(ProcessSpec::new("a", Origin::SimNode, "/y", "a"))
            .expect_err("duplicate");
        assert!(matches!(err, GroupError::AlreadyExists(ref n) if n == "a"));
        assert_eq!(group.len(), 1);
    }

    #[tokio::test]
    async fn remove_unknown_member_is_not_found() {
        let group = ProcessGroup::new("g", StatusBus::new(), Config::default());
        let err = group
            .remove_process("missing", Duration::from_millis(10))
            .await
            .expect_err("not found");
        assert_eq!(err.as_label(), "group_not_found");
    }

    #[tokio::test]
    async fn empty_group_reports_success() {
        let group = ProcessGroup::new("g", StatusBus::new(), Config::default());
        let report = group.start_all(None).await;
        assert!(report.all_ok());
        assert!(report.is_empty());
        assert_eq!(report.group(), "g");
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::process::handle::ProcessState;
        use crate::process::testutil::{fast_config, script};

        #[tokio::test]
        async fn start_all_isolates_a_failing_member() {
            let dir = tempfile::tempdir().expect("tempdir");
            script(dir.path(), "a", "exec sleep 30");
            script(dir.path(), "b", "exec sleep 30");
            let cfg = Config {
                max_parallel: 2,
                ..fast_config()
            };
            let group = ProcessGroup::new("nodes", StatusBus::new(), cfg);
            for name in ["a", "b"] {
                group
                    .add_process(ProcessSpec::new(name, Origin::SimNode, dir.path(), name))
                    .expect("add");
            }
            group
                .add_process(ProcessSpec::new("c", Origin::SimNode, dir.path(), "missing"))
                .expect("add");

            let report = group.start_all(None).await;
            assert!(!report.all_ok());
            assert_eq!(report.len(), 3);
            let failures: Vec<_> = report.failures().map(|(n, _)| n.to_owned()).collect();
            assert_eq!(failures, vec!["c".to_owned()]);

            for name in ["a", "b"] {
                let handle = group.get(name).expect("member");
                assert_eq!(handle.state().await, ProcessState::Running);
            }

            let again = group.start_all(None).await;
            assert!(again.get("a").is_some_and(Result::is_ok));

            let stopped = group.stop_all(Duration::from_secs(2)).await;
            assert!(stopped.all_ok());
        }

        #[tokio::test]
        async fn parallel_start_rolls_back_every_group_on_failure() {
            let dir = tempfile::tempdir().expect("tempdir");
            script(dir.path(), "ok", "exec sleep 30");
            let bus = StatusBus::new();
            let good = ProcessGroup::new("backend", bus.clone(), fast_config());
            let bad = ProcessGroup::new("nodes", bus, fast_config());
            good.add_process(ProcessSpec::new("ok", Origin::Player, dir.path(), "ok"))
                .expect("add");
            bad.add_process(ProcessSpec::new("ko", Origin::SimNode, dir.path(), "ko"))
                .expect("add");

            let reports =
                start_groups_in_parallel(&[&good, &bad], None, Duration::from_secs(2)).await;
            assert!(reports[0].all_ok());
            assert!(!reports[1].all_ok());
            let handle = good.get("ok").expect("member");
            assert_eq!(handle.state().await, ProcessState::NotRunning);
        }

        #[tokio::test]
        async fn remove_process_stops_the_member() {
            let dir = tempfile::tempdir().expect("tempdir");
            script(dir.path(), "n", "exec sleep 30");
            let group = ProcessGroup::new("nodes", StatusBus::new(), fast_config());
            let handle = group
                .add_process(ProcessSpec::new("n", Origin::SimNode, dir.path(), "n"))
                .expect("add");
            handle.start(None).await.expect("started");

            group
                .remove_process("n", Duration::from_secs(2))
                .await
                .expect("removed");
            assert!(group.is_empty());
            assert!(!handle.is_running().await);
        }
    }
}
