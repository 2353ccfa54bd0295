//! # Simulation: backend plus user simulation nodes.
//!
//! A [`Simulation`] owns one [`StatusBus`] and two groups:
//! - **backend**: control bridge, data bridge and player, each confirmed by
//!   its `CompInitFinished` event
//! - **sim_nodes**: user supplied nodes added at runtime
//!
//! ## Lifecycle
//! ```text
//! new() ─► add_sim_node()* ─► start_simulation() ─► ... ─► shutdown()
//!                                 │ any group fails
//!                                 └─► stop both groups, report failure
//!
//! stop_simulation()   = stop both groups ─► reset bus history
//! restart_sim_nodes() = stop sim nodes ─► reset bus history ─► start sim nodes
//! ```
//!
//! ## Rules
//! - History is reset after stops so a later start never matches a stale
//!   init event from the previous run.
//! - `shutdown` is idempotent; after it the bus is closed and every start
//!   fails with [`StartError::BusClosed`] or times out.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use super::signals::wait_for_termination;
use crate::bus::StatusBus;
use crate::config::Config;
use crate::error::{GroupError, StartError, StopError};
use crate::process::{
    GroupReport, ProcessGroup, ProcessHandle, ProcessSpec, start_groups_in_parallel,
    stop_groups_in_parallel,
};
use crate::status::Origin;
use crate::transport::StatusFeed;

/// Name of the backend group.
pub const BACKEND_GROUP: &str = "backend";
/// Name of the simulation node group.
pub const SIM_NODES_GROUP: &str = "sim_nodes";

/// Backend components started for every simulation.
const BACKEND_ORIGINS: [Origin; 3] = [Origin::ControlBridge, Origin::DataBridge, Origin::Player];

/// Controls the processes of one simulation session.
pub struct Simulation {
    bus: StatusBus,
    cfg: Config,
    backend: ProcessGroup,
    sim_nodes: ProcessGroup,
    closed: AtomicBool,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("backend", &self.backend)
            .field("sim_nodes", &self.sim_nodes)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Simulation {
    /// Creates a simulation whose backend executables live in `backend_dir`.
    pub fn new(bus: StatusBus, backend_dir: impl Into<PathBuf>, cfg: Config) -> Self {
        let backend_dir = backend_dir.into();
        let backend = ProcessGroup::new(BACKEND_GROUP, bus.clone(), cfg.clone());
        for origin in BACKEND_ORIGINS {
            if let Err(err) = backend.add_process(ProcessSpec::backend(origin, &backend_dir)) {
                tracing::warn!(error = %err, "backend component registered twice");
            }
        }
        Self::with_backend(bus, backend, cfg)
    }

    /// Creates a simulation around a custom backend group.
    pub fn with_backend(bus: StatusBus, backend: ProcessGroup, cfg: Config) -> Self {
        let sim_nodes = ProcessGroup::new(SIM_NODES_GROUP, bus.clone(), cfg.clone());
        Self {
            bus,
            cfg,
            backend,
            sim_nodes,
            closed: AtomicBool::new(false),
        }
    }

    /// Bus shared by every process of this simulation.
    pub fn bus(&self) -> &StatusBus {
        &self.bus
    }

    /// Backend group.
    pub fn backend(&self) -> &ProcessGroup {
        &self.backend
    }

    /// Simulation node group.
    pub fn sim_nodes(&self) -> &ProcessGroup {
        &self.sim_nodes
    }

    /// Spawns a transport feed into this simulation's bus.
    ///
    /// The queue holds [`Config::channel_capacity`] records.
    pub fn open_feed(&self) -> (mpsc::Sender<String>, StatusFeed) {
        StatusFeed::channel(self.bus.clone(), self.cfg.channel_capacity)
    }

    /// Registers a simulation node; it is not started.
    pub fn add_sim_node(&self, spec: ProcessSpec) -> Result<Arc<ProcessHandle>, GroupError> {
        self.sim_nodes.add_process(spec)
    }

    /// Stops and removes a simulation node.
    pub async fn remove_sim_node(&self, name: &str, timeout: Duration) -> Result<(), GroupError> {
        self.sim_nodes.remove_process(name, timeout).await
    }

    /// Simulation node by name.
    pub fn node(&self, name: &str) -> Option<Arc<ProcessHandle>> {
        self.sim_nodes.get(name)
    }

    /// Backend component by name.
    pub fn backend_node(&self, name: &str) -> Option<Arc<ProcessHandle>> {
        self.backend.get(name)
    }

    /// Starts the backend components.
    pub async fn start_backend(&self, timeout: Option<Duration>) -> GroupReport<StartError> {
        self.backend.start_all(timeout).await
    }

    /// Starts every simulation node that is not running yet.
    pub async fn start_sim_nodes(&self, timeout: Option<Duration>) -> GroupReport<StartError> {
        self.sim_nodes.start_all(timeout).await
    }

    /// Starts backend and simulation nodes in parallel.
    ///
    /// Returns true if every process started. On failure both groups have
    /// been stopped with the configured stop timeout.
    pub async fn start_simulation(&self, timeout: Option<Duration>) -> bool {
        let reports = start_groups_in_parallel(
            &[&self.backend, &self.sim_nodes],
            timeout,
            self.cfg.stop_timeout,
        )
        .await;
        let ok = reports.iter().all(GroupReport::all_ok);
        if ok {
            tracing::info!("simulation started");
        } else {
            tracing::error!("simulation start failed");
        }
        ok
    }

    /// [`start_simulation`](Self::start_simulation) with [`Config::start_timeout`].
    pub async fn start(&self) -> bool {
        self.start_simulation(self.cfg.default_start_timeout()).await
    }

    /// [`stop_simulation`](Self::stop_simulation) with [`Config::stop_timeout`].
    pub async fn stop(&self) -> bool {
        self.stop_simulation(self.cfg.stop_timeout).await
    }

    /// Stops the backend components.
    pub async fn stop_backend(&self, timeout: Duration) -> GroupReport<StopError> {
        self.backend.stop_all(timeout).await
    }

    /// Stops every simulation node (they stay registered).
    pub async fn stop_sim_nodes(&self, timeout: Duration) -> GroupReport<StopError> {
        self.sim_nodes.stop_all(timeout).await
    }

    /// Stops both groups in parallel and clears the status history.
    pub async fn stop_simulation(&self, timeout: Duration) -> bool {
        let reports =
            stop_groups_in_parallel(&[&self.sim_nodes, &self.backend], timeout).await;
        self.bus.reset();
        let ok = reports.iter().all(GroupReport::all_ok);
        tracing::info!(ok, "simulation stopped");
        ok
    }

    /// Restarts the simulation nodes with a clean status history.
    pub async fn restart_sim_nodes(
        &self,
        start_timeout: Option<Duration>,
        stop_timeout: Duration,
    ) -> GroupReport<StartError> {
        let stopped = self.sim_nodes.stop_all(stop_timeout).await;
        if !stopped.all_ok() {
            tracing::warn!("restart: some simulation nodes did not stop cleanly");
        }
        self.bus.reset();
        self.sim_nodes.start_all(start_timeout).await
    }

    /// Restarts the whole simulation.
    pub async fn restart(&self, start_timeout: Option<Duration>, stop_timeout: Duration) -> bool {
        if !self.stop_simulation(stop_timeout).await {
            tracing::warn!("restart: stop incomplete, starting anyway");
        }
        self.start_simulation(start_timeout).await
    }

    /// Stops every process, closes the bus and forgets the simulation nodes.
    ///
    /// Returns true if every process stopped cleanly. Later calls are no-ops
    /// returning true.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return true;
        }
        let ok = self.stop_simulation(timeout).await;
        self.bus.shutdown();
        self.sim_nodes.clear();
        tracing::info!(ok, "simulation shut down");
        ok
    }

    /// Waits for a termination signal, then shuts down.
    pub async fn run_until_signal(&self) -> std::io::Result<bool> {
        wait_for_termination().await?;
        Ok(self.shutdown(self.cfg.stop_timeout).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusMessage;

    #[test]
    fn backend_group_holds_the_three_components() {
        let sim = Simulation::new(StatusBus::new(), "/opt/backend", Config::default());
        assert_eq!(
            sim.backend().names(),
            vec!["next_controlbridge", "next_databridge", "next_player"]
        );
        let player = sim.backend_node("next_player").expect("player");
        assert_eq!(player.spec().init_code(), Some(211));
        assert!(sim.sim_nodes().is_empty());
    }

    #[tokio::test]
    async fn stop_simulation_resets_history() {
        let bus = StatusBus::new();
        let sim = Simulation::new(bus.clone(), "/opt/backend", Config::default());
        bus.ingest(StatusMessage::new("next_player", Origin::Player, 4211, "ready"));
        assert!(sim.stop_simulation(Duration::from_millis(100)).await);
        assert!(bus.history().is_empty());
    }

    #[tokio::test]
    async fn feed_ingests_into_the_simulation_bus() {
        let sim = Simulation::new(StatusBus::new(), "/opt/backend", Config::default());
        let (tx, feed) = sim.open_feed();
        tx.send(r#"{"component_name":"next_player","origin":4,"status_code":4211,"status_msg":"ok"}"#.to_owned())
            .await
            .expect("send");
        drop(tx);
        let stats = feed.join().await;
        assert_eq!(stats.ingested, 1);
        assert_eq!(sim.bus().history().len(), 1);
    }

    #[tokio::test]
    async fn missing_backend_fails_the_start() {
        let sim = Simulation::new(StatusBus::new(), "/nonexistent/backend", Config::default());
        assert!(!sim.start_simulation(Some(Duration::from_millis(100))).await);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_closes_the_bus() {
        let bus = StatusBus::new();
        let sim = Simulation::new(bus.clone(), "/opt/backend", Config::default());
        sim.add_sim_node(ProcessSpec::new("n", Origin::SimNode, "/opt", "n"))
            .expect("add");

        assert!(sim.shutdown(Duration::from_millis(100)).await);
        assert!(bus.is_closed());
        assert!(sim.sim_nodes().is_empty());
        assert!(sim.shutdown(Duration::from_millis(100)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn restart_sim_nodes_waits_for_fresh_init_events() {
        use crate::process::ProcessState;
        use crate::process::testutil::{fast_config, script};
        use crate::status::StatusCode;

        let dir = tempfile::tempdir().expect("tempdir");
        script(dir.path(), "node", "exec sleep 30");
        let bus = StatusBus::new();
        let sim = Simulation::with_backend(
            bus.clone(),
            ProcessGroup::new(BACKEND_GROUP, bus.clone(), fast_config()),
            fast_config(),
        );
        let node = sim
            .add_sim_node(
                ProcessSpec::new("node", Origin::SimNode, dir.path(), "node")
                    .with_init_code(StatusCode::CompInitFinished),
            )
            .expect("add");

        bus.ingest(StatusMessage::new("node", Origin::SimNode, 5211, "ready"));
        assert!(sim.start_sim_nodes(Some(Duration::from_secs(2))).await.all_ok());
        assert_eq!(node.state().await, ProcessState::Running);

        let report = sim
            .restart_sim_nodes(Some(Duration::from_millis(300)), Duration::from_secs(2))
            .await;
        assert!(!report.all_ok(), "stale init event must not satisfy the restart");
        assert_eq!(node.state().await, ProcessState::NotRunning);
        assert!(sim.shutdown(Duration::from_secs(2)).await);
    }
}
