//! Periodic liveness probing.
//!
//! Every tick starts a new round: the registry is snapshotted and every node
//! in it is pinged concurrently. A node that fails a single probe (error,
//! rejection or no answer within `probe_timeout`) is evicted as soon as that
//! probe lands. Rounds do not wait for each other and a new round never
//! cancels probes still in flight from an earlier one.

use crate::registry::{ChunkServerRecord, Registry};
use crate::remote::ChunkServerRpc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct LivenessConfig {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Alive {
        id: String,
        message: String,
    },
    Failed {
        id: String,
        reason: String,
        /// False if the entry was already gone or had re-registered.
        evicted: bool,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub alive: Vec<String>,
    pub evicted: Vec<String>,
}

impl RoundReport {
    fn record(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Alive { id, .. } => self.alive.push(id),
            ProbeOutcome::Failed {
                id, evicted: true, ..
            } => self.evicted.push(id),
            ProbeOutcome::Failed { .. } => {}
        }
    }

    pub fn probed(&self) -> usize {
        self.alive.len() + self.evicted.len()
    }
}

pub struct LivenessMonitor<R: ChunkServerRpc> {
    registry: Arc<Registry>,
    rpc: Arc<R>,
    config: LivenessConfig,
}

impl<R: ChunkServerRpc> LivenessMonitor<R> {
    pub fn new(registry: Arc<Registry>, rpc: Arc<R>, config: LivenessConfig) -> Self {
        Self {
            registry,
            rpc,
            config,
        }
    }

    /// Probes one node and evicts it on failure.
    pub async fn probe(&self, record: ChunkServerRecord) -> ProbeOutcome {
        probe_and_evict(
            self.registry.clone(),
            self.rpc.clone(),
            record,
            self.config.probe_timeout,
        )
        .await
    }

    /// Runs one probe round over a snapshot of the registry and waits for
    /// every probe in it to finish.
    pub async fn run_round(&self) -> RoundReport {
        let targets = self.registry.snapshot();
        let mut probes = JoinSet::new();

        for record in targets {
            probes.spawn(probe_and_evict(
                self.registry.clone(),
                self.rpc.clone(),
                record,
                self.config.probe_timeout,
            ));
        }

        let mut report = RoundReport::default();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => tracing::error!("Probe task failed: {}", e),
            }
        }
        report
    }

    /// Starts a round every `probe_interval` until `shutdown` flips to true
    /// or its sender is dropped. The first round runs one interval after start.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.probe_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        tracing::info!(
            "Liveness monitor started (interval {:?}, timeout {:?})",
            self.config.probe_interval,
            self.config.probe_timeout
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Detached so a slow round never delays the next tick.
                    let monitor = self.clone();
                    tokio::spawn(async move {
                        let report = monitor.run_round().await;
                        if report.probed() > 0 {
                            tracing::debug!(
                                "Probe round finished: {} alive, {} evicted",
                                report.alive.len(),
                                report.evicted.len()
                            );
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Liveness monitor stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

async fn probe_and_evict<R: ChunkServerRpc>(
    registry: Arc<Registry>,
    rpc: Arc<R>,
    record: ChunkServerRecord,
    timeout: Duration,
) -> ProbeOutcome {
    tracing::debug!("Sending ping to chunk server {} (port {})", record.id, record.port);

    let result = match tokio::time::timeout(timeout, rpc.ping(&record)).await {
        Ok(Ok(response)) => Ok(response.message),
        Ok(Err(status)) => Err(status.to_string()),
        Err(_) => Err(format!("no response within {:?}", timeout)),
    };

    match result {
        Ok(message) => {
            tracing::info!("Chunk server {} responded: {}", record.id, message);
            ProbeOutcome::Alive {
                id: record.id,
                message,
            }
        }
        Err(reason) => {
            let evicted = registry.evict(&record);
            if evicted {
                tracing::warn!(
                    "Chunk server {} failed liveness probe ({}), marking it offline",
                    record.id,
                    reason
                );
            } else {
                tracing::debug!(
                    "Probe to stale entry {} (port {}) failed: {}",
                    record.id,
                    record.port,
                    reason
                );
            }
            ProbeOutcome::Failed {
                id: record.id,
                reason,
                evicted,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ReregistrationPolicy;
    use crate::remote::fake::{Behavior, FakeChunkServers};

    fn config(interval_ms: u64, timeout_ms: u64) -> LivenessConfig {
        LivenessConfig {
            probe_interval: Duration::from_millis(interval_ms),
            probe_timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn setup(
        fake: FakeChunkServers,
        config: LivenessConfig,
    ) -> (Arc<Registry>, Arc<FakeChunkServers>, LivenessMonitor<FakeChunkServers>) {
        let registry = Arc::new(Registry::new(50052, ReregistrationPolicy::MintNew));
        let fake = Arc::new(fake);
        let monitor = LivenessMonitor::new(registry.clone(), fake.clone(), config);
        (registry, fake, monitor)
    }

    #[tokio::test]
    async fn test_single_miss_evicts() {
        let (registry, fake, monitor) = setup(FakeChunkServers::new(), config(5000, 500));
        registry.register("cs1").unwrap();
        registry.register("cs2").unwrap();
        fake.set("cs2", Behavior::Fail);

        let report = monitor.run_round().await;

        assert_eq!(report.alive, vec!["cs1".to_string()]);
        assert_eq!(report.evicted, vec!["cs2".to_string()]);
        assert!(registry.get("cs1").is_some());
        assert!(registry.get("cs2").is_none());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let (registry, fake, monitor) = setup(FakeChunkServers::new(), config(5000, 50));
        registry.register("slow").unwrap();
        fake.set("slow", Behavior::Hang);

        let report = monitor.run_round().await;

        assert_eq!(report.evicted, vec!["slow".to_string()]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_probes_in_a_round_run_concurrently() {
        // Each ping blocks until all four are in flight, so a sequential
        // round would time every probe out.
        let (registry, fake, monitor) =
            setup(FakeChunkServers::with_ping_barrier(4), config(5000, 2000));
        for id in ["a", "b", "c", "d"] {
            registry.register(id).unwrap();
        }

        let report = monitor.run_round().await;

        assert_eq!(report.alive.len(), 4);
        assert!(report.evicted.is_empty());
        assert_eq!(fake.ping_count(), 4);
        assert_eq!(registry.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_registry_round() {
        let (_registry, fake, monitor) = setup(FakeChunkServers::new(), config(5000, 500));
        let report = monitor.run_round().await;
        assert_eq!(report, RoundReport::default());
        assert_eq!(fake.ping_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_probe_keeps_reregistered_node() {
        let (registry, fake, monitor) = setup(FakeChunkServers::new(), config(5000, 500));
        let stale = registry.register("cs1").unwrap().record;
        let fresh = registry.register("cs1").unwrap().record;
        fake.set("cs1", Behavior::Fail);

        let outcome = monitor.probe(stale).await;

        assert!(matches!(outcome, ProbeOutcome::Failed { evicted: false, .. }));
        assert_eq!(registry.get("cs1"), Some(fresh));
    }

    #[tokio::test]
    async fn test_run_loop_evicts_and_stops() {
        let (registry, fake, monitor) = setup(FakeChunkServers::new(), config(30, 200));
        registry.register("ok").unwrap();
        registry.register("dead").unwrap();
        fake.set("dead", Behavior::Fail);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Arc::new(monitor).spawn(shutdown_rx);

        let mut evicted = false;
        for _ in 0..100 {
            if registry.get("dead").is_none() {
                evicted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(evicted);
        assert!(registry.get("ok").is_some());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(fake.ping_count() >= 2);
    }

    #[tokio::test]
    async fn test_ticks_keep_probing_while_earlier_probe_hangs() {
        let (registry, fake, monitor) = setup(FakeChunkServers::new(), config(20, 300));
        registry.register("ok").unwrap();
        registry.register("hung").unwrap();
        fake.set("hung", Behavior::Hang);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Arc::new(monitor).spawn(shutdown_rx);

        // Well inside the first probe's timeout: later rounds already pinged
        // the hung node again and nothing has been evicted yet.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(fake.pings_to("hung") >= 3, "pings: {}", fake.pings_to("hung"));
        assert!(registry.get("hung").is_some());

        let mut evicted = false;
        for _ in 0..200 {
            if registry.get("hung").is_none() {
                evicted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(evicted);
        assert!(registry.get("ok").is_some());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_overlapping_rounds_evict_once() {
        let (registry, fake, monitor) = setup(FakeChunkServers::new(), config(5000, 200));
        let monitor = Arc::new(monitor);
        registry.register("ok").unwrap();
        registry.register("hung").unwrap();
        fake.set("hung", Behavior::Hang);

        let mut rounds = JoinSet::new();
        for _ in 0..3 {
            let monitor = monitor.clone();
            rounds.spawn(async move { monitor.run_round().await });
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        let mut evictions = 0;
        let mut alive = 0;
        while let Some(report) = rounds.join_next().await {
            let report = report.unwrap();
            evictions += report.evicted.len();
            alive += report.alive.len();
        }

        // Every straggler ran to completion, but only the first removed the node.
        assert_eq!(fake.pings_to("hung"), 3);
        assert_eq!(evictions, 1);
        assert_eq!(alive, 3);
        assert!(registry.get("hung").is_none());
        assert!(registry.get("ok").is_some());
    }
}
