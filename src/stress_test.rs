use async_stream::stream;
use clap::Parser;
use futures::stream::Stream;
use futures::stream::StreamExt;
use mdcs_cell::{Cell, CellError, CellSerializer, CounterCell, DecodeMode, Digest, Digestible, NO_DELETION};
use mdcs_counter::{MinterConfig, ReplicaIdMinter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};

const CELL_NAME: &str = "page_views";

/// Command line configuration for the stress harness.
#[derive(Parser, Clone, Debug)]
#[command(name = "carnelia-counter", about = "Convergence stress test for replicated counters")]
pub struct StressConfig {
    /// Number of simulated nodes
    #[arg(long, default_value_t = 4)]
    pub replicas: usize,

    /// Local increments performed by each node
    #[arg(long, default_value_t = 200)]
    pub increments: usize,

    /// Random pairwise exchanges before the final gossip round
    #[arg(long, default_value_t = 500)]
    pub syncs: usize,

    /// Seed for the workload; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Also run the scaling analysis up to this many replicas
    #[arg(long)]
    pub scale_to: Option<usize>,
}

/// Errors that abort a stress run.
#[derive(Error, Debug)]
pub enum StressError {
    #[error(transparent)]
    Cell(#[from] CellError),

    /// An increment task panicked or was cancelled; its deltas are unknown.
    #[error("Increment task failed: {0}")]
    Task(#[from] JoinError),
}

/// Statistics collected during stress testing
#[derive(Clone, Debug)]
pub struct StressTestStats {
    pub num_replicas: usize,
    pub increments_per_replica: usize,
    pub total_syncs: usize,
    pub skipped_transfers: usize,
    pub total_time: Duration,
    pub avg_sync_time: Duration,
    pub ops_per_second: f64,
    pub expected_total: i64,
    pub final_total: i64,
    pub digest: Option<Digest>,
    pub converged: bool,
}

impl StressTestStats {
    pub fn print(&self) {
        let digest = self.digest.map(|d| d.short()).unwrap_or_else(|| "-".to_string());
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Number of Replicas:        {:>30} ║", self.num_replicas);
        println!("║  Increments per Replica:    {:>30} ║", self.increments_per_replica);
        println!("║  Total Sync Operations:     {:>30} ║", self.total_syncs);
        println!("║  Skipped by Diff:           {:>30} ║", self.skipped_transfers);
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Average Sync Time:         {:>28}µs ║", self.avg_sync_time.as_micros());
        println!("║  Operations/Second:         {:>30.0} ║", self.ops_per_second);
        println!("║  Expected Total:            {:>30} ║", self.expected_total);
        println!("║  Converged Total:           {:>30} ║", self.final_total);
        println!("║  Digest:                    {:>30} ║", digest);
        println!("║  Converged:                 {:>30} ║", self.converged);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// One simulated node: its own id minter and its current view of the cell.
struct Node {
    minter: ReplicaIdMinter,
    cell: Option<Cell>,
}

impl Node {
    fn new(node_id: u64) -> Self {
        Node {
            minter: ReplicaIdMinter::new(&MinterConfig::default().with_node_id(node_id)),
            cell: None,
        }
    }

    fn absorb(&mut self, incoming: &Cell) -> Result<(), CellError> {
        self.cell = Some(match &self.cell {
            Some(current) => current.reconcile(incoming)?,
            None => incoming.clone(),
        });
        Ok(())
    }

    fn total(&self) -> i64 {
        self.cell
            .as_ref()
            .and_then(Cell::as_counter)
            .map(CounterCell::total)
            .unwrap_or(0)
    }
}

fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Generator that yields replica indices for synchronization patterns
fn replica_sync_generator(
    num_replicas: usize,
    num_syncs: usize,
    seed: u64,
) -> impl Stream<Item = (usize, usize)> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..num_syncs {
            let replica_a = rng.gen_range(0..num_replicas);
            let replica_b = rng.gen_range(0..num_replicas);
            yield (replica_a, replica_b);
        }
    }
}

/// Ship `from`'s cell to `to` over the wire, skipping the transfer when
/// `to` already dominates it. Returns whether bytes were transferred.
async fn perform_sync(
    replicas: &[Arc<Mutex<Node>>],
    from: usize,
    to: usize,
    sync_times: &mut Vec<Duration>,
) -> Result<bool, CellError> {
    if from == to {
        return Ok(false);
    }

    let sync_start = Instant::now();
    let (sender, mut receiver) = tokio::join!(replicas[from].lock(), replicas[to].lock());

    let Some(outgoing) = sender.cell.clone() else {
        return Ok(false);
    };
    drop(sender);

    if let Some(current) = &receiver.cell {
        if current.diff(&outgoing)?.is_none() {
            sync_times.push(sync_start.elapsed());
            return Ok(false);
        }
    }

    let bytes = CellSerializer::encode(&outgoing)?;
    let incoming = CellSerializer::decode(&bytes, DecodeMode::FromRemote)?;
    receiver.absorb(&incoming)?;
    drop(receiver);

    sync_times.push(sync_start.elapsed());
    Ok(true)
}

/// Sum the deltas applied by every increment task, failing on the first
/// task that errored or did not finish.
async fn collect_applied(
    handles: Vec<JoinHandle<Result<i64, CellError>>>,
) -> Result<i64, StressError> {
    let mut total = 0i64;
    for handle in handles {
        total += handle.await??;
    }
    Ok(total)
}

/// Stress test for replicated counters with async synchronization
pub async fn stress_test_counters(config: &StressConfig) -> Result<StressTestStats, StressError> {
    let num_replicas = config.replicas.max(1);
    let increments = config.increments;
    let seed = config.seed.unwrap_or_else(rand::random);

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Counter Stress Test (Async)                         ║");
    println!("║  Replicas: {} | Increments/Replica: {} | Syncs: {} ║",
             num_replicas, increments, config.syncs);
    println!("╚════════════════════════════════════════════════════════════╝");
    tracing::info!(seed, num_replicas, increments, syncs = config.syncs, "starting counter stress test");

    let start = Instant::now();

    let replicas: Vec<Arc<Mutex<Node>>> = (0..num_replicas)
        .map(|idx| Arc::new(Mutex::new(Node::new(idx as u64 + 1))))
        .collect();

    println!("\n[Phase 1/3] Local increments...");

    let mut handles = vec![];
    for (idx, replica) in replicas.iter().enumerate() {
        let replica = Arc::clone(replica);
        let handle = tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(seed ^ idx as u64);
            let mut applied = 0i64;
            for i in 0..increments {
                let delta = rng.gen_range(-5i64..=10);
                let mut node = replica.lock().await;
                let cell = CounterCell::create_local_with(
                    &node.minter,
                    CELL_NAME,
                    delta,
                    now_micros(),
                    NO_DELETION,
                );
                node.absorb(&Cell::Counter(cell))?;
                applied += delta;
                drop(node);

                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            Ok::<i64, CellError>(applied)
        });
        handles.push(handle);
    }

    let expected_total = collect_applied(handles).await?;

    println!("[Phase 1/3] ✓ Completed");
    println!("[Phase 2/3] Random pairwise exchange...");

    let mut sync_times = vec![];
    let mut total_syncs = 0;
    let mut skipped_transfers = 0;
    let mut sync_gen = Box::pin(replica_sync_generator(num_replicas, config.syncs, seed));
    while let Some((from, to)) = sync_gen.next().await {
        if from == to {
            continue;
        }
        if perform_sync(&replicas, from, to, &mut sync_times).await? {
            total_syncs += 1;
        } else {
            skipped_transfers += 1;
        }
        if (total_syncs + skipped_transfers) % 100 == 0 {
            println!("  Exchanges completed: {}/{}", total_syncs + skipped_transfers, config.syncs);
        }
    }

    println!("[Phase 2/3] ✓ Completed");
    println!("[Phase 3/3] Final gossip round...");

    // Everyone pushes to node 0, then node 0 pushes to everyone.
    for idx in 1..num_replicas {
        if perform_sync(&replicas, idx, 0, &mut sync_times).await? {
            total_syncs += 1;
        } else {
            skipped_transfers += 1;
        }
    }
    for idx in 1..num_replicas {
        if perform_sync(&replicas, 0, idx, &mut sync_times).await? {
            total_syncs += 1;
        } else {
            skipped_transfers += 1;
        }
    }

    let mut digests = Vec::with_capacity(num_replicas);
    let mut totals = Vec::with_capacity(num_replicas);
    for replica in &replicas {
        let node = replica.lock().await;
        digests.push(node.cell.as_ref().map(Digestible::digest));
        totals.push(node.total());
    }
    let converged = digests.windows(2).all(|w| w[0] == w[1])
        && totals.iter().all(|&t| t == expected_total);
    if converged {
        tracing::info!(total = expected_total, "replicas converged");
    } else {
        tracing::warn!(expected = expected_total, ?totals, "replicas diverged");
    }

    println!("[Phase 3/3] ✓ Completed");

    let total_time = start.elapsed();
    let avg_sync_time = if !sync_times.is_empty() {
        sync_times.iter().sum::<Duration>() / sync_times.len() as u32
    } else {
        Duration::ZERO
    };
    let total_operations = (num_replicas * increments) + total_syncs;
    let ops_per_second = total_operations as f64 / total_time.as_secs_f64();

    Ok(StressTestStats {
        num_replicas,
        increments_per_replica: increments,
        total_syncs,
        skipped_transfers,
        total_time,
        avg_sync_time,
        ops_per_second,
        expected_total,
        final_total: totals.first().copied().unwrap_or(0),
        digest: digests.first().copied().flatten(),
        converged,
    })
}

/// Stress test comparing different replica scales
pub async fn stress_test_scaling(
    base: &StressConfig,
    max_replicas: usize,
    step_size: usize,
) -> Result<(), StressError> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Counter Convergence vs Replicas    ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current_replicas = step_size.max(1);
    while current_replicas <= max_replicas {
        let config = StressConfig {
            replicas: current_replicas,
            increments: 50,
            syncs: current_replicas * 100,
            ..base.clone()
        };
        stress_test_counters(&config).await?.print();
        current_replicas += step_size.max(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(replicas: usize, increments: usize, syncs: usize) -> StressConfig {
        StressConfig {
            replicas,
            increments,
            syncs,
            seed: Some(7),
            scale_to: None,
        }
    }

    #[tokio::test]
    async fn test_small_cluster_converges() {
        let stats = stress_test_counters(&config(3, 20, 30)).await.unwrap();

        assert!(stats.converged);
        assert_eq!(stats.final_total, stats.expected_total);
        assert!(stats.digest.is_some());
    }

    #[tokio::test]
    async fn test_single_replica() {
        let stats = stress_test_counters(&config(1, 10, 5)).await.unwrap();

        assert!(stats.converged);
        assert_eq!(stats.total_syncs, 0);
    }

    #[tokio::test]
    async fn test_panicked_increment_task_fails_the_run() {
        let healthy = tokio::spawn(async { Ok::<i64, CellError>(5) });
        let panicked = tokio::spawn(async {
            if true {
                panic!("increment task died");
            }
            Ok::<i64, CellError>(3)
        });

        let result = collect_applied(vec![healthy, panicked]).await;
        assert!(matches!(result, Err(StressError::Task(_))));
    }

    #[tokio::test]
    async fn test_collect_applied_sums_deltas() {
        let handles = vec![
            tokio::spawn(async { Ok::<i64, CellError>(5) }),
            tokio::spawn(async { Ok::<i64, CellError>(-2) }),
        ];
        assert_eq!(collect_applied(handles).await.unwrap(), 3);
    }

    #[test]
    fn test_config_parsing() {
        let parsed = StressConfig::try_parse_from([
            "carnelia-counter",
            "--replicas",
            "6",
            "--seed",
            "42",
        ])
        .unwrap();

        assert_eq!(parsed.replicas, 6);
        assert_eq!(parsed.increments, 200);
        assert_eq!(parsed.seed, Some(42));
        assert_eq!(parsed.scale_to, None);
    }
}
