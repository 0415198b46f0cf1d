//! Statistics and results for scenario runs

use beam_sim::beam_interface::{NodeId, Role, SimTime};
use beam_sim::TopologyKind;

/// Outcome of one scenario run
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub topology: TopologyKind,

    pub num_validators: usize,
    pub num_subnet_aggregators: usize,
    pub num_global_aggregators: usize,

    /// Clock value when the run ended (ms)
    pub final_time: SimTime,

    pub events_executed: u64,

    /// Events still queued past the time bound
    pub events_pending: usize,

    pub traffic: TrafficStats,
    pub latency: LatencyStats,
    pub aggregation: AggregationStats,
}

#[derive(Debug, Clone, Default)]
pub struct TrafficStats {
    pub total_sent: u64,
    pub total_received: u64,
    pub messages: u64,
    pub deliveries: u64,

    /// Busiest sender and its byte count
    pub busiest_node: Option<(NodeId, u64)>,

    pub per_role: Vec<RoleTraffic>,
}

/// Bytes sent and received by all nodes of one role
#[derive(Debug, Clone)]
pub struct RoleTraffic {
    pub role: Role,
    pub nodes: usize,
    pub sent: u64,
    pub received: u64,
}

impl RoleTraffic {
    pub fn mean_sent(&self) -> f64 {
        if self.nodes == 0 {
            return 0.0;
        }
        self.sent as f64 / self.nodes as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    pub samples: usize,
    pub min: Option<SimTime>,
    pub mean: Option<SimTime>,
    pub median: Option<SimTime>,
    pub max: Option<SimTime>,
}

impl LatencyStats {
    pub fn from_samples(samples: &[SimTime]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            samples: sorted.len(),
            min: sorted.first().copied(),
            mean: Some(sorted.iter().sum::<SimTime>() / sorted.len() as SimTime),
            median: Some(sorted[sorted.len() / 2]),
            max: sorted.last().copied(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregationStats {
    pub subnet_rounds: usize,
    pub global_finalizations: usize,
    pub signatures_aggregated: usize,
    pub first_global_finalization: Option<SimTime>,
    pub dropped_routes: u64,
}

fn fmt_ms(value: Option<SimTime>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}ms", v))
}

impl ScenarioResult {
    /// Print a summary of the scenario results
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║        Aggregation Simulation Results                  ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration:");
        println!("  Topology: {}", self.topology.as_str());
        println!(
            "  Nodes: {} validators, {} subnet aggregators, {} global aggregators",
            self.num_validators, self.num_subnet_aggregators, self.num_global_aggregators
        );
        println!(
            "  Finished at t={:.1}ms after {} events ({} pending)\n",
            self.final_time, self.events_executed, self.events_pending
        );

        println!("Aggregation:");
        println!("  Subnet rounds: {}", self.aggregation.subnet_rounds);
        println!(
            "  Signatures aggregated: {}",
            self.aggregation.signatures_aggregated
        );
        println!(
            "  Global finalizations: {}",
            self.aggregation.global_finalizations
        );
        println!(
            "  First global finalization: {}",
            fmt_ms(self.aggregation.first_global_finalization)
        );
        if self.aggregation.dropped_routes > 0 {
            println!("  Dropped routes: {}", self.aggregation.dropped_routes);
        }
        println!();

        println!("Latency:");
        println!("  Samples: {}", self.latency.samples);
        println!(
            "  min={}, median={}, mean={}, max={}",
            fmt_ms(self.latency.min),
            fmt_ms(self.latency.median),
            fmt_ms(self.latency.mean),
            fmt_ms(self.latency.max)
        );
        println!();

        println!("Bandwidth:");
        println!(
            "  Total: {} bytes sent, {} bytes received",
            self.traffic.total_sent, self.traffic.total_received
        );
        println!(
            "  Messages: {} sent, {} delivered",
            self.traffic.messages, self.traffic.deliveries
        );
        for role in &self.traffic.per_role {
            println!(
                "  {:<18} nodes={:<5} sent={:<12} received={:<12} avg_sent={:.0}",
                role.role.as_str(),
                role.nodes,
                role.sent,
                role.received,
                role.mean_sent()
            );
        }
        if let Some((node, bytes)) = self.traffic.busiest_node {
            println!("  Busiest sender: node {} ({} bytes)", node, bytes);
        }
        println!();
    }
}
