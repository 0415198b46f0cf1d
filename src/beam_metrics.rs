//! In-memory metrics, filled through [`MetricsSink`] and read after the run

use indexmap::IndexMap;

use crate::beam_interface::{MetricsSink, NodeId, Role, SimTime};

/// One finished aggregation round
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AggregationRecord {
    pub time: SimTime,
    pub aggregator: NodeId,
    pub role: Role,
    pub signatures: usize,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    bytes_sent: IndexMap<NodeId, u64>,
    bytes_received: IndexMap<NodeId, u64>,
    message_counts: IndexMap<NodeId, u64>,
    latencies: Vec<SimTime>,
    aggregations: Vec<AggregationRecord>,
    // (time, signatures aggregated by subnet aggregators so far)
    progress: Vec<(SimTime, usize)>,
    first_global_finalization: Option<SimTime>,
    dropped_routes: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_sent(&self, node: NodeId) -> u64 {
        self.bytes_sent.get(&node).copied().unwrap_or(0)
    }

    pub fn bytes_received(&self, node: NodeId) -> u64 {
        self.bytes_received.get(&node).copied().unwrap_or(0)
    }

    pub fn message_count(&self, node: NodeId) -> u64 {
        self.message_counts.get(&node).copied().unwrap_or(0)
    }

    /// Per-node message counts in first-seen order
    pub fn message_counts(&self) -> impl Iterator<Item = (&NodeId, &u64)> {
        self.message_counts.iter()
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.bytes_sent.values().sum()
    }

    pub fn total_bytes_received(&self) -> u64 {
        self.bytes_received.values().sum()
    }

    pub fn total_messages(&self) -> u64 {
        self.message_counts.values().sum()
    }

    /// Latency samples in the order deliveries happened
    pub fn latencies(&self) -> &[SimTime] {
        &self.latencies
    }

    pub fn mean_latency(&self) -> Option<SimTime> {
        if self.latencies.is_empty() {
            return None;
        }
        Some(self.latencies.iter().sum::<SimTime>() / self.latencies.len() as SimTime)
    }

    pub fn max_latency(&self) -> Option<SimTime> {
        self.latencies.iter().copied().reduce(f64::max)
    }

    pub fn aggregations(&self) -> &[AggregationRecord] {
        &self.aggregations
    }

    /// Cumulative subnet-level signature count, keyed by simulation time
    pub fn aggregation_progress(&self) -> &[(SimTime, usize)] {
        &self.progress
    }

    pub fn signatures_aggregated(&self) -> usize {
        self.progress.last().map_or(0, |(_, total)| *total)
    }

    pub fn global_finalizations(&self) -> usize {
        self.aggregations
            .iter()
            .filter(|r| r.role == Role::GlobalAggregator)
            .count()
    }

    pub fn first_global_finalization(&self) -> Option<SimTime> {
        self.first_global_finalization
    }

    pub fn dropped_routes(&self) -> u64 {
        self.dropped_routes
    }
}

impl MetricsSink for MetricsCollector {
    fn record_message(&mut self, node: NodeId, bytes: u64) {
        *self.bytes_sent.entry(node).or_insert(0) += bytes;
        *self.message_counts.entry(node).or_insert(0) += 1;
    }

    fn record_received(&mut self, node: NodeId, bytes: u64) {
        *self.bytes_received.entry(node).or_insert(0) += bytes;
    }

    fn record_latency(&mut self, latency: SimTime) {
        self.latencies.push(latency);
    }

    fn record_aggregation(&mut self, time: SimTime, aggregator: NodeId, role: Role, signatures: usize) {
        self.aggregations.push(AggregationRecord {
            time,
            aggregator,
            role,
            signatures,
        });
        match role {
            Role::SubnetAggregator => {
                let total = self.signatures_aggregated() + signatures;
                self.progress.push((time, total));
            }
            Role::GlobalAggregator => {
                self.first_global_finalization.get_or_insert(time);
            }
            Role::Validator => {}
        }
    }

    fn record_dropped_route(&mut self, _from: NodeId, _to: NodeId) {
        self.dropped_routes += 1;
    }
}
