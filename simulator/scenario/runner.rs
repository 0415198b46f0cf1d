//! Scenario runner

use super::stats::{AggregationStats, LatencyStats, RoleTraffic, ScenarioResult, TrafficStats};
use beam_sim::beam_interface::{Role, SimError, SimEvent};
use beam_sim::{BeamNetwork, MetricsCollector, SimConfig, Simulator, Topology};
use log::info;

/// Runs one configuration from epoch ticks to the time bound
pub struct ScenarioRunner {
    config: SimConfig,
    network: BeamNetwork<MetricsCollector>,
    sim: Simulator<SimEvent>,
}

impl ScenarioRunner {
    /// Build nodes and topology for `config`
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let network = BeamNetwork::from_config(&config, MetricsCollector::new())?;
        Ok(Self {
            config,
            network,
            sim: Simulator::new(),
        })
    }

    /// Seed every epoch, run, and summarize
    pub fn run(mut self) -> Result<ScenarioResult, SimError> {
        let simulation = &self.config.simulation;
        for epoch in 0..simulation.epochs {
            let at = epoch as f64 * simulation.epoch_interval_ms;
            self.network.schedule_epoch(&mut self.sim, epoch, at)?;
        }
        if self.network.start_heartbeat(&mut self.sim)? {
            info!(
                "gossip heartbeat every {:?}ms",
                self.network.heartbeat_interval()
            );
        }

        let max_time = simulation.max_time_ms();
        info!(
            "running {} epoch(s) on {} topology, max_time={}ms",
            simulation.epochs,
            self.network.topology().kind().as_str(),
            max_time
        );
        let final_time = self.sim.run(&mut self.network, Some(max_time))?;

        Ok(self.summarize(final_time))
    }

    fn summarize(&self, final_time: f64) -> ScenarioResult {
        let network = &self.network;
        let metrics = network.metrics();
        let bandwidth = network.bandwidth();
        let totals = bandwidth.totals();

        let per_role = [Role::Validator, Role::SubnetAggregator, Role::GlobalAggregator]
            .into_iter()
            .map(|role| {
                network.nodes_with_role(role).fold(
                    RoleTraffic {
                        role,
                        nodes: 0,
                        sent: 0,
                        received: 0,
                    },
                    |mut acc, node| {
                        let usage = bandwidth.usage(node.id());
                        acc.nodes += 1;
                        acc.sent += usage.sent;
                        acc.received += usage.received;
                        acc
                    },
                )
            })
            .collect();

        let busiest_node = bandwidth
            .iter()
            .map(|(id, usage)| (*id, usage.sent))
            .filter(|(_, sent)| *sent > 0)
            .max_by_key(|(id, sent)| (*sent, std::cmp::Reverse(*id)));

        let subnet_rounds = metrics
            .aggregations()
            .iter()
            .filter(|r| r.role == Role::SubnetAggregator)
            .count();

        ScenarioResult {
            topology: network.topology().kind(),
            num_validators: self.config.network.num_validators,
            num_subnet_aggregators: self.config.network.num_subnet_aggregators,
            num_global_aggregators: self.config.network.num_global_aggregators,
            final_time,
            events_executed: self.sim.executed_events(),
            events_pending: self.sim.pending_events(),
            traffic: TrafficStats {
                total_sent: totals.sent,
                total_received: totals.received,
                messages: metrics.total_messages(),
                deliveries: network.deliveries(),
                busiest_node,
                per_role,
            },
            latency: LatencyStats::from_samples(metrics.latencies()),
            aggregation: AggregationStats {
                subnet_rounds,
                global_finalizations: metrics.global_finalizations(),
                signatures_aggregated: metrics.signatures_aggregated(),
                first_global_finalization: metrics.first_global_finalization(),
                dropped_routes: metrics.dropped_routes(),
            },
        }
    }
}
