//! Event dispatch
//!
//! `BeamNetwork` is the single handler for every [`SimEvent`]. It owns the
//! nodes, the topology, the bandwidth tracker and the metrics sink, turns
//! deliveries into node calls and applies the actions nodes hand back.

use std::collections::BTreeMap;

use log::{debug, info, trace};

use crate::beam_aggregation::AggregationLogic;
use crate::beam_bandwidth::BandwidthTracker;
use crate::beam_config::SimConfig;
use crate::beam_interface::{
    Delivery, Epoch, Message, MetricsSink, NodeId, ProofKind, Role, SimError, SimEvent, SimTime,
};
use crate::beam_metrics::MetricsCollector;
use crate::beam_nodes::{
    GlobalAggregator, Neighborhood, Node, NodeAction, SubnetAggregator, Validator,
};
use crate::beam_simulator::{EventHandler, Simulator};
use crate::beam_topology::{build_topology, ConnectParams, RouteContext, Topology, TopologyKind};

pub struct BeamNetwork<M: MetricsSink = MetricsCollector> {
    topology: Box<dyn Topology>,
    nodes: BTreeMap<NodeId, Node>,
    bandwidth: BandwidthTracker,
    metrics: M,
    heartbeat_interval: Option<SimTime>,
    // a heartbeat is queued; at most one chain per network
    heartbeat_armed: bool,
    deliveries: u64,
}

impl<M: MetricsSink> BeamNetwork<M> {
    pub fn new(topology: Box<dyn Topology>, metrics: M) -> Self {
        Self {
            topology,
            nodes: BTreeMap::new(),
            bandwidth: BandwidthTracker::new(),
            metrics,
            heartbeat_interval: None,
            heartbeat_armed: false,
            deliveries: 0,
        }
    }

    /// Build and connect a whole network.
    ///
    /// Ids: validators `0..V`, then subnet aggregators, then global aggregators.
    pub fn from_config(config: &SimConfig, metrics: M) -> Result<Self, SimError> {
        config.validate()?;
        let mut network = Self::new(build_topology(config)?, metrics);

        let aggregation = &config.aggregation;
        let subnet_logic = AggregationLogic::new(
            aggregation.aggregation_rate_per_sec,
            aggregation.snark_proof_size,
            aggregation.subnet_signature_threshold,
            ProofKind::Subnet,
        )?;
        let global_logic = AggregationLogic::new(
            aggregation.recursion_aggregation_rate_per_sec,
            aggregation.snark_proof_size,
            aggregation.finalization_threshold,
            ProofKind::Recursive,
        )?;

        let validators = config.network.num_validators as NodeId;
        let subnets = validators + config.network.num_subnet_aggregators as NodeId;
        let globals = subnets + config.network.num_global_aggregators as NodeId;

        for id in 0..validators {
            network.add_node(Node::Validator(Validator::new(id, aggregation.signature_size)))?;
        }
        for id in validators..subnets {
            network.add_node(Node::SubnetAggregator(SubnetAggregator::new(
                id,
                subnet_logic.clone(),
            )))?;
        }
        for id in subnets..globals {
            network.add_node(Node::GlobalAggregator(GlobalAggregator::new(
                id,
                global_logic.clone(),
            )))?;
        }

        if network.topology.kind() == TopologyKind::GossipMesh {
            network.heartbeat_interval = config.gossip.heartbeat_interval_ms;
        }
        network.connect();
        Ok(network)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), SimError> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(SimError::DuplicateNode(id));
        }
        self.bandwidth.register(id);
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Hand every registered node to the topology, grouped by role
    pub fn connect(&mut self) {
        let mut params = ConnectParams::default();
        for (id, node) in &self.nodes {
            match node.role() {
                Role::Validator => params.validators.push(*id),
                Role::SubnetAggregator => params.subnet_aggregators.push(*id),
                Role::GlobalAggregator => params.global_aggregators.push(*id),
            }
        }
        self.topology.connect(&params);
        info!(
            "{} network: {} validators, {} subnet aggregators, {} global aggregators, {} edges",
            self.topology.kind().as_str(),
            params.validators.len(),
            params.subnet_aggregators.len(),
            params.global_aggregators.len(),
            self.topology.graph().edge_count()
        );
    }

    pub fn set_heartbeat_interval(&mut self, interval: Option<SimTime>) -> Result<(), SimError> {
        if let Some(ms) = interval {
            if ms.is_nan() || ms <= 0.0 {
                return Err(SimError::Configuration(format!(
                    "heartbeat_interval_ms must be positive, got {}",
                    ms
                )));
            }
        }
        self.heartbeat_interval = interval;
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Option<SimTime> {
        self.heartbeat_interval
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_with_role(&self, role: Role) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.role() == role)
    }

    pub fn topology(&self) -> &dyn Topology {
        self.topology.as_ref()
    }

    pub fn bandwidth(&self) -> &BandwidthTracker {
        &self.bandwidth
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn into_metrics(self) -> M {
        self.metrics
    }

    /// Deliveries handed to nodes so far
    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    /// Current peers of `id`, grouped by role
    pub fn neighborhood(&self, id: NodeId) -> Neighborhood {
        let mut neighborhood = Neighborhood::default();
        for peer in self.topology.get_neighbors(id) {
            match self.nodes.get(&peer).map(Node::role) {
                Some(Role::Validator) => neighborhood.validators.push(peer),
                Some(Role::SubnetAggregator) => neighborhood.subnet_aggregators.push(peer),
                Some(Role::GlobalAggregator) => neighborhood.global_aggregators.push(peer),
                None => {}
            }
        }
        neighborhood
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Route `message` from `sender`; `None` broadcasts. Returns deliveries scheduled.
    pub fn send(
        &mut self,
        sim: &mut Simulator<SimEvent>,
        sender: NodeId,
        recipient: Option<NodeId>,
        message: &Message,
    ) -> Result<usize, SimError> {
        let mut ctx = RouteContext {
            sim,
            bandwidth: &mut self.bandwidth,
            metrics: &mut self.metrics,
        };
        self.topology.route(&mut ctx, sender, recipient, message)
    }

    /// Hand `message` to node `to` as if it had just arrived
    pub fn receive(
        &mut self,
        sim: &mut Simulator<SimEvent>,
        to: NodeId,
        message: &Message,
    ) -> Result<(), SimError> {
        let neighborhood = self.neighborhood(to);
        let node = self.nodes.get_mut(&to).ok_or(SimError::UnknownNode(to))?;
        let mut actions = Vec::new();
        node.receive(message, &neighborhood, &mut actions);
        self.apply(sim, to, actions)
    }

    /// Queue an epoch tick for every validator at absolute time `at`
    pub fn schedule_epoch(
        &self,
        sim: &mut Simulator<SimEvent>,
        epoch: Epoch,
        at: SimTime,
    ) -> Result<usize, SimError> {
        let mut scheduled = 0;
        for node in self.nodes_with_role(Role::Validator) {
            sim.schedule_at(
                at,
                SimEvent::EpochTick {
                    validator: node.id(),
                    epoch,
                },
            )?;
            scheduled += 1;
        }
        debug!("epoch {} scheduled at t={} for {} validators", epoch, at, scheduled);
        Ok(scheduled)
    }

    /// Queue the first heartbeat if one is configured and none is queued yet.
    /// Returns whether it was queued.
    pub fn start_heartbeat(&mut self, sim: &mut Simulator<SimEvent>) -> Result<bool, SimError> {
        if self.heartbeat_armed {
            return Ok(false);
        }
        self.schedule_heartbeat(sim)
    }

    fn schedule_heartbeat(&mut self, sim: &mut Simulator<SimEvent>) -> Result<bool, SimError> {
        match self.heartbeat_interval {
            Some(interval) => {
                sim.schedule(interval, SimEvent::Heartbeat)?;
                self.heartbeat_armed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    fn deliver(&mut self, sim: &mut Simulator<SimEvent>, delivery: Delivery) -> Result<(), SimError> {
        let now = sim.current_time();
        self.deliveries += 1;
        self.bandwidth.record_received(delivery.to, delivery.message.byte_size);
        self.metrics.record_received(delivery.to, delivery.message.byte_size);
        self.metrics.record_latency(now - delivery.sent_at);
        trace!(
            "t={}: {} from {} (origin {}, {} hops) reached {}",
            now,
            delivery.message.payload.kind_str(),
            delivery.from,
            delivery.origin,
            delivery.hops,
            delivery.to
        );
        self.receive(sim, delivery.to, &delivery.message)
    }

    fn tick_validator(
        &mut self,
        sim: &mut Simulator<SimEvent>,
        validator: NodeId,
        epoch: Epoch,
    ) -> Result<(), SimError> {
        let neighborhood = self.neighborhood(validator);
        let node = self
            .nodes
            .get_mut(&validator)
            .ok_or(SimError::UnknownNode(validator))?;
        let mut actions = Vec::new();
        node.tick(epoch, &neighborhood, &mut actions);
        self.apply(sim, validator, actions)
    }

    fn complete_aggregation(
        &mut self,
        sim: &mut Simulator<SimEvent>,
        aggregator: NodeId,
    ) -> Result<(), SimError> {
        let neighborhood = self.neighborhood(aggregator);
        let node = self
            .nodes
            .get_mut(&aggregator)
            .ok_or(SimError::UnknownNode(aggregator))?;
        let mut actions = Vec::new();
        node.complete(&neighborhood, &mut actions);
        self.apply(sim, aggregator, actions)
    }

    fn heartbeat(&mut self, sim: &mut Simulator<SimEvent>) -> Result<(), SimError> {
        let changed = self.topology.heartbeat();
        trace!("t={}: heartbeat changed {} edges", sim.current_time(), changed);
        self.heartbeat_armed = false;
        // the popped beat was the only heartbeat queued, so anything left is traffic
        if sim.pending_events() > 0 {
            self.schedule_heartbeat(sim)?;
        }
        Ok(())
    }

    fn apply(
        &mut self,
        sim: &mut Simulator<SimEvent>,
        node_id: NodeId,
        actions: Vec<NodeAction>,
    ) -> Result<(), SimError> {
        for action in actions {
            match action {
                NodeAction::Send { to, message } => {
                    self.send(sim, node_id, Some(to), &message)?;
                }
                NodeAction::Broadcast { message } => {
                    self.send(sim, node_id, None, &message)?;
                }
                NodeAction::ScheduleCompletion { delay } => {
                    sim.schedule(delay, SimEvent::AggregationComplete { aggregator: node_id })?;
                }
                NodeAction::Finalized { proof } => {
                    let role = self.nodes.get(&node_id).map_or(Role::Validator, Node::role);
                    info!(
                        "t={}: {} {} finalized a proof over {} signatures ({} inputs)",
                        sim.current_time(),
                        role.as_str(),
                        node_id,
                        proof.num_signatures,
                        proof.num_inputs
                    );
                    self.metrics.record_aggregation(
                        sim.current_time(),
                        node_id,
                        role,
                        proof.num_signatures,
                    );
                }
            }
        }
        Ok(())
    }
}

impl<M: MetricsSink> EventHandler<SimEvent> for BeamNetwork<M> {
    fn handle(&mut self, sim: &mut Simulator<SimEvent>, event: SimEvent) -> Result<(), SimError> {
        match event {
            SimEvent::Deliver(delivery) => self.deliver(sim, delivery),
            SimEvent::AggregationComplete { aggregator } => self.complete_aggregation(sim, aggregator),
            SimEvent::EpochTick { validator, epoch } => self.tick_validator(sim, validator, epoch),
            SimEvent::Heartbeat => self.heartbeat(sim),
        }
    }
}
