//! Network topologies
//!
//! A topology owns the connectivity graph and decides, for a directed send or
//! a broadcast, which nodes get a delivery event and when. All variants share
//! the adjacency helper and the latency model through [`Links`]; they only
//! differ in how the graph is built and how far a broadcast travels.

use std::collections::BTreeSet;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::beam_bandwidth::BandwidthTracker;
use crate::beam_config::SimConfig;
use crate::beam_graph::{AdjacencyGraph, Hop};
use crate::beam_interface::{
    Delivery, Message, MetricsSink, NodeId, SimError, SimEvent, SimTime,
};
use crate::beam_latency::LatencyModel;
use crate::beam_simulator::Simulator;

// ============================================================================
// Shared Types
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TopologyKind {
    Direct,
    GossipMesh,
    Grid,
}

impl TopologyKind {
    /// Map the numeric selector used in configuration files
    pub fn from_selector(selector: u8) -> Result<Self, SimError> {
        match selector {
            0 => Ok(TopologyKind::Direct),
            1 => Ok(TopologyKind::GossipMesh),
            2 => Ok(TopologyKind::Grid),
            other => Err(SimError::Configuration(format!(
                "unknown topology selector: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyKind::Direct => "direct",
            TopologyKind::GossipMesh => "gossip-mesh",
            TopologyKind::Grid => "grid",
        }
    }
}

/// Node ids handed to `connect`, grouped by role
#[derive(Debug, Clone, Default)]
pub struct ConnectParams {
    pub validators: Vec<NodeId>,
    pub subnet_aggregators: Vec<NodeId>,
    pub global_aggregators: Vec<NodeId>,
}

impl ConnectParams {
    /// Members of the peer-to-peer overlay: validators, then subnet aggregators
    pub fn overlay(&self) -> Vec<NodeId> {
        self.validators
            .iter()
            .chain(self.subnet_aggregators.iter())
            .copied()
            .collect()
    }
}

/// What `route` needs besides the topology itself
pub struct RouteContext<'a> {
    pub sim: &'a mut Simulator<SimEvent>,
    pub bandwidth: &'a mut BandwidthTracker,
    pub metrics: &'a mut dyn MetricsSink,
}

pub trait Topology {
    fn kind(&self) -> TopologyKind;

    fn graph(&self) -> &AdjacencyGraph;

    /// Build the graph. Calling it again must not duplicate nodes or edges.
    fn connect(&mut self, params: &ConnectParams);

    /// Schedule delivery of `message`. `None` as recipient broadcasts.
    ///
    /// Returns the number of delivery events scheduled. Unknown endpoints are
    /// dropped and counted, not reported as errors.
    fn route(
        &mut self,
        ctx: &mut RouteContext<'_>,
        sender: NodeId,
        recipient: Option<NodeId>,
        message: &Message,
    ) -> Result<usize, SimError>;

    fn latency(&mut self, sender: NodeId, recipient: NodeId) -> SimTime;

    fn bandwidth_usage(&self, message: &Message) -> u64;

    /// Periodic maintenance hook, returns the number of edges changed
    fn heartbeat(&mut self) -> usize {
        0
    }

    fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.graph().are_connected(a, b)
    }

    fn get_neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph()
            .neighbors(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Build the topology selected by `config`
pub fn build_topology(config: &SimConfig) -> Result<Box<dyn Topology>, SimError> {
    let latency = LatencyModel::from_name(
        config.latency.min_ms,
        config.latency.max_ms,
        &config.latency.distribution,
        config.latency.seed,
    )?;

    let topology: Box<dyn Topology> = match TopologyKind::from_selector(config.topology)? {
        TopologyKind::Direct => Box::new(DirectTopology::new(
            config.direct.redundancy_factor,
            latency,
        )?),
        TopologyKind::GossipMesh => Box::new(GossipMeshTopology::new(
            config.gossip.d,
            config.gossip.d_low,
            config.gossip.d_high,
            config.gossip.seed,
            latency,
        )?),
        TopologyKind::Grid => Box::new(GridTopology::new(config.grid.grid_size, latency)?),
    };
    Ok(topology)
}

// ============================================================================
// Links: graph + latency, shared by every variant
// ============================================================================

pub struct Links {
    graph: AdjacencyGraph,
    latency: LatencyModel,
}

impl Links {
    pub fn new(latency: LatencyModel) -> Self {
        Self {
            graph: AdjacencyGraph::new(),
            latency,
        }
    }

    fn register_all(&mut self, params: &ConnectParams) {
        for id in params
            .validators
            .iter()
            .chain(params.subnet_aggregators.iter())
            .chain(params.global_aggregators.iter())
        {
            self.graph.add_node(*id);
        }
    }

    /// Every subnet aggregator reports to every global aggregator
    fn uplink(&mut self, params: &ConnectParams) {
        for subnet in &params.subnet_aggregators {
            for global in &params.global_aggregators {
                self.graph.connect(*subnet, *global);
            }
        }
    }

    fn drop_route(ctx: &mut RouteContext<'_>, from: NodeId, to: NodeId) -> usize {
        let err = SimError::Routing { from, to };
        warn!("t={}: {}, dropping message", ctx.sim.current_time(), err);
        ctx.metrics.record_dropped_route(from, to);
        0
    }

    /// Schedule one hop leaving `from` `offset` ms from now. Returns the arrival offset.
    #[allow(clippy::too_many_arguments)]
    fn schedule_hop(
        &mut self,
        ctx: &mut RouteContext<'_>,
        from: NodeId,
        to: NodeId,
        origin: NodeId,
        offset: SimTime,
        hops: usize,
        message: &Message,
        bytes: u64,
    ) -> Result<SimTime, SimError> {
        let arrival = offset + self.latency.sample(from, to);
        let sent_at = ctx.sim.current_time();
        ctx.sim.schedule(
            arrival,
            SimEvent::Deliver(Delivery {
                from,
                to,
                origin,
                sent_at,
                hops,
                message: *message,
            }),
        )?;
        ctx.bandwidth.record_sent(from, bytes);
        ctx.metrics.record_message(from, bytes);
        trace!(
            "t={}: {} {} -> {} arriving +{}ms",
            sent_at,
            message.payload.kind_str(),
            from,
            to,
            arrival
        );
        Ok(arrival)
    }

    fn route_direct(
        &mut self,
        ctx: &mut RouteContext<'_>,
        sender: NodeId,
        recipient: NodeId,
        message: &Message,
        bytes: u64,
    ) -> Result<usize, SimError> {
        if !self.graph.contains(sender) || !self.graph.contains(recipient) {
            return Ok(Self::drop_route(ctx, sender, recipient));
        }
        self.schedule_hop(ctx, sender, recipient, sender, 0.0, 1, message, bytes)?;
        Ok(1)
    }

    /// Depth-1 fan-out to the sender's direct neighbours
    fn route_neighbors(
        &mut self,
        ctx: &mut RouteContext<'_>,
        sender: NodeId,
        message: &Message,
        bytes: u64,
    ) -> Result<usize, SimError> {
        let neighbors: Vec<NodeId> = match self.graph.neighbors(sender) {
            Some(set) => set.iter().copied().collect(),
            None => return Ok(Self::drop_route(ctx, sender, sender)),
        };
        for neighbor in &neighbors {
            self.schedule_hop(ctx, sender, *neighbor, sender, 0.0, 1, message, bytes)?;
        }
        Ok(neighbors.len())
    }

    /// Visit-once flood; relay latency accumulates along the BFS tree
    fn route_flood(
        &mut self,
        ctx: &mut RouteContext<'_>,
        sender: NodeId,
        message: &Message,
        bytes: u64,
    ) -> Result<usize, SimError> {
        if !self.graph.contains(sender) {
            return Ok(Self::drop_route(ctx, sender, sender));
        }

        let plan: Vec<Hop> = self.graph.flood(sender);
        let mut arrivals: hashbrown::HashMap<NodeId, SimTime> = hashbrown::HashMap::new();
        arrivals.insert(sender, 0.0);

        for hop in &plan {
            let offset = arrivals.get(&hop.from).copied().unwrap_or(0.0);
            let arrival =
                self.schedule_hop(ctx, hop.from, hop.to, sender, offset, hop.depth, message, bytes)?;
            arrivals.insert(hop.to, arrival);
        }
        Ok(plan.len())
    }
}

// ============================================================================
// Direct
// ============================================================================

/// Point-to-point: validators talk straight to their first few aggregators
pub struct DirectTopology {
    links: Links,
    redundancy_factor: usize,
}

impl DirectTopology {
    pub fn new(redundancy_factor: usize, latency: LatencyModel) -> Result<Self, SimError> {
        if redundancy_factor == 0 {
            return Err(SimError::Configuration(
                "redundancy_factor must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            links: Links::new(latency),
            redundancy_factor,
        })
    }

    pub fn redundancy_factor(&self) -> usize {
        self.redundancy_factor
    }
}

impl Topology for DirectTopology {
    fn kind(&self) -> TopologyKind {
        TopologyKind::Direct
    }

    fn graph(&self) -> &AdjacencyGraph {
        &self.links.graph
    }

    fn connect(&mut self, params: &ConnectParams) {
        self.links.register_all(params);
        for validator in &params.validators {
            for aggregator in params.subnet_aggregators.iter().take(self.redundancy_factor) {
                self.links.graph.connect(*validator, *aggregator);
            }
        }
        self.links.uplink(params);
        debug!(
            "direct topology: {} nodes, {} edges (redundancy {})",
            self.links.graph.len(),
            self.links.graph.edge_count(),
            self.redundancy_factor
        );
    }

    fn route(
        &mut self,
        ctx: &mut RouteContext<'_>,
        sender: NodeId,
        recipient: Option<NodeId>,
        message: &Message,
    ) -> Result<usize, SimError> {
        let bytes = self.bandwidth_usage(message);
        match recipient {
            Some(to) => self.links.route_direct(ctx, sender, to, message, bytes),
            None => self.links.route_neighbors(ctx, sender, message, bytes),
        }
    }

    fn latency(&mut self, sender: NodeId, recipient: NodeId) -> SimTime {
        self.links.latency.sample(sender, recipient)
    }

    fn bandwidth_usage(&self, message: &Message) -> u64 {
        message.byte_size
    }
}

// ============================================================================
// Gossip mesh
// ============================================================================

/// Unstructured random mesh. Each node picks between `d_low` and `d_high`
/// random peers; broadcasts flood the whole component.
pub struct GossipMeshTopology {
    links: Links,
    d: usize,
    d_low: usize,
    d_high: usize,
    rng: StdRng,
    overlay: Vec<NodeId>,
    built: bool,
}

impl GossipMeshTopology {
    pub fn new(
        d: usize,
        d_low: usize,
        d_high: usize,
        seed: u64,
        latency: LatencyModel,
    ) -> Result<Self, SimError> {
        if d_low > d_high {
            return Err(SimError::Configuration(format!(
                "gossip d_low {} exceeds d_high {}",
                d_low, d_high
            )));
        }
        if d < d_low || d > d_high {
            return Err(SimError::Configuration(format!(
                "gossip d {} outside [{}, {}]",
                d, d_low, d_high
            )));
        }
        Ok(Self {
            links: Links::new(latency),
            d,
            d_low,
            d_high,
            rng: StdRng::seed_from_u64(seed),
            overlay: Vec::new(),
            built: false,
        })
    }

    /// Mesh degree of `id`, ignoring aggregator uplinks
    pub fn mesh_degree(&self, id: NodeId) -> usize {
        self.mesh_neighbors(id).len()
    }

    fn mesh_neighbors(&self, id: NodeId) -> Vec<NodeId> {
        match self.links.graph.neighbors(id) {
            Some(set) => set
                .iter()
                .filter(|n| self.overlay.contains(n))
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }
}

impl Topology for GossipMeshTopology {
    fn kind(&self) -> TopologyKind {
        TopologyKind::GossipMesh
    }

    fn graph(&self) -> &AdjacencyGraph {
        &self.links.graph
    }

    fn connect(&mut self, params: &ConnectParams) {
        if self.built {
            debug!("gossip mesh already built, ignoring connect");
            return;
        }
        self.links.register_all(params);
        self.overlay = params.overlay();

        for node in self.overlay.clone() {
            let wanted = self.rng.gen_range(self.d_low..=self.d_high);
            let candidates: Vec<NodeId> =
                self.overlay.iter().filter(|n| **n != node).copied().collect();
            let count = wanted.min(candidates.len());
            for peer in candidates.choose_multiple(&mut self.rng, count) {
                self.links.graph.connect(node, *peer);
            }
        }
        self.links.uplink(params);
        self.built = true;

        debug!(
            "gossip mesh: {} overlay nodes, {} edges (D={} range [{}, {}])",
            self.overlay.len(),
            self.links.graph.edge_count(),
            self.d,
            self.d_low,
            self.d_high
        );
    }

    fn route(
        &mut self,
        ctx: &mut RouteContext<'_>,
        sender: NodeId,
        recipient: Option<NodeId>,
        message: &Message,
    ) -> Result<usize, SimError> {
        let bytes = self.bandwidth_usage(message);
        match recipient {
            Some(to) => self.links.route_direct(ctx, sender, to, message, bytes),
            None => self.links.route_flood(ctx, sender, message, bytes),
        }
    }

    fn latency(&mut self, sender: NodeId, recipient: NodeId) -> SimTime {
        self.links.latency.sample(sender, recipient)
    }

    fn bandwidth_usage(&self, message: &Message) -> u64 {
        message.byte_size
    }

    /// Graft nodes below `d_low` up to `d`, prune nodes above `d_high` down to it
    fn heartbeat(&mut self) -> usize {
        let changed: usize = self
            .overlay
            .clone()
            .into_iter()
            .map(|node| self.maintain(node))
            .sum();
        if changed > 0 {
            debug!("gossip heartbeat changed {} mesh edges", changed);
        }
        changed
    }
}

impl GossipMeshTopology {
    /// Bring one node's mesh degree back inside `[d_low, d_high]`
    fn maintain(&mut self, node: NodeId) -> usize {
        let current = self.mesh_neighbors(node);
        let mut changed = 0;

        if current.len() < self.d_low {
            let needed = self.d - current.len();
            let candidates: Vec<NodeId> = self
                .overlay
                .iter()
                .filter(|n| **n != node && !current.contains(n))
                .copied()
                .collect();
            let count = needed.min(candidates.len());
            for peer in candidates.choose_multiple(&mut self.rng, count) {
                if self.links.graph.connect(node, *peer) {
                    changed += 1;
                }
            }
        } else if current.len() > self.d_high {
            let excess = current.len() - self.d_high;
            let pruned: BTreeSet<NodeId> = current
                .choose_multiple(&mut self.rng, excess)
                .copied()
                .collect();
            for peer in pruned {
                if self.links.graph.disconnect(node, peer) {
                    changed += 1;
                }
            }
        }
        changed
    }
}

// ============================================================================
// Grid
// ============================================================================

/// Row-major square grid with up/down/left/right links
pub struct GridTopology {
    links: Links,
    grid_size: Option<usize>,
    side: usize,
    cells: Vec<NodeId>,
}

impl GridTopology {
    pub fn new(grid_size: Option<usize>, latency: LatencyModel) -> Result<Self, SimError> {
        if grid_size == Some(0) {
            return Err(SimError::Configuration(
                "grid_size must be positive".to_string(),
            ));
        }
        Ok(Self {
            links: Links::new(latency),
            grid_size,
            side: 0,
            cells: Vec::new(),
        })
    }

    /// Nodes per row, resolved at connect time
    pub fn side(&self) -> usize {
        self.side
    }

    /// (row, col) of a node in the grid
    pub fn position(&self, id: NodeId) -> Option<(usize, usize)> {
        if self.side == 0 {
            return None;
        }
        self.cells
            .iter()
            .position(|n| *n == id)
            .map(|idx| (idx / self.side, idx % self.side))
    }

    pub fn node_at(&self, row: usize, col: usize) -> Option<NodeId> {
        if col >= self.side {
            return None;
        }
        self.cells.get(row * self.side + col).copied()
    }
}

/// Smallest side length whose square holds `n` cells
fn ceil_sqrt(n: usize) -> usize {
    let mut side = (n as f64).sqrt() as usize;
    while side * side < n {
        side += 1;
    }
    side
}

impl Topology for GridTopology {
    fn kind(&self) -> TopologyKind {
        TopologyKind::Grid
    }

    fn graph(&self) -> &AdjacencyGraph {
        &self.links.graph
    }

    fn connect(&mut self, params: &ConnectParams) {
        self.links.register_all(params);
        let cells = params.overlay();
        let side = self.grid_size.unwrap_or_else(|| ceil_sqrt(cells.len()));

        for (idx, node) in cells.iter().enumerate() {
            let col = idx % side;
            // right and down; the reverse directions come from symmetry
            if col + 1 < side && idx + 1 < cells.len() {
                self.links.graph.connect(*node, cells[idx + 1]);
            }
            if idx + side < cells.len() {
                self.links.graph.connect(*node, cells[idx + side]);
            }
        }
        self.links.uplink(params);
        self.side = side;
        self.cells = cells;

        debug!(
            "grid topology: {} cells, side {}, {} edges",
            self.cells.len(),
            self.side,
            self.links.graph.edge_count()
        );
    }

    fn route(
        &mut self,
        ctx: &mut RouteContext<'_>,
        sender: NodeId,
        recipient: Option<NodeId>,
        message: &Message,
    ) -> Result<usize, SimError> {
        let bytes = self.bandwidth_usage(message);
        match recipient {
            Some(to) => self.links.route_direct(ctx, sender, to, message, bytes),
            None => self.links.route_flood(ctx, sender, message, bytes),
        }
    }

    fn latency(&mut self, sender: NodeId, recipient: NodeId) -> SimTime {
        self.links.latency.sample(sender, recipient)
    }

    fn bandwidth_usage(&self, message: &Message) -> u64 {
        message.byte_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam_interface::{NoOpSink, Payload, Signature};
    use crate::beam_latency::LatencyDistribution;
    use crate::beam_metrics::MetricsCollector;

    fn fixed_latency(ms: u64) -> LatencyModel {
        LatencyModel::new(ms, ms, LatencyDistribution::Uniform, 0).unwrap()
    }

    fn signature_from(sender: NodeId) -> Message {
        Message::new(
            sender,
            Payload::Signature(Signature {
                validator_id: sender,
                epoch: 0,
                size: 100,
            }),
        )
    }

    fn validators(n: u64) -> ConnectParams {
        ConnectParams {
            validators: (0..n).collect(),
            ..Default::default()
        }
    }

    /// Deliveries currently queued, in pop order
    fn drain_deliveries(sim: &mut Simulator<SimEvent>) -> Vec<(SimTime, Delivery)> {
        let mut out = Vec::new();
        struct Collect<'a>(&'a mut Vec<(SimTime, Delivery)>);
        impl crate::beam_simulator::EventHandler<SimEvent> for Collect<'_> {
            fn handle(
                &mut self,
                sim: &mut Simulator<SimEvent>,
                event: SimEvent,
            ) -> Result<(), SimError> {
                if let SimEvent::Deliver(d) = event {
                    self.0.push((sim.current_time(), d));
                }
                Ok(())
            }
        }
        sim.run(&mut Collect(&mut out), None).unwrap();
        out
    }

    #[test]
    fn test_selector_mapping() {
        assert_eq!(TopologyKind::from_selector(0).unwrap(), TopologyKind::Direct);
        assert_eq!(TopologyKind::from_selector(1).unwrap(), TopologyKind::GossipMesh);
        assert_eq!(TopologyKind::from_selector(2).unwrap(), TopologyKind::Grid);
        assert!(matches!(
            TopologyKind::from_selector(3),
            Err(SimError::Configuration(_))
        ));
    }

    #[test]
    fn test_direct_redundancy() {
        let mut topology = DirectTopology::new(2, fixed_latency(10)).unwrap();
        let params = ConnectParams {
            validators: vec![0],
            subnet_aggregators: vec![1, 2, 3],
            global_aggregators: vec![],
        };
        topology.connect(&params);

        assert!(topology.are_connected(0, 1));
        assert!(topology.are_connected(0, 2));
        assert!(!topology.are_connected(0, 3));
        assert!(topology.are_connected(2, 0), "edges are symmetric");
        assert_eq!(topology.get_neighbors(0), vec![1, 2]);
    }

    #[test]
    fn test_direct_connect_is_idempotent() {
        let mut topology = DirectTopology::new(1, fixed_latency(10)).unwrap();
        let params = ConnectParams {
            validators: vec![0, 1],
            subnet_aggregators: vec![10],
            global_aggregators: vec![20],
        };
        topology.connect(&params);
        let edges = topology.graph().edge_count();
        topology.connect(&params);

        assert_eq!(topology.graph().edge_count(), edges);
        assert_eq!(topology.graph().len(), 4);
        assert!(topology.are_connected(10, 20), "subnet aggregators uplink");
    }

    #[test]
    fn test_zero_redundancy_rejected() {
        assert!(matches!(
            DirectTopology::new(0, fixed_latency(1)),
            Err(SimError::Configuration(_))
        ));
    }

    #[test]
    fn test_direct_route_schedules_one_delivery() {
        let mut topology = DirectTopology::new(1, fixed_latency(25)).unwrap();
        topology.connect(&ConnectParams {
            validators: vec![0],
            subnet_aggregators: vec![1],
            global_aggregators: vec![],
        });

        let mut sim = Simulator::new();
        let mut bandwidth = BandwidthTracker::new();
        bandwidth.register(0);
        let mut metrics = NoOpSink;
        let mut ctx = RouteContext {
            sim: &mut sim,
            bandwidth: &mut bandwidth,
            metrics: &mut metrics,
        };

        let scheduled = topology.route(&mut ctx, 0, Some(1), &signature_from(0)).unwrap();
        assert_eq!(scheduled, 1);
        assert_eq!(bandwidth.usage(0).sent, 100);

        let deliveries = drain_deliveries(&mut sim);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, 25.0);
        assert_eq!(deliveries[0].1.to, 1);
    }

    #[test]
    fn test_route_to_unknown_node_is_dropped() {
        let mut topology = DirectTopology::new(1, fixed_latency(5)).unwrap();
        topology.connect(&validators(2));

        let mut sim = Simulator::new();
        let mut bandwidth = BandwidthTracker::new();
        let mut metrics = MetricsCollector::new();
        let mut ctx = RouteContext {
            sim: &mut sim,
            bandwidth: &mut bandwidth,
            metrics: &mut metrics,
        };

        assert_eq!(topology.route(&mut ctx, 0, Some(99), &signature_from(0)).unwrap(), 0);
        assert_eq!(topology.route(&mut ctx, 77, None, &signature_from(77)).unwrap(), 0);
        assert_eq!(sim.pending_events(), 0);
        assert_eq!(metrics.dropped_routes(), 2);
    }

    #[test]
    fn test_direct_broadcast_is_depth_one() {
        let mut topology = DirectTopology::new(2, fixed_latency(5)).unwrap();
        topology.connect(&ConnectParams {
            validators: vec![0, 1],
            subnet_aggregators: vec![10, 11],
            global_aggregators: vec![],
        });

        let mut sim = Simulator::new();
        let mut bandwidth = BandwidthTracker::new();
        let mut metrics = NoOpSink;
        let mut ctx = RouteContext {
            sim: &mut sim,
            bandwidth: &mut bandwidth,
            metrics: &mut metrics,
        };

        // 0 reaches both aggregators but is not relayed on to validator 1
        assert_eq!(topology.route(&mut ctx, 0, None, &signature_from(0)).unwrap(), 2);
        let reached: Vec<_> = drain_deliveries(&mut sim).iter().map(|(_, d)| d.to).collect();
        assert_eq!(reached, vec![10, 11]);
    }

    #[test]
    fn test_grid_three_by_three() {
        let mut topology = GridTopology::new(None, fixed_latency(1)).unwrap();
        topology.connect(&validators(9));

        assert_eq!(topology.side(), 3);
        let center = topology.node_at(1, 1).unwrap();
        assert_eq!(topology.graph().degree(center), 4);
        for (row, col) in [(0, 0), (0, 2), (2, 0), (2, 2)] {
            let corner = topology.node_at(row, col).unwrap();
            assert_eq!(topology.graph().degree(corner), 2, "corner ({}, {})", row, col);
        }
        assert_eq!(topology.graph().degree(topology.node_at(0, 1).unwrap()), 3);
        assert_eq!(topology.position(5), Some((1, 2)));
        assert_eq!(topology.graph().edge_count(), 12);
    }

    #[test]
    fn test_grid_partial_last_row() {
        let mut topology = GridTopology::new(None, fixed_latency(1)).unwrap();
        topology.connect(&validators(7));

        // 3 per side, last row holds only node 6
        assert_eq!(topology.side(), 3);
        assert_eq!(topology.get_neighbors(6), vec![3]);
        assert!(topology.graph().is_consistent());
    }

    #[test]
    fn test_grid_explicit_side() {
        let mut topology = GridTopology::new(Some(2), fixed_latency(1)).unwrap();
        topology.connect(&validators(6));

        assert_eq!(topology.side(), 2);
        assert_eq!(topology.position(5), Some((2, 1)));
        assert_eq!(topology.get_neighbors(0), vec![1, 2]);
        assert!(GridTopology::new(Some(0), fixed_latency(1)).is_err());
    }

    #[test]
    fn test_grid_flood_reaches_all_once() {
        let mut topology = GridTopology::new(None, fixed_latency(10)).unwrap();
        topology.connect(&validators(16));

        let mut sim = Simulator::new();
        let mut bandwidth = BandwidthTracker::new();
        let mut metrics = NoOpSink;
        let mut ctx = RouteContext {
            sim: &mut sim,
            bandwidth: &mut bandwidth,
            metrics: &mut metrics,
        };
        assert_eq!(topology.route(&mut ctx, 0, None, &signature_from(0)).unwrap(), 15);

        let deliveries = drain_deliveries(&mut sim);
        let mut reached: Vec<_> = deliveries.iter().map(|(_, d)| d.to).collect();
        reached.sort();
        assert_eq!(reached, (1..16).collect::<Vec<_>>());

        // relay latency accumulates: the opposite corner is 6 hops away
        let (time, far) = deliveries.iter().find(|(_, d)| d.to == 15).unwrap();
        assert_eq!(*time, 60.0);
        assert_eq!(far.hops, 6);
        assert_eq!(far.origin, 0);
    }

    #[test]
    fn test_grid_flood_from_unknown_sender_is_dropped() {
        let mut topology = GridTopology::new(None, fixed_latency(10)).unwrap();
        topology.connect(&validators(4));

        let mut sim = Simulator::new();
        let mut bandwidth = BandwidthTracker::new();
        let mut metrics = MetricsCollector::new();
        let mut ctx = RouteContext {
            sim: &mut sim,
            bandwidth: &mut bandwidth,
            metrics: &mut metrics,
        };

        assert_eq!(topology.route(&mut ctx, 77, None, &signature_from(77)).unwrap(), 0);
        assert_eq!(sim.pending_events(), 0);
        assert_eq!(bandwidth.totals().sent, 0);
        assert_eq!(metrics.dropped_routes(), 1);
        assert_eq!(metrics.total_messages(), 0);
    }

    #[test]
    fn test_gossip_mesh_degrees_and_symmetry() {
        let mut topology = GossipMeshTopology::new(4, 3, 6, 42, fixed_latency(1)).unwrap();
        topology.connect(&validators(30));

        assert!(topology.graph().is_consistent());
        for id in 0..30 {
            // each node picked at least d_low peers itself, others may add more
            assert!(topology.mesh_degree(id) >= 3, "node {} under-connected", id);
            assert!(!topology.are_connected(id, id));
        }
    }

    #[test]
    fn test_gossip_same_seed_same_mesh() {
        let build = |seed| {
            let mut topology = GossipMeshTopology::new(4, 3, 6, seed, fixed_latency(1)).unwrap();
            topology.connect(&validators(20));
            (0..20).map(|id| topology.get_neighbors(id)).collect::<Vec<_>>()
        };
        assert_eq!(build(7), build(7));
        assert_ne!(build(7), build(8));
    }

    #[test]
    fn test_gossip_connect_twice_keeps_mesh() {
        let mut topology = GossipMeshTopology::new(4, 3, 6, 1, fixed_latency(1)).unwrap();
        let params = validators(12);
        topology.connect(&params);
        let before: Vec<_> = (0..12).map(|id| topology.get_neighbors(id)).collect();
        topology.connect(&params);
        let after: Vec<_> = (0..12).map(|id| topology.get_neighbors(id)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_gossip_small_population() {
        // fewer peers than d_low: everyone connects to everyone
        let mut topology = GossipMeshTopology::new(8, 6, 12, 42, fixed_latency(1)).unwrap();
        topology.connect(&validators(4));
        for id in 0..4 {
            assert_eq!(topology.get_neighbors(id).len(), 3);
        }
    }

    #[test]
    fn test_gossip_invalid_degrees() {
        assert!(GossipMeshTopology::new(8, 12, 6, 0, fixed_latency(1)).is_err());
        assert!(GossipMeshTopology::new(20, 6, 12, 0, fixed_latency(1)).is_err());
    }

    #[test]
    fn test_gossip_flood_no_duplicates() {
        let mut topology = GossipMeshTopology::new(4, 3, 6, 9, fixed_latency(3)).unwrap();
        topology.connect(&validators(40));

        let mut sim = Simulator::new();
        let mut bandwidth = BandwidthTracker::new();
        let mut metrics = NoOpSink;
        let mut ctx = RouteContext {
            sim: &mut sim,
            bandwidth: &mut bandwidth,
            metrics: &mut metrics,
        };
        topology.route(&mut ctx, 5, None, &signature_from(5)).unwrap();

        let deliveries = drain_deliveries(&mut sim);
        let reached: BTreeSet<_> = deliveries.iter().map(|(_, d)| d.to).collect();
        assert_eq!(reached.len(), deliveries.len(), "a node was delivered twice");
        assert!(!reached.contains(&5));
        // d_low=3 random mesh over 40 nodes is connected for this seed
        assert_eq!(reached.len(), 39);
    }

    #[test]
    fn test_gossip_maintain_grafts_isolated_node() {
        let mut topology = GossipMeshTopology::new(4, 3, 20, 11, fixed_latency(1)).unwrap();
        topology.connect(&validators(10));
        for peer in topology.get_neighbors(0) {
            topology.links.graph.disconnect(0, peer);
        }
        assert_eq!(topology.mesh_degree(0), 0);

        assert_eq!(topology.maintain(0), 4);
        assert_eq!(topology.mesh_degree(0), 4);
        assert!(topology.graph().is_consistent());
    }

    #[test]
    fn test_gossip_maintain_prunes_to_d_high() {
        let mut topology = GossipMeshTopology::new(1, 1, 2, 5, fixed_latency(1)).unwrap();
        topology.connect(&ConnectParams {
            validators: (0..6).collect(),
            subnet_aggregators: vec![],
            global_aggregators: vec![50],
        });
        for peer in 1..6 {
            topology.links.graph.connect(0, peer);
        }

        topology.maintain(0);
        assert_eq!(topology.mesh_degree(0), 2);
        assert!(topology.graph().is_consistent());
    }

    #[test]
    fn test_gossip_heartbeat_keeps_uplinks() {
        let mut topology = GossipMeshTopology::new(1, 1, 1, 3, fixed_latency(1)).unwrap();
        topology.connect(&ConnectParams {
            validators: (0..12).collect(),
            subnet_aggregators: vec![12, 13],
            global_aggregators: vec![20],
        });
        for _ in 0..5 {
            topology.heartbeat();
        }
        assert!(topology.are_connected(12, 20));
        assert!(topology.are_connected(13, 20));
        assert!(topology.graph().is_consistent());
    }
}
