use thiserror::Error;

// all node ids share one numeric space (validators, subnet and global aggregators)
pub type NodeId = u64;

/// Simulation time in milliseconds
pub type SimTime = f64;

pub type Epoch = u64;

pub const MILLIS_PER_SECOND: f64 = 1000.0;

// ============================================================================
// Node Roles
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Validator,
    SubnetAggregator,
    GlobalAggregator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Validator => "validator",
            Role::SubnetAggregator => "subnet-aggregator",
            Role::GlobalAggregator => "global-aggregator",
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Stand-in for a post-quantum validator signature. Only its size matters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Signature {
    pub validator_id: NodeId,
    pub epoch: Epoch,
    pub size: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProofKind {
    /// Produced by a subnet aggregator over validator signatures
    Subnet,
    /// Produced by a global aggregator over subnet proofs
    Recursive,
}

/// Opaque aggregate proof. Size and timing are parametric.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SnarkProof {
    pub aggregator_id: NodeId,
    pub kind: ProofKind,
    pub proof_size: u64,
    /// Validator signatures covered (transitively for recursive proofs)
    pub num_signatures: usize,
    /// Direct inputs folded in: signatures or subnet proofs
    pub num_inputs: usize,
    pub aggregation_time_secs: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Payload {
    Signature(Signature),
    Proof(SnarkProof),
}

impl Payload {
    /// Bytes this payload occupies on the wire
    pub fn wire_size(&self) -> u64 {
        match self {
            Payload::Signature(signature) => signature.size,
            Payload::Proof(proof) => proof.proof_size,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Payload::Signature(_) => "signature",
            Payload::Proof(p) if p.kind == ProofKind::Subnet => "subnet-proof",
            Payload::Proof(_) => "recursive-proof",
        }
    }
}

/// A message is value-like: every recipient of a fan-out gets its own copy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Message {
    pub sender_id: NodeId,
    pub payload: Payload,
    pub byte_size: u64,
}

impl Message {
    pub fn new(sender_id: NodeId, payload: Payload) -> Self {
        Self {
            sender_id,
            byte_size: payload.wire_size(),
            payload,
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match &self.payload {
            Payload::Signature(signature) => Some(signature),
            _ => None,
        }
    }

    pub fn proof(&self) -> Option<&SnarkProof> {
        match &self.payload {
            Payload::Proof(proof) => Some(proof),
            _ => None,
        }
    }
}

// ============================================================================
// Simulation Events
// ============================================================================

/// One hop of a message in flight
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub from: NodeId,
    pub to: NodeId,
    /// Node that first sent the message (differs from `from` on relayed hops)
    pub origin: NodeId,
    /// Clock value when the origin sent it
    pub sent_at: SimTime,
    /// Hops travelled, 1 for a direct delivery
    pub hops: usize,
    pub message: Message,
}

/// Everything the event queue can carry. Dispatched by a single handler.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    Deliver(Delivery),
    /// Deferred end of an aggregation round
    AggregationComplete { aggregator: NodeId },
    /// External trigger making a validator emit its signature
    EpochTick { validator: NodeId, epoch: Epoch },
    /// Periodic mesh maintenance
    Heartbeat,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Rejected configuration, raised at construction or setup
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Broken clock invariant: negative delay, backward pop, invalid state change
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Route towards a node the topology does not know about
    #[error("no route from {from} to {to}")]
    Routing { from: NodeId, to: NodeId },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} registered twice")]
    DuplicateNode(NodeId),
}

// ============================================================================
// Metrics Sink
// ============================================================================

/// Consumer of measurements produced by the simulation core
pub trait MetricsSink {
    /// A message of `bytes` left `node` (one call per scheduled hop)
    fn record_message(&mut self, node: NodeId, bytes: u64);

    /// A delivery of `bytes` reached `node`
    fn record_received(&mut self, node: NodeId, bytes: u64);

    /// End-to-end latency of one delivery, measured from the first send
    fn record_latency(&mut self, latency: SimTime);

    /// An aggregator finished a round covering `signatures` validator signatures
    fn record_aggregation(&mut self, time: SimTime, aggregator: NodeId, role: Role, signatures: usize);

    /// A route request was dropped because an endpoint is not in the topology
    fn record_dropped_route(&mut self, from: NodeId, to: NodeId);
}

/// Sink that discards everything
pub struct NoOpSink;

impl MetricsSink for NoOpSink {
    #[inline(always)]
    fn record_message(&mut self, _node: NodeId, _bytes: u64) {}

    #[inline(always)]
    fn record_received(&mut self, _node: NodeId, _bytes: u64) {}

    #[inline(always)]
    fn record_latency(&mut self, _latency: SimTime) {}

    #[inline(always)]
    fn record_aggregation(&mut self, _time: SimTime, _aggregator: NodeId, _role: Role, _signatures: usize) {}

    #[inline(always)]
    fn record_dropped_route(&mut self, _from: NodeId, _to: NodeId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_size_follows_payload() {
        let signature = Signature {
            validator_id: 7,
            epoch: 0,
            size: 3072,
        };
        let message = Message::new(7, Payload::Signature(signature));
        assert_eq!(message.byte_size, 3072);
        assert_eq!(message.signature(), Some(&signature));
        assert!(message.proof().is_none());

        let proof = SnarkProof {
            aggregator_id: 9,
            kind: ProofKind::Recursive,
            proof_size: 131_072,
            num_signatures: 12,
            num_inputs: 3,
            aggregation_time_secs: 0.5,
        };
        let message = Message::new(9, Payload::Proof(proof));
        assert_eq!(message.byte_size, 131_072);
        assert_eq!(message.payload.kind_str(), "recursive-proof");
    }

    #[test]
    fn test_error_messages() {
        let err = SimError::Routing { from: 1, to: 2 };
        assert_eq!(err.to_string(), "no route from 1 to 2");

        let err = SimError::Configuration("zero aggregation rate".to_string());
        assert!(err.to_string().contains("zero aggregation rate"));
    }
}
