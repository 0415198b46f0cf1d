//! Node roles and their aggregation state machines
//!
//! Nodes never touch the simulator or the topology. Like a peer handling a
//! message, they mutate their own state and push what should happen next into
//! an action list; the network applies those actions.

use log::debug;

use crate::beam_aggregation::AggregationLogic;
use crate::beam_interface::{
    Epoch, Message, NodeId, Payload, ProofKind, Role, SimTime, Signature, SnarkProof,
};

/// Side effect requested by a node
#[derive(Clone, Debug, PartialEq)]
pub enum NodeAction {
    Send { to: NodeId, message: Message },
    Broadcast { message: Message },
    /// Fire `AggregationComplete` for this node after `delay` ms
    ScheduleCompletion { delay: SimTime },
    /// A round finished with this proof (reported to metrics)
    Finalized { proof: SnarkProof },
}

/// The node's current peers, grouped by role
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Neighborhood {
    pub validators: Vec<NodeId>,
    pub subnet_aggregators: Vec<NodeId>,
    pub global_aggregators: Vec<NodeId>,
}

impl Neighborhood {
    pub fn len(&self) -> usize {
        self.validators.len() + self.subnet_aggregators.len() + self.global_aggregators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AggregatorPhase {
    Collecting,
    /// Threshold reached, completion event pending
    Finalizing,
}

// ============================================================================
// Aggregation round
// ============================================================================

/// Bucket plus phase, shared by both aggregator roles
#[derive(Debug)]
struct AggregationRound<T> {
    bucket: Vec<T>,
    phase: AggregatorPhase,
}

impl<T> AggregationRound<T> {
    fn new() -> Self {
        Self {
            bucket: Vec::new(),
            phase: AggregatorPhase::Collecting,
        }
    }

    /// Add `item`; returns the completion delay if this crossed the threshold
    fn offer(&mut self, item: T, logic: &AggregationLogic, total: usize) -> Option<SimTime> {
        self.bucket.push(item);
        if self.phase == AggregatorPhase::Finalizing {
            return None;
        }
        if logic.should_aggregate(self.bucket.len(), total) {
            self.phase = AggregatorPhase::Finalizing;
            return Some(logic.aggregation_delay(self.bucket.len()));
        }
        None
    }

    /// Empty the bucket and go back to collecting. `None` on a stale completion.
    fn take(&mut self) -> Option<Vec<T>> {
        if self.phase != AggregatorPhase::Finalizing {
            return None;
        }
        self.phase = AggregatorPhase::Collecting;
        if self.bucket.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.bucket))
    }
}

// ============================================================================
// Validator
// ============================================================================

#[derive(Debug)]
pub struct Validator {
    id: NodeId,
    signature_size: u64,
    signatures_sent: u64,
    last_epoch: Option<Epoch>,
    messages_seen: u64,
    final_proofs_seen: u64,
}

impl Validator {
    pub fn new(id: NodeId, signature_size: u64) -> Self {
        Self {
            id,
            signature_size,
            signatures_sent: 0,
            last_epoch: None,
            messages_seen: 0,
            final_proofs_seen: 0,
        }
    }

    /// Sign `epoch` and address the signature to every connected subnet
    /// aggregator, or flood it when there is none.
    pub fn tick(&mut self, epoch: Epoch, neighborhood: &Neighborhood, out: &mut Vec<NodeAction>) {
        let message = Message::new(
            self.id,
            Payload::Signature(Signature {
                validator_id: self.id,
                epoch,
                size: self.signature_size,
            }),
        );
        self.signatures_sent += 1;
        self.last_epoch = Some(epoch);

        if neighborhood.subnet_aggregators.is_empty() {
            out.push(NodeAction::Broadcast { message });
        } else {
            for aggregator in &neighborhood.subnet_aggregators {
                out.push(NodeAction::Send {
                    to: *aggregator,
                    message,
                });
            }
        }
    }

    /// Validators only observe traffic
    pub fn receive(&mut self, message: &Message) {
        self.messages_seen += 1;
        if let Some(proof) = message.proof() {
            if proof.kind == ProofKind::Recursive {
                self.final_proofs_seen += 1;
            }
        }
    }

    pub fn signatures_sent(&self) -> u64 {
        self.signatures_sent
    }

    pub fn last_epoch(&self) -> Option<Epoch> {
        self.last_epoch
    }

    pub fn messages_seen(&self) -> u64 {
        self.messages_seen
    }

    pub fn final_proofs_seen(&self) -> u64 {
        self.final_proofs_seen
    }
}

// ============================================================================
// Subnet aggregator
// ============================================================================

/// Collects validator signatures into subnet proofs, sent to every global aggregator
#[derive(Debug)]
pub struct SubnetAggregator {
    id: NodeId,
    logic: AggregationLogic,
    round: AggregationRound<Signature>,
    rounds_completed: u64,
    signatures_aggregated: u64,
}

impl SubnetAggregator {
    pub fn new(id: NodeId, logic: AggregationLogic) -> Self {
        Self {
            id,
            logic,
            round: AggregationRound::new(),
            rounds_completed: 0,
            signatures_aggregated: 0,
        }
    }

    /// Threshold is checked against the validators connected right now
    pub fn receive(&mut self, message: &Message, neighborhood: &Neighborhood, out: &mut Vec<NodeAction>) {
        let Some(signature) = message.signature() else {
            return;
        };
        let total = neighborhood.validators.len();
        if let Some(delay) = self.round.offer(*signature, &self.logic, total) {
            debug!(
                "subnet aggregator {}: {}/{} signatures, finalizing in {}ms",
                self.id,
                self.round.bucket.len(),
                total,
                delay
            );
            out.push(NodeAction::ScheduleCompletion { delay });
        }
    }

    pub fn complete(&mut self, neighborhood: &Neighborhood, out: &mut Vec<NodeAction>) {
        let Some(signatures) = self.round.take() else {
            return;
        };
        let proof = self.logic.aggregate(&signatures, signatures.len(), self.id);
        let message = Message::new(self.id, Payload::Proof(proof));
        for global in &neighborhood.global_aggregators {
            out.push(NodeAction::Send {
                to: *global,
                message,
            });
        }
        self.rounds_completed += 1;
        self.signatures_aggregated += signatures.len() as u64;
        out.push(NodeAction::Finalized { proof });
    }

    pub fn phase(&self) -> AggregatorPhase {
        self.round.phase
    }

    pub fn bucket_len(&self) -> usize {
        self.round.bucket.len()
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    pub fn signatures_aggregated(&self) -> u64 {
        self.signatures_aggregated
    }
}

// ============================================================================
// Global aggregator
// ============================================================================

/// Folds subnet proofs into a recursive proof and broadcasts it
#[derive(Debug)]
pub struct GlobalAggregator {
    id: NodeId,
    logic: AggregationLogic,
    round: AggregationRound<SnarkProof>,
    final_proofs: Vec<SnarkProof>,
}

impl GlobalAggregator {
    pub fn new(id: NodeId, logic: AggregationLogic) -> Self {
        Self {
            id,
            logic,
            round: AggregationRound::new(),
            final_proofs: Vec::new(),
        }
    }

    pub fn receive(&mut self, message: &Message, neighborhood: &Neighborhood, out: &mut Vec<NodeAction>) {
        let Some(proof) = message.proof() else {
            return;
        };
        if proof.kind != ProofKind::Subnet {
            return;
        }
        let total = neighborhood.subnet_aggregators.len();
        if let Some(delay) = self.round.offer(*proof, &self.logic, total) {
            debug!(
                "global aggregator {}: {}/{} subnet proofs, finalizing in {}ms",
                self.id,
                self.round.bucket.len(),
                total,
                delay
            );
            out.push(NodeAction::ScheduleCompletion { delay });
        }
    }

    pub fn complete(&mut self, out: &mut Vec<NodeAction>) {
        let Some(proofs) = self.round.take() else {
            return;
        };
        let signatures = proofs.iter().map(|p| p.num_signatures).sum();
        let proof = self.logic.aggregate(&proofs, signatures, self.id);
        self.final_proofs.push(proof);
        out.push(NodeAction::Broadcast {
            message: Message::new(self.id, Payload::Proof(proof)),
        });
        out.push(NodeAction::Finalized { proof });
    }

    pub fn phase(&self) -> AggregatorPhase {
        self.round.phase
    }

    pub fn bucket_len(&self) -> usize {
        self.round.bucket.len()
    }

    pub fn final_proofs(&self) -> &[SnarkProof] {
        &self.final_proofs
    }
}

// ============================================================================
// Node
// ============================================================================

#[derive(Debug)]
pub enum Node {
    Validator(Validator),
    SubnetAggregator(SubnetAggregator),
    GlobalAggregator(GlobalAggregator),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Validator(v) => v.id,
            Node::SubnetAggregator(s) => s.id,
            Node::GlobalAggregator(g) => g.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Node::Validator(_) => Role::Validator,
            Node::SubnetAggregator(_) => Role::SubnetAggregator,
            Node::GlobalAggregator(_) => Role::GlobalAggregator,
        }
    }

    pub fn receive(&mut self, message: &Message, neighborhood: &Neighborhood, out: &mut Vec<NodeAction>) {
        match self {
            Node::Validator(v) => v.receive(message),
            Node::SubnetAggregator(s) => s.receive(message, neighborhood, out),
            Node::GlobalAggregator(g) => g.receive(message, neighborhood, out),
        }
    }

    /// Only validators react to epoch ticks
    pub fn tick(&mut self, epoch: Epoch, neighborhood: &Neighborhood, out: &mut Vec<NodeAction>) {
        if let Node::Validator(v) = self {
            v.tick(epoch, neighborhood, out);
        }
    }

    pub fn complete(&mut self, neighborhood: &Neighborhood, out: &mut Vec<NodeAction>) {
        match self {
            Node::Validator(_) => {}
            Node::SubnetAggregator(s) => s.complete(neighborhood, out),
            Node::GlobalAggregator(g) => g.complete(out),
        }
    }

    /// `None` for validators
    pub fn phase(&self) -> Option<AggregatorPhase> {
        match self {
            Node::Validator(_) => None,
            Node::SubnetAggregator(s) => Some(s.phase()),
            Node::GlobalAggregator(g) => Some(g.phase()),
        }
    }

    pub fn as_validator(&self) -> Option<&Validator> {
        match self {
            Node::Validator(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_subnet_aggregator(&self) -> Option<&SubnetAggregator> {
        match self {
            Node::SubnetAggregator(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_global_aggregator(&self) -> Option<&GlobalAggregator> {
        match self {
            Node::GlobalAggregator(g) => Some(g),
            _ => None,
        }
    }
}
