use indexmap::IndexMap;

use crate::beam_interface::NodeId;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BandwidthUsage {
    pub sent: u64,
    pub received: u64,
}

/// Per-node sent/received byte counters, kept in registration order
#[derive(Debug, Default)]
pub struct BandwidthTracker {
    usage: IndexMap<NodeId, BandwidthUsage>,
}

impl BandwidthTracker {
    pub fn new() -> Self {
        Self {
            usage: IndexMap::new(),
        }
    }

    /// Start tracking a node. Registering twice keeps the existing counters.
    pub fn register(&mut self, node_id: NodeId) {
        self.usage.entry(node_id).or_default();
    }

    pub fn is_registered(&self, node_id: NodeId) -> bool {
        self.usage.contains_key(&node_id)
    }

    // unregistered nodes are ignored so late registration is harmless
    pub fn record_sent(&mut self, node_id: NodeId, bytes: u64) {
        if let Some(usage) = self.usage.get_mut(&node_id) {
            usage.sent += bytes;
        }
    }

    pub fn record_received(&mut self, node_id: NodeId, bytes: u64) {
        if let Some(usage) = self.usage.get_mut(&node_id) {
            usage.received += bytes;
        }
    }

    pub fn usage(&self, node_id: NodeId) -> BandwidthUsage {
        self.usage.get(&node_id).copied().unwrap_or_default()
    }

    pub fn totals(&self) -> BandwidthUsage {
        self.usage
            .values()
            .fold(BandwidthUsage::default(), |acc, u| BandwidthUsage {
                sent: acc.sent + u.sent,
                received: acc.received + u.received,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &BandwidthUsage)> {
        self.usage.iter()
    }

    pub fn len(&self) -> usize {
        self.usage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_empty()
    }
}
