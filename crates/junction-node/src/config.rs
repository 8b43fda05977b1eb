//! Node configuration.

use crate::arbiter::{ArbiterConfig, ContentionPolicy};
use crate::sequencer::SequenceTiming;
use crate::signal::{JunctionLayout, ResourceId};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Name reported by `_info` and `systemStats`.
    pub node_id: String,
    pub arbiter: ArbiterConfig,
    pub timing: SequenceTiming,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "junction-node".to_string(),
            arbiter: ArbiterConfig::default(),
            timing: SequenceTiming::default(),
        }
    }
}

impl NodeConfig {
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn with_layout(mut self, layout: JunctionLayout) -> Self {
        self.arbiter.layout = layout;
        self
    }

    pub fn with_initial_active(mut self, resource: ResourceId) -> Self {
        self.arbiter.initial_active = resource;
        self
    }

    pub fn with_vip_preemption(mut self, enabled: bool) -> Self {
        self.arbiter.vip_preemption = enabled;
        self
    }

    pub fn with_contention(mut self, policy: ContentionPolicy) -> Self {
        self.arbiter.contention = policy;
        self
    }

    pub fn with_timing(mut self, timing: SequenceTiming) -> Self {
        self.timing = timing;
        self
    }
}
