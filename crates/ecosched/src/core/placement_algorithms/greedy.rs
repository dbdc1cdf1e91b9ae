//! Greedy placement algorithm.

use crate::core::cluster_api::ClusterApi;
use crate::core::cluster_view::{ClusterView, MachineOrder};
use crate::core::common::{MachineId, PlacementRequest, PlacementVerdict};
use crate::core::placement::PlacementAlgorithm;

/// Uses the first feasible machine in ascending memory-used order.
#[derive(Clone, Default)]
pub struct Greedy;

impl Greedy {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementAlgorithm for Greedy {
    fn select_machine(
        &self,
        request: &PlacementRequest,
        view: &ClusterView,
        cluster: &dyn ClusterApi,
    ) -> Option<MachineId> {
        for machine in view.machines_sorted(cluster, MachineOrder::MemoryUsed) {
            if view.can_host(cluster, machine, request.cpu, request.memory) == PlacementVerdict::Success {
                return Some(machine);
            }
        }
        None
    }
}
