//! PMapper placement algorithm.

use crate::core::cluster_api::ClusterApi;
use crate::core::cluster_view::{ClusterView, MachineOrder};
use crate::core::common::{MachineId, PlacementRequest, PlacementVerdict, PowerState};
use crate::core::placement::PlacementAlgorithm;

/// Consolidation-oriented placement: the first feasible running machine in
/// ascending memory-used order, or the first feasible machine overall when
/// nothing suitable is running. Paired with the consolidation pass on task
/// completion, which keeps packing load onto the upper half of the cluster so
/// the lower half can power down.
#[derive(Clone, Default)]
pub struct PMapper;

impl PMapper {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementAlgorithm for PMapper {
    fn select_machine(
        &self,
        request: &PlacementRequest,
        view: &ClusterView,
        cluster: &dyn ClusterApi,
    ) -> Option<MachineId> {
        let mut fallback: Option<MachineId> = None;
        for machine in view.machines_sorted(cluster, MachineOrder::MemoryUsed) {
            if view.can_host(cluster, machine, request.cpu, request.memory) != PlacementVerdict::Success {
                continue;
            }
            if cluster.machine_info(machine).s_state == PowerState::S0 {
                return Some(machine);
            }
            if fallback.is_none() {
                fallback = Some(machine);
            }
        }
        fallback
    }

    fn consolidate_on_completion(&self) -> bool {
        true
    }
}
