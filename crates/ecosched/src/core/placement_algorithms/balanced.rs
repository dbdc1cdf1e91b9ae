//! Balanced placement algorithm.

use crate::core::cluster_api::ClusterApi;
use crate::core::cluster_view::{ClusterView, MachineOrder};
use crate::core::common::{MachineId, PlacementRequest, PlacementVerdict, PowerState};
use crate::core::placement::PlacementAlgorithm;

/// Scans machines in ascending memory-used order, keeping only those with a
/// matching CPU and room for the task, and picks the best candidate under a
/// strict dominance order: GPU present when the task wants one, then running
/// (S0). The scan exits early once a candidate wins on both.
#[derive(Clone, Default)]
pub struct Balanced;

impl Balanced {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementAlgorithm for Balanced {
    fn select_machine(
        &self,
        request: &PlacementRequest,
        view: &ClusterView,
        cluster: &dyn ClusterApi,
    ) -> Option<MachineId> {
        let mut best: Option<(MachineId, (bool, bool))> = None;

        for machine in view.machines_sorted(cluster, MachineOrder::MemoryUsed) {
            if view.can_host(cluster, machine, request.cpu, request.memory) != PlacementVerdict::Success {
                continue;
            }
            let score = (
                !request.prefer_gpu || view.machine_has_gpu(machine),
                cluster.machine_info(machine).s_state == PowerState::S0,
            );
            if best.as_ref().map_or(true, |(_, current)| score > *current) {
                best = Some((machine, score));
            }
            if score == (true, true) {
                break;
            }
        }
        best.map(|(machine, _)| machine)
    }
}
