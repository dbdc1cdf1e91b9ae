//! Task placement algorithms.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::cluster_api::ClusterApi;
use crate::core::cluster_view::ClusterView;
use crate::core::common::{MachineId, PlacementRequest};
use crate::core::config::parse_config_value;
use crate::core::placement_algorithms::balanced::Balanced;
use crate::core::placement_algorithms::greedy::Greedy;
use crate::core::placement_algorithms::p_mapper::PMapper;

/// Trait for implementation of task placement algorithms.
///
/// The algorithm is defined as a function of the placement request and the
/// current cluster state, which returns an ID of the machine selected for the
/// task or `None` if there is no suitable machine. The candidate machines and
/// the pending-memory accounting are taken from the cluster view; capacities
/// and power states are read from the oracle.
pub trait PlacementAlgorithm: DynClone {
    fn select_machine(
        &self,
        request: &PlacementRequest,
        view: &ClusterView,
        cluster: &dyn ClusterApi,
    ) -> Option<MachineId>;

    /// Whether the strategy wants the consolidation pass on task completion.
    fn consolidate_on_completion(&self) -> bool {
        false
    }
}

clone_trait_object!(PlacementAlgorithm);

pub fn placement_algorithm_resolver(config_str: &str) -> Box<dyn PlacementAlgorithm> {
    let (algorithm_name, _options) = parse_config_value(config_str);
    match algorithm_name.as_str() {
        "Balanced" => Box::new(Balanced::new()),
        "Greedy" => Box::new(Greedy::new()),
        "PMapper" => Box::new(PMapper::new()),
        _ => panic!("Can't resolve placement algorithm: {}", config_str),
    }
}
