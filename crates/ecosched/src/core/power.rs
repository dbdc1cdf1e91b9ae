//! Power controller stepping machines through S- and P-states.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::core::cluster_api::ClusterApi;
use crate::core::cluster_view::ClusterView;
use crate::core::common::Time;
use crate::core::config::SchedulerConfig;

pub struct PowerManager {
    cluster: Rc<RefCell<dyn ClusterApi>>,
    config: Rc<SchedulerConfig>,
}

impl PowerManager {
    pub fn new(cluster: Rc<RefCell<dyn ClusterApi>>, config: Rc<SchedulerConfig>) -> Self {
        Self { cluster, config }
    }

    /// Periodic sweep. Each machine is examined at most once per
    /// `state_change_threshold`: two consecutive samples with zero memory and
    /// no pending work step the machine one notch toward S5, anything else
    /// steps it toward S0. The core P-state follows the memory trend between
    /// samples. Transitions are only requested when the target differs from
    /// the current state and no state change is already in flight.
    pub fn on_periodic_check(&self, now: Time, view: &mut ClusterView) {
        let mut cluster = self.cluster.borrow_mut();
        for machine in view.machine_ids() {
            if now.saturating_sub(view.last_state_check(machine)) < self.config.state_change_threshold {
                continue;
            }
            let info = cluster.machine_info(machine);
            let current_memory = info.memory_used;
            let previous_memory = view.last_memory_used(machine);

            let idle = current_memory == 0 && previous_memory == 0 && !view.has_pending_work(machine);
            let s_target = if idle { info.s_state.deeper() } else { info.s_state.shallower() };
            if s_target != info.s_state && !view.state_change_in_flight(machine) {
                view.set_state_change(machine, true);
                cluster.set_machine_state(machine, s_target);
                debug!(
                    "stepping machine {} from {} to {} at time {}",
                    machine, info.s_state, s_target, now
                );
            }

            let p_target = if current_memory > previous_memory {
                info.p_state.faster()
            } else if current_memory < previous_memory {
                info.p_state.slower()
            } else {
                info.p_state
            };
            if p_target != info.p_state {
                cluster.set_core_performance(machine, p_target);
                debug!(
                    "stepping machine {} cores from {} to {} at time {}",
                    machine, info.p_state, p_target, now
                );
            }

            view.record_state_check(machine, now, current_memory);
        }
        view.tick_cooldowns(self.config.cooldown_tick);
    }
}
