//! VM migration engine.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::core::cluster_api::ClusterApi;
use crate::core::cluster_view::{ClusterView, MachineOrder};
use crate::core::common::{sla_priority, MachineId, PlacementVerdict, PowerState, TaskId, Time, VmId};
use crate::core::config::SchedulerConfig;

pub struct MigrationEngine {
    cluster: Rc<RefCell<dyn ClusterApi>>,
    config: Rc<SchedulerConfig>,
}

impl MigrationEngine {
    pub fn new(cluster: Rc<RefCell<dyn ClusterApi>>, config: Rc<SchedulerConfig>) -> Self {
        Self { cluster, config }
    }

    /// Reacts to an SLA warning by moving the task's VM to a better host.
    /// The warning is absorbed if the VM is mid-migration, cooling down after
    /// a recent one, or no destination exists.
    pub fn on_sla_warning(&self, now: Time, task: TaskId, view: &mut ClusterView) {
        let vm = match view.vm_of_task(task) {
            Some(vm) => vm,
            None => {
                warn!("sla warning for task {} which is not placed on any vm", task);
                return;
            }
        };
        if view.is_migrating(vm) {
            debug!("vm {} is already migrating, absorbing sla warning", vm);
            return;
        }
        if view.in_cooldown(vm) {
            debug!("vm {} migrated recently, absorbing sla warning", vm);
            return;
        }
        match self.select_destination(vm, view) {
            Some(destination) => {
                info!(
                    "migrating vm {} to machine {} to relieve task {} at time {}",
                    vm, destination, task, now
                );
                self.begin_migration(vm, destination, view);
            }
            None => {
                warn!("no suitable machine to migrate vm {} hosting task {}", vm, task);
            }
        }
    }

    /// Picks a destination for the VM: ascending memory-used order, skipping
    /// the current host and machines already receiving a migration, requiring
    /// a matching CPU and room for the VM's full demand. Among the feasible,
    /// prefers a GPU machine when any hosted task can use one, then a running
    /// machine.
    fn select_destination(&self, vm: VmId, view: &ClusterView) -> Option<MachineId> {
        let cluster = self.cluster.borrow();
        let vm_info = cluster.vm_info(vm);
        let demand = view.vm_demand(vm, &*cluster);
        let prefer_gpu = vm_info
            .active_tasks
            .iter()
            .any(|task| cluster.task_gpu_capable(*task));

        let mut best: Option<(MachineId, (bool, bool))> = None;
        for machine in view.machines_sorted(&*cluster, MachineOrder::MemoryUsed) {
            if vm_info.machine == Some(machine) || view.migration_bound_for(machine) {
                continue;
            }
            if view.can_host(&*cluster, machine, vm_info.cpu, demand) != PlacementVerdict::Success {
                continue;
            }
            let score = (
                !prefer_gpu || view.machine_has_gpu(machine),
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

    /// Marks the VM and the destination, delists the VM from its old host and
    /// either starts the migration right away or parks it until the
    /// destination reaches S0.
    fn begin_migration(&self, vm: VmId, destination: MachineId, view: &mut ClusterView) {
        let source = match self.cluster.borrow().vm_info(vm).machine {
            Some(source) => source,
            None => panic!("vm {} scheduled for migration has no host", vm),
        };
        view.set_migrating(vm, true);
        view.set_inbound_migration(destination, true);
        view.remove_vm(source, vm);

        let mut cluster = self.cluster.borrow_mut();
        if cluster.machine_info(destination).s_state == PowerState::S0 && !view.state_change_in_flight(destination) {
            cluster.vm_migrate(vm, destination);
            view.attach_vm(destination, vm);
        } else {
            view.queue_migration(destination, vm);
            if !view.state_change_in_flight(destination) {
                view.set_state_change(destination, true);
                cluster.set_machine_state(destination, PowerState::S0);
            }
            debug!("vm {} awaits migration until machine {} reaches S0", vm, destination);
        }
    }

    /// Starts the migration parked for this machine, if any. Invoked once the
    /// machine has reached S0.
    pub fn launch_queued(&self, machine: MachineId, view: &mut ClusterView) {
        if let Some(vm) = view.take_queued_migration(machine) {
            self.cluster.borrow_mut().vm_migrate(vm, machine);
            view.attach_vm(machine, vm);
            info!("starting queued migration of vm {} to machine {}", vm, machine);
        }
    }

    /// Clears the transient flags, dispatches the tasks that queued up while
    /// the VM was in flight and arms the re-migration cooldown.
    pub fn on_migration_done(&self, now: Time, vm: VmId, view: &mut ClusterView) {
        view.set_migrating(vm, false);
        let mut cluster = self.cluster.borrow_mut();
        let host = match cluster.vm_info(vm).machine {
            Some(host) => host,
            None => panic!("vm {} reported migration done while detached", vm),
        };
        view.set_inbound_migration(host, false);
        for task in view.drain_pending_tasks(vm) {
            let priority = sla_priority(cluster.required_sla(task));
            cluster.vm_add_task(vm, task, priority);
        }
        view.start_cooldown(vm, self.config.migration_cooldown);
        info!("migration of vm {} to machine {} completed at time {}", vm, host, now);
    }

    /// Opportunistic consolidation, run on task completion under the PMapper
    /// strategy: take the VM holding the smallest task on the least loaded
    /// machine and move it into the upper half of the load-sorted list, so
    /// the lower half may drain and power down.
    pub fn consolidate(&self, now: Time, view: &mut ClusterView) {
        let decision = {
            let cluster = self.cluster.borrow();
            let order = view.machines_sorted(&*cluster, MachineOrder::MemoryUsed);
            if order.len() < 2 {
                return;
            }
            let lightest = order[0];

            let mut smallest: Option<(VmId, u64)> = None;
            for vm in view.vms_on(lightest) {
                if view.is_migrating(*vm) || view.in_cooldown(*vm) {
                    continue;
                }
                for task in cluster.vm_info(*vm).active_tasks {
                    let footprint = cluster.task_memory(task) + cluster.vm_memory_overhead();
                    if smallest.map_or(true, |(_, current)| footprint < current) {
                        smallest = Some((*vm, footprint));
                    }
                }
            }
            let vm = match smallest {
                Some((vm, _)) => vm,
                None => return,
            };

            let demand = view.vm_demand(vm, &*cluster);
            let cpu = cluster.vm_info(vm).cpu;
            let mut destination = None;
            for machine in &order[order.len() / 2..] {
                if *machine == lightest || view.migration_bound_for(*machine) {
                    continue;
                }
                if view.can_host(&*cluster, *machine, cpu, demand) == PlacementVerdict::Success {
                    destination = Some(*machine);
                    break;
                }
            }
            match destination {
                Some(destination) => (vm, destination),
                None => return,
            }
        };

        let (vm, destination) = decision;
        info!(
            "consolidating vm {} onto machine {} at time {}",
            vm, destination, now
        );
        self.begin_migration(vm, destination, view);
    }
}
