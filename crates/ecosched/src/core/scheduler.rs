//! Event-driven scheduler controller.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};
use sugars::rc;

use crate::core::cluster_api::ClusterApi;
use crate::core::cluster_view::{ClusterView, MachineOrder};
use crate::core::common::{sla_priority, MachineId, PlacementRequest, PowerState, SlaClass, TaskId, Time, VmId};
use crate::core::config::SchedulerConfig;
use crate::core::migration::MigrationEngine;
use crate::core::placement::{placement_algorithm_resolver, PlacementAlgorithm};
use crate::core::power::PowerManager;

/// Scheduler reacting to the simulator's event callbacks.
///
/// Owns the cluster view and funnels every event into the placement,
/// migration and power subsystems. Asynchronous operations started from one
/// callback (machine state change, VM migration) park their dependent work in
/// the view's pending queues; the corresponding completion callback drains
/// them. All handlers run to completion and never block, so the single-thread
/// event serialization of the simulator is the only synchronization needed.
pub struct Scheduler {
    cluster: Rc<RefCell<dyn ClusterApi>>,
    view: ClusterView,
    placement: Box<dyn PlacementAlgorithm>,
    migrator: MigrationEngine,
    power: PowerManager,
    config: Rc<SchedulerConfig>,
}

impl Scheduler {
    /// Creates scheduler with the placement algorithm named in the config.
    pub fn new(cluster: Rc<RefCell<dyn ClusterApi>>, config: SchedulerConfig) -> Self {
        let config = rc!(config);
        Self {
            view: ClusterView::new(),
            placement: placement_algorithm_resolver(&config.placement_algorithm),
            migrator: MigrationEngine::new(cluster.clone(), config.clone()),
            power: PowerManager::new(cluster.clone(), config.clone()),
            cluster,
            config,
        }
    }

    /// Read access to the scheduler's bookkeeping, mainly for inspection in
    /// tests and reports.
    pub fn view(&self) -> &ClusterView {
        &self.view
    }

    /// Enumerates all machines and seeds the cluster view, classifying GPU
    /// machines along the way. The simulator numbers machines densely from 0.
    pub fn init(&mut self) {
        let cluster = self.cluster.borrow();
        let total = cluster.machine_count();
        info!(
            "initializing scheduler: {} machines, {} tasks expected",
            total,
            cluster.task_count()
        );
        for machine in 0..total as MachineId {
            let info = cluster.machine_info(machine);
            self.view.add_machine(machine, info.has_gpu());
        }
    }

    /// Places an arriving task: select a machine, wake it if needed, reuse or
    /// create a VM, and either dispatch the task or park it until the machine
    /// and VM are ready. An unplaceable task is dropped with a log line and
    /// never retried here.
    pub fn on_new_task(&mut self, now: Time, task: TaskId) {
        let (request, priority) = {
            let cluster = self.cluster.borrow();
            let info = cluster.task_info(task);
            let request = PlacementRequest {
                task,
                cpu: info.required_cpu,
                vm_type: info.required_vm_type,
                memory: info.required_memory + cluster.vm_memory_overhead(),
                prefer_gpu: info.gpu_capable,
            };
            (request, sla_priority(info.sla))
        };

        let machine = {
            let cluster = self.cluster.borrow();
            self.placement.select_machine(&request, &self.view, &*cluster)
        };
        let machine = match machine {
            Some(machine) => machine,
            None => {
                warn!("no feasible machine for task {} at time {}", task, now);
                return;
            }
        };
        debug!("decided to place task {} on machine {}", task, machine);

        let mut cluster = self.cluster.borrow_mut();
        if cluster.machine_info(machine).s_state != PowerState::S0 && !self.view.state_change_in_flight(machine) {
            self.view.set_state_change(machine, true);
            cluster.set_machine_state(machine, PowerState::S0);
        }

        let mut vm = None;
        for candidate in self.view.vms_on(machine) {
            let vm_info = cluster.vm_info(*candidate);
            if vm_info.vm_type == request.vm_type && vm_info.active_tasks.len() < self.config.vm_task_cap {
                vm = Some(*candidate);
                break;
            }
        }
        let vm = match vm {
            Some(vm) => vm,
            None => {
                let vm = cluster.vm_create(request.vm_type, request.cpu);
                self.view.register_vm(vm);
                if self.view.state_change_in_flight(machine) {
                    self.view.push_pending_vm(machine, vm);
                    debug!("vm {} awaits attachment to machine {}", vm, machine);
                } else {
                    cluster.vm_attach(vm, machine);
                    self.view.attach_vm(machine, vm);
                    debug!("attached vm {} to machine {}", vm, machine);
                }
                vm
            }
        };

        self.view.assign_task(task, vm);
        if self.view.is_migrating(vm) || self.view.state_change_in_flight(machine) {
            self.view.push_pending_task(vm, task);
            debug!("task {} awaits vm {} on machine {}", task, vm, machine);
        } else {
            cluster.vm_add_task(vm, task, priority);
            debug!("task {} placed on vm {} on machine {}", task, vm, machine);
        }
    }

    /// Drops the completed task from the bookkeeping and, for strategies that
    /// ask for it, runs the consolidation pass.
    pub fn on_task_completed(&mut self, now: Time, task: TaskId) {
        self.view.forget_task(task);
        if self.placement.consolidate_on_completion() {
            self.migrator.consolidate(now, &mut self.view);
        }
    }

    pub fn on_sla_warning(&mut self, now: Time, task: TaskId) {
        self.migrator.on_sla_warning(now, task, &mut self.view);
    }

    /// Diagnostic only; the next SLA warning is what actually reshuffles load.
    pub fn on_memory_warning(&mut self, now: Time, machine: MachineId) {
        let info = self.cluster.borrow().machine_info(machine);
        warn!(
            "memory overcommit on machine {} at time {}: {}/{} used by {} vms",
            machine, now, info.memory_used, info.memory_size, info.active_vms
        );
    }

    pub fn on_migration_done(&mut self, now: Time, vm: VmId) {
        self.migrator.on_migration_done(now, vm, &mut self.view);
    }

    /// Completion of an asynchronous power transition. Reaching S0 releases
    /// everything parked on the machine: the queued inbound migration, the
    /// pending VMs, and the tasks queued on its VMs. Landing on any other
    /// state with work still pending immediately re-arms the climb to S0.
    pub fn on_state_change_complete(&mut self, now: Time, machine: MachineId) {
        let state = self.cluster.borrow().machine_info(machine).s_state;
        debug!("machine {} reached {} at time {}", machine, state, now);
        self.view.set_state_change(machine, false);
        if state != PowerState::S0 {
            if self.view.has_pending_work(machine) {
                self.view.set_state_change(machine, true);
                self.cluster.borrow_mut().set_machine_state(machine, PowerState::S0);
            }
            return;
        }

        self.migrator.launch_queued(machine, &mut self.view);

        let mut cluster = self.cluster.borrow_mut();
        for vm in self.view.drain_pending_vms(machine) {
            cluster.vm_attach(vm, machine);
            self.view.attach_vm(machine, vm);
            debug!("attached pending vm {} to machine {}", vm, machine);
        }
        for vm in self.view.vms_on(machine).to_vec() {
            if self.view.is_migrating(vm) {
                continue;
            }
            for task in self.view.drain_pending_tasks(vm) {
                let priority = sla_priority(cluster.required_sla(task));
                cluster.vm_add_task(vm, task, priority);
                debug!("dispatched pending task {} to vm {}", task, vm);
            }
        }
    }

    /// Periodic tick driving the power controller.
    pub fn on_periodic_check(&mut self, now: Time) {
        self.power.on_periodic_check(now, &mut self.view);
    }

    /// Teardown: shut down every VM and log the SLA and energy figures.
    pub fn on_simulation_complete(&mut self, now: Time) {
        let mut cluster = self.cluster.borrow_mut();
        for vm in self.view.all_vms().to_vec() {
            cluster.vm_shutdown(vm);
        }

        info!("sla violation report:");
        for sla in [SlaClass::Sla0, SlaClass::Sla1, SlaClass::Sla2, SlaClass::Sla3] {
            info!("  {}: {:.2}%", sla, cluster.sla_report(sla));
        }
        info!("total cluster energy: {:.3} kW-hour", cluster.cluster_energy());
        for machine in self.view.machines_sorted(&*cluster, MachineOrder::EnergyConsumed) {
            info!(
                "  machine {}: {:.3} kW-hour",
                machine,
                cluster.machine_info(machine).energy_consumed
            );
        }
        let unfinished = (0..cluster.task_count() as TaskId)
            .filter(|task| !cluster.task_completed(*task))
            .count();
        if unfinished > 0 {
            warn!("{} tasks did not complete", unfinished);
        }
        info!("simulation finished at time {}", now);
    }
}
