//! Scheduler-side view of the cluster.
//!
//! Single owner of every mutable index the engines rely on: which VMs sit on
//! which machine, which VM runs which task, the transient migration and state
//! change flags, the pending queues drained on async completions, and the
//! per-VM migration cooldowns. All other subsystems observe the view and
//! mutate it only through these operations; anything the simulator owns
//! (memory used, power states) is re-read from [`ClusterApi`] on every event
//! instead of being cached here.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::core::cluster_api::ClusterApi;
use crate::core::common::{CpuType, MachineId, PlacementVerdict, TaskId, Time, VmId};

/// Sort key for machine enumeration.
#[derive(Clone, Copy, Debug)]
pub enum MachineOrder {
    /// Ascending memory used, ties broken by machine identity. The canonical
    /// order for every placement and migration scan.
    MemoryUsed,
    /// Ascending accumulated energy, used for the end-of-run report.
    EnergyConsumed,
}

/// Scheduler-side state of one machine.
#[derive(Clone, Default)]
struct MachineRecord {
    vms: Vec<VmId>,
    has_gpu: bool,
    state_change_in_flight: bool,
    inbound_migration: bool,
    pending_vms: Vec<VmId>,
    queued_migration: Option<VmId>,
    last_state_check: Time,
    last_memory_used: u64,
}

#[derive(Clone, Default)]
pub struct ClusterView {
    machines: IndexMap<MachineId, MachineRecord>,
    task_vm: HashMap<TaskId, VmId>,
    pending_tasks: HashMap<VmId, Vec<TaskId>>,
    migrating: HashMap<VmId, bool>,
    cooldowns: HashMap<VmId, Time>,
    vms: Vec<VmId>,
}

impl ClusterView {
    pub fn new() -> Self {
        Default::default()
    }

    fn record(&self, machine: MachineId) -> &MachineRecord {
        self.machines
            .get(&machine)
            .unwrap_or_else(|| panic!("unknown machine {}", machine))
    }

    fn record_mut(&mut self, machine: MachineId) -> &mut MachineRecord {
        self.machines
            .get_mut(&machine)
            .unwrap_or_else(|| panic!("unknown machine {}", machine))
    }

    /// Registers a machine discovered at init.
    pub fn add_machine(&mut self, machine: MachineId, has_gpu: bool) {
        self.machines.insert(
            machine,
            MachineRecord {
                has_gpu,
                ..Default::default()
            },
        );
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn machine_ids(&self) -> Vec<MachineId> {
        self.machines.keys().copied().collect()
    }

    pub fn machine_has_gpu(&self, machine: MachineId) -> bool {
        self.record(machine).has_gpu
    }

    /// Enumerates all machines in the requested sort order. The ordering keys
    /// are read from the oracle at call time, never cached.
    pub fn machines_sorted(&self, cluster: &dyn ClusterApi, order: MachineOrder) -> Vec<MachineId> {
        let mut ids = self.machine_ids();
        match order {
            MachineOrder::MemoryUsed => {
                ids.sort_by_key(|&machine| (cluster.machine_info(machine).memory_used, machine));
            }
            MachineOrder::EnergyConsumed => {
                ids.sort_by(|&a, &b| {
                    cluster
                        .machine_info(a)
                        .energy_consumed
                        .total_cmp(&cluster.machine_info(b).energy_consumed)
                        .then(a.cmp(&b))
                });
            }
        }
        ids
    }

    // VM placement bookkeeping ////////////////////////////////////////////////

    /// Records a created VM so that teardown can reach it.
    pub fn register_vm(&mut self, vm: VmId) {
        self.vms.push(vm);
        self.migrating.insert(vm, false);
    }

    pub fn all_vms(&self) -> &[VmId] {
        &self.vms
    }

    /// VMs currently listed on the machine, including a VM migrating in
    /// (listed under its intended host).
    pub fn vms_on(&self, machine: MachineId) -> &[VmId] {
        &self.record(machine).vms
    }

    pub fn attach_vm(&mut self, machine: MachineId, vm: VmId) {
        self.record_mut(machine).vms.push(vm);
    }

    /// Delists the VM from the machine. The VM must be listed there, anything
    /// else means the book-keeping has diverged from reality.
    pub fn remove_vm(&mut self, machine: MachineId, vm: VmId) {
        let vms = &mut self.record_mut(machine).vms;
        match vms.iter().position(|&other| other == vm) {
            Some(index) => {
                vms.remove(index);
            }
            None => panic!("vm {} is not listed on machine {}", vm, machine),
        }
    }

    // Task bookkeeping ////////////////////////////////////////////////////////

    pub fn assign_task(&mut self, task: TaskId, vm: VmId) {
        self.task_vm.insert(task, vm);
    }

    pub fn vm_of_task(&self, task: TaskId) -> Option<VmId> {
        self.task_vm.get(&task).copied()
    }

    pub fn forget_task(&mut self, task: TaskId) {
        self.task_vm.remove(&task);
    }

    // Transient flags /////////////////////////////////////////////////////////

    pub fn is_migrating(&self, vm: VmId) -> bool {
        self.migrating.get(&vm).copied().unwrap_or(false)
    }

    pub fn set_migrating(&mut self, vm: VmId, value: bool) {
        self.migrating.insert(vm, value);
    }

    pub fn state_change_in_flight(&self, machine: MachineId) -> bool {
        self.record(machine).state_change_in_flight
    }

    pub fn set_state_change(&mut self, machine: MachineId, value: bool) {
        self.record_mut(machine).state_change_in_flight = value;
    }

    /// True while a migration is in progress or parked for this destination.
    pub fn migration_bound_for(&self, machine: MachineId) -> bool {
        let record = self.record(machine);
        record.inbound_migration || record.queued_migration.is_some()
    }

    pub fn set_inbound_migration(&mut self, machine: MachineId, value: bool) {
        self.record_mut(machine).inbound_migration = value;
    }

    // Pending queues //////////////////////////////////////////////////////////

    pub fn push_pending_vm(&mut self, machine: MachineId, vm: VmId) {
        self.record_mut(machine).pending_vms.push(vm);
    }

    pub fn drain_pending_vms(&mut self, machine: MachineId) -> Vec<VmId> {
        std::mem::take(&mut self.record_mut(machine).pending_vms)
    }

    pub fn push_pending_task(&mut self, vm: VmId, task: TaskId) {
        self.pending_tasks.entry(vm).or_default().push(task);
    }

    pub fn drain_pending_tasks(&mut self, vm: VmId) -> Vec<TaskId> {
        self.pending_tasks.remove(&vm).unwrap_or_default()
    }

    pub fn pending_tasks_of(&self, vm: VmId) -> &[TaskId] {
        self.pending_tasks.get(&vm).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parks a migration until the destination reaches S0. Only one migration
    /// may be bound for a destination at a time.
    pub fn queue_migration(&mut self, machine: MachineId, vm: VmId) {
        let record = self.record_mut(machine);
        if let Some(queued) = record.queued_migration {
            panic!("machine {} already has queued migration of vm {}", machine, queued);
        }
        record.queued_migration = Some(vm);
    }

    pub fn take_queued_migration(&mut self, machine: MachineId) -> Option<VmId> {
        self.record_mut(machine).queued_migration.take()
    }

    /// True if anything is waiting for this machine to reach S0: a pending VM,
    /// a parked migration, or a task queued on one of its VMs.
    pub fn has_pending_work(&self, machine: MachineId) -> bool {
        let record = self.record(machine);
        if !record.pending_vms.is_empty() || record.queued_migration.is_some() {
            return true;
        }
        record
            .vms
            .iter()
            .any(|vm| !self.pending_tasks_of(*vm).is_empty())
    }

    // Memory accounting ///////////////////////////////////////////////////////

    /// Full memory demand of a VM: the per-VM overhead plus the requirements
    /// of its active tasks and of the tasks queued to land on it.
    pub fn vm_demand(&self, vm: VmId, cluster: &dyn ClusterApi) -> u64 {
        let mut demand = cluster.vm_memory_overhead();
        for task in cluster.vm_info(vm).active_tasks {
            demand += cluster.task_memory(task);
        }
        for task in self.pending_tasks_of(vm) {
            demand += cluster.task_memory(*task);
        }
        demand
    }

    /// Memory already spoken for on a machine by VMs queued to land there:
    /// pending VMs plus a parked inbound migration. The simulator does not
    /// know about these yet, so its `memory_used` misses them.
    pub fn pending_memory(&self, machine: MachineId, cluster: &dyn ClusterApi) -> u64 {
        let record = self.record(machine);
        let mut pending = 0;
        for vm in &record.pending_vms {
            pending += self.vm_demand(*vm, cluster);
        }
        if let Some(vm) = record.queued_migration {
            pending += self.vm_demand(vm, cluster);
        }
        pending
    }

    /// Checks whether the machine can take `memory` more bytes for a workload
    /// requiring the given CPU architecture.
    pub fn can_host(&self, cluster: &dyn ClusterApi, machine: MachineId, cpu: CpuType, memory: u64) -> PlacementVerdict {
        if cluster.machine_cpu(machine) != cpu {
            return PlacementVerdict::WrongCpuType;
        }
        let info = cluster.machine_info(machine);
        let free = info
            .memory_size
            .saturating_sub(info.memory_used)
            .saturating_sub(self.pending_memory(machine, cluster));
        if memory > free {
            return PlacementVerdict::NotEnoughMemory;
        }
        PlacementVerdict::Success
    }

    // Cooldowns ///////////////////////////////////////////////////////////////

    pub fn start_cooldown(&mut self, vm: VmId, amount: Time) {
        self.cooldowns.insert(vm, amount);
    }

    pub fn in_cooldown(&self, vm: VmId) -> bool {
        self.cooldowns.get(&vm).copied().unwrap_or(0) > 0
    }

    /// Decrements every cooldown by the tick delta, dropping expired entries.
    pub fn tick_cooldowns(&mut self, delta: Time) {
        self.cooldowns.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(delta);
            *remaining > 0
        });
    }

    // Power sweep samples /////////////////////////////////////////////////////

    pub fn last_state_check(&self, machine: MachineId) -> Time {
        self.record(machine).last_state_check
    }

    pub fn last_memory_used(&self, machine: MachineId) -> u64 {
        self.record(machine).last_memory_used
    }

    pub fn record_state_check(&mut self, machine: MachineId, now: Time, memory_used: u64) {
        let record = self.record_mut(machine);
        record.last_state_check = now;
        record.last_memory_used = memory_used;
    }
}
