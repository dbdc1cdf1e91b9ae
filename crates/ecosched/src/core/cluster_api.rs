//! Interface to the simulated cluster.
//!
//! The simulator owns the machines, VMs and tasks; the scheduler observes and
//! actuates them only through this trait. State changes and migrations are
//! split-phase: the call returns immediately and the host reports completion
//! through a later callback.

use crate::core::common::{CpuType, MachineId, PState, PowerState, Priority, SlaClass, TaskId, Time, VmId, VmType};

/// Point-in-time description of a physical machine.
#[derive(Clone, Debug)]
pub struct MachineInfo {
    pub id: MachineId,
    pub cpu: CpuType,
    pub memory_size: u64,
    pub memory_used: u64,
    pub gpus: u32,
    pub s_state: PowerState,
    pub p_state: PState,
    pub active_vms: u32,
    pub energy_consumed: f64,
}

impl MachineInfo {
    pub fn has_gpu(&self) -> bool {
        self.gpus > 0
    }
}

/// Point-in-time description of a virtual machine.
#[derive(Clone, Debug)]
pub struct VmInfo {
    pub id: VmId,
    pub vm_type: VmType,
    pub cpu: CpuType,
    /// Host machine, or None while the VM is detached.
    pub machine: Option<MachineId>,
    pub active_tasks: Vec<TaskId>,
}

/// Immutable description of a task supplied by the simulator.
#[derive(Clone, Debug)]
pub struct TaskInfo {
    pub id: TaskId,
    pub required_cpu: CpuType,
    pub required_vm_type: VmType,
    pub required_memory: u64,
    pub gpu_capable: bool,
    pub sla: SlaClass,
    pub arrival: Time,
    pub target_completion: Time,
}

/// The oracle surface of the simulator.
///
/// Observation methods take `&self` and are answered from the simulator's
/// current state; actuation methods take `&mut self` and either apply
/// synchronously (`vm_attach`, `vm_add_task`) or start an asynchronous
/// operation completed by a later callback (`set_machine_state`,
/// `vm_migrate`).
pub trait ClusterApi {
    fn machine_count(&self) -> usize;
    fn machine_info(&self, machine: MachineId) -> MachineInfo;
    fn machine_cpu(&self, machine: MachineId) -> CpuType;
    fn set_machine_state(&mut self, machine: MachineId, state: PowerState);
    /// Applies the performance state to every core of the machine.
    fn set_core_performance(&mut self, machine: MachineId, state: PState);
    fn cluster_energy(&self) -> f64;

    fn vm_create(&mut self, vm_type: VmType, cpu: CpuType) -> VmId;
    fn vm_attach(&mut self, vm: VmId, machine: MachineId);
    fn vm_add_task(&mut self, vm: VmId, task: TaskId, priority: Priority);
    fn vm_migrate(&mut self, vm: VmId, destination: MachineId);
    fn vm_shutdown(&mut self, vm: VmId);
    fn vm_info(&self, vm: VmId) -> VmInfo;
    /// Fixed memory cost charged to every VM on top of its tasks.
    fn vm_memory_overhead(&self) -> u64;

    fn task_info(&self, task: TaskId) -> TaskInfo;
    fn set_task_priority(&mut self, task: TaskId, priority: Priority);
    fn task_count(&self) -> usize;
    fn task_completed(&self, task: TaskId) -> bool;
    /// Fraction of tasks in the class that met their SLA, in percent.
    fn sla_report(&self, sla: SlaClass) -> f64;

    fn required_sla(&self, task: TaskId) -> SlaClass {
        self.task_info(task).sla
    }

    fn required_cpu(&self, task: TaskId) -> CpuType {
        self.task_info(task).required_cpu
    }

    fn required_vm_type(&self, task: TaskId) -> VmType {
        self.task_info(task).required_vm_type
    }

    fn task_memory(&self, task: TaskId) -> u64 {
        self.task_info(task).required_memory
    }

    fn task_gpu_capable(&self, task: TaskId) -> bool {
        self.task_info(task).gpu_capable
    }
}
