//! Deterministic in-memory cluster used to drive the scheduler in tests.
//!
//! Plays the simulator's role: it answers the oracle queries and records
//! every actuation. State changes and migrations are split-phase, as in the
//! real thing: the call only arms the transition, and the test decides when
//! to complete it and fire the corresponding scheduler callback.

#![allow(dead_code)]

use ecosched::core::cluster_api::{ClusterApi, MachineInfo, TaskInfo, VmInfo};
use ecosched::core::common::{CpuType, MachineId, PState, PowerState, Priority, SlaClass, TaskId, VmId, VmType};

#[derive(Clone, Debug, PartialEq)]
pub enum SimCall {
    SetState(MachineId, PowerState),
    SetCorePerformance(MachineId, PState),
    VmCreate(VmId),
    VmAttach(VmId, MachineId),
    VmAddTask(VmId, TaskId, Priority),
    VmMigrate(VmId, MachineId),
    VmShutdown(VmId),
    SetTaskPriority(TaskId, Priority),
}

struct SimMachine {
    cpu: CpuType,
    memory_size: u64,
    gpus: u32,
    s_state: PowerState,
    p_state: PState,
    pending_state: Option<PowerState>,
    energy_consumed: f64,
}

struct SimVm {
    vm_type: VmType,
    cpu: CpuType,
    machine: Option<MachineId>,
    tasks: Vec<TaskId>,
    migrating_to: Option<MachineId>,
}

struct SimTask {
    required_cpu: CpuType,
    required_vm_type: VmType,
    required_memory: u64,
    gpu_capable: bool,
    sla: SlaClass,
    completed: bool,
}

pub struct SimCluster {
    machines: Vec<SimMachine>,
    vms: Vec<SimVm>,
    tasks: Vec<SimTask>,
    overhead: u64,
    pub calls: Vec<SimCall>,
}

impl SimCluster {
    pub fn new(overhead: u64) -> Self {
        Self {
            machines: Vec::new(),
            vms: Vec::new(),
            tasks: Vec::new(),
            overhead,
            calls: Vec::new(),
        }
    }

    pub fn add_machine(&mut self, cpu: CpuType, memory_size: u64, gpus: u32, s_state: PowerState) -> MachineId {
        self.machines.push(SimMachine {
            cpu,
            memory_size,
            gpus,
            s_state,
            p_state: PState::P0,
            pending_state: None,
            energy_consumed: 0.,
        });
        (self.machines.len() - 1) as MachineId
    }

    pub fn add_task(
        &mut self,
        cpu: CpuType,
        vm_type: VmType,
        memory: u64,
        gpu_capable: bool,
        sla: SlaClass,
    ) -> TaskId {
        self.tasks.push(SimTask {
            required_cpu: cpu,
            required_vm_type: vm_type,
            required_memory: memory,
            gpu_capable,
            sla,
            completed: false,
        });
        (self.tasks.len() - 1) as TaskId
    }

    /// Applies the power transition armed by `set_machine_state`. The test
    /// must follow up with `Scheduler::on_state_change_complete`.
    pub fn complete_state_change(&mut self, machine: MachineId) {
        let machine = &mut self.machines[machine as usize];
        machine.s_state = machine.pending_state.take().expect("no state change in flight");
    }

    /// Lands the VM on the destination armed by `vm_migrate`. The test must
    /// follow up with `Scheduler::on_migration_done`.
    pub fn complete_migration(&mut self, vm: VmId) {
        let vm = &mut self.vms[vm as usize];
        vm.machine = Some(vm.migrating_to.take().expect("no migration in flight"));
    }

    /// Finishes a running task. The test must follow up with
    /// `Scheduler::on_task_completed`.
    pub fn complete_task(&mut self, task: TaskId) {
        self.tasks[task as usize].completed = true;
        for vm in self.vms.iter_mut() {
            vm.tasks.retain(|&other| other != task);
        }
    }

    pub fn set_p_state(&mut self, machine: MachineId, p_state: PState) {
        self.machines[machine as usize].p_state = p_state;
    }

    pub fn set_energy(&mut self, machine: MachineId, energy: f64) {
        self.machines[machine as usize].energy_consumed = energy;
    }

    pub fn machine_state(&self, machine: MachineId) -> PowerState {
        self.machines[machine as usize].s_state
    }

    pub fn vm_host(&self, vm: VmId) -> Option<MachineId> {
        self.vms[vm as usize].machine
    }

    pub fn vm_tasks(&self, vm: VmId) -> Vec<TaskId> {
        self.vms[vm as usize].tasks.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&SimCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn memory_used(&self, machine: MachineId) -> u64 {
        let mut used = 0;
        for vm in &self.vms {
            if vm.machine == Some(machine) {
                used += self.overhead;
                for task in &vm.tasks {
                    used += self.tasks[*task as usize].required_memory;
                }
            }
        }
        used
    }
}

impl ClusterApi for SimCluster {
    fn machine_count(&self) -> usize {
        self.machines.len()
    }

    fn machine_info(&self, machine: MachineId) -> MachineInfo {
        let record = &self.machines[machine as usize];
        MachineInfo {
            id: machine,
            cpu: record.cpu,
            memory_size: record.memory_size,
            memory_used: self.memory_used(machine),
            gpus: record.gpus,
            s_state: record.s_state,
            p_state: record.p_state,
            active_vms: self.vms.iter().filter(|vm| vm.machine == Some(machine)).count() as u32,
            energy_consumed: record.energy_consumed,
        }
    }

    fn machine_cpu(&self, machine: MachineId) -> CpuType {
        self.machines[machine as usize].cpu
    }

    fn set_machine_state(&mut self, machine: MachineId, state: PowerState) {
        self.machines[machine as usize].pending_state = Some(state);
        self.calls.push(SimCall::SetState(machine, state));
    }

    fn set_core_performance(&mut self, machine: MachineId, state: PState) {
        self.machines[machine as usize].p_state = state;
        self.calls.push(SimCall::SetCorePerformance(machine, state));
    }

    fn cluster_energy(&self) -> f64 {
        self.machines.iter().map(|machine| machine.energy_consumed).sum()
    }

    fn vm_create(&mut self, vm_type: VmType, cpu: CpuType) -> VmId {
        self.vms.push(SimVm {
            vm_type,
            cpu,
            machine: None,
            tasks: Vec::new(),
            migrating_to: None,
        });
        let vm = (self.vms.len() - 1) as VmId;
        self.calls.push(SimCall::VmCreate(vm));
        vm
    }

    fn vm_attach(&mut self, vm: VmId, machine: MachineId) {
        self.vms[vm as usize].machine = Some(machine);
        self.calls.push(SimCall::VmAttach(vm, machine));
    }

    fn vm_add_task(&mut self, vm: VmId, task: TaskId, priority: Priority) {
        self.vms[vm as usize].tasks.push(task);
        self.calls.push(SimCall::VmAddTask(vm, task, priority));
    }

    fn vm_migrate(&mut self, vm: VmId, destination: MachineId) {
        self.vms[vm as usize].migrating_to = Some(destination);
        self.calls.push(SimCall::VmMigrate(vm, destination));
    }

    fn vm_shutdown(&mut self, vm: VmId) {
        let record = &mut self.vms[vm as usize];
        record.machine = None;
        record.tasks.clear();
        self.calls.push(SimCall::VmShutdown(vm));
    }

    fn vm_info(&self, vm: VmId) -> VmInfo {
        let record = &self.vms[vm as usize];
        VmInfo {
            id: vm,
            vm_type: record.vm_type,
            cpu: record.cpu,
            machine: record.machine,
            active_tasks: record.tasks.clone(),
        }
    }

    fn vm_memory_overhead(&self) -> u64 {
        self.overhead
    }

    fn task_info(&self, task: TaskId) -> TaskInfo {
        let record = &self.tasks[task as usize];
        TaskInfo {
            id: task,
            required_cpu: record.required_cpu,
            required_vm_type: record.required_vm_type,
            required_memory: record.required_memory,
            gpu_capable: record.gpu_capable,
            sla: record.sla,
            arrival: 0,
            target_completion: 0,
        }
    }

    fn set_task_priority(&mut self, task: TaskId, priority: Priority) {
        self.calls.push(SimCall::SetTaskPriority(task, priority));
    }

    fn task_count(&self) -> usize {
        self.tasks.len()
    }

    fn task_completed(&self, task: TaskId) -> bool {
        self.tasks[task as usize].completed
    }

    fn sla_report(&self, _sla: SlaClass) -> f64 {
        let total = self.tasks.len().max(1);
        let completed = self.tasks.iter().filter(|task| task.completed).count();
        100. * completed as f64 / total as f64
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
