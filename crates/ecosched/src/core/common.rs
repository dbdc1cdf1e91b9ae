//! Common data structures.

use std::fmt::{Display, Formatter};

use serde::Serialize;

pub type MachineId = u32;
pub type VmId = u32;
pub type TaskId = u32;

/// Simulated time.
pub type Time = u64;

/// CPU architecture of a machine, and the architecture a task requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CpuType {
    X86,
    Arm,
    Power,
    Riscv,
}

/// Guest system flavor hosted by a VM, and the flavor a task requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmType {
    Linux,
    Win,
    Aix,
}

/// Task quality-of-service tier. Sla0 is the strictest, Sla3 is best-effort.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SlaClass {
    Sla0,
    Sla1,
    Sla2,
    Sla3,
}

impl Display for SlaClass {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SlaClass::Sla0 => write!(f, "SLA0"),
            SlaClass::Sla1 => write!(f, "SLA1"),
            SlaClass::Sla2 => write!(f, "SLA2"),
            SlaClass::Sla3 => write!(f, "SLA3"),
        }
    }
}

/// Dispatch priority of a task inside its VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Low,
    Mid,
    High,
}

/// Maps the task SLA class to its dispatch priority.
pub fn sla_priority(sla: SlaClass) -> Priority {
    match sla {
        SlaClass::Sla0 => Priority::High,
        SlaClass::Sla1 | SlaClass::Sla2 => Priority::Mid,
        SlaClass::Sla3 => Priority::Low,
    }
}

/// Machine power state, S0 fully on through S5 fully off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PowerState {
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
}

impl PowerState {
    /// One notch toward S5, clamped at S5.
    pub fn deeper(self) -> PowerState {
        match self {
            PowerState::S0 => PowerState::S1,
            PowerState::S1 => PowerState::S2,
            PowerState::S2 => PowerState::S3,
            PowerState::S3 => PowerState::S4,
            PowerState::S4 | PowerState::S5 => PowerState::S5,
        }
    }

    /// One notch toward S0, clamped at S0.
    pub fn shallower(self) -> PowerState {
        match self {
            PowerState::S0 | PowerState::S1 => PowerState::S0,
            PowerState::S2 => PowerState::S1,
            PowerState::S3 => PowerState::S2,
            PowerState::S4 => PowerState::S3,
            PowerState::S5 => PowerState::S4,
        }
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "S{}", *self as u32)
    }
}

/// CPU core performance state, P0 fastest through P3 slowest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PState {
    P0,
    P1,
    P2,
    P3,
}

impl PState {
    /// One notch toward P0, clamped at P0.
    pub fn faster(self) -> PState {
        match self {
            PState::P0 | PState::P1 => PState::P0,
            PState::P2 => PState::P1,
            PState::P3 => PState::P2,
        }
    }

    /// One notch toward P3, clamped at P3.
    pub fn slower(self) -> PState {
        match self {
            PState::P0 => PState::P1,
            PState::P1 => PState::P2,
            PState::P2 | PState::P3 => PState::P3,
        }
    }
}

impl Display for PState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "P{}", *self as u32)
    }
}

/// Resource demand of a task to be placed, plus its scheduling preferences.
///
/// The memory field already includes the per-VM overhead, so it is the amount
/// a machine must actually have free to take the task on a fresh VM.
#[derive(Serialize, Clone)]
pub struct PlacementRequest {
    pub task: TaskId,
    pub cpu: CpuType,
    pub vm_type: VmType,
    pub memory: u64,
    pub prefer_gpu: bool,
}

/// Describes a result of checking the placement feasibility on one machine.
#[derive(Debug, PartialEq)]
pub enum PlacementVerdict {
    WrongCpuType,
    NotEnoughMemory,
    Success,
}
