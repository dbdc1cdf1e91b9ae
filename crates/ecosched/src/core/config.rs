//! Scheduler configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Auxiliary structure to parse SchedulerConfig from file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SchedulerConfigRaw {
    /// minimal interval between power state decisions for one machine
    pub state_change_threshold: Option<u64>,
    /// soft cap on active tasks per VM before a new VM is preferred
    pub vm_task_cap: Option<usize>,
    /// minimal interval between consecutive migrations of one VM
    pub migration_cooldown: Option<u64>,
    /// amount subtracted from every migration cooldown at each periodic check
    pub cooldown_tick: Option<u64>,
    /// placement algorithm used for new tasks
    pub placement_algorithm: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// minimal interval between power state decisions for one machine
    pub state_change_threshold: u64,
    /// soft cap on active tasks per VM before a new VM is preferred
    pub vm_task_cap: usize,
    /// minimal interval between consecutive migrations of one VM
    pub migration_cooldown: u64,
    /// amount subtracted from every migration cooldown at each periodic check
    pub cooldown_tick: u64,
    /// placement algorithm used for new tasks
    pub placement_algorithm: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            state_change_threshold: 1_000_000,
            vm_task_cap: 100,
            migration_cooldown: 2_000_000,
            cooldown_tick: 100_000,
            placement_algorithm: "Balanced".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Creates scheduler config by reading parameter values from .yaml file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Self {
        let raw: SchedulerConfigRaw = serde_yaml::from_str(
            &std::fs::read_to_string(file_name).unwrap_or_else(|_| panic!("Can't read file {}", file_name)),
        )
        .unwrap_or_else(|_| panic!("Can't parse YAML from file {}", file_name));

        let defaults = SchedulerConfig::default();
        Self {
            state_change_threshold: raw.state_change_threshold.unwrap_or(defaults.state_change_threshold),
            vm_task_cap: raw.vm_task_cap.unwrap_or(defaults.vm_task_cap),
            migration_cooldown: raw.migration_cooldown.unwrap_or(defaults.migration_cooldown),
            cooldown_tick: raw.cooldown_tick.unwrap_or(defaults.cooldown_tick),
            placement_algorithm: raw.placement_algorithm.unwrap_or(defaults.placement_algorithm),
        }
    }
}

/// Parses config value string, which consists of two parts - name and options.
/// Example: BestFit[threshold=0.8] parts are name BestFit and options string
/// "threshold=0.8".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.to_string(), Some(r.to_string().replace(']', ""))),
        None => (config_str.to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.to_string(), value.to_string());
        }
    }
    options
}
