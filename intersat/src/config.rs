//! Solver configuration.
use serde::{Deserialize, Serialize};

/// Restart scheduling strategy.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum RestartSchedule {
    /// Restart intervals follow the Luby sequence scaled by
    /// [`luby_restart_scale`](SolverConfig::luby_restart_scale).
    Luby,
    /// Inner/outer geometric intervals: the inner interval grows by a fixed
    /// factor per restart until it reaches the outer interval, which then
    /// grows itself while the inner interval resets.
    Geometric,
}

/// How learned clauses are minimized during conflict analysis.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum MinimizeMode {
    /// Keep the first-UIP clause as derived.
    None,
    /// Drop a literal when all literals of its reason are already present.
    Local,
    /// Full recursive minimization over the implication graph.
    Recursive,
}

/// Phase used for a decision variable without saved or pinned phase.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum DefaultPhase {
    False,
    True,
    /// The polarity with the larger Jeroslow-Wang score.
    JeroslowWang,
    Random,
}

/// Configurable parameters used during solving.
///
/// The numeric defaults follow the solvers this design is derived from;
/// none of them is load-bearing for correctness.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Multiplicative decay for variable activities.
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities.
    pub clause_activity_decay: f32,

    /// Probability of replacing a heap decision with a uniformly random
    /// unassigned variable.
    pub random_decision_freq: f64,

    /// Phase selection for variables that were never assigned.
    pub default_phase: DefaultPhase,

    /// Clause minimization mode used during conflict analysis.
    pub minimize_mode: MinimizeMode,

    /// Restart scheduling strategy.
    pub restart_schedule: RestartSchedule,

    /// Scale for Luby restart intervals (in conflicts).
    pub luby_restart_scale: u64,

    /// Initial and minimal inner restart interval (in conflicts).
    pub restart_inner_base: f64,

    /// Growth factor of the inner restart interval.
    pub restart_inner_scale: f64,

    /// Growth factor of the outer restart interval.
    pub restart_outer_scale: f64,

    /// Skip a Luby restart when the agility is above this value.
    pub restart_agility_luby: f64,

    /// Skip an inner restart when the agility is above this value.
    pub restart_agility_inner: f64,

    /// Skip an outer restart when the agility is above this value.
    pub restart_agility_outer: f64,

    /// Initial soft bound on the number of long redundant clauses.
    pub reduce_initial: u64,

    /// Amount added to the soft bound when it grows.
    pub reduce_grow: u64,

    /// Number of reductions before the soft bound grows; this interval
    /// itself grows by half after each increase.
    pub reduce_adjust_interval: u64,

    /// Clauses with a glue of at most this value are never deleted.
    pub reduce_protected_glue: u32,

    /// The most recently learned clauses exempt from reduction.
    pub reduce_fresh_count: usize,

    /// Propagations of regular search between inprocessing passes.
    pub inprocess_interval: u64,

    /// Propagation budget of a single failed literal probing pass.
    pub probe_budget: u64,

    /// Budget extension awarded when probing finds a unit.
    pub probe_reward: u64,

    /// Step budget of a single subsumption pass.
    pub subsume_budget: u64,

    /// Step budget of a single variable elimination pass.
    pub elim_budget: u64,

    /// Number of extra clauses variable elimination may introduce.
    pub elim_grow: usize,

    /// Resolvents larger than this block the elimination of a variable.
    pub elim_clause_limit: usize,

    /// Learn binary clauses by lazy hyper-binary resolution. Enabling this
    /// forces the strict propagation order.
    pub lazy_hyper_binary: bool,

    /// Process binary and ternary watches of a literal strictly before long
    /// watches. Slower, but required for lazy hyper-binary resolution.
    pub strict_propagation_order: bool,

    /// Number of conflicts between progress log lines.
    pub log_interval: u64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            vsids_decay: 0.95,
            clause_activity_decay: 0.999,
            random_decision_freq: 0.005,
            default_phase: DefaultPhase::JeroslowWang,
            minimize_mode: MinimizeMode::Recursive,
            restart_schedule: RestartSchedule::Luby,
            luby_restart_scale: 128,
            restart_inner_base: 100.0,
            restart_inner_scale: 1.1,
            restart_outer_scale: 1.1,
            restart_agility_luby: 0.23,
            restart_agility_inner: 0.20,
            restart_agility_outer: 0.25,
            reduce_initial: 4000,
            reduce_grow: 300,
            reduce_adjust_interval: 4,
            reduce_protected_glue: 2,
            reduce_fresh_count: 50,
            inprocess_interval: 300_000,
            probe_budget: 100_000,
            probe_reward: 1000,
            subsume_budget: 1_000_000,
            elim_budget: 1_000_000,
            elim_grow: 0,
            elim_clause_limit: 20,
            lazy_hyper_binary: true,
            strict_propagation_order: true,
            log_interval: 5000,
        }
    }
}

impl SolverConfig {
    /// Whether the propagator has to process short watches of a literal
    /// before its long watches.
    pub fn strict_order(&self) -> bool {
        self.strict_propagation_order || self.lazy_hyper_binary
    }

    /// Check the configuration for out of range values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.vsids_decay < 1.0 && self.vsids_decay > 1.0 / 16.0) {
            return Err("vsids_decay must be within (1/16, 1)".to_owned());
        }
        if !(self.clause_activity_decay < 1.0 && self.clause_activity_decay > 1.0 / 16.0) {
            return Err("clause_activity_decay must be within (1/16, 1)".to_owned());
        }
        if !(0.0..=1.0).contains(&self.random_decision_freq) {
            return Err("random_decision_freq must be within [0, 1]".to_owned());
        }
        if self.restart_inner_scale < 1.0 || self.restart_outer_scale < 1.0 {
            return Err("restart interval scales must be at least 1".to_owned());
        }
        if self.luby_restart_scale == 0 || self.restart_inner_base < 1.0 {
            return Err("restart intervals must be positive".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_decay() {
        let mut config = SolverConfig::default();
        config.vsids_decay = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn lhbr_forces_strict_order() {
        let mut config = SolverConfig::default();
        config.strict_propagation_order = false;
        config.lazy_hyper_binary = true;
        assert!(config.strict_order());
        config.lazy_hyper_binary = false;
        assert!(!config.strict_order());
    }
}
