//! Boolean satisfiability solver.
use std::io;

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use thiserror::Error;

use intersat_formula::{CnfFormula, Lit, Var};

use crate::cdcl::search_step;
use crate::config::SolverConfig;
use crate::context::{config_changed, ensure_var_count, parts::*, Context};
use crate::load::load_clause;
use crate::state::SatState;
use crate::trace::TraceSink;

/// Outcome of a [`solve`](Solver::solve) call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SolveResult {
    /// A model was found and can be queried with
    /// [`value`](Solver::value) or [`model`](Solver::model).
    Sat,
    /// No model exists; with assumptions, the failed subset can be queried
    /// with [`failed`](Solver::failed) or [`failed_core`](Solver::failed_core).
    Unsat,
    /// A budget ran out or the interrupt callback fired. The solver remains
    /// usable; a later call continues the search.
    Unknown,
}

/// Errors of the solver's public interface.
///
/// All of these indicate incorrect API usage, except for
/// [`InvalidConfig`](SolverError::InvalidConfig) which rejects the supplied
/// values and leaves the solver untouched. Usage errors poison the solver;
/// every subsequent operation fails.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("variable {0} was never created")]
    UnknownVariable(Var),
    #[error("variable {0} was eliminated and cannot be used anymore")]
    EliminatedVariable(Var),
    #[error("no model available, the last solve call did not return SAT")]
    NoModel,
    #[error("no failed assumption set available, the last solve call did not return UNSAT under assumptions")]
    NoFailedAssumptions,
    #[error("a trace sink must be installed before adding clauses")]
    TraceSinkAfterClauses,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("the solver was poisoned by an earlier usage error")]
    Poisoned,
}

/// A CDCL SAT solver with bounded inprocessing.
///
/// The `'a` lifetime covers the registered trace sink and interrupt
/// callback; use `Solver<'static>` when they are owned.
#[derive(Default)]
pub struct Solver<'a> {
    ctx: Box<Context<'a>>,
    /// Assumptions for the next `solve` call.
    pending_assumptions: Vec<Lit>,
}

impl<'a> Solver<'a> {
    /// Create a new solver without variables or clauses.
    pub fn new() -> Solver<'a> {
        Solver::default()
    }

    /// Create a fresh unassigned variable.
    pub fn new_var(&mut self) -> Var {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let var = ctx.part_mut(VariablesP).new_var();
        ensure_var_count(ctx.borrow());
        var
    }

    /// Add a clause over previously created variables.
    ///
    /// The empty clause makes the solver permanently unsatisfiable;
    /// tautological clauses are ignored.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Result<(), SolverError> {
        self.check_usable()?;
        for &lit in lits {
            self.check_var(lit.var())?;
        }

        let mut ctx = self.ctx.into_partial_ref_mut();
        load_clause(ctx.borrow(), lits);
        Ok(())
    }

    /// Add a whole formula, creating its variables as needed.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        {
            let mut ctx = self.ctx.into_partial_ref_mut();
            ctx.part_mut(VariablesP).ensure_count(formula.var_count());
            ensure_var_count(ctx.borrow());
        }
        for clause in formula.iter() {
            // Variables exist now, so this cannot fail on a healthy solver.
            let _ = self.add_clause(clause);
        }
    }

    /// Reads and adds a formula in DIMACS CNF format.
    ///
    /// Using this avoids creating a temporary [`CnfFormula`].
    pub fn add_dimacs_cnf(&mut self, input: impl io::Read) -> Result<(), anyhow::Error> {
        use intersat_dimacs::DimacsParser;
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = DimacsParser::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);

            self.add_formula(&parser.take_formula());
        }
        parser.eof()?;
        self.add_formula(&parser.take_formula());
        parser.check_header()?;

        log::info!(
            "parsed formula with {} variables and {} clauses",
            parser.var_count(),
            parser.clause_count()
        );

        Ok(())
    }

    /// Assume a literal for the next `solve` call.
    ///
    /// Assumptions accumulate until `solve` runs and are dropped
    /// afterwards.
    pub fn assume(&mut self, lit: Lit) -> Result<(), SolverError> {
        self.check_usable()?;
        self.check_var(lit.var())?;
        self.pending_assumptions.push(lit);
        Ok(())
    }

    /// Check the satisfiability of the current formula under the current
    /// assumptions.
    pub fn solve(&mut self) -> Result<SolveResult, SolverError> {
        self.check_usable()?;

        let pending = std::mem::replace(&mut self.pending_assumptions, vec![]);

        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(LimitsP).start_solve();
        crate::assumptions::set_assumptions(ctx.borrow(), &pending);

        loop {
            match ctx.part(SolverStateP).sat_state {
                SatState::Unknown => (),
                SatState::Sat => return Ok(SolveResult::Sat),
                SatState::Unsat | SatState::UnsatUnderAssumptions => {
                    return Ok(SolveResult::Unsat)
                }
            }
            if ctx.part_mut(LimitsP).should_stop() {
                return Ok(SolveResult::Unknown);
            }
            search_step(ctx.borrow());
        }
    }

    /// Model value of a literal after a SAT result.
    ///
    /// Eliminated variables are covered; the model is extended through the
    /// elimination history before it becomes visible.
    pub fn value(&mut self, lit: Lit) -> Result<Option<bool>, SolverError> {
        self.check_usable()?;
        let no_model = {
            let ctx = self.ctx.into_partial_ref();
            ctx.part(SolverStateP).sat_state != SatState::Sat
        };
        if no_model {
            self.poison();
            return Err(SolverError::NoModel);
        }

        let ctx = self.ctx.into_partial_ref();
        Ok(ctx.part(ModelP).lit_value(lit))
    }

    /// The model as a list of true literals after a SAT result.
    pub fn model(&self) -> Option<Vec<Lit>> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::Sat {
            Some(ctx.part(ModelP).lits())
        } else {
            None
        }
    }

    /// Whether an assumption is part of the failed assumption set after an
    /// UNSAT-under-assumptions result.
    pub fn failed(&mut self, lit: Lit) -> Result<bool, SolverError> {
        self.check_usable()?;
        let failed = {
            let ctx = self.ctx.into_partial_ref();
            if ctx.part(SolverStateP).sat_state != SatState::UnsatUnderAssumptions {
                None
            } else {
                Some(ctx.part(AssumptionsP).failed_core().contains(&lit))
            }
        };
        match failed {
            Some(failed) => Ok(failed),
            None => {
                self.poison();
                Err(SolverError::NoFailedAssumptions)
            }
        }
    }

    /// The failed assumption subset after an UNSAT-under-assumptions
    /// result.
    pub fn failed_core(&self) -> Option<Vec<Lit>> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::UnsatUnderAssumptions {
            Some(ctx.part(AssumptionsP).failed_core().to_vec())
        } else {
            None
        }
    }

    /// Limit the propagations and decisions of future `solve` calls.
    ///
    /// `None` removes the corresponding budget. A `solve` call that runs
    /// out of budget returns [`SolveResult::Unknown`] and can be resumed.
    pub fn set_budget(&mut self, propagations: Option<u64>, decisions: Option<u64>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(LimitsP).set_budget(propagations, decisions);
    }

    /// Install a callback polled at decision boundaries and before
    /// inprocessing passes; returning `true` stops the search with
    /// [`SolveResult::Unknown`].
    pub fn set_interrupt(&mut self, callback: impl FnMut() -> bool + 'a) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(LimitsP).set_interrupt(callback);
    }

    /// Remove the interrupt callback.
    pub fn clear_interrupt(&mut self) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(LimitsP).clear_interrupt();
    }

    /// Seed the random number generator driving decision jitter.
    ///
    /// Runs with the same formula, configuration and seed produce identical
    /// results.
    pub fn set_rng_seed(&mut self, seed: u64) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(RngP).set_seed(seed);
    }

    /// Install a sink receiving learned and deleted clause events.
    ///
    /// Must happen before the first clause is added, so the sink observes
    /// every derivation.
    pub fn set_trace_sink(&mut self, sink: impl TraceSink + 'a) -> Result<(), SolverError> {
        self.check_usable()?;
        let mut ctx = self.ctx.into_partial_ref_mut();
        if ctx.part(SolverStateP).clauses_added {
            ctx.part_mut(SolverStateP).poisoned = true;
            return Err(SolverError::TraceSinkAfterClauses);
        }
        ctx.part_mut(TraceP).set_sink(sink);
        Ok(())
    }

    /// Pin the decision phase of a variable.
    pub fn set_pinned_phase(&mut self, var: Var, phase: Option<bool>) -> Result<(), SolverError> {
        self.check_usable()?;
        self.check_var(var)?;
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(VariablesP).var_data_mut(var).pinned_phase = phase;
        Ok(())
    }

    /// Replace the solver configuration.
    pub fn set_config(&mut self, config: SolverConfig) -> Result<(), SolverError> {
        self.check_usable()?;
        config
            .validate()
            .map_err(SolverError::InvalidConfig)?;
        let mut ctx = self.ctx.into_partial_ref_mut();
        *ctx.part_mut(SolverConfigP) = config;
        config_changed(ctx.borrow());
        Ok(())
    }

    /// Cumulative propagation, decision and conflict counts.
    pub fn stats(&self) -> (u64, u64, u64) {
        let ctx = self.ctx.into_partial_ref();
        let limits = ctx.part(LimitsP);
        (limits.propagations, limits.decisions, limits.conflicts)
    }

    fn check_usable(&mut self) -> Result<(), SolverError> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).poisoned {
            return Err(SolverError::Poisoned);
        }
        Ok(())
    }

    fn check_var(&mut self, var: Var) -> Result<(), SolverError> {
        let error = {
            let ctx = self.ctx.into_partial_ref();
            if !ctx.part(VariablesP).exists(var) {
                Some(SolverError::UnknownVariable(var))
            } else if ctx.part(VariablesP).var_data(var).eliminated {
                Some(SolverError::EliminatedVariable(var))
            } else {
                None
            }
        };
        match error {
            Some(error) => {
                self.poison();
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn poison(&mut self) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(SolverStateP).poisoned = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use intersat_formula::{cnf_formula, lits};

    use intersat_formula::test::{sat_formula, sgen_unsat_formula};

    #[test]
    fn empty_formula_is_sat() {
        let mut solver = Solver::new();
        assert_eq!(solver.solve().unwrap(), SolveResult::Sat);
    }

    #[test]
    fn unknown_variables_poison_the_solver() {
        let mut solver = Solver::new();
        let var = solver.new_var();
        assert!(solver.add_clause(&[var.positive()]).is_ok());

        let missing = Var::from_index(10);
        assert!(matches!(
            solver.add_clause(&[missing.positive()]),
            Err(SolverError::UnknownVariable(_))
        ));
        assert!(matches!(solver.solve(), Err(SolverError::Poisoned)));
    }

    #[test]
    fn value_before_sat_is_a_usage_error() {
        let mut solver = Solver::new();
        let var = solver.new_var();
        assert!(matches!(
            solver.value(var.positive()),
            Err(SolverError::NoModel)
        ));
        assert!(matches!(solver.solve(), Err(SolverError::Poisoned)));
    }

    #[test]
    fn budget_returns_unknown_and_can_resume() {
        let mut solver = Solver::new();
        solver.add_formula(&cnf_formula![
            1, 2, 3;
            -1, -2;
            -1, -3;
            -2, -3;
            1, 2;
        ]);

        solver.set_budget(Some(1), None);
        assert_eq!(solver.solve().unwrap(), SolveResult::Unknown);

        solver.set_budget(None, None);
        assert_eq!(solver.solve().unwrap(), SolveResult::Sat);
    }

    #[test]
    fn interrupt_stops_the_search() {
        let mut solver = Solver::new();
        solver.add_formula(&cnf_formula![
            1, 2;
            -1, 2;
        ]);
        solver.set_interrupt(|| true);
        assert_eq!(solver.solve().unwrap(), SolveResult::Unknown);

        solver.clear_interrupt();
        assert_eq!(solver.solve().unwrap(), SolveResult::Sat);
        assert_eq!(solver.value(lits![2][0]).unwrap(), Some(true));
    }

    #[test]
    fn assumptions_are_per_call() {
        let mut solver = Solver::new();
        solver.add_formula(&cnf_formula![
            1, 2;
            -1, 2;
        ]);

        let not_two = lits![-2][0];
        solver.assume(not_two).unwrap();
        assert_eq!(solver.solve().unwrap(), SolveResult::Unsat);
        assert!(solver.failed(not_two).unwrap());
        assert_eq!(solver.failed_core().unwrap(), vec![not_two]);

        // The assumption is gone for the next call.
        assert_eq!(solver.solve().unwrap(), SolveResult::Sat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);
            prop_assert_eq!(solver.solve().unwrap(), SolveResult::Unsat);
        }

        #[test]
        fn sat_with_model(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);
            prop_assert_eq!(solver.solve().unwrap(), SolveResult::Sat);

            let model = solver.model().unwrap();
            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sat_with_eager_inprocessing(
            formula in sat_formula(10..30usize, 30..150usize, 0.05..0.2, 0.5..1.0)
        ) {
            let mut config = SolverConfig::default();
            config.inprocess_interval = 50;
            config.probe_budget = 10_000;

            let mut solver = Solver::new();
            solver.set_config(config).unwrap();
            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve().unwrap(), SolveResult::Sat);

            // The model is extended through any eliminated variables and
            // must satisfy every original clause.
            let model = solver.model().unwrap();
            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sgen_unsat_with_eager_inprocessing(formula in sgen_unsat_formula(1..5usize)) {
            let mut config = SolverConfig::default();
            config.inprocess_interval = 50;

            let mut solver = Solver::new();
            solver.set_config(config).unwrap();
            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve().unwrap(), SolveResult::Unsat);
        }
    }
}
