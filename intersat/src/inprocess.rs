//! Bounded inprocessing interleaved with search.
//!
//! Once enough search propagations have happened, the solver returns to
//! decision level 0 and runs a sequence of budgeted best-effort passes:
//! failed literal probing (with lifting), backward subsumption with
//! self-subsuming resolution, and bounded variable elimination. Each pass
//! polls the interrupt callback before starting and stops when its own
//! budget is spent, leaving the solver in a consistent state.
pub mod elim;
pub mod occur;
pub mod probe;
pub mod subsume;

use partial_ref::{partial, PartialRef};

use log::info;

use crate::clause::gc::collect_garbage;
use crate::context::{parts::*, Context};
use crate::prop::{full_restart, propagate};
use crate::simplify::{prove_units, simplify};
use crate::state::SatState;

use occur::OccLists;

/// Inprocessing state kept across passes.
#[derive(Default)]
pub struct Inprocess {
    /// Propagation count at the end of the last inprocessing run.
    last_propagations: u64,
    /// Completed probing rounds; the first round orders candidates
    /// differently.
    probe_rounds: u64,
    /// Occurrence lists over long clauses, only populated while an
    /// inprocessing run is active.
    occ: OccLists,
    /// Inprocessing runs performed.
    runs: u64,
}

impl Inprocess {
    /// Inprocessing runs performed.
    pub fn runs(&self) -> u64 {
        self.runs
    }
}

/// Whether enough search propagations have happened since the last run.
pub fn inprocess_due<'a>(
    mut ctx: partial!(Context<'a>, InprocessP, LimitsP<'a>, SolverConfigP),
) -> bool {
    let interval = ctx.part(SolverConfigP).inprocess_interval;
    let spent = ctx.part(LimitsP).propagations - ctx.part(InprocessP).last_propagations;
    spent >= interval
}

/// Run one full inprocessing pass at decision level 0.
pub fn inprocess<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ElimHistoryP,
        mut ImplGraphP,
        mut InprocessP,
        mut LimitsP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    full_restart(ctx.borrow());

    probe::probe(ctx.borrow());

    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        finish(ctx.borrow());
        return;
    }

    // Clean the long clauses against the units found by probing before the
    // occurrence lists are built.
    if propagate(ctx.borrow()).is_err() {
        // Probing propagates each unit it finds, so a leftover conflict at
        // level 0 cannot happen; be defensive anyway.
        ctx.part_mut(TraceP).learned(&[]);
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        finish(ctx.borrow());
        return;
    }
    if prove_units(ctx.borrow()) {
        simplify(ctx.borrow());
    }

    build_occurrence_lists(ctx.borrow());

    subsume::subsume_pass(ctx.borrow());

    if ctx.part(SolverStateP).sat_state == SatState::Unknown {
        elim::eliminate_pass(ctx.borrow());
    }

    ctx.part_mut(InprocessP).occ.clear();

    collect_garbage(ctx.borrow());

    finish(ctx.borrow());
}

/// Delete a long clause, dropping it from the occurrence lists as well.
fn delete_long_with_occ<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut InprocessP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut WatchlistsP,
    ),
    cref: crate::clause::ClauseRef,
) {
    let (inprocess, mut ctx) = ctx.split_part_mut(InprocessP);
    for &lit in ctx.part(ClauseAllocP).lits(cref) {
        inprocess.occ.remove(lit, cref);
    }
    crate::clause::reduce::delete_long_clause(ctx.borrow(), cref);
}

/// Populate the occurrence lists from the live long clauses.
fn build_occurrence_lists(
    mut ctx: partial!(Context, mut InprocessP, AssignmentP, ClauseAllocP, ClauseDbP),
) {
    let (inprocess, mut ctx) = ctx.split_part_mut(InprocessP);
    let (db, mut ctx) = ctx.split_part(ClauseDbP);
    let alloc = ctx.part(ClauseAllocP);

    let var_count = ctx.part(AssignmentP).var_count();
    inprocess.occ.rebuild(var_count, db, alloc);
}

fn finish<'a>(mut ctx: partial!(Context<'a>, mut InprocessP, mut LimitsP<'a>)) {
    let propagations = ctx.part(LimitsP).propagations;
    let inprocess = ctx.part_mut(InprocessP);
    inprocess.last_propagations = propagations;
    inprocess.runs += 1;

    info!(
        "inprocess: run {} done at {} propagations",
        ctx.part(InprocessP).runs(),
        propagations
    );
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Build the occurrence lists outside of a full inprocessing run.
    pub(crate) fn prepare_occ(
        ctx: partial!(Context, mut InprocessP, AssignmentP, ClauseAllocP, ClauseDbP),
    ) {
        build_occurrence_lists(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::lits;

    use crate::context::set_var_count;
    use crate::load::load_clause;

    #[test]
    fn inprocessing_becomes_due_by_propagations() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);
        assert!(!inprocess_due(ctx.borrow()));

        let interval = ctx.part(SolverConfigP).inprocess_interval;
        ctx.part_mut(LimitsP).propagations = interval;
        assert!(inprocess_due(ctx.borrow()));
    }

    #[test]
    fn inprocess_run_keeps_solver_consistent() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 8);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 4]);
        load_clause(ctx.borrow(), &lits![1, 2, 3]);
        load_clause(ctx.borrow(), &lits![-1, 5]);
        load_clause(ctx.borrow(), &lits![-5, 6, 7]);

        inprocess(ctx.borrow());

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
        assert_eq!(ctx.part(InprocessP).runs(), 1);
        // The occurrence lists are pass-local.
        assert!(ctx.part(InprocessP).occ.is_empty());
    }
}
