//! The conflict driven clause learning loop.
use partial_ref::{partial, PartialRef};

use crate::analyze::analyze_conflict;
use crate::assumptions::{enqueue_assumption, EnqueueAssumption};
use crate::clause::activity::{bump_clause_activity, decay_clause_activities};
use crate::clause::reduce::{reduce_due, reduce_learned};
use crate::clause::{db, ClauseHeader, ClauseRef};
use crate::context::{parts::*, Context};
use crate::decision::make_decision;
use crate::inprocess::{inprocess, inprocess_due};
use crate::model::reconstruct_model;
use crate::prop::{backtrack, enqueue_assignment, propagate, Conflict, Reason};
use crate::schedule::{maybe_restart, on_conflict, restart_due};
use crate::simplify::{prove_units, simplify};
use crate::state::SatState;

/// Perform one step of the search.
///
/// A step propagates to a fixpoint and then performs exactly one of:
/// conflict handling, assumption installation, a restart, a clause database
/// reduction, an inprocessing pass or a decision. The caller loops over this
/// until the solver state leaves `Unknown` or a budget runs out; every
/// return is a safe point for interruption.
pub fn search_step<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ElimHistoryP,
        mut ImplGraphP,
        mut InprocessP,
        mut LimitsP<'a>,
        mut ModelP,
        mut ReduceP,
        mut RngP,
        mut ScheduleP,
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
    match propagate(ctx.borrow()) {
        Err(conflict) => handle_conflict(ctx.borrow(), conflict),
        Ok(()) => {
            if prove_units(ctx.borrow()) {
                simplify(ctx.borrow());
            }

            match enqueue_assumption(ctx.borrow()) {
                EnqueueAssumption::Conflict => {
                    ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
                }
                EnqueueAssumption::Enqueued => (),
                EnqueueAssumption::Done => {
                    if restart_due(ctx.borrow()) {
                        maybe_restart(ctx.borrow());
                    } else if reduce_due(ctx.borrow()) {
                        reduce_learned(ctx.borrow());
                    } else if inprocess_due(ctx.borrow()) {
                        inprocess(ctx.borrow());
                    } else if !make_decision(ctx.borrow()) {
                        reconstruct_model(ctx.borrow());
                    }
                }
            }
        }
    }
}

/// Learn from a conflict and backjump.
fn handle_conflict<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut LimitsP<'a>,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    conflict: Conflict,
) {
    on_conflict(ctx.borrow());
    ctx.part_mut(LimitsP).conflicts += 1;

    if ctx.part(TrailP).current_level() == 0 {
        ctx.part_mut(TraceP).learned(&[]);
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return;
    }

    let backtrack_to = analyze_conflict(ctx.borrow(), conflict);

    let glue = ctx.part(AnalyzeConflictP).glue();
    let (analyze, mut ctx) = ctx.split_part(AnalyzeConflictP);

    for &cref in analyze.involved() {
        bump_clause_activity(ctx.borrow(), cref);
        refresh_glue(ctx.borrow(), cref);
    }

    decay_clause_activities(ctx.borrow());

    backtrack(ctx.borrow(), backtrack_to);

    let clause = analyze.clause();

    ctx.part_mut(TraceP).learned(clause);

    let reason = match *clause {
        [] => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return;
        }
        [_] => Reason::Unit,
        [_, lit_1] => {
            ctx.part_mut(WatchlistsP)
                .watch_binary([clause[0], lit_1], true);
            Reason::Binary([lit_1])
        }
        [_, lit_1, lit_2] => {
            ctx.part_mut(WatchlistsP)
                .watch_ternary([clause[0], lit_1, lit_2], true);
            Reason::Ternary([lit_1, lit_2])
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_redundant(true);
            // The glue computed during the conflict counts the conflict
            // level, which the asserting clause leaves behind.
            header.set_glue(glue.saturating_sub(1).max(1));
            let cref = db::add_clause(ctx.borrow(), header, clause);
            ctx.part_mut(WatchlistsP)
                .watch_long(cref, [clause[0], clause[1]]);
            Reason::Long(cref)
        }
    };

    enqueue_assignment(ctx.borrow(), clause[0], reason);
}

/// Recompute the glue of a clause involved in a conflict.
///
/// All literals of such a clause are assigned. A drop below the protected
/// threshold makes the clause permanently exempt from reduction.
fn refresh_glue(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut TmpDataP,
        ImplGraphP,
        SolverConfigP,
    ),
    cref: ClauseRef,
) {
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    let impl_graph = ctx.part(ImplGraphP);

    if !alloc.header(cref).redundant() {
        return;
    }

    let flags = &mut tmp.flags;
    let lits = alloc.clause(cref).lits();

    let mut glue = 0;
    for &lit in lits {
        let level = impl_graph.level(lit.var());
        if !flags[level] {
            flags[level] = true;
            glue += 1;
        }
    }
    for &lit in lits {
        flags[impl_graph.level(lit.var())] = false;
    }

    let header = alloc.header_mut(cref);
    if glue < header.glue() {
        header.set_glue(glue);
        if glue <= ctx.part(SolverConfigP).reduce_protected_glue as usize {
            header.set_protected(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::{cnf_formula, test::*};

    use crate::context::set_var_count;
    use crate::load::load_clause;

    macro_rules! run_search {
        ($ctx:expr) => {
            while $ctx.part(SolverStateP).sat_state == SatState::Unknown {
                search_step($ctx.borrow());
            }
        };
    }

    #[test]
    fn level_0_unsat() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1, 2, 3;
            -1;
            1, -2;
            2, -3;
        ];

        set_var_count(ctx.borrow(), formula.var_count());

        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        run_search!(ctx);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }

            run_search!(ctx);

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }

            run_search!(ctx);

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Sat);

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|&lit| ctx.part(ModelP).lit_is_true(lit)));
            }
        }

        #[test]
        fn sgen_unsat_incremental_clauses(formula in sgen_unsat_formula(1..7usize)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            let mut last_state = SatState::Sat;

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
                run_search!(ctx);

                if ctx.part(SolverStateP).sat_state != last_state {
                    prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
                    prop_assert_eq!(last_state, SatState::Sat);
                    last_state = ctx.part(SolverStateP).sat_state;
                }
            }

            prop_assert_eq!(last_state, SatState::Unsat);
        }
    }
}
