//! Unit propagation.
pub mod assignment;
pub mod graph;
pub mod watch;

mod long;
mod short;

pub use assignment::{backtrack, enqueue_assignment, full_restart, restart, Assignment, Trail};
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use watch::{Watch, Watchlists};

use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};

/// Propagate all enqueued assignments to a fixpoint.
///
/// Returns the conflicting clause if propagation found one. When this
/// returns without conflict every literal implied by unit propagation from
/// the current assignment is on the trail and all watch invariants hold.
///
/// In the strict order mode all binary and ternary watches of a literal are
/// processed before its long watches; lazy hyper-binary resolution relies on
/// this. The mixed mode walks each watch list once, which is faster.
pub fn propagate<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut LimitsP<'a>,
        mut TraceP<'a>,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Result<(), Conflict> {
    let strict = ctx.part(SolverConfigP).strict_order();

    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        ctx.part_mut(LimitsP).propagations += 1;

        if strict {
            short::propagate_short(ctx.borrow(), lit)?;
            long::propagate_long(ctx.borrow(), lit, false)?;
        } else {
            long::propagate_long(ctx.borrow(), lit, true)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::{cnf_formula, lits};

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::state::SatState;

    #[test]
    fn propagates_a_unit_chain_at_level_zero() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1;
            -1, 2;
            -2, 3;
            -3, 4;
        ];

        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        assert!(propagate(ctx.borrow()).is_ok());

        assert_eq!(ctx.part(TrailP).trail().len(), 4);
        assert_eq!(ctx.part(TrailP).current_level(), 0);
        for index in 0..4 {
            assert!(ctx
                .part(AssignmentP)
                .lit_is_true(intersat_formula::Var::from_index(index).positive()));
        }
    }

    #[test]
    fn propagates_through_long_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            -1, -2, -3, 4;
            1, 2, 3, 4, 5;
        ];

        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        for lit in lits![1, 2, 3].iter() {
            enqueue_assignment(ctx.borrow(), *lit, Reason::Unit);
        }

        assert!(propagate(ctx.borrow()).is_ok());
        assert!(ctx.part(AssignmentP).lit_is_true(intersat_formula::lit!(4)));
    }

    #[test]
    fn reports_conflicts_in_short_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            -1, 2;
            -1, -2;
        ];

        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), intersat_formula::lit!(1), Reason::Unit);

        let result = propagate(ctx.borrow());
        assert!(result.is_err());
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }
}
