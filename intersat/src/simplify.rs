//! Simplification using top-level assignments.
use partial_ref::{partial, PartialRef};

use crate::clause::{clause_abstraction, ClauseRef};
use crate::context::{parts::*, Context};

/// Turn fully propagated top-level assignments into unit clauses.
///
/// The assignments stay in effect, but are removed from the trail and lose
/// their reasons, so conflict analysis and clause shrinking treat them like
/// unit clauses. Returns whether any new unit was found.
pub fn prove_units(mut ctx: partial!(Context, mut ImplGraphP, mut TrailP)) -> bool {
    if ctx.part(TrailP).current_level() != 0 {
        return false;
    }

    debug_assert!(ctx.part(TrailP).fully_propagated());

    let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
    let trail = ctx.part_mut(TrailP);

    let mut new_unit = false;
    for &lit in trail.trail() {
        impl_graph.update_removed_unit(lit.var());
        new_unit = true;
    }

    trail.clear();

    new_unit
}

/// Remove satisfied long clauses and false literals within long clauses.
///
/// Called at decision level 0 after new units were proven. Clauses that
/// shrink to three or fewer literals migrate to their inline
/// representation. Every removal and rewrite is reported to the trace sink.
pub fn simplify<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut WatchlistsP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let live_clauses: Vec<ClauseRef> = ctx.part(ClauseDbP).clauses.clone();

    for cref in live_clauses {
        if ctx.part(ClauseAllocP).header(cref).deleted() {
            continue;
        }

        let mut satisfied = false;
        let mut false_count = 0;
        {
            let assignment = ctx.part(AssignmentP);
            for &lit in ctx.part(ClauseAllocP).lits(cref) {
                match assignment.lit_value(lit) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => false_count += 1,
                    None => (),
                }
            }
        }

        if satisfied {
            crate::clause::reduce::delete_long_clause(ctx.borrow(), cref);
            continue;
        }

        if false_count == 0 {
            continue;
        }

        shrink_clause(ctx.borrow(), cref);
    }
}

/// Rewrite a long clause that contains top-level false literals.
fn shrink_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
) {
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp.lits.clear();
    tmp.lits
        .extend_from_slice(ctx.part(ClauseAllocP).lits(cref));

    let new_lits = &mut tmp.lits_2;
    new_lits.clear();
    for &lit in tmp.lits.iter() {
        if ctx.part(AssignmentP).lit_value(lit) == None {
            new_lits.push(lit);
        }
    }

    // An empty or unit result is impossible after full propagation: the
    // clause would have been conflicting or satisfied.
    debug_assert!(new_lits.len() >= 2);

    ctx.part_mut(TraceP).learned(new_lits);
    ctx.part_mut(TraceP).deleted(&tmp.lits);

    let redundant = ctx.part(ClauseAllocP).header(cref).redundant();

    if new_lits.len() >= 4 {
        // Shrink in place; the watches move to the first two remaining
        // literals.
        let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
        watchlists.unwatch_long(tmp.lits[0], cref);
        watchlists.unwatch_long(tmp.lits[1], cref);

        let removed = tmp.lits.len() - new_lits.len();
        {
            let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
            clause.lits_mut()[..new_lits.len()].copy_from_slice(new_lits);
            let header = clause.header_mut();
            header.set_len(new_lits.len());
            header.set_abstraction(clause_abstraction(new_lits));
        }
        ctx.part_mut(ClauseDbP).garbage_size += removed;

        watchlists.watch_long(cref, [new_lits[0], new_lits[1]]);
    } else {
        // The clause leaves the arena for the inline representation.
        let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
        watchlists.unwatch_long(tmp.lits[0], cref);
        watchlists.unwatch_long(tmp.lits[1], cref);
        crate::clause::db::delete_clause(ctx.borrow(), cref);

        match new_lits.len() {
            2 => watchlists.watch_binary([new_lits[0], new_lits[1]], redundant),
            _ => watchlists.watch_ternary([new_lits[0], new_lits[1], new_lits[2]], redundant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::lits;

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::propagate;

    #[test]
    fn satisfied_clauses_are_removed() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 4]);
        load_clause(ctx.borrow(), &lits![2]);

        propagate(ctx.borrow()).unwrap();
        assert!(prove_units(ctx.borrow()));
        simplify(ctx.borrow());

        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 0);
    }

    #[test]
    fn false_literals_are_dropped() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 4, 5]);
        load_clause(ctx.borrow(), &lits![-5]);

        propagate(ctx.borrow()).unwrap();
        assert!(prove_units(ctx.borrow()));
        simplify(ctx.borrow());

        // Still long, now with four literals.
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 1);
        let cref = ctx.part(ClauseDbP).clauses[0];
        assert_eq!(ctx.part(ClauseAllocP).lits(cref), &lits![1, 2, 3, 4]);
    }

    #[test]
    fn shrinking_to_ternary_leaves_the_arena() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 4]);
        load_clause(ctx.borrow(), &lits![-4]);

        propagate(ctx.borrow()).unwrap();
        assert!(prove_units(ctx.borrow()));
        simplify(ctx.borrow());

        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 0);
        assert_eq!(ctx.part(WatchlistsP).ternary_count(), 1);
    }
}
