//! Backward subsumption and self-subsuming resolution.
//!
//! A clause `C` subsumes `D` when every literal of `C` occurs in `D`; `D`
//! is then redundant and removed. When all but one literal of `C` occur in
//! `D` and that one occurs negated, resolving the two strengthens `D` by
//! removing the negated literal.
//!
//! The pass works backwards: for each candidate clause it scans the
//! occurrence lists of its rarest variable for clauses it subsumes or
//! strengthens. Implicit binary clauses participate as subsuming clauses
//! through a separate sweep over the watch lists. The clause abstraction
//! rejects most non-candidates without touching their literals.
use partial_ref::{partial, PartialRef};

use intersat_formula::Lit;

use crate::clause::{clause_abstraction, db, lit_abstraction, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::Watch;
use crate::state::SatState;

/// Result of a subsumption test.
enum Subsumes {
    No,
    Exact,
    /// The subsuming clause contains this literal negated in the subsumed
    /// clause; resolving removes it.
    LitSign(Lit),
}

/// Test whether `c` subsumes `d`, allowing one flipped literal.
fn subsumes(c: &[Lit], c_abstraction: u32, d: &[Lit], d_abstraction: u32) -> Subsumes {
    if d.len() < c.len() || (c_abstraction & !d_abstraction) != 0 {
        return Subsumes::No;
    }

    let mut result = Subsumes::Exact;
    for &lit in c {
        let mut found = false;
        for &other in d {
            if lit == other {
                found = true;
                break;
            } else if lit == !other {
                if let Subsumes::Exact = result {
                    result = Subsumes::LitSign(lit);
                    found = true;
                    break;
                } else {
                    return Subsumes::No;
                }
            }
        }
        if !found {
            return Subsumes::No;
        }
    }

    result
}

/// Run one subsumption pass over the long clauses.
pub fn subsume_pass<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut InprocessP,
        mut LimitsP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    if ctx.part_mut(LimitsP).interrupted() {
        return;
    }

    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let mut steps = ctx.part(SolverConfigP).subsume_budget;

    let mut subsumed = 0u64;
    let mut strengthened = 0u64;

    binary_sweep(ctx.borrow(), &mut steps, &mut subsumed, &mut strengthened);

    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        return;
    }

    // Backward subsumption between long clauses, oldest first.
    let queue: Vec<ClauseRef> = ctx.part(ClauseDbP).clauses.clone();
    let mut at = 0;

    while at < queue.len() && steps > 0 {
        let cref = queue[at];
        at += 1;

        if ctx.part(ClauseAllocP).header(cref).deleted() {
            continue;
        }

        // Scan the occurrence lists of the rarest literal of the clause.
        let best = {
            let lits = ctx.part(ClauseAllocP).lits(cref);
            let occ = &ctx.part(InprocessP).occ;
            let mut best = lits[0];
            for &lit in &lits[1..] {
                if occ.count(lit) + occ.count(!lit) < occ.count(best) + occ.count(!best) {
                    best = lit;
                }
            }
            best
        };

        for &probe in [best, !best].iter() {
            let mut candidate_at = 0;
            loop {
                if ctx.part(ClauseAllocP).header(cref).deleted() {
                    break;
                }
                let other = match ctx.part(InprocessP).occ.lookup(probe).get(candidate_at) {
                    Some(&other) => other,
                    None => break,
                };
                candidate_at += 1;

                if other == cref || ctx.part(ClauseAllocP).header(other).deleted() {
                    continue;
                }

                steps = steps.saturating_sub(1);

                let verdict = {
                    let alloc = ctx.part(ClauseAllocP);
                    subsumes(
                        alloc.lits(cref),
                        alloc.header(cref).abstraction(),
                        alloc.lits(other),
                        alloc.header(other).abstraction(),
                    )
                };

                match verdict {
                    Subsumes::No => (),
                    Subsumes::Exact => {
                        subsumed += 1;
                        // The survivor inherits the subsumed clause's
                        // irredundant status.
                        if !ctx.part(ClauseAllocP).header(other).redundant() {
                            db::make_irredundant(ctx.borrow(), cref);
                        }
                        super::delete_long_with_occ(ctx.borrow(), other);
                    }
                    Subsumes::LitSign(lit) => {
                        strengthened += 1;
                        strengthen_clause(ctx.borrow(), other, !lit);
                        // The strengthened clause may have left the
                        // occurrence list we are scanning.
                        candidate_at = candidate_at.min(ctx.part(InprocessP).occ.count(probe));
                    }
                }

                if steps == 0 {
                    break;
                }
            }
        }
    }

    log::info!(
        "subsume: {} subsumed, {} strengthened",
        subsumed,
        strengthened
    );
}

/// Let implicit binary clauses subsume and strengthen long clauses.
fn binary_sweep<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut InprocessP,
        mut LimitsP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    steps: &mut u64,
    subsumed: &mut u64,
    strengthened: &mut u64,
) {
    let var_count = ctx.part(AssignmentP).var_count();

    for code in 0..var_count * 2 {
        if *steps == 0 {
            return;
        }

        let a = Lit::from_code(code);

        let mut entry_at = 0;
        loop {
            let (b, redundant) = {
                let watches = ctx.part(WatchlistsP).watched_by(a);
                match watches.get(entry_at) {
                    None => break,
                    Some(&Watch::Binary { implied, redundant }) => (implied, redundant),
                    Some(_) => {
                        entry_at += 1;
                        continue;
                    }
                }
            };
            entry_at += 1;

            // Each binary clause is stored from both sides; handle it once.
            if a.code() > b.code() {
                continue;
            }

            let binary = [a, b];
            let binary_abstraction = lit_abstraction(a) | lit_abstraction(b);

            // Clauses containing `a`: subsumed if they also contain `b`,
            // strengthened if they contain `!b` (and vice versa).
            for &(probe, partner) in [(a, b), (b, a)].iter() {
                let mut candidate_at = 0;
                loop {
                    let other = match ctx.part(InprocessP).occ.lookup(probe).get(candidate_at) {
                        Some(&other) => other,
                        None => break,
                    };
                    candidate_at += 1;

                    if ctx.part(ClauseAllocP).header(other).deleted() {
                        continue;
                    }

                    *steps = steps.saturating_sub(1);

                    let verdict = {
                        let alloc = ctx.part(ClauseAllocP);
                        subsumes(
                            &binary,
                            binary_abstraction,
                            alloc.lits(other),
                            alloc.header(other).abstraction(),
                        )
                    };

                    match verdict {
                        Subsumes::No => (),
                        Subsumes::Exact => {
                            // Deleting an irredundant clause would require
                            // promoting the implicit binary; keep both in
                            // that case.
                            if redundant && !ctx.part(ClauseAllocP).header(other).redundant() {
                                continue;
                            }
                            *subsumed += 1;
                            super::delete_long_with_occ(ctx.borrow(), other);
                        }
                        Subsumes::LitSign(lit) if lit == partner => {
                            *strengthened += 1;
                            strengthen_clause(ctx.borrow(), other, !lit);
                            candidate_at =
                                candidate_at.min(ctx.part(InprocessP).occ.count(probe));
                        }
                        Subsumes::LitSign(_) => (),
                    }

                    if *steps == 0 {
                        return;
                    }
                }
            }
        }
    }
}

/// Remove a single literal from a long clause.
///
/// The clause is rewritten in place or migrates to the inline
/// representation when it gets short enough. Runs at decision level 0 with
/// the clause's remaining literals unassigned.
pub(super) fn strengthen_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut InprocessP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
    remove: Lit,
) {
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp.lits.clear();
    tmp.lits
        .extend_from_slice(ctx.part(ClauseAllocP).lits(cref));

    let new_lits = &mut tmp.lits_2;
    new_lits.clear();
    new_lits.extend(tmp.lits.iter().cloned().filter(|&lit| lit != remove));

    debug_assert!(new_lits.len() + 1 == tmp.lits.len());

    ctx.part_mut(TraceP).learned(new_lits);
    ctx.part_mut(TraceP).deleted(&tmp.lits);

    ctx.part_mut(InprocessP).occ.remove(remove, cref);

    let redundant = ctx.part(ClauseAllocP).header(cref).redundant();

    if new_lits.len() >= 4 {
        let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
        watchlists.unwatch_long(tmp.lits[0], cref);
        watchlists.unwatch_long(tmp.lits[1], cref);

        {
            let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
            clause.lits_mut()[..new_lits.len()].copy_from_slice(new_lits);
            let header = clause.header_mut();
            header.set_len(new_lits.len());
            header.set_abstraction(clause_abstraction(new_lits));
        }
        ctx.part_mut(ClauseDbP).garbage_size += 1;

        watchlists.watch_long(cref, [new_lits[0], new_lits[1]]);
        return;
    }

    // The clause leaves the arena.
    {
        let (inprocess, mut ctx) = ctx.split_part_mut(InprocessP);
        for &lit in new_lits.iter() {
            inprocess.occ.remove(lit, cref);
        }
        let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
        watchlists.unwatch_long(tmp.lits[0], cref);
        watchlists.unwatch_long(tmp.lits[1], cref);
        db::delete_clause(ctx.borrow(), cref);

        match new_lits[..] {
            [lit_0, lit_1, lit_2] => watchlists.watch_ternary([lit_0, lit_1, lit_2], redundant),
            [lit_0, lit_1] => watchlists.watch_binary([lit_0, lit_1], redundant),
            _ => unreachable!("strengthening keeps at least two literals"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::lits;

    use crate::context::set_var_count;
    use crate::inprocess::tests_support::prepare_occ;
    use crate::load::load_clause;

    #[test]
    fn duplicate_long_clause_is_subsumed() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 8);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 4]);
        load_clause(ctx.borrow(), &lits![1, 2, 3, 4, 5]);

        prepare_occ(ctx.borrow());
        subsume_pass(ctx.borrow());

        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 1);
        let cref = ctx.part(ClauseDbP).clauses[0];
        assert_eq!(ctx.part(ClauseAllocP).lits(cref), &lits![1, 2, 3, 4]);
    }

    #[test]
    fn self_subsumption_strengthens() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 8);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 4]);
        load_clause(ctx.borrow(), &lits![-1, 2, 3, 4, 5]);

        prepare_occ(ctx.borrow());
        subsume_pass(ctx.borrow());

        // The second clause loses its -1.
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 2);
        let cref = ctx.part(ClauseDbP).clauses[1];
        assert_eq!(ctx.part(ClauseAllocP).lits(cref), &lits![2, 3, 4, 5]);
    }

    #[test]
    fn binary_strengthens_long_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 8);

        load_clause(ctx.borrow(), &lits![1, 2]);
        load_clause(ctx.borrow(), &lits![1, -2, 3, 4]);

        prepare_occ(ctx.borrow());
        subsume_pass(ctx.borrow());

        // Resolving (1 2) with (1 -2 3 4) drops the -2.
        assert_eq!(ctx.part(WatchlistsP).ternary_count(), 1);
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 0);
    }
}
