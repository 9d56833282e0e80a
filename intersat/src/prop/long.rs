//! Propagation of long clauses.
use partial_ref::{partial, PartialRef};

use intersat_formula::Lit;

use crate::context::{parts::*, Context};

use super::enqueue_assignment;
use super::short::{propagate_binary, propagate_ternary};
use super::{Conflict, Reason, Watch};

/// Propagate all long clauses watching the given literal.
///
/// `lit` is the literal that was assigned true. With `include_short` the
/// sweep also evaluates binary and ternary entries, giving the mixed
/// propagation order; otherwise those entries are copied through untouched
/// and have to be handled by [`propagate_short`](super::short::propagate_short)
/// beforehand.
///
/// Watch entries whose watched literal moves to another literal of the
/// clause migrate to that literal's list; the remaining entries are
/// compacted in place. On conflict the unprocessed tail is preserved before
/// returning.
///
/// When lazy hyper-binary resolution is enabled and a clause propagates
/// while all its other literals were forced through binary clauses sharing a
/// single antecedent, the implied binary clause is learned and used as the
/// reason instead of the long clause.
pub fn propagate_long<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TraceP<'a>,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    lit: Lit,
    include_short: bool,
) -> Result<(), Conflict> {
    let lhbr = ctx.part(SolverConfigP).lazy_hyper_binary;
    let false_lit = !lit;

    // Binary clauses found by hyper-binary resolution are attached after the
    // sweep; attaching them right away could grow the list under our feet.
    let mut hyper_binaries: Vec<[Lit; 2]> = vec![];

    let result = long_sweep(
        ctx.borrow(),
        false_lit,
        include_short,
        lhbr,
        &mut hyper_binaries,
    );

    for &lits in hyper_binaries.iter() {
        ctx.part_mut(TraceP).learned(&lits);
        ctx.part_mut(WatchlistsP).watch_binary(lits, true);
    }

    result
}

fn long_sweep<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    false_lit: Lit,
    include_short: bool,
    lhbr: bool,
    hyper_binaries: &mut Vec<[Lit; 2]>,
) -> Result<(), Conflict> {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    let mut read = 0;
    let mut write = 0;

    'watches: loop {
        let list = watchlists.watched_by_mut(false_lit);
        if read >= list.len() {
            list.truncate(write);
            break;
        }
        let watch = list[read];
        read += 1;

        let (cref, blocker) = match watch {
            Watch::Binary { implied, .. } => {
                list[write] = watch;
                write += 1;
                if include_short {
                    if let Err(conflict) = propagate_binary(ctx.borrow(), false_lit, implied) {
                        finish_sweep(watchlists, false_lit, read, write);
                        return Err(conflict);
                    }
                }
                continue;
            }
            Watch::Ternary { other, .. } => {
                list[write] = watch;
                write += 1;
                if include_short {
                    if let Err(conflict) = propagate_ternary(ctx.borrow(), false_lit, other) {
                        finish_sweep(watchlists, false_lit, read, write);
                        return Err(conflict);
                    }
                }
                continue;
            }
            Watch::Long { cref, blocker } => (cref, blocker),
        };

        // If the blocking literal (which is part of the watched clause) is
        // already true, the clause is satisfied and we don't even have to
        // look at it.
        if ctx.part(AssignmentP).lit_is_true(blocker) {
            let list = watchlists.watched_by_mut(false_lit);
            list[write] = watch;
            write += 1;
            continue;
        }

        let lits = alloc.clause_mut(cref).lits_mut();

        // Make sure the literal we are propagating is in position 1. This
        // establishes the order expected should the clause become
        // propagating, with the implied literal in position 0.
        if lits[0] == false_lit {
            lits.swap(0, 1);
        }
        let first = lits[0];

        // The other watched literal makes a better blocker for the retained
        // entry, it was just read from the clause anyway.
        let new_watch = Watch::Long {
            cref,
            blocker: first,
        };

        if first != blocker && ctx.part(AssignmentP).lit_is_true(first) {
            let list = watchlists.watched_by_mut(false_lit);
            list[write] = new_watch;
            write += 1;
            continue;
        }

        // Search for a non-false literal to take over this watch.
        for at in 2..lits.len() {
            let candidate = lits[at];
            if !ctx.part(AssignmentP).lit_is_false(candidate) {
                lits[1] = candidate;
                lits[at] = false_lit;
                watchlists.add_watch(candidate, new_watch);
                continue 'watches;
            }
        }

        // No replacement found: the clause is propagating or conflicting.
        let list = watchlists.watched_by_mut(false_lit);
        list[write] = new_watch;
        write += 1;

        if ctx.part(AssignmentP).lit_is_false(first) {
            finish_sweep(watchlists, false_lit, read, write);
            return Err(Conflict::Long(cref));
        }

        let mut reason = Reason::Long(cref);

        if lhbr && ctx.part(TrailP).current_level() > 0 {
            let lits = alloc.clause(cref).lits();
            if let Some(dominator) = hyper_binary_dominator(ctx.part(ImplGraphP), lits) {
                hyper_binaries.push([first, dominator]);
                reason = Reason::Binary([dominator]);
            }
        }

        enqueue_assignment(ctx.borrow(), first, reason);
    }

    Ok(())
}

/// Compact the watch list on an early exit, keeping the unprocessed tail.
fn finish_sweep(
    watchlists: &mut super::Watchlists,
    false_lit: Lit,
    mut read: usize,
    mut write: usize,
) {
    let list = watchlists.watched_by_mut(false_lit);
    while read < list.len() {
        list[write] = list[read];
        read += 1;
        write += 1;
    }
    list.truncate(write);
}

/// Common binary antecedent of all false literals of a propagating clause.
///
/// `lits[1..]` are all false. Returns `Some(d)` when resolving the clause
/// against the binary reasons of those literals yields the binary clause
/// `(lits[0] v d)`. Literals assigned at level 0 drop out of the resolvent
/// and are skipped.
fn hyper_binary_dominator(graph: &super::ImplGraph, lits: &[Lit]) -> Option<Lit> {
    let mut dominator = None;

    for &lit in &lits[1..] {
        if graph.level(lit.var()) == 0 {
            continue;
        }
        if let Reason::Binary([antecedent]) = graph.reason(lit.var()) {
            dominator = Some(*antecedent);
            break;
        }
    }
    let dominator = dominator?;

    for &lit in &lits[1..] {
        if graph.level(lit.var()) == 0 || lit == dominator {
            continue;
        }
        match graph.reason(lit.var()) {
            Reason::Binary([antecedent]) if *antecedent == dominator => (),
            _ => return None,
        }
    }
    Some(dominator)
}
