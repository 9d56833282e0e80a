//! Learned clause reduction.
use partial_ref::{partial, PartialRef};

use ordered_float::OrderedFloat;
use vec_mut_scan::VecMutScan;

use crate::context::{parts::*, Context};

use super::db::is_locked;
use super::{db, gc, ClauseRef};

/// State of the reduction policy.
///
/// Keeps a soft bound on the number of long redundant clauses. The bound
/// grows by a constant, but only every few reductions, with the interval
/// between increases itself growing. This gives roughly square root shaped
/// growth over the number of reductions.
#[derive(Default)]
pub struct Reduce {
    /// Soft bound on long redundant clauses, 0 until initialized from the
    /// configuration.
    limit: u64,
    /// Reductions since the bound last grew.
    adjust_count: u64,
    /// Reductions between bound increases.
    adjust_interval: u64,
    /// Total number of reductions performed.
    reductions: u64,
}

impl Reduce {
    /// Total number of reductions performed.
    pub fn reductions(&self) -> u64 {
        self.reductions
    }
}

/// Whether the learned clause database grew past the current bound.
pub fn reduce_due(mut ctx: partial!(Context, mut ReduceP, ClauseDbP, SolverConfigP)) -> bool {
    let config = ctx.part(SolverConfigP);
    let initial = config.reduce_initial;
    let adjust = config.reduce_adjust_interval;

    let reduce = ctx.part_mut(ReduceP);
    if reduce.limit == 0 {
        reduce.limit = initial;
        reduce.adjust_interval = adjust;
    }

    (ctx.part(ClauseDbP).redundant_count() as u64) > ctx.part(ReduceP).limit
}

/// Delete the less useful half of the long redundant clauses.
///
/// Clauses are ranked by glue first, then activity, then length. Locked
/// clauses, clauses with a glue at or below the protected threshold and the
/// freshest clauses are kept. If locking prevented most of the planned
/// deletions, the bound is raised, as the same clauses would be selected
/// again next time.
pub fn reduce_learned<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ReduceP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut WatchlistsP,
        AssignmentP,
        SolverConfigP,
        TrailP,
    ),
) {
    let protected_glue = ctx.part(SolverConfigP).reduce_protected_glue as usize;
    let fresh_count = ctx.part(SolverConfigP).reduce_fresh_count;

    // Candidates in insertion order, oldest first.
    let mut candidates: Vec<ClauseRef> = vec![];
    for at in 0..ctx.part(ClauseDbP).clauses.len() {
        let cref = ctx.part(ClauseDbP).clauses[at];
        let header = ctx.part(ClauseAllocP).header(cref);
        if !header.deleted() && header.redundant() && header.glue() > protected_glue {
            candidates.push(cref);
        }
    }

    // The freshest clauses get a chance to prove themselves.
    let fresh = fresh_count.min(candidates.len());
    candidates.truncate(candidates.len() - fresh);

    // Rank by usefulness; the stable sort keeps the insertion order for
    // ties, which keeps reduction deterministic.
    {
        let alloc = ctx.part(ClauseAllocP);
        candidates.sort_by_key(|&cref| {
            let header = alloc.header(cref);
            (
                header.glue(),
                std::cmp::Reverse(OrderedFloat(header.activity())),
                header.len(),
            )
        });
    }

    let keep = candidates.len() - candidates.len() / 2;
    let target = candidates.len() / 2;
    let mut collected = 0usize;

    let mut doomed = candidates.split_off(keep);
    let mut scan = VecMutScan::new(&mut doomed);

    while let Some(cref) = scan.next() {
        if is_locked(ctx.borrow(), *cref) {
            continue;
        }

        delete_long_clause(ctx.borrow(), *cref);
        cref.remove();
        collected += 1;
    }

    drop(scan);

    let config_grow = ctx.part(SolverConfigP).reduce_grow;
    let reduce = ctx.part_mut(ReduceP);
    reduce.reductions += 1;

    // Mostly locked clauses: grow the bound right away, as the same
    // candidates would be selected again.
    if collected * 2 < target {
        reduce.limit += config_grow.max(1);
    }

    reduce.adjust_count += 1;
    if reduce.adjust_count >= reduce.adjust_interval {
        reduce.adjust_count = 0;
        reduce.adjust_interval += reduce.adjust_interval / 2 + 1;
        reduce.limit += config_grow;
    }

    log::info!(
        "reduce: {} deleted, {} kept, limit {}",
        collected,
        target - collected + keep,
        ctx.part(ReduceP).limit,
    );

    gc::collect_garbage(ctx.borrow());
}

/// Emit the delete event, detach the watches and remove a long clause.
pub fn delete_long_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
) {
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp.lits.clear();
    tmp.lits.extend_from_slice(ctx.part(ClauseAllocP).lits(cref));

    ctx.part_mut(TraceP).deleted(&tmp.lits);

    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    watchlists.unwatch_long(tmp.lits[0], cref);
    watchlists.unwatch_long(tmp.lits[1], cref);

    db::delete_clause(ctx.borrow(), cref);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::Lit;

    use crate::clause::ClauseHeader;
    use crate::context::set_var_count;

    fn add_learned(
        mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut WatchlistsP),
        lits: &[Lit],
        glue: usize,
    ) -> ClauseRef {
        let mut header = ClauseHeader::new();
        header.set_redundant(true);
        header.set_glue(glue);
        let cref = db::add_clause(ctx.borrow(), header, lits);
        ctx.part_mut(WatchlistsP).watch_long(cref, [lits[0], lits[1]]);
        cref
    }

    #[test]
    fn reduction_deletes_high_glue_clauses_first() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 30);
        ctx.part_mut(SolverConfigP).reduce_fresh_count = 0;

        let mut crefs = vec![];
        for at in 0..10 {
            let lits: Vec<Lit> = (0..4)
                .map(|k| Lit::from_index(at * 2 + k, true))
                .collect();
            crefs.push(add_learned(ctx.borrow(), &lits, 3 + at));
        }

        reduce_learned(ctx.borrow());

        // The five worst (highest glue) clauses are gone.
        for (at, &cref) in crefs.iter().enumerate() {
            let deleted = ctx.part(ClauseAllocP).header(cref).deleted();
            assert_eq!(deleted, at >= 5, "clause {} deletion", at);
        }
        assert_eq!(ctx.part(ClauseDbP).redundant_count(), 5);
    }

    #[test]
    fn protected_glue_is_exempt() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 30);
        ctx.part_mut(SolverConfigP).reduce_fresh_count = 0;

        let mut crefs = vec![];
        for at in 0..4 {
            let lits: Vec<Lit> = (0..4)
                .map(|k| Lit::from_index(at * 2 + k, true))
                .collect();
            crefs.push(add_learned(ctx.borrow(), &lits, 2));
        }

        reduce_learned(ctx.borrow());

        for &cref in crefs.iter() {
            assert!(!ctx.part(ClauseAllocP).header(cref).deleted());
        }
    }

    #[test]
    fn bound_grows_after_enough_reductions() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);
        assert!(!reduce_due(ctx.borrow()));

        let initial = ctx.part(ReduceP).limit;
        assert!(initial > 0);

        for _ in 0..ctx.part(SolverConfigP).reduce_adjust_interval {
            reduce_learned(ctx.borrow());
        }

        assert_eq!(
            ctx.part(ReduceP).reductions(),
            ctx.part(SolverConfigP).reduce_adjust_interval
        );
        assert!(ctx.part(ReduceP).limit > initial);
    }
}
