//! Garbage collection of long clauses.
use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use crate::context::{parts::*, Context};
use crate::prop::Reason;

use super::{ClauseAlloc, ClauseRef};

/// Perform a garbage collection of long clauses if necessary.
///
/// Collecting when a fixed fraction of the allocation is garbage amortizes
/// collection costs.
pub fn collect_garbage(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let alloc = ctx.part(ClauseAllocP);
    let db = ctx.part(ClauseDbP);

    if db.garbage_size * 2 > alloc.buffer_size() {
        collect_garbage_now(ctx.borrow());
    }
}

/// Unconditionally perform a garbage collection of long clauses.
///
/// All live clauses are copied into a fresh allocator. A remap table from
/// old to new references is built and applied to every structure holding
/// clause references: the watch lists and the reasons of assigned literals.
/// The relative order of clauses is preserved, so the reduction ordering is
/// unaffected.
fn collect_garbage_now(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let alloc = ctx.part(ClauseAllocP);

    assert!(
        db.garbage_size <= alloc.buffer_size(),
        "Inconsistent garbage tracking in ClauseDb"
    );
    let current_size = alloc.buffer_size() - db.garbage_size;

    // Allocating just the current size would lead to an immediate growing
    // when new clauses are learned, overallocating here avoids that.
    let mut new_alloc = ClauseAlloc::with_capacity(current_size * 2);

    let mut remap = FxHashMap::default();
    let mut new_clauses = vec![];

    for &cref in db.clauses.iter() {
        let clause = alloc.clause(cref);
        if clause.header().deleted() {
            continue;
        }
        let new_cref = new_alloc.add_clause(clause.header().clone(), clause.lits());
        remap.insert(cref, new_cref);
        new_clauses.push(new_cref);
    }

    *ctx.part_mut(ClauseAllocP) = new_alloc;
    db.clauses = new_clauses;
    db.garbage_size = 0;

    ctx.part_mut(WatchlistsP).remap_long_watches(&remap);

    let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
    for &lit in ctx.part(TrailP).trail().iter() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            let new_cref = remap
                .get(&cref)
                .expect("reason clause deleted while locked");
            impl_graph.update_reason(lit.var(), Reason::Long(*new_cref));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cmp::max;

    use partial_ref::IntoPartialRefMut;
    use proptest::prelude::*;

    use intersat_formula::{cnf::strategy::*, Lit};

    use crate::clause::{db, ClauseHeader};
    use crate::context::set_var_count;
    use crate::prop::{enqueue_assignment, Watch};

    proptest! {
        #[test]
        fn garbage_collection_keeps_live_clauses(
            input_a in cnf_formula(2..100usize, 100..500, 4..30),
            input_b in cnf_formula(2..100usize, 10..100, 4..20),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), max(input_a.var_count(), input_b.var_count()));

            let mut crefs_a = vec![];
            let mut crefs_b = vec![];

            for lits in input_a.iter() {
                let cref = db::add_clause(ctx.borrow(), ClauseHeader::new(), lits);
                crefs_a.push(cref);
            }

            for lits in input_b.iter() {
                let cref = db::add_clause(ctx.borrow(), ClauseHeader::new(), lits);
                ctx.part_mut(WatchlistsP).watch_long(cref, [lits[0], lits[1]]);
                crefs_b.push(cref);

                if ctx.part(AssignmentP).lit_value(lits[0]) == None {
                    // Not a consistent propagation, but garbage collection
                    // only looks at the reason structure.
                    enqueue_assignment(ctx.borrow(), lits[0], Reason::Long(cref));
                }
            }

            for cref in crefs_a {
                db::delete_clause(ctx.borrow(), cref);
                prop_assert!(ctx.part(ClauseDbP).garbage_size > 0);
            }

            let old_buffer_size = ctx.part(ClauseAllocP).buffer_size();

            collect_garbage(ctx.borrow());

            prop_assert!(ctx.part(ClauseDbP).garbage_size == 0);
            prop_assert!(old_buffer_size > ctx.part(ClauseAllocP).buffer_size());

            let mut output_clauses: Vec<Vec<Lit>> = vec![];

            for &cref in ctx.part(ClauseDbP).clauses.iter() {
                let clause = ctx.part(ClauseAllocP).clause(cref);
                prop_assert!(!clause.header().deleted());
                output_clauses.push(clause.lits().to_vec());
            }

            let mut input_clauses: Vec<Vec<Lit>> = input_b
                .iter()
                .map(|c| c.to_vec())
                .collect();

            output_clauses.sort();
            input_clauses.sort();

            prop_assert_eq!(input_clauses, output_clauses);

            // Reasons were remapped to live clauses with the same literals.
            for &lit in ctx.part(TrailP).trail() {
                if let &Reason::Long(cref) = ctx.part(ImplGraphP).reason(lit.var()) {
                    prop_assert_eq!(ctx.part(ClauseAllocP).lits(cref)[0], lit);
                }
            }

            // Watches point at live clauses watching their first literals.
            for &cref in ctx.part(ClauseDbP).clauses.iter() {
                let lits = ctx.part(ClauseAllocP).lits(cref).to_vec();
                for &watched in &lits[..2] {
                    let found = ctx
                        .part(WatchlistsP)
                        .watched_by(watched)
                        .iter()
                        .any(|watch| matches!(watch, Watch::Long { cref: at, .. } if *at == cref));
                    prop_assert!(found);
                }
            }
        }
    }
}
