//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use intersat_formula::Lit;

use crate::context::{parts::*, Context};

use super::header::HEADER_LEN;
use super::{clause_abstraction, ClauseHeader, ClauseRef};

/// Database for long clauses.
///
/// Tracks all arena clauses in insertion order together with counts and the
/// amount of garbage in the allocator. The `clauses` list may contain
/// clauses already marked as deleted; iteration has to check the header.
#[derive(Default)]
pub struct ClauseDb {
    /// All long clauses in insertion order, may contain deleted clauses.
    pub clauses: Vec<ClauseRef>,
    /// Number of live redundant clauses.
    redundant_count: usize,
    /// Number of live irredundant clauses.
    irredundant_count: usize,
    /// Size of deleted but not yet collected clauses.
    pub garbage_size: usize,
}

impl ClauseDb {
    /// The number of live redundant long clauses.
    pub fn redundant_count(&self) -> usize {
        self.redundant_count
    }

    /// The number of live irredundant long clauses.
    pub fn irredundant_count(&self) -> usize {
        self.irredundant_count
    }
}

/// Add a long clause to the database.
///
/// The abstraction field of the header is computed here; all other header
/// fields are taken as given.
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    mut header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    header.set_abstraction(clause_abstraction(lits));
    let redundant = header.redundant();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    let db = ctx.part_mut(ClauseDbP);
    db.clauses.push(cref);
    if redundant {
        db.redundant_count += 1;
    } else {
        db.irredundant_count += 1;
    }

    cref
}

/// Delete a long clause from the database.
///
/// The storage is reclaimed at the next garbage collection. The caller is
/// responsible for detaching watches and for emitting a trace event first.
pub fn delete_clause(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP), cref: ClauseRef) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);

    debug_assert!(!header.deleted(), "delete_clause for already deleted clause");

    header.set_deleted(true);

    if header.redundant() {
        db.redundant_count -= 1;
    } else {
        db.irredundant_count -= 1;
    }

    db.garbage_size += header.len() + HEADER_LEN;
}

/// Turn a redundant clause into an irredundant one.
///
/// This is a noop for clauses that already are irredundant.
pub fn make_irredundant(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    cref: ClauseRef,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);
    if header.redundant() {
        header.set_redundant(false);
        db.redundant_count -= 1;
        db.irredundant_count += 1;
    }
}

/// Whether a clause is the reason of the assignment of its first literal.
///
/// Locked clauses may not be deleted, their literals may not be moved.
pub fn is_locked(
    mut ctx: partial!(Context, AssignmentP, ClauseAllocP, ImplGraphP),
    cref: ClauseRef,
) -> bool {
    use crate::prop::Reason;

    let first = ctx.part(ClauseAllocP).lits(cref)[0];
    ctx.part(AssignmentP).lit_is_true(first)
        && ctx.part(ImplGraphP).reason(first.var()) == &Reason::Long(cref)
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::{cnf, lits, Lit};

    #[test]
    fn counts_follow_additions_and_deletions() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let clauses = cnf![
            1, 2, 3, 4;
            4, -5, 6, 2;
            -2, 3, -4, 5;
        ];

        let mut crefs = vec![];
        for (at, clause) in clauses.iter().enumerate() {
            let mut header = ClauseHeader::new();
            header.set_redundant(at == 2);
            crefs.push(add_clause(ctx.borrow(), header, clause));
        }

        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 2);
        assert_eq!(ctx.part(ClauseDbP).redundant_count(), 1);
        assert_eq!(ctx.part(ClauseDbP).garbage_size, 0);

        delete_clause(ctx.borrow(), crefs[0]);
        delete_clause(ctx.borrow(), crefs[2]);

        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 1);
        assert_eq!(ctx.part(ClauseDbP).redundant_count(), 0);
        assert!(ctx.part(ClauseDbP).garbage_size > 0);
        assert!(ctx.part(ClauseAllocP).header(crefs[0]).deleted());
        assert!(!ctx.part(ClauseAllocP).header(crefs[1]).deleted());
    }

    #[test]
    fn promotion_updates_counts() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut header = ClauseHeader::new();
        header.set_redundant(true);
        let cref = add_clause(ctx.borrow(), header, &lits![1, -2, 3, 4]);

        assert_eq!(ctx.part(ClauseDbP).redundant_count(), 1);

        make_irredundant(ctx.borrow(), cref);
        make_irredundant(ctx.borrow(), cref);

        assert_eq!(ctx.part(ClauseDbP).redundant_count(), 0);
        assert_eq!(ctx.part(ClauseDbP).irredundant_count(), 1);
    }

    #[test]
    fn abstraction_is_stored() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let lits: &[Lit] = &lits![1, -2, 3, 4];
        let cref = add_clause(ctx.borrow(), ClauseHeader::new(), lits);

        assert_eq!(
            ctx.part(ClauseAllocP).header(cref).abstraction(),
            clause_abstraction(lits)
        );
    }
}
