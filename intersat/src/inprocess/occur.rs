//! Occurrence lists over long clauses.
//!
//! Built at the start of an inprocessing run and discarded at its end.
//! Binary and ternary clauses are not tracked here; the passes that need
//! them scan the watch lists directly.
use intersat_formula::Lit;

use crate::clause::{ClauseAlloc, ClauseDb, ClauseRef};

/// Long clause occurrences per literal.
#[derive(Default)]
pub struct OccLists {
    /// Indexed by literal code.
    occs: Vec<Vec<ClauseRef>>,
}

impl OccLists {
    /// Rebuild the lists from all live long clauses.
    pub fn rebuild(&mut self, var_count: usize, db: &ClauseDb, alloc: &ClauseAlloc) {
        self.occs.clear();
        self.occs.resize(var_count * 2, vec![]);

        for &cref in db.clauses.iter() {
            if alloc.header(cref).deleted() {
                continue;
            }
            for &lit in alloc.lits(cref) {
                self.occs[lit.code()].push(cref);
            }
        }
    }

    /// Drop all lists.
    pub fn clear(&mut self) {
        self.occs.clear();
    }

    /// Whether the lists are currently discarded.
    pub fn is_empty(&self) -> bool {
        self.occs.is_empty()
    }

    /// Clauses containing the given literal.
    pub fn lookup(&self, lit: Lit) -> &[ClauseRef] {
        &self.occs[lit.code()]
    }

    /// Number of clauses containing the given literal.
    pub fn count(&self, lit: Lit) -> usize {
        self.occs[lit.code()].len()
    }

    /// Register a new clause containing the given literal.
    pub fn add(&mut self, lit: Lit, cref: ClauseRef) {
        self.occs[lit.code()].push(cref);
    }

    /// Remove one clause from a literal's list.
    pub fn remove(&mut self, lit: Lit, cref: ClauseRef) {
        let list = &mut self.occs[lit.code()];
        if let Some(at) = list.iter().position(|&found| found == cref) {
            list.swap_remove(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use intersat_formula::lits;

    use crate::clause::ClauseHeader;

    #[test]
    fn rebuild_indexes_all_literals() {
        let mut alloc = ClauseAlloc::default();
        let mut db = ClauseDb::default();

        let lits_a = lits![1, -2, 3, 4];
        let lits_b = lits![-1, 2, 3, 5];

        for lits in [&lits_a[..], &lits_b[..]].iter() {
            let cref = alloc.add_clause(ClauseHeader::new(), lits);
            db.clauses.push(cref);
        }

        let mut occ = OccLists::default();
        occ.rebuild(5, &db, &alloc);

        assert_eq!(occ.count(lits_a[0]), 1);
        assert_eq!(occ.count(lits_b[0]), 1);
        assert_eq!(occ.count(lits_a[2]), 2);
        assert_eq!(occ.count(!lits_a[2]), 0);

        let cref = occ.lookup(lits_a[0])[0];
        occ.remove(lits_a[0], cref);
        assert_eq!(occ.count(lits_a[0]), 0);
    }
}
