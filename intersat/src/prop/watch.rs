//! Watch lists driving unit propagation.
//!
//! Every clause is monitored through two watched literals. A watch entry
//! lives in the list of the *negation* of the literal it watches, so that it
//! is visited exactly when the watched literal becomes false.
//!
//! Binary and ternary clauses are not stored in the clause arena at all:
//! their remaining literals fit inline into the watch entry, so propagating
//! them never touches clause memory. Such entries are mirrored into the
//! lists of all their literals and never move.
//!
//! Long clauses are watched through [`Watch::Long`] entries carrying the
//! clause reference and a *blocker*, a cached literal of the clause. When
//! the blocker is already true the clause is satisfied and the entry can be
//! skipped without dereferencing the arena. The watched literals of a long
//! clause are kept at positions 0 and 1 by every mutator; when a watch has
//! to move, the entry migrates to another literal's list.
//!
//! When a clause is not unit under the current assignment, the watched
//! literals of a long clause are two non-false literals. When a clause is
//! propagating, the implied literal is in position 0 and the position 1
//! literal has the highest decision level of the false literals. Unassigning
//! variables never invalidates these invariants, so backtracking does not
//! touch watch lists.
use rustc_hash::FxHashMap;

use intersat_formula::Lit;

use crate::clause::ClauseRef;

/// A watch entry.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Watch {
    /// Watch of a binary clause; `implied` is the other literal.
    Binary { implied: Lit, redundant: bool },
    /// Watch of a ternary clause; `other` are the two remaining literals.
    Ternary { other: [Lit; 2], redundant: bool },
    /// Watch of an arena clause.
    Long { cref: ClauseRef, blocker: Lit },
}

/// Watch lists for all literals.
#[derive(Default)]
pub struct Watchlists {
    /// Indexed by the code of the literal whose falsification triggers the
    /// watch.
    watches: Vec<Vec<Watch>>,
    binary_count: usize,
    ternary_count: usize,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Number of binary clauses.
    pub fn binary_count(&self) -> usize {
        self.binary_count
    }

    /// Number of ternary clauses.
    pub fn ternary_count(&self) -> usize {
        self.ternary_count
    }

    /// Watches triggered by the falsification of `lit`.
    pub fn watched_by(&self, lit: Lit) -> &[Watch] {
        &self.watches[(!lit).code()]
    }

    pub(super) fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watch> {
        &mut self.watches[(!lit).code()]
    }

    /// Add a watch triggered by the falsification of `lit`.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[(!lit).code()].push(watch)
    }

    /// Store a binary clause.
    pub fn watch_binary(&mut self, lits: [Lit; 2], redundant: bool) {
        for i in 0..2 {
            self.add_watch(
                lits[i],
                Watch::Binary {
                    implied: lits[i ^ 1],
                    redundant,
                },
            );
        }
        self.binary_count += 1;
    }

    /// Store a ternary clause.
    pub fn watch_ternary(&mut self, lits: [Lit; 3], redundant: bool) {
        for i in 0..3 {
            self.add_watch(
                lits[i],
                Watch::Ternary {
                    other: [lits[(i + 1) % 3], lits[(i + 2) % 3]],
                    redundant,
                },
            );
        }
        self.ternary_count += 1;
    }

    /// Start watching a long clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_long(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            self.add_watch(
                lits[i],
                Watch::Long {
                    cref,
                    blocker: lits[i ^ 1],
                },
            );
        }
    }

    /// Remove the watch for a long clause from the list of `lit`.
    pub fn unwatch_long(&mut self, lit: Lit, cref: ClauseRef) {
        self.watches[(!lit).code()].retain(|watch| match watch {
            Watch::Long { cref: found, .. } => *found != cref,
            _ => true,
        });
    }

    /// Remove a stored binary clause.
    pub fn unwatch_binary(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            let list = &mut self.watches[(!lits[i]).code()];
            if let Some(at) = list.iter().position(|watch| match watch {
                Watch::Binary { implied, .. } => *implied == lits[i ^ 1],
                _ => false,
            }) {
                list.remove(at);
            }
        }
        self.binary_count -= 1;
    }

    /// Remove a stored ternary clause.
    pub fn unwatch_ternary(&mut self, lits: [Lit; 3]) {
        for i in 0..3 {
            let mut others = [lits[(i + 1) % 3], lits[(i + 2) % 3]];
            others.sort_unstable();
            let list = &mut self.watches[(!lits[i]).code()];
            if let Some(at) = list.iter().position(|watch| match watch {
                Watch::Ternary { other, .. } => {
                    let mut found = *other;
                    found.sort_unstable();
                    found == others
                }
                _ => false,
            }) {
                list.remove(at);
            }
        }
        self.ternary_count -= 1;
    }

    /// Rewrite all long watch entries after a garbage collection.
    ///
    /// Entries of clauses missing from the remap table are dropped.
    pub fn remap_long_watches(&mut self, remap: &FxHashMap<ClauseRef, ClauseRef>) {
        for list in self.watches.iter_mut() {
            let mut write = 0;
            for read in 0..list.len() {
                let mut watch = list[read];
                if let Watch::Long { cref, blocker } = watch {
                    match remap.get(&cref) {
                        Some(&new_cref) => {
                            watch = Watch::Long {
                                cref: new_cref,
                                blocker,
                            }
                        }
                        None => continue,
                    }
                }
                list[write] = watch;
                write += 1;
            }
            list.truncate(write);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use intersat_formula::lits;

    #[test]
    fn binary_watches_are_mirrored() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let [a, b] = lits![1, -2];
        watchlists.watch_binary([a, b], false);

        assert_eq!(
            watchlists.watched_by(a),
            &[Watch::Binary {
                implied: b,
                redundant: false
            }]
        );
        assert_eq!(
            watchlists.watched_by(b),
            &[Watch::Binary {
                implied: a,
                redundant: false
            }]
        );
        assert_eq!(watchlists.binary_count(), 1);

        watchlists.unwatch_binary([b, a]);
        assert!(watchlists.watched_by(a).is_empty());
        assert!(watchlists.watched_by(b).is_empty());
        assert_eq!(watchlists.binary_count(), 0);
    }

    #[test]
    fn ternary_watches_cover_all_literals() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let [a, b, c] = lits![1, 2, -3];
        watchlists.watch_ternary([a, b, c], true);

        for &lit in [a, b, c].iter() {
            assert_eq!(watchlists.watched_by(lit).len(), 1);
        }

        watchlists.unwatch_ternary([c, a, b]);
        for &lit in [a, b, c].iter() {
            assert!(watchlists.watched_by(lit).is_empty());
        }
    }
}
