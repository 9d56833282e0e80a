//! Learns a new clause by analyzing a conflict.
use std::mem::swap;

use partial_ref::{partial, split_borrow, PartialRef};
use vec_mut_scan::VecMutScan;

use intersat_formula::{Lit, Var};

use crate::clause::ClauseRef;
use crate::config::MinimizeMode;
use crate::context::{parts::*, Context};
use crate::prop::{Conflict, Reason};

/// Temporaries for conflict analysis.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// This is the learned clause after analysis finishes.
    clause: Vec<Lit>,
    /// Number of literals of the current level in the current clause.
    current_level_count: usize,
    /// Variables in the current clause.
    var_flags: Vec<bool>,
    /// Entries to clean in `var_flags`.
    to_clean: Vec<Var>,
    /// Long clauses resolved on, they get their activity bumped.
    involved: Vec<ClauseRef>,
    /// Stack for the minimization DFS.
    stack: Vec<Lit>,
    /// Glue level of the learned clause.
    glue: usize,
}

impl AnalyzeConflict {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_flags.resize(count, false);
    }

    /// The learned clause.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }

    /// Long clauses involved in the conflict.
    pub fn involved(&self) -> &[ClauseRef] {
        &self.involved
    }

    /// Glue level of the learned clause, valid after analysis.
    ///
    /// Computed before backtracking, so the asserting literal's current
    /// level is among the counted levels.
    pub fn glue(&self) -> usize {
        self.glue
    }
}

/// Learns a new clause by analyzing a conflict.
///
/// Returns the lowest decision level that makes the learned clause
/// asserting. The asserting literal ends up in position 0 and the literal of
/// the backjump level in position 1, ready to become the watched pair.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut VsidsP,
        ClauseAllocP,
        ImplGraphP,
        SolverConfigP,
        TrailP,
    ),
    conflict: Conflict,
) -> usize {
    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);

    {
        let analyze = ctx.part_mut(AnalyzeConflictP);

        analyze.clause.clear();
        analyze.involved.clear();
        analyze.current_level_count = 0;
        analyze.glue = 0;
    }

    if ctx.part(TrailP).current_level() == 0 {
        // Conflict with no decisions, generate the empty clause.
        return 0;
    }

    // We start with all the literals of the conflicting clause.
    for &lit in conflict.lits(&lit_ctx) {
        add_literal(ctx.borrow(), lit);
    }

    if let Conflict::Long(cref) = conflict {
        ctx.part_mut(AnalyzeConflictP).involved.push(cref);
    }

    // To get rid of all but one literal of the current level, we resolve the
    // clause with the reason for those literals. The correct order for this
    // is reverse chronological.

    split_borrow!(ctx_trail = &(TrailP) ctx);

    for &lit in ctx_trail.part(TrailP).trail().iter().rev() {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        let lit_present = &mut analyze.var_flags[lit.index()];
        // Is the lit present in the current clause?
        if *lit_present {
            *lit_present = false;
            analyze.current_level_count -= 1;
            if analyze.current_level_count == 0 {
                // lit is the last literal of the current level present in
                // the current clause, therefore the resulting clause will
                // assert !lit so we put it in position 0.
                analyze.clause.push(!lit);
                let end = analyze.clause.len() - 1;
                analyze.clause.swap(0, end);

                break;
            } else {
                // We removed the literal and add its reason.
                let (graph, mut ctx) = ctx.split_part(ImplGraphP);

                let reason = graph.reason(lit.var());

                for &reason_lit in reason.lits(&lit_ctx) {
                    add_literal(ctx.borrow(), reason_lit);
                }

                if let &Reason::Long(cref) = reason {
                    ctx.part_mut(AnalyzeConflictP).involved.push(cref);
                }
            }
        }
    }

    // This needs var_flags set and keeps some var_flags set.
    match ctx.part(SolverConfigP).minimize_mode {
        MinimizeMode::None => (),
        MinimizeMode::Local => minimize_clause_local(ctx.borrow()),
        MinimizeMode::Recursive => minimize_clause_recursive(ctx.borrow()),
    }

    compute_glue(ctx.borrow());

    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);

    for var in analyze.to_clean.drain(..) {
        analyze.var_flags[var.index()] = false;
    }

    // We find the highest level literal besides the asserting literal and
    // move it into position 1. This is important to ensure the watch
    // invariants hold after backtracking.
    let mut backtrack_to = 0;

    if analyze.clause.len() > 1 {
        let (prefix, rest) = analyze.clause.split_at_mut(2);
        let lit_1 = &mut prefix[1];
        backtrack_to = ctx.part(ImplGraphP).level(lit_1.var());
        for lit in rest.iter_mut() {
            let lit_level = ctx.part(ImplGraphP).level(lit.var());
            if lit_level > backtrack_to {
                backtrack_to = lit_level;
                swap(lit_1, lit);
            }
        }
    }

    ctx.part_mut(VsidsP).decay();

    backtrack_to
}

/// Add a literal to the current clause.
fn add_literal(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut VsidsP,
        ImplGraphP,
        TrailP
    ),
    lit: Lit,
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    // No need to add literals that are set by unit clauses or already
    // present.
    if lit_level > 0 && !analyze.var_flags[lit.index()] {
        ctx.part_mut(VsidsP).bump(lit.var());

        analyze.var_flags[lit.index()] = true;
        if lit_level == ctx.part(TrailP).current_level() {
            analyze.current_level_count += 1;
        } else {
            analyze.clause.push(lit);
            analyze.to_clean.push(lit.var());
        }
    }
}

/// A Bloom filter of levels.
#[derive(Default)]
struct LevelAbstraction {
    bits: u64,
}

impl LevelAbstraction {
    /// Add a level to the Bloom filter.
    pub fn add(&mut self, level: usize) {
        self.bits |= 1 << (level % 64)
    }

    /// Test whether a level could be in the Bloom filter.
    pub fn test(&self, level: usize) -> bool {
        self.bits & (1 << (level % 64)) != 0
    }
}

/// Number of distinct decision levels in the learned clause.
///
/// Counted approximately through the level Bloom filter; collisions can
/// undercount, which only makes a clause look more useful.
fn compute_glue(mut ctx: partial!(Context, mut AnalyzeConflictP, ImplGraphP, TrailP)) {
    let (analyze, ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let impl_graph = ctx.part(ImplGraphP);

    let mut levels = LevelAbstraction::default();
    let mut glue = 0;

    // The Bloom filter can undercount on collisions, which only makes the
    // clause look better than it is. The current level of the asserting
    // literal is counted like the others.
    let current = ctx.part(TrailP).current_level();
    levels.add(current);
    glue += 1;

    for &lit in analyze.clause.iter().skip(1) {
        let level = impl_graph.level(lit.var());
        if !levels.test(level) {
            levels.add(level);
            glue += 1;
        }
    }

    analyze.glue = glue;
}

/// Cheap non-recursive clause minimization.
///
/// A literal is removed when all literals of its reason are themselves part
/// of the clause (or top-level assignments).
fn minimize_clause_local(
    mut ctx: partial!(Context, mut AnalyzeConflictP, ClauseAllocP, ImplGraphP),
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);
    let impl_graph = ctx.part(ImplGraphP);

    let var_flags = &analyze.var_flags;

    let mut scan = VecMutScan::new(&mut analyze.clause);

    // We always keep the asserting literal.
    scan.next();

    while let Some(lit) = scan.next() {
        let reason = impl_graph.reason(lit.var());

        let removable = !reason.is_unit()
            && reason.lits(&lit_ctx).iter().all(|&reason_lit| {
                var_flags[reason_lit.index()] || impl_graph.level(reason_lit.var()) == 0
            });

        if removable {
            lit.remove();
        }
    }
}

/// Performs recursive clause minimization.
///
/// **Note:** Requires AnalyzeConflict's var_flags to be set for exactly the
/// variables of the unminimized clause. This also sets some more var_flags,
/// but lists them in to_clean.
///
/// This routine tries to remove some redundant literals of the learned
/// clause. The idea is to detect literals of the learned clause that are
/// already implied by other literals of the clause.
///
/// This is done by performing a DFS in the implication graph (following
/// edges in reverse) for each literal apart from the asserting one. The
/// search doesn't expand literals already known to be implied by literals of
/// the clause. When a decision literal that is not in the clause is found,
/// the candidate literal is not redundant.
///
/// Two optimizations are used: The search stops as soon as a literal of a
/// decision level not present in the clause is found, as the decision of
/// that level would eventually be reached and cannot be in the clause.
/// Membership of decision levels is tested approximately using a Bloom
/// filter. The second optimization is to avoid duplicating work: when a
/// literal is found to be redundant, the search stayed within the implied
/// literals, and their var_flags remain set so later searches treat them
/// like clause literals. On a failed search the var_flags set during that
/// search are reset.
///
/// The recursion of the source description is replaced by an explicit stack
/// kept in [`AnalyzeConflict`].
fn minimize_clause_recursive(
    mut ctx: partial!(Context, mut AnalyzeConflictP, ClauseAllocP, ImplGraphP),
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);
    let impl_graph = ctx.part(ImplGraphP);

    let mut involved_levels = LevelAbstraction::default();

    for &lit in analyze.clause.iter() {
        involved_levels.add(impl_graph.level(lit.var()));
    }

    let mut scan = VecMutScan::new(&mut analyze.clause);

    // We always keep the asserting literal.
    scan.next();

    'next_lit: while let Some(lit) = scan.next() {
        if impl_graph.reason(lit.var()).is_unit() {
            continue;
        }

        // Start the DFS.
        analyze.stack.clear();
        analyze.stack.push(!*lit);

        // Used to remember which var_flags were set during this DFS.
        let top = analyze.to_clean.len();

        while let Some(lit) = analyze.stack.pop() {
            let reason = impl_graph.reason(lit.var());

            for &reason_lit in reason.lits(&lit_ctx) {
                let reason_level = impl_graph.level(reason_lit.var());

                if !analyze.var_flags[reason_lit.index()] && reason_level > 0 {
                    // We haven't established reason_lit to be redundant,
                    // haven't visited it yet and it's not implied by unit
                    // clauses.

                    if impl_graph.reason(reason_lit.var()).is_unit()
                        || !involved_levels.test(reason_level)
                    {
                        // reason_lit is a decision not in the clause or in a
                        // decision level known not to be in the clause.
                        // Abort the search.

                        // Reset the var_flags set during _this_ DFS.
                        for lit in analyze.to_clean.drain(top..) {
                            analyze.var_flags[lit.index()] = false;
                        }
                        continue 'next_lit;
                    } else {
                        analyze.var_flags[reason_lit.index()] = true;
                        analyze.to_clean.push(reason_lit.var());
                        analyze.stack.push(!reason_lit);
                    }
                }
            }
        }

        lit.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_abstraction_membership() {
        let mut levels = LevelAbstraction::default();
        levels.add(3);
        levels.add(64 + 5);

        assert!(levels.test(3));
        assert!(levels.test(5)); // collision with 64 + 5
        assert!(!levels.test(4));
    }
}
