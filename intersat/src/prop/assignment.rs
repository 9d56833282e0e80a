//! Partial assignment, trail and backtracking.
use partial_ref::{partial, PartialRef};

use intersat_formula::{Lit, LitIdx, Var};

use crate::context::{parts::*, Context};
use crate::decision::make_available;

use super::Reason;

/// Exponential moving average of phase flips, used to gate restarts.
///
/// Each assignment contributes whether the variable took a value different
/// from its saved phase. High agility means the search is still visiting new
/// territory and a restart would be wasted.
#[derive(Clone)]
pub struct Agility {
    value: f64,
}

impl Default for Agility {
    fn default() -> Agility {
        Agility { value: 0.0 }
    }
}

impl Agility {
    const DECAY: f64 = 1.0 / 10000.0;

    fn update(&mut self, flipped: bool) {
        self.value -= self.value * Self::DECAY;
        if flipped {
            self.value += Self::DECAY;
        }
    }

    /// Current flip rate in `[0, 1]`.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Current partial assignment and phase memory.
#[derive(Default)]
pub struct Assignment {
    assignment: Vec<Option<bool>>,
    /// Value a variable had when it was last unassigned.
    saved_phase: Vec<Option<bool>>,
    agility: Agility,
}

/// This compares two `Option<bool>` values as bytes. Workaround for bad code
/// generation.
pub fn fast_option_eq(a: Option<bool>, b: Option<bool>) -> bool {
    unsafe { std::mem::transmute::<_, u8>(a) == std::mem::transmute::<_, u8>(b) }
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.assignment.resize(count, None);
        self.saved_phase.resize(count, None);
    }

    /// Number of variables covered by this assignment.
    pub fn var_count(&self) -> usize {
        self.assignment.len()
    }

    /// Current partial assignment as slice.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    /// Value assigned to a variable.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment[var.index()]
    }

    /// Phase memory of a variable.
    ///
    /// `None` if the variable was never assigned.
    pub fn saved_phase(&self, var: Var) -> Option<bool> {
        self.saved_phase[var.index()]
    }

    /// Value assigned to a literal.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.index()].map(|b| b ^ lit.is_negative())
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_positive()))
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_negative()))
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], None)
    }

    /// Current agility, i.e. the recent phase flip rate.
    pub fn agility(&self) -> f64 {
        self.agility.value()
    }

    fn assign_lit(&mut self, lit: Lit) {
        let value = lit.is_positive();
        self.agility
            .update(self.saved_phase[lit.index()] == Some(!value));
        self.assignment[lit.index()] = Some(value);
    }

    fn unassign_lit(&mut self, lit: Lit) {
        let index = lit.index();
        self.saved_phase[index] = self.assignment[index];
        self.assignment[index] = None;
    }
}

/// Decision and propagation history.
#[derive(Default)]
pub struct Trail {
    /// Stack of all propagated and all enqueued assignments.
    trail: Vec<Lit>,
    /// Next assignment in trail to propagate.
    queue_head_pos: usize,
    /// Decision levels as trail indices.
    decisions: Vec<LitIdx>,
    /// Number of unit clauses removed from the trail.
    units_removed: usize,
}

impl Trail {
    /// Return the next assigned literal to propagate and remove it from the
    /// queue.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        let head = self.trail.get(self.queue_head_pos).cloned();
        if head.is_some() {
            self.queue_head_pos += 1;
        }
        head
    }

    /// Whether all assignments are processed.
    pub fn fully_propagated(&self) -> bool {
        self.queue_head_pos == self.trail.len()
    }

    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Clear the trail.
    ///
    /// This simply removes all entries without performing any backtracking.
    /// Can only be called with no active decisions.
    pub fn clear(&mut self) {
        assert!(self.decisions.is_empty());
        self.units_removed += self.trail.len();
        self.trail.clear();
        self.queue_head_pos = 0;
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self) {
        self.decisions.push(self.trail.len() as LitIdx)
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.decisions.len()
    }

    /// The number of assignments at level 0, including removed units.
    pub fn top_level_assignment_count(&self) -> usize {
        self.decisions
            .get(0)
            .map(|&len| len as usize)
            .unwrap_or(self.trail.len())
            + self.units_removed
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any
/// propagation. The literal has to be unassigned when calling this.
pub fn enqueue_assignment(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
    reason: Reason,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_value(lit) == None);

    assignment.assign_lit(lit);

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    trail.trail.push(lit);

    let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
    node.reason = reason;
    node.level = trail.decisions.len() as LitIdx;
}

/// Undo all assignments in decision levels deeper than the given level.
pub fn backtrack(
    mut ctx: partial!(Context, mut AssignmentP, mut TrailP, mut VsidsP),
    level: usize,
) {
    let (assignment, mut ctx) = ctx.split_part_mut(AssignmentP);
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    if level >= trail.decisions.len() {
        return;
    }

    let new_trail_len = trail.decisions[level] as usize;

    trail.queue_head_pos = new_trail_len;
    trail.decisions.truncate(level);

    let trail_end = &trail.trail[new_trail_len..];
    for &lit in trail_end {
        make_available(ctx.borrow(), lit.var());
        assignment.unassign_lit(lit);
    }
    trail.trail.truncate(new_trail_len);
}

/// Undo all decisions and assumptions.
pub fn full_restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut AssumptionsP,
        mut TrailP,
        mut VsidsP,
    ),
) {
    ctx.part_mut(AssumptionsP).full_restart();
    backtrack(ctx.borrow(), 0);
}

/// Undo all decisions, but keep the enqueued assumptions.
pub fn restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut TrailP,
        mut VsidsP,
        AssumptionsP
    ),
) {
    let level = ctx.part(AssumptionsP).assumption_levels();
    backtrack(ctx.borrow(), level);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::lit;

    use crate::context::set_var_count;

    #[test]
    fn backtracking_restores_phase_memory() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Unit);
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Unit);

        assert_eq!(ctx.part(AssignmentP).lit_value(lit!(1)), Some(true));
        assert_eq!(ctx.part(AssignmentP).lit_value(lit!(-2)), Some(true));
        assert_eq!(ctx.part(TrailP).current_level(), 1);

        backtrack(ctx.borrow(), 0);

        assert_eq!(ctx.part(AssignmentP).lit_value(lit!(1)), None);
        assert_eq!(ctx.part(AssignmentP).saved_phase(lit!(1).var()), Some(true));
        assert_eq!(
            ctx.part(AssignmentP).saved_phase(lit!(2).var()),
            Some(false)
        );
        assert_eq!(ctx.part(TrailP).current_level(), 0);
        assert!(ctx.part(TrailP).trail().is_empty());
    }

    #[test]
    fn agility_rises_on_flips() {
        let mut agility = Agility::default();
        for _ in 0..100 {
            agility.update(true);
        }
        let high = agility.value();
        assert!(high > 0.0);
        for _ in 0..100 {
            agility.update(false);
        }
        assert!(agility.value() < high);
    }
}
