//! Decision heuristics.
pub mod vsids;

use partial_ref::{partial, PartialRef};

use intersat_formula::{Lit, Var};

use crate::config::DefaultPhase;
use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};

/// Re-insert a variable into the decision heap.
///
/// Called when a variable becomes unassigned.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// Make a decision and enqueue it.
///
/// Picks the unassigned variable with the highest activity, or occasionally
/// a random one, and assigns it its decision phase.
///
/// Returns `false` if no decision was made because all variables are
/// assigned or ineligible, meaning the formula is satisfied.
pub fn make_decision<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ImplGraphP,
        mut LimitsP<'a>,
        mut RngP,
        mut TrailP,
        mut VsidsP,
        SolverConfigP,
        VariablesP,
    ),
) -> bool {
    let decision_var = match pick_decision_var(ctx.borrow()) {
        Some(var) => var,
        None => return false,
    };

    let decision = Lit::from_var(decision_var, decision_phase(ctx.borrow(), decision_var));

    ctx.part_mut(LimitsP).decisions += 1;
    ctx.part_mut(TrailP).new_decision_level();
    enqueue_assignment(ctx.borrow(), decision, Reason::Unit);

    true
}

/// Select the next decision variable.
fn pick_decision_var(
    mut ctx: partial!(
        Context,
        mut RngP,
        mut VsidsP,
        AssignmentP,
        SolverConfigP,
        VariablesP,
    ),
) -> Option<Var> {
    let random_freq = ctx.part(SolverConfigP).random_decision_freq;
    if random_freq > 0.0 && ctx.part_mut(RngP).chance(random_freq) {
        let fraction = ctx.part_mut(RngP).next_f64();
        if let Some(var) = ctx.part(VsidsP).peek_at(fraction) {
            if var_eligible(ctx.borrow(), var) {
                return Some(var);
            }
        }
    }

    loop {
        let var = ctx.part_mut(VsidsP).pop()?;
        // Assigned and eliminated variables stay in the heap until popped;
        // unassigning re-inserts (see make_available).
        if var_eligible(ctx.borrow(), var) {
            return Some(var);
        }
    }
}

/// Whether a variable can be used as a decision.
fn var_eligible(mut ctx: partial!(Context, AssignmentP, VariablesP), var: Var) -> bool {
    let data = ctx.part(VariablesP).var_data(var);
    data.decision && !data.eliminated && ctx.part(AssignmentP).var_value(var) == None
}

/// Phase for a decision on the given variable.
///
/// A user-pinned phase wins, then the saved phase of the last assignment,
/// then the configured default.
fn decision_phase(
    mut ctx: partial!(Context, mut RngP, AssignmentP, SolverConfigP, VariablesP),
    var: Var,
) -> bool {
    if let Some(pinned) = ctx.part(VariablesP).var_data(var).pinned_phase {
        return pinned;
    }
    if let Some(saved) = ctx.part(AssignmentP).saved_phase(var) {
        return saved;
    }
    match ctx.part(SolverConfigP).default_phase {
        DefaultPhase::False => false,
        DefaultPhase::True => true,
        DefaultPhase::JeroslowWang => {
            let variables = ctx.part(VariablesP);
            variables.jwh(var.positive()) >= variables.jwh(var.negative())
        }
        DefaultPhase::Random => ctx.part_mut(RngP).chance(0.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use intersat_formula::lit;

    use crate::context::set_var_count;

    #[test]
    fn decisions_respect_pinned_phase() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 1);
        ctx.part_mut(SolverConfigP).random_decision_freq = 0.0;

        ctx.part_mut(VariablesP)
            .var_data_mut(lit!(1).var())
            .pinned_phase = Some(false);

        assert!(make_decision(ctx.borrow()));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(-1)));
        assert_eq!(ctx.part(TrailP).current_level(), 1);
    }

    #[test]
    fn saved_phase_is_reused() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 1);
        ctx.part_mut(SolverConfigP).random_decision_freq = 0.0;
        ctx.part_mut(SolverConfigP).default_phase = DefaultPhase::False;

        assert!(make_decision(ctx.borrow()));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(-1)));

        crate::prop::backtrack(ctx.borrow(), 0);

        // Pinning overrides the saved phase.
        ctx.part_mut(VariablesP)
            .var_data_mut(lit!(1).var())
            .pinned_phase = Some(true);

        assert!(make_decision(ctx.borrow()));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(1)));
    }

    #[test]
    fn no_decision_left_means_all_assigned() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 1);
        ctx.part_mut(SolverConfigP).random_decision_freq = 0.0;

        assert!(make_decision(ctx.borrow()));
        assert!(!make_decision(ctx.borrow()));
    }
}
