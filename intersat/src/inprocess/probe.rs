//! Failed literal probing.
//!
//! Assumes a literal at a fresh decision level, propagates and undoes the
//! assignment. A conflict makes the negated literal a top-level unit. When
//! both polarities of a variable survive probing, any literal forced by
//! both is a top-level unit as well (lifting); the two implications proving
//! it are reported to the trace sink so the lifted unit stays checkable by
//! unit propagation.
use partial_ref::{partial, PartialRef};

use ordered_float::OrderedFloat;

use intersat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{backtrack, enqueue_assignment, propagate, Reason, Watch};
use crate::state::SatState;

/// Run one probing pass.
pub fn probe<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut InprocessP,
        mut LimitsP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
        VariablesP,
    ),
) {
    if ctx.part_mut(LimitsP).interrupted() {
        return;
    }

    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let candidates = probe_candidates(ctx.borrow());

    let start = ctx.part(LimitsP).propagations;
    let mut bound = ctx.part(SolverConfigP).probe_budget;
    let reward = ctx.part(SolverConfigP).probe_reward;

    let mut forced: Vec<Lit> = vec![];
    let mut lifted: Vec<Lit> = vec![];

    let mut failed = 0u64;
    let mut lifted_count = 0u64;

    for var in candidates {
        if ctx.part(LimitsP).propagations - start >= bound {
            break;
        }
        if ctx.part(AssignmentP).var_value(var) != None {
            continue;
        }

        let lit = var.positive();

        // Probe the positive phase.
        let mark = ctx.part(TrailP).trail().len();
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit, Reason::Unit);

        if propagate(ctx.borrow()).is_err() {
            backtrack(ctx.borrow(), 0);
            failed += 1;
            bound += reward;
            if !learn_probed_unit(ctx.borrow(), !lit) {
                return;
            }
            continue;
        }

        forced.clear();
        forced.extend_from_slice(&ctx.part(TrailP).trail()[mark + 1..]);
        backtrack(ctx.borrow(), 0);

        // Probe the negative phase.
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), !lit, Reason::Unit);

        if propagate(ctx.borrow()).is_err() {
            backtrack(ctx.borrow(), 0);
            failed += 1;
            bound += reward;
            if !learn_probed_unit(ctx.borrow(), lit) {
                return;
            }
            continue;
        }

        // A literal forced by both polarities does not depend on the probe.
        lifted.clear();
        for &other in forced.iter() {
            if other != lit && ctx.part(AssignmentP).lit_is_true(other) {
                lifted.push(other);
            }
        }
        backtrack(ctx.borrow(), 0);

        for &other in lifted.iter() {
            lifted_count += 1;
            bound += reward;

            // Emit the two implications so the unit is a propagation
            // consequence for a clausal proof checker; they are dropped
            // again right after.
            let up = [!lit, other];
            let down = [lit, other];
            ctx.part_mut(TraceP).learned(&up);
            ctx.part_mut(TraceP).learned(&down);

            let keep_going = learn_probed_unit(ctx.borrow(), other);

            ctx.part_mut(TraceP).deleted(&up);
            ctx.part_mut(TraceP).deleted(&down);

            if !keep_going {
                return;
            }
        }
    }

    ctx.part_mut(InprocessP).probe_rounds += 1;

    log::info!(
        "probe: {} failed, {} lifted, {} propagations",
        failed,
        lifted_count,
        ctx.part(LimitsP).propagations - start
    );
}

/// Enqueue a unit learned by probing and propagate it.
///
/// Returns `false` if this made the formula unsatisfiable.
fn learn_probed_unit<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut LimitsP<'a>,
        mut SolverStateP,
        mut TraceP<'a>,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    unit: Lit,
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    match ctx.part(AssignmentP).lit_value(unit) {
        Some(true) => true,
        Some(false) => {
            ctx.part_mut(TraceP).learned(&[unit]);
            ctx.part_mut(TraceP).learned(&[]);
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            false
        }
        None => {
            ctx.part_mut(TraceP).learned(&[unit]);
            enqueue_assignment(ctx.borrow(), unit, Reason::Unit);
            if propagate(ctx.borrow()).is_err() {
                ctx.part_mut(TraceP).learned(&[]);
                ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                return false;
            }
            true
        }
    }
}

/// Variables worth probing, most promising first.
///
/// Only unassigned variables with binary occurrences in both polarities can
/// fail or lift anything through binary implications alone; restricting to
/// them keeps the pass cheap. The first round orders by Jeroslow-Wang
/// scores, later rounds by current activity.
fn probe_candidates(
    mut ctx: partial!(
        Context,
        AssignmentP,
        InprocessP,
        VariablesP,
        VsidsP,
        WatchlistsP,
    ),
) -> Vec<Var> {
    let var_count = ctx.part(AssignmentP).var_count();
    let first_round = ctx.part(InprocessP).probe_rounds == 0;

    let mut candidates: Vec<(OrderedFloat<f64>, Var)> = vec![];

    for index in 0..var_count {
        let var = Var::from_index(index);
        let data = ctx.part(VariablesP).var_data(var);
        if data.eliminated || !data.decision {
            continue;
        }
        if ctx.part(AssignmentP).var_value(var) != None {
            continue;
        }

        let has_bins = |lit: Lit| {
            ctx.part(WatchlistsP)
                .watched_by(lit)
                .iter()
                .any(|watch| matches!(watch, Watch::Binary { .. }))
        };
        if !has_bins(var.positive()) || !has_bins(var.negative()) {
            continue;
        }

        let score = if first_round {
            ctx.part(VariablesP).jwh(var.positive()) + ctx.part(VariablesP).jwh(var.negative())
        } else {
            ctx.part(VsidsP).activity(var) as f64
        };
        candidates.push((OrderedFloat(score), var));
    }

    // Highest score first, variable index breaks ties deterministically.
    candidates.sort_by_key(|&(score, var)| (std::cmp::Reverse(score), var));
    candidates.into_iter().map(|(_, var)| var).collect()
}
