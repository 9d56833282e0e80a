//! Model storage and extension through eliminated variables.
use partial_ref::{partial, PartialRef};

use intersat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::state::SatState;

/// The satisfying assignment of the last `solve` call.
#[derive(Default)]
pub struct Model {
    /// Assignment over all variables, including eliminated ones.
    ///
    /// Only valid while the solver state is SAT.
    assignment: Vec<Option<bool>>,
}

impl Model {
    /// Model value of a literal.
    ///
    /// Only valid while the solver state is SAT.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.assignment
            .get(lit.index())
            .cloned()
            .flatten()
            .map(|value| value ^ lit.is_negative())
    }

    /// Whether a literal is true in the model.
    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.lit_value(lit) == Some(true)
    }

    /// The model as one literal per assigned variable.
    pub fn lits(&self) -> Vec<Lit> {
        self.assignment
            .iter()
            .enumerate()
            .flat_map(|(index, &value)| value.map(|value| Lit::from_index(index, value)))
            .collect()
    }
}

/// Build the model from the current full assignment and extend it to the
/// eliminated variables.
///
/// The search only sees the reduced formula; the elimination history
/// replays the removed clauses in reverse to pick values for eliminated
/// variables that satisfy the original formula. Sets the solver state to
/// SAT.
pub fn reconstruct_model(
    mut ctx: partial!(
        Context,
        mut ModelP,
        mut SolverStateP,
        AssignmentP,
        ElimHistoryP,
    ),
) {
    let (model, mut ctx) = ctx.split_part_mut(ModelP);

    model.assignment.clear();
    model
        .assignment
        .extend_from_slice(ctx.part(AssignmentP).assignment());

    ctx.part(ElimHistoryP).extend_model(&mut model.assignment);

    ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
}
