//! The implication graph.
use partial_ref::{partial, PartialRef};

use intersat_formula::{Lit, LitIdx, Var};

use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};

/// Assignments that caused a propagation.
///
/// Binary and ternary implications store the remaining false literals of the
/// propagating clause inline; only long clauses are referenced through the
/// arena.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    /// Decision, assumption or top-level unit.
    Unit,
    Binary([Lit; 1]),
    Ternary([Lit; 2]),
    Long(ClauseRef),
}

impl Reason {
    /// The literals that caused the propagation.
    pub fn lits<'out, 'a, 'b>(&'a self, ctx: &'b partial!('b Context, ClauseAllocP)) -> &'out [Lit]
    where
        'a: 'out,
        'b: 'out,
    {
        match self {
            Reason::Unit => &[],
            Reason::Binary(lits) => lits,
            Reason::Ternary(lits) => lits,
            // The propagated literal is always kept at position 0
            Reason::Long(cref) => &ctx.part(ClauseAllocP).lits(*cref)[1..],
        }
    }

    /// Whether the assignment was not forced by other assignments.
    pub fn is_unit(&self) -> bool {
        matches!(self, Reason::Unit)
    }
}

/// Propagation that resulted in a conflict.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Conflict {
    Binary([Lit; 2]),
    Ternary([Lit; 3]),
    Long(ClauseRef),
}

impl Conflict {
    /// The literals of the conflicting clause.
    pub fn lits<'out, 'a, 'b>(&'a self, ctx: &'b partial!('b Context, ClauseAllocP)) -> &'out [Lit]
    where
        'a: 'out,
        'b: 'out,
    {
        match self {
            Conflict::Binary(lits) => lits,
            Conflict::Ternary(lits) => lits,
            Conflict::Long(cref) => ctx.part(ClauseAllocP).lits(*cref),
        }
    }
}

/// Node and incoming edges of the implication graph.
#[derive(Copy, Clone)]
pub struct ImplNode {
    pub reason: Reason,
    pub level: LitIdx,
}

/// The implication graph.
///
/// This is a DAG having all assigned variables as nodes. It has unit
/// clauses, assumptions and decisions as sources. For each propagated
/// assignment it has incoming edges from the literals whose assignment
/// caused the propagation to happen.
#[derive(Default)]
pub struct ImplGraph {
    /// Contains only valid data for indices of assigned variables.
    pub nodes: Vec<ImplNode>,
}

impl ImplGraph {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.nodes.resize(
            count,
            ImplNode {
                reason: Reason::Unit,
                level: 0,
            },
        );
    }

    /// Get the reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> &Reason {
        &self.nodes[var.index()].reason
    }

    /// Get the decision level of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.nodes[var.index()].level as usize
    }

    /// Updates the reason for an assigned variable.
    ///
    /// Make sure the reason vars are in front of the assigned variable in
    /// the trail.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.nodes[var.index()].reason = reason
    }

    /// Turn the reason of a variable into a top-level unit.
    pub fn update_removed_unit(&mut self, var: Var) {
        let node = &mut self.nodes[var.index()];
        node.reason = Reason::Unit;
        node.level = 0;
    }
}
