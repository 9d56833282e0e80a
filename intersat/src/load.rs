//! Adding clauses to the working formula.
use partial_ref::{partial, PartialRef};

use intersat_formula::Lit;

use crate::clause::{db, ClauseHeader, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, full_restart, Reason};
use crate::state::SatState;

/// Where a stored clause ended up.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StoredClause {
    Empty,
    Unit(Lit),
    Binary([Lit; 2]),
    Ternary([Lit; 3]),
    Long(ClauseRef),
}

/// Store a clause and attach its watches.
///
/// Dispatches among the unit, binary, ternary and long representations.
/// The literals must be nonempty, free of duplicates, unassigned and sorted
/// into watch order for long clauses (any order is fine up to length 3). No
/// trace event is emitted here. May only be called at decision level 0.
pub fn store_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lits: &[Lit],
    redundant: bool,
) -> StoredClause {
    match *lits {
        [] => StoredClause::Empty,
        [lit] => {
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
            StoredClause::Unit(lit)
        }
        [lit_0, lit_1] => {
            ctx.part_mut(WatchlistsP).watch_binary([lit_0, lit_1], redundant);
            StoredClause::Binary([lit_0, lit_1])
        }
        [lit_0, lit_1, lit_2] => {
            ctx.part_mut(WatchlistsP)
                .watch_ternary([lit_0, lit_1, lit_2], redundant);
            StoredClause::Ternary([lit_0, lit_1, lit_2])
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_redundant(redundant);
            let cref = db::add_clause(ctx.borrow(), header, lits);
            ctx.part_mut(WatchlistsP)
                .watch_long(cref, [lits[0], lits[1]]);
            StoredClause::Long(cref)
        }
    }
}

/// Adds a clause to the current formula.
///
/// Removes duplicated literals, ignores tautological clauses (eg. x v -x v
/// y), handles empty clauses and dispatches among the clause
/// representations. Clauses simplified against the top-level assignment emit
/// the corresponding trace events.
///
/// Does not adjust the solver's variable count. If necessary that has to be
/// done before calling this.
pub fn load_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    lits: &[Lit],
) {
    match ctx.part(SolverStateP).sat_state {
        SatState::Unsat => return,
        SatState::Sat | SatState::UnsatUnderAssumptions => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unknown;
        }
        SatState::Unknown => {}
    }

    ctx.part_mut(SolverStateP).clauses_added = true;

    // Restart the search when the user adds new clauses.
    full_restart(ctx.borrow());

    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp_data.lits.clear();
    tmp_data.lits.extend_from_slice(lits);
    let lits = &mut tmp_data.lits;
    let simplified_lits = &mut tmp_data.lits_2;

    lits.sort_unstable();
    lits.dedup();

    // Detect tautological clauses.
    let mut last = None;

    for &lit in lits.iter() {
        if last == Some(!lit) {
            return;
        }
        last = Some(lit);
    }

    // Remove false literals and satisfied clauses. Only the top level is
    // assigned here, so dropped literals are consequences of unit clauses.
    simplified_lits.clear();

    for &lit in lits.iter() {
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => return,
            Some(false) => (),
            None => {
                simplified_lits.push(lit);
            }
        }
    }

    if simplified_lits.len() < lits.len() && ctx.part(TraceP).is_active() {
        ctx.part_mut(TraceP).learned(simplified_lits);
        ctx.part_mut(TraceP).deleted(lits);
    }

    // The Jeroslow-Wang scores only track the clauses added by the user.
    for &lit in simplified_lits.iter() {
        let len = simplified_lits.len();
        ctx.part_mut(VariablesP).bump_jwh(lit, len);
    }

    if let StoredClause::Empty = store_clause(ctx.borrow(), simplified_lits, false) {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
    }
}
