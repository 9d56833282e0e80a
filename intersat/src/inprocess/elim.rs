//! Bounded variable elimination.
//!
//! A variable `v` can be eliminated by replacing all clauses containing it
//! with the non-tautological resolvents between its positive and negative
//! occurrences. This is done only when the number of resolvents does not
//! grow the formula beyond a configured slack and no resolvent exceeds a
//! size cap.
//!
//! The removed occurrences of one polarity are recorded on an elimination
//! history; once a model of the reduced formula is found, replaying the
//! history in reverse picks values for the eliminated variables that
//! satisfy all original clauses.
use partial_ref::{partial, PartialRef};

use intersat_formula::{Lit, Var};

use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};
use crate::load::{store_clause, StoredClause};
use crate::prop::{propagate, Watch};
use crate::state::SatState;

use super::delete_long_with_occ;

/// LIFO log of eliminated variables and their clauses.
///
/// Stored as a flat literal buffer with a parallel length stack. The first
/// literal of each recorded clause is the eliminated variable's literal.
#[derive(Default)]
pub struct ElimHistory {
    literals: Vec<Lit>,
    sizes: Vec<usize>,
}

impl ElimHistory {
    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Record one removed occurrence of an eliminated variable.
    pub fn record_clause(&mut self, var: Var, lits: &[Lit]) {
        debug_assert!(lits.len() > 1);
        let first = self.literals.len();

        let mut var_at = None;
        for (at, &lit) in lits.iter().enumerate() {
            self.literals.push(lit);
            if lit.var() == var {
                var_at = Some(first + at);
            }
        }

        // The eliminated variable's literal goes in front, model extension
        // assigns it when the remaining literals are all false.
        let var_at = var_at.expect("recorded clause misses the eliminated variable");
        self.literals.swap(first, var_at);

        self.sizes.push(lits.len());
    }

    /// Record the default polarity of an eliminated variable.
    ///
    /// Recorded after the clauses of [`record_clause`], so that the reverse
    /// replay sees it first; it satisfies all occurrences of the other
    /// polarity.
    pub fn record_unit(&mut self, lit: Lit) {
        self.literals.push(lit);
        self.sizes.push(1);
    }

    /// Extend a model of the reduced formula to the eliminated variables.
    pub fn extend_model(&self, assignment: &mut Vec<Option<bool>>) {
        let mut end = self.literals.len();

        for &size in self.sizes.iter().rev() {
            let clause = &self.literals[end - size..end];
            end -= size;

            let (&first, rest) = clause.split_first().unwrap();

            let satisfied = rest.iter().any(|&lit| {
                assignment[lit.index()] == Some(lit.is_positive())
            });

            if !satisfied {
                assignment[first.index()] = Some(first.is_positive());
            }
        }
    }
}

/// A materialized occurrence of the variable being eliminated.
struct OccClause {
    lits: Vec<Lit>,
    source: OccSource,
    redundant: bool,
}

enum OccSource {
    Long(ClauseRef),
    Binary([Lit; 2]),
    Ternary([Lit; 3]),
}

/// Run one bounded variable elimination pass.
pub fn eliminate_pass<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ElimHistoryP,
        mut ImplGraphP,
        mut InprocessP,
        mut LimitsP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    if ctx.part_mut(LimitsP).interrupted() {
        return;
    }

    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let grow = ctx.part(SolverConfigP).elim_grow;
    let clause_limit = ctx.part(SolverConfigP).elim_clause_limit;
    let mut steps = ctx.part(SolverConfigP).elim_budget;

    let mut eliminated = 0u64;

    let candidates = elim_candidates(ctx.borrow());

    'vars: for var in candidates {
        if steps == 0 {
            break;
        }
        {
            let data = ctx.part(VariablesP).var_data(var);
            if data.eliminated || data.frozen {
                continue;
            }
        }
        if ctx.part(AssignmentP).var_value(var) != None {
            continue;
        }

        let (pos, neg) = gather_occurrences(ctx.borrow(), var);

        // Resolve only the irredundant occurrences; redundant clauses are
        // implied and simply dropped with the variable.
        let pos_count = pos.iter().filter(|c| !c.redundant).count();
        let neg_count = neg.iter().filter(|c| !c.redundant).count();
        let allowed = pos_count + neg_count + grow;

        let mut resolvents: Vec<Vec<Lit>> = vec![];

        for c in pos.iter().filter(|c| !c.redundant) {
            for d in neg.iter().filter(|d| !d.redundant) {
                steps = steps.saturating_sub(1);
                if let Some(resolvent) = merge(var, &c.lits, &d.lits) {
                    if resolvent.len() > clause_limit || resolvents.len() == allowed {
                        continue 'vars;
                    }
                    resolvents.push(resolvent);
                }
                if steps == 0 {
                    continue 'vars;
                }
            }
        }

        eliminate_var(ctx.borrow(), var, &pos, &neg, &resolvents);
        eliminated += 1;

        if ctx.part(SolverStateP).sat_state != SatState::Unknown {
            break;
        }
    }

    log::info!("elim: {} variables eliminated", eliminated);
}

/// Commit the elimination of a variable.
fn eliminate_var<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ElimHistoryP,
        mut ImplGraphP,
        mut InprocessP,
        mut LimitsP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TraceP<'a>,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    var: Var,
    pos: &[OccClause],
    neg: &[OccClause],
    resolvents: &[Vec<Lit>],
) {
    // Record the smaller irredundant side plus the default polarity that
    // satisfies the larger side.
    {
        let pos_count = pos.iter().filter(|c| !c.redundant).count();
        let neg_count = neg.iter().filter(|c| !c.redundant).count();

        let (small, unit) = if pos_count > neg_count {
            (neg, var.positive())
        } else {
            (pos, var.negative())
        };

        let history = ctx.part_mut(ElimHistoryP);
        for occ in small.iter().filter(|c| !c.redundant) {
            history.record_clause(var, &occ.lits);
        }
        history.record_unit(unit);
    }

    // The resolvents are consequences of the clauses deleted below; a
    // clausal proof needs them added first.
    for resolvent in resolvents.iter() {
        ctx.part_mut(TraceP).learned(resolvent);
    }

    for occ in pos.iter().chain(neg.iter()) {
        match occ.source {
            OccSource::Long(cref) => delete_long_with_occ(ctx.borrow(), cref),
            OccSource::Binary(lits) => {
                ctx.part_mut(TraceP).deleted(&lits);
                ctx.part_mut(WatchlistsP).unwatch_binary(lits);
            }
            OccSource::Ternary(lits) => {
                ctx.part_mut(TraceP).deleted(&lits);
                ctx.part_mut(WatchlistsP).unwatch_ternary(lits);
            }
        }
    }

    {
        let data = ctx.part_mut(VariablesP).var_data_mut(var);
        data.eliminated = true;
        data.decision = false;
    }

    // Earlier eliminations of this pass may have assigned variables at the
    // top level; simplify each resolvent against those assignments right
    // before it is stored.
    let mut filtered: Vec<Lit> = vec![];
    for resolvent in resolvents.iter() {
        filtered.clear();
        let mut satisfied = false;
        for &lit in resolvent.iter() {
            match ctx.part(AssignmentP).lit_value(lit) {
                Some(true) => {
                    satisfied = true;
                    break;
                }
                Some(false) => (),
                None => filtered.push(lit),
            }
        }
        if satisfied {
            ctx.part_mut(TraceP).deleted(resolvent);
            continue;
        }
        if filtered.len() < resolvent.len() {
            ctx.part_mut(TraceP).learned(&filtered);
            ctx.part_mut(TraceP).deleted(resolvent);
        }
        if filtered.is_empty() {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return;
        }
        if let StoredClause::Long(cref) = store_clause(ctx.borrow(), &filtered, false) {
            for &lit in filtered.iter() {
                ctx.part_mut(InprocessP).occ.add(lit, cref);
            }
        }
    }

    // Unit resolvents need to reach their propagation fixpoint.
    if propagate(ctx.borrow()).is_err() {
        ctx.part_mut(TraceP).learned(&[]);
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
    }
}

/// Materialize all clauses containing the variable, in both polarities.
fn gather_occurrences(
    mut ctx: partial!(Context, ClauseAllocP, InprocessP, WatchlistsP),
    var: Var,
) -> (Vec<OccClause>, Vec<OccClause>) {
    let mut sides = [vec![], vec![]];

    for (side, &lit) in [var.positive(), var.negative()].iter().enumerate() {
        let side = &mut sides[side];

        for &cref in ctx.part(InprocessP).occ.lookup(lit) {
            let header = ctx.part(ClauseAllocP).header(cref);
            if header.deleted() {
                continue;
            }
            side.push(OccClause {
                lits: ctx.part(ClauseAllocP).lits(cref).to_vec(),
                source: OccSource::Long(cref),
                redundant: header.redundant(),
            });
        }

        for watch in ctx.part(WatchlistsP).watched_by(lit) {
            match *watch {
                Watch::Binary { implied, redundant } => side.push(OccClause {
                    lits: vec![lit, implied],
                    source: OccSource::Binary([lit, implied]),
                    redundant,
                }),
                Watch::Ternary { other, redundant } => side.push(OccClause {
                    lits: vec![lit, other[0], other[1]],
                    source: OccSource::Ternary([lit, other[0], other[1]]),
                    redundant,
                }),
                Watch::Long { .. } => (),
            }
        }
    }

    let [pos, neg] = sides;
    (pos, neg)
}

/// Resolve two clauses on a variable.
///
/// Returns `None` for tautological resolvents.
fn merge(var: Var, c: &[Lit], d: &[Lit]) -> Option<Vec<Lit>> {
    let mut resolvent: Vec<Lit> = c.iter().cloned().filter(|lit| lit.var() != var).collect();

    for &lit in d {
        if lit.var() == var {
            continue;
        }
        if resolvent.contains(&!lit) {
            return None;
        }
        if !resolvent.contains(&lit) {
            resolvent.push(lit);
        }
    }

    Some(resolvent)
}

/// Unassigned eliminable variables, cheapest first.
fn elim_candidates(
    mut ctx: partial!(Context, AssignmentP, InprocessP, VariablesP, WatchlistsP),
) -> Vec<Var> {
    let var_count = ctx.part(AssignmentP).var_count();

    let mut candidates: Vec<(usize, Var)> = vec![];

    for index in 0..var_count {
        let var = Var::from_index(index);
        let data = ctx.part(VariablesP).var_data(var);
        if data.eliminated || data.frozen || !data.decision {
            continue;
        }
        if ctx.part(AssignmentP).var_value(var) != None {
            continue;
        }

        let mut cost = 0;
        for &lit in [var.positive(), var.negative()].iter() {
            cost += ctx.part(InprocessP).occ.count(lit);
            cost += ctx
                .part(WatchlistsP)
                .watched_by(lit)
                .iter()
                .filter(|watch| !matches!(watch, Watch::Long { .. }))
                .count();
        }

        // A variable without occurrences constrains nothing; leave it
        // usable instead of marking it eliminated.
        if cost == 0 {
            continue;
        }

        candidates.push((cost, var));
    }

    candidates.sort();
    candidates.into_iter().map(|(_, var)| var).collect()
}
