//! Central solver data structure.
//!
//! This module defines the `Context` data structure which holds all data
//! used by the solver. It also contains global notification functions that
//! likely need to be extended when new parts are added to the solver.
use partial_ref::{part, partial, PartialRef, PartialRefTarget};

use crate::analyze::AnalyzeConflict;
use crate::assumptions::Assumptions;
use crate::clause::{ClauseActivity, ClauseAlloc, ClauseDb, Reduce};
use crate::config::SolverConfig;
use crate::decision::vsids::Vsids;
use crate::inprocess::elim::ElimHistory;
use crate::inprocess::Inprocess;
use crate::limits::Limits;
use crate::model::Model;
use crate::prop::{Assignment, ImplGraph, Trail, Watchlists};
use crate::rng::SolverRng;
use crate::schedule::Schedule;
use crate::state::SolverState;
use crate::tmp::TmpData;
use crate::trace::Trace;
use crate::variables::Variables;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub AnalyzeConflictP: AnalyzeConflict);
    part!(pub AssignmentP: Assignment);
    part!(pub AssumptionsP: Assumptions);
    part!(pub ClauseActivityP: ClauseActivity);
    part!(pub ClauseAllocP: ClauseAlloc);
    part!(pub ClauseDbP: ClauseDb);
    part!(pub ElimHistoryP: ElimHistory);
    part!(pub ImplGraphP: ImplGraph);
    part!(pub InprocessP: Inprocess);
    part!(pub LimitsP<'a>: Limits<'a>);
    part!(pub ModelP: Model);
    part!(pub ReduceP: Reduce);
    part!(pub RngP: SolverRng);
    part!(pub ScheduleP: Schedule);
    part!(pub SolverConfigP: SolverConfig);
    part!(pub SolverStateP: SolverState);
    part!(pub TmpDataP: TmpData);
    part!(pub TraceP<'a>: Trace<'a>);
    part!(pub TrailP: Trail);
    part!(pub VariablesP: Variables);
    part!(pub VsidsP: Vsids);
    part!(pub WatchlistsP: Watchlists);
}

use parts::*;

/// Central solver data structure.
///
/// This struct contains all data kept by the solver. Most functions
/// operating on multiple fields of the context use partial references
/// provided by the `partial_ref` crate. This documents the data dependencies
/// and makes the borrow checker happy without the overhead of passing
/// individual references.
#[derive(PartialRefTarget, Default)]
pub struct Context<'a> {
    #[part(AnalyzeConflictP)]
    pub analyze_conflict: AnalyzeConflict,
    #[part(AssignmentP)]
    pub assignment: Assignment,
    #[part(AssumptionsP)]
    pub assumptions: Assumptions,
    #[part(ClauseActivityP)]
    pub clause_activity: ClauseActivity,
    #[part(ClauseAllocP)]
    pub clause_alloc: ClauseAlloc,
    #[part(ClauseDbP)]
    pub clause_db: ClauseDb,
    #[part(ElimHistoryP)]
    pub elim_history: ElimHistory,
    #[part(ImplGraphP)]
    pub impl_graph: ImplGraph,
    #[part(InprocessP)]
    pub inprocess: Inprocess,
    #[part(LimitsP<'a>)]
    pub limits: Limits<'a>,
    #[part(ModelP)]
    pub model: Model,
    #[part(ReduceP)]
    pub reduce: Reduce,
    #[part(RngP)]
    pub rng: SolverRng,
    #[part(ScheduleP)]
    pub schedule: Schedule,
    #[part(SolverConfigP)]
    pub solver_config: SolverConfig,
    #[part(SolverStateP)]
    pub solver_state: SolverState,
    #[part(TmpDataP)]
    pub tmp_data: TmpData,
    #[part(TraceP<'a>)]
    pub trace: Trace<'a>,
    #[part(TrailP)]
    pub trail: Trail,
    #[part(VariablesP)]
    pub variables: Variables,
    #[part(VsidsP)]
    pub vsids: Vsids,
    #[part(WatchlistsP)]
    pub watchlists: Watchlists,
}

/// Update structures for a new variable count.
pub fn set_var_count(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ImplGraphP,
        mut TmpDataP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    count: usize,
) {
    ctx.part_mut(AnalyzeConflictP).set_var_count(count);
    ctx.part_mut(AssignmentP).set_var_count(count);
    ctx.part_mut(ImplGraphP).set_var_count(count);
    ctx.part_mut(TmpDataP).set_var_count(count);
    ctx.part_mut(VariablesP).set_var_count(count);
    ctx.part_mut(VsidsP).set_var_count(count);
    ctx.part_mut(WatchlistsP).set_var_count(count);
}

/// Grow the structures to cover all variables created so far.
pub fn ensure_var_count(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ImplGraphP,
        mut TmpDataP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    let count = ctx.part(VariablesP).count();
    if count > ctx.part(AssignmentP).var_count() {
        set_var_count(ctx.borrow(), count)
    }
}

/// The solver configuration has changed.
pub fn config_changed(
    mut ctx: partial!(Context, mut ClauseActivityP, mut VsidsP, SolverConfigP),
) {
    let (config, mut ctx) = ctx.split_part(SolverConfigP);
    ctx.part_mut(VsidsP).set_decay(config.vsids_decay);
    ctx.part_mut(ClauseActivityP)
        .set_decay(config.clause_activity_decay);
}
