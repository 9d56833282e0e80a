//! Scheduling of restarts, reductions and inprocessing.
mod luby;

use partial_ref::{partial, PartialRef};

use log::info;

use crate::config::RestartSchedule;
use crate::context::{parts::*, Context};
use crate::prop::restart;

use luby::LubySequence;

/// Restart, reduction and logging schedule state.
#[derive(Default)]
pub struct Schedule {
    /// Conflicts seen so far.
    pub conflicts: u64,
    /// Restarts executed so far.
    restarts: u64,
    /// Restarts skipped due to high agility.
    restart_skips: u64,
    /// Conflict count that triggers the next restart request.
    next_restart: u64,
    luby: LubySequence,
    /// Current inner restart interval of the geometric schedule.
    inner: f64,
    /// Current outer restart interval of the geometric schedule.
    outer: f64,
    initialized: bool,
}

impl Schedule {
    /// Restarts executed so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Restarts skipped by the agility gate so far.
    pub fn restart_skips(&self) -> u64 {
        self.restart_skips
    }
}

/// Bookkeeping at each conflict, including progress logging.
pub fn on_conflict(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        AssignmentP,
        ClauseDbP,
        SolverConfigP,
        TrailP,
        WatchlistsP,
    ),
) {
    let log_interval = ctx.part(SolverConfigP).log_interval;
    let (schedule, ctx) = ctx.split_part_mut(ScheduleP);

    schedule.conflicts += 1;

    if log_interval > 0 && schedule.conflicts % log_interval == 0 {
        let db = ctx.part(ClauseDbP);
        let units = ctx.part(TrailP).top_level_assignment_count();
        info!(
            "confl: {}k rest: {} (skip {}) vars: {} bin: {} tern: {} irred: {} red: {} agility: {:.2}",
            schedule.conflicts / 1000,
            schedule.restarts,
            schedule.restart_skips,
            ctx.part(AssignmentP).var_count() - units,
            ctx.part(WatchlistsP).binary_count(),
            ctx.part(WatchlistsP).ternary_count(),
            db.irredundant_count(),
            db.redundant_count(),
            ctx.part(AssignmentP).agility(),
        );
    }
}

/// Whether the conflict count reached the next restart threshold.
pub fn restart_due(mut ctx: partial!(Context, mut ScheduleP, SolverConfigP)) -> bool {
    let config = ctx.part(SolverConfigP);
    let luby_scale = config.luby_restart_scale;
    let inner_base = config.restart_inner_base;
    let schedule_kind = config.restart_schedule;

    let schedule = ctx.part_mut(ScheduleP);

    if !schedule.initialized {
        schedule.initialized = true;
        schedule.inner = inner_base;
        schedule.outer = inner_base;
        schedule.next_restart = match schedule_kind {
            RestartSchedule::Luby => luby_scale * schedule.luby.advance(),
            RestartSchedule::Geometric => schedule.inner as u64,
        };
    }

    schedule.conflicts >= schedule.next_restart
}

/// Execute or skip a requested restart.
///
/// A restart is skipped while the agility is above the threshold of the
/// current schedule step; the search is still flipping many saved phases
/// and considered to be making progress. Either way the next restart
/// threshold is computed.
pub fn maybe_restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ScheduleP,
        mut TrailP,
        mut VsidsP,
        AssumptionsP,
        SolverConfigP,
    ),
) {
    let agility = ctx.part(AssignmentP).agility();
    let (config, mut ctx) = ctx.split_part(SolverConfigP);

    let (interval, threshold) = match config.restart_schedule {
        RestartSchedule::Luby => {
            let schedule = ctx.part_mut(ScheduleP);
            (
                config.luby_restart_scale * schedule.luby.advance(),
                config.restart_agility_luby,
            )
        }
        RestartSchedule::Geometric => {
            let schedule = ctx.part_mut(ScheduleP);
            let outer_step = schedule.inner >= schedule.outer;
            if outer_step {
                schedule.outer *= config.restart_outer_scale;
                schedule.inner = config.restart_inner_base;
            } else {
                schedule.inner *= config.restart_inner_scale;
            }
            let threshold = if outer_step {
                config.restart_agility_outer
            } else {
                config.restart_agility_inner
            };
            (schedule.inner as u64, threshold)
        }
    };

    let skip = agility >= threshold;

    if skip {
        ctx.part_mut(ScheduleP).restart_skips += 1;
    } else {
        ctx.part_mut(ScheduleP).restarts += 1;
        restart(ctx.borrow());
    }

    let schedule = ctx.part_mut(ScheduleP);
    schedule.next_restart = schedule.conflicts + interval.max(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::config::SolverConfig;

    #[test]
    fn luby_thresholds_scale() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let scale = SolverConfig::default().luby_restart_scale;

        assert!(!restart_due(ctx.borrow()));
        assert_eq!(ctx.part(ScheduleP).next_restart, scale);

        ctx.part_mut(ScheduleP).conflicts = scale;
        assert!(restart_due(ctx.borrow()));

        // Low agility executes the restart and schedules the next one.
        maybe_restart(ctx.borrow());
        assert_eq!(ctx.part(ScheduleP).restarts(), 1);
        assert_eq!(ctx.part(ScheduleP).next_restart, 2 * scale);
    }

    #[test]
    fn geometric_inner_resets_at_outer_boundary() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        ctx.part_mut(SolverConfigP).restart_schedule = RestartSchedule::Geometric;
        ctx.part_mut(SolverConfigP).restart_inner_base = 100.0;
        ctx.part_mut(SolverConfigP).restart_inner_scale = 2.0;
        ctx.part_mut(SolverConfigP).restart_outer_scale = 2.0;

        restart_due(ctx.borrow());

        // First restart hits the outer boundary: outer doubles, inner
        // resets.
        maybe_restart(ctx.borrow());
        assert_eq!(ctx.part(ScheduleP).inner, 100.0);
        assert_eq!(ctx.part(ScheduleP).outer, 200.0);

        // Second restart grows the inner interval.
        maybe_restart(ctx.borrow());
        assert_eq!(ctx.part(ScheduleP).inner, 200.0);
        assert_eq!(ctx.part(ScheduleP).outer, 200.0);
    }
}
