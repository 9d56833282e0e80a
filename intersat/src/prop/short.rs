//! Propagation of binary and ternary watch entries.
use partial_ref::{partial, PartialRef};

use intersat_formula::Lit;

use crate::context::{parts::*, Context};

use super::enqueue_assignment;
use super::{Conflict, Reason, Watch};

/// Propagate all binary and ternary clauses watching the given literal.
///
/// `lit` is the literal that was assigned true; the watch list scanned here
/// belongs to its falsified negation. Inline entries never move, so this is
/// a read-only sweep over the list.
pub fn propagate_short(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    let (watchlists, mut ctx) = ctx.split_part(WatchlistsP);

    let false_lit = !lit;

    for &watch in watchlists.watched_by(false_lit) {
        match watch {
            Watch::Binary { implied, .. } => {
                propagate_binary(ctx.borrow(), false_lit, implied)?;
            }
            Watch::Ternary { other, .. } => {
                propagate_ternary(ctx.borrow(), false_lit, other)?;
            }
            Watch::Long { .. } => (),
        }
    }

    Ok(())
}

/// Handle a binary watch entry of the falsified literal `false_lit`.
pub(super) fn propagate_binary(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    false_lit: Lit,
    implied: Lit,
) -> Result<(), Conflict> {
    match ctx.part(AssignmentP).lit_value(implied) {
        Some(true) => Ok(()),
        Some(false) => Err(Conflict::Binary([implied, false_lit])),
        None => {
            enqueue_assignment(ctx.borrow(), implied, Reason::Binary([false_lit]));
            Ok(())
        }
    }
}

/// Handle a ternary watch entry of the falsified literal `false_lit`.
pub(super) fn propagate_ternary(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    false_lit: Lit,
    other: [Lit; 2],
) -> Result<(), Conflict> {
    let value_0 = ctx.part(AssignmentP).lit_value(other[0]);
    let value_1 = ctx.part(AssignmentP).lit_value(other[1]);

    match (value_0, value_1) {
        (Some(true), _) | (_, Some(true)) => Ok(()),
        (Some(false), Some(false)) => Err(Conflict::Ternary([other[0], other[1], false_lit])),
        (None, Some(false)) => {
            enqueue_assignment(
                ctx.borrow(),
                other[0],
                Reason::Ternary([other[1], false_lit]),
            );
            Ok(())
        }
        (Some(false), None) => {
            enqueue_assignment(
                ctx.borrow(),
                other[1],
                Reason::Ternary([other[0], false_lit]),
            );
            Ok(())
        }
        // Two unassigned literals left, nothing to do.
        (None, None) => Ok(()),
    }
}
