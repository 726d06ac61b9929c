//! Tier selection: which rotation should serve the current population.

use std::cmp::Ordering;

use crate::rotation::Rotation;

/// Pick the highest tier the current player count qualifies for.
///
/// Only rotations that are enabled, non-empty and whose threshold is at most
/// `participants` are considered. Among those the largest threshold wins;
/// equal thresholds go to the alphabetically first name.
pub fn select_eligible<'a, I>(rotations: I, participants: u32) -> Option<&'a Rotation>
where
    I: IntoIterator<Item = &'a Rotation>,
{
    rotations
        .into_iter()
        .filter(|r| r.is_eligible(participants))
        .max_by(|a, b| tier_order(a, b))
}

fn tier_order(a: &Rotation, b: &Rotation) -> Ordering {
    a.players()
        .cmp(&b.players())
        .then_with(|| b.name().cmp(a.name()))
}
