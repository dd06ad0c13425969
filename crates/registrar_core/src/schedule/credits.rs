//! Credit-hour accumulation against the per-student cap.

/// Maximum credit-hours a student may hold at once. Fixed policy.
pub const MAX_CREDITS: u32 = 24;

/// Sums the credit weights of held courses.
pub fn total_credits<I>(held: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    held.into_iter().fold(0u32, |total, credits| total.saturating_add(credits))
}

/// Returns whether taking `candidate` on top of `held_total` breaks the cap.
pub fn exceeds_cap(held_total: u32, candidate: u32) -> bool {
    held_total.saturating_add(candidate) > MAX_CREDITS
}
