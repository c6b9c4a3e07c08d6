//! Order number generation
//!
//! Format `<PREFIX>-<YY><MM>-<NNNN>`, e.g. `BOX-2403-0042`. The suffix is
//! random within the month; suffixes already taken that month are excluded
//! up front so the 10,000 slots of a month can all be handed out.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

/// Number of suffixes available per month
pub const SUFFIX_SPACE: u16 = 10_000;

/// Random draws before falling back to scanning the free slots
const RANDOM_TRIES: usize = 32;

/// `BOX-2403-`
pub fn month_prefix(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-{:02}{:02}-", prefix, at.year() % 100, at.month())
}

/// Suffix of an order number that belongs to `month_prefix`
pub fn parse_suffix(month_prefix: &str, order_number: &str) -> Option<u16> {
    let suffix = order_number.strip_prefix(month_prefix)?;
    if suffix.len() != 4 {
        return None;
    }
    suffix.parse().ok().filter(|n| *n < SUFFIX_SPACE)
}

/// Pick a free order number for the month, `None` when every suffix is used
pub fn pick_order_number<R: Rng + ?Sized>(
    month_prefix: &str,
    used: &HashSet<u16>,
    rng: &mut R,
) -> Option<String> {
    if used.len() >= usize::from(SUFFIX_SPACE) {
        return None;
    }

    let suffix = (0..RANDOM_TRIES)
        .map(|_| rng.gen_range(0..SUFFIX_SPACE))
        .find(|n| !used.contains(n))
        .or_else(|| {
            // Crowded month: choose uniformly among the remaining slots
            let free: Vec<u16> = (0..SUFFIX_SPACE).filter(|n| !used.contains(n)).collect();
            if free.is_empty() {
                None
            } else {
                Some(free[rng.gen_range(0..free.len())])
            }
        })?;

    Some(format!("{month_prefix}{suffix:04}"))
}
