//! Best-Candidate Selector.

use std::cmp::{Ordering, Reverse};

use crate::classify::Candidate;

/// 0 for POST (any case), 1 for every other verb.
pub fn priority_rank(method: &str) -> u8 {
    if method.eq_ignore_ascii_case("POST") {
        0
    } else {
        1
    }
}

fn selection_order(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    let key = |c: &Candidate<'_>| {
        (
            priority_rank(&c.request.method),
            Reverse((c.phase_index, c.request.sequence)),
        )
    };
    key(a).cmp(&key(b)).then_with(|| a.id.cmp(b.id))
}

/// Picks the bucket's representative: POST first, then most recent, then lowest id.
pub fn select_best<'c, 'a>(candidates: &'c [Candidate<'a>]) -> Option<&'c Candidate<'a>> {
    candidates
        .iter()
        .min_by(|a, b| selection_order(a, b))
}
