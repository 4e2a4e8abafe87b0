use std::collections::HashSet;
use std::hash::Hash;

/// Entries left after collapsing natural-key duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated<T> {
    pub kept: Vec<T>,
    pub discarded: usize,
}

/// Keep the first entry for every key, in submission order.
pub fn first_wins<T, K, F>(entries: Vec<T>, key: F) -> Deduplicated<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let total = entries.len();
    let mut seen = HashSet::with_capacity(total);
    let kept: Vec<T> = entries
        .into_iter()
        .filter(|entry| seen.insert(key(entry)))
        .collect();

    Deduplicated {
        discarded: total - kept.len(),
        kept,
    }
}
