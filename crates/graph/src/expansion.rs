use crate::types::RelationTiers;
use std::collections::HashSet;

/// Threads worth pulling in alongside `thread`: directly related first, then often,
/// then occasionally, each name once at its strongest position.
pub fn recommend_expansion(thread: &str, tiers: &RelationTiers) -> Vec<String> {
    dedup_in_order(thread, tiers.iter().map(|(_, name)| name))
}

/// First-occurrence de-duplication that also drops `thread` itself.
fn dedup_in_order<'a>(
    thread: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| !name.is_empty() && *name != thread)
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
