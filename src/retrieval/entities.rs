use itertools::Itertools;

use crate::vocabulary::canonical_names;

/// Find every known driver, team and circuit named in `text`.
///
/// Matching is case-insensitive substring containment, so `"VERSTAPPEN wins"`
/// and `"Verstappen wins"` both yield `["Verstappen"]`. Results come back in
/// vocabulary order (drivers, then teams, then circuits) without duplicates.
#[inline]
pub fn extract_entities(text: &str) -> Vec<&'static str> {
    if text.is_empty() {
        return Vec::new();
    }

    let haystack = text.to_lowercase();
    canonical_names()
        .map(|(_, name)| name)
        .filter(|name| haystack.contains(&name.to_lowercase()))
        .unique()
        .collect()
}

/// Case-insensitive containment used for entity-scoped filtering
#[inline]
pub fn mentions(haystack: &str, entity: &str) -> bool {
    haystack.to_lowercase().contains(&entity.to_lowercase())
}
