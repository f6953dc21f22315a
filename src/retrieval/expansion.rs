use itertools::Itertools;

use super::entities::extract_entities;

/// Default cap on query variants, the question itself included
pub const DEFAULT_MAX_QUERY_VARIANTS: usize = 3;

/// Build the query variants for `question`.
///
/// The first variant is always `question` verbatim. Each entity found in the
/// question adds `"{entity} Formula 1"`, in vocabulary order, until
/// `max_variants` is reached. A cap of zero still keeps the question.
#[inline]
pub fn expand_query(question: &str, max_variants: usize) -> Vec<String> {
    let cap = max_variants.max(1);

    std::iter::once(question.to_string())
        .chain(
            extract_entities(question)
                .into_iter()
                .map(|entity| format!("{entity} Formula 1")),
        )
        .unique()
        .take(cap)
        .collect()
}
