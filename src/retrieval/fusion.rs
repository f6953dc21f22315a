use std::cmp::Ordering;
use std::collections::HashMap;

use crate::database::ScoredDocument;

/// Max-score fusion of several retrieval passes.
///
/// Each document id keeps the highest score seen across all passes. Ranking
/// sorts by score descending and breaks exact ties by ascending id, so the
/// outcome does not depend on the order passes were added in.
#[derive(Debug, Default)]
pub struct MaxScoreFusion {
    best: HashMap<String, ScoredDocument>,
}

impl MaxScoreFusion {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one hit; it replaces the stored entry only with a strictly higher score
    #[inline]
    pub fn add(&mut self, hit: ScoredDocument) {
        match self.best.get_mut(&hit.document.id) {
            Some(existing) => {
                if hit.score.total_cmp(&existing.score) == Ordering::Greater {
                    *existing = hit;
                }
            }
            None => {
                self.best.insert(hit.document.id.clone(), hit);
            }
        }
    }

    #[inline]
    pub fn extend<I>(&mut self, hits: I)
    where
        I: IntoIterator<Item = ScoredDocument>,
    {
        for hit in hits {
            self.add(hit);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.best.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// Rank the fused hits and keep the top `limit`
    #[inline]
    pub fn into_ranked(self, limit: usize) -> Vec<ScoredDocument> {
        let mut ranked: Vec<ScoredDocument> = self.best.into_values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        ranked.truncate(limit);
        ranked
    }
}
