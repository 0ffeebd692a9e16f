//! Completeness scoring.
//!
//! Scoring is presence-weighted: a source earns its full points with one
//! item and earns nothing more for additional items.

use crate::types::{EvidenceKind, EvidenceSet};

/// Highest attainable completeness score.
pub const MAX_SCORE: u8 = 100;

/// Sum of the points of every source that contributed at least one item.
pub fn completeness_score(evidence: &EvidenceSet) -> u8 {
    EvidenceKind::ALL
        .iter()
        .filter(|kind| evidence.has(**kind))
        .map(|kind| kind.points())
        .sum()
}
