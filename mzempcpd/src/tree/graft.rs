use std::collections::HashSet;

use identity_hash::BuildIdentityHasher;
use itertools::Itertools;
use mzpeaks::Tolerance;
use tracing::{debug, warn};

use crate::index::MzIndex;
use crate::patterns::PatternTable;
use crate::peaks::{Peak, PeakKey, PeakList};

use super::forest::Forest;

/// How the retention times of two tree roots must relate for one to be a modified form
/// of the other
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RetentionTimeRule {
    /// Modifications formed in the ion source co-elute, `|Δapex| < tolerance`
    InSource { tolerance: f64 },
    /// Derivatized compounds elute strictly later than the parent
    Derivatization,
}

impl RetentionTimeRule {
    pub fn accepts(&self, parent: &Peak, modified: &Peak) -> bool {
        match self {
            Self::InSource { tolerance } => (modified.apex - parent.apex).abs() < *tolerance,
            Self::Derivatization => modified.apex > parent.apex,
        }
    }
}

/// A proposed graft of the tree rooted at `child` under the node for `parent`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraftCandidate {
    pub parent: PeakKey,
    pub child: PeakKey,
    pub relation: String,
}

#[derive(Debug, Clone, Default)]
pub struct GraftReport {
    pub candidates: Vec<GraftCandidate>,
    pub grafted: usize,
    /// Candidates not applied because the child root was already moved, or both ends
    /// already share a tree
    pub skipped: Vec<GraftCandidate>,
    /// Roots that appear both as a parent and as a modified form
    pub unresolved: Vec<PeakKey>,
}

/// Find pairs of tree roots separated by one of `patterns` and satisfying `rule`, and
/// graft the heavier root's tree under the lighter root.
pub fn merge_trees_by_modifications(
    forest: &mut Forest,
    peaks: &PeakList,
    patterns: &PatternTable,
    rule: RetentionTimeRule,
    error_tolerance: Tolerance,
) -> GraftReport {
    let roots = forest.roots();
    debug!("Merging modifications on {} trees", roots.len());
    let index = MzIndex::build_from_keys(peaks, roots.iter().copied());

    let mut candidates = Vec::new();
    for root in roots.iter().copied() {
        let p1 = &peaks[root];
        for pattern in patterns {
            for (hit, p2) in index.query_peaks(peaks, p1.search_mz() + pattern.delta, error_tolerance) {
                if hit != root && rule.accepts(p1, p2) {
                    candidates.push(GraftCandidate {
                        parent: root,
                        child: hit,
                        relation: pattern.relation.clone(),
                    });
                }
            }
        }
    }

    let parents: HashSet<PeakKey, BuildIdentityHasher<PeakKey>> =
        candidates.iter().map(|c| c.parent).collect();
    let unresolved: Vec<PeakKey> = candidates
        .iter()
        .map(|c| c.child)
        .filter(|c| parents.contains(c))
        .sorted()
        .dedup()
        .collect();
    if !unresolved.is_empty() {
        warn!(
            "Unresolved multiple relationships: {}",
            unresolved
                .iter()
                .map(|k| peaks[*k].id.as_str())
                .join(", ")
        );
    }

    let mut grafted = 0;
    let mut skipped = Vec::new();
    for candidate in candidates.iter() {
        match forest.graft(candidate.parent, candidate.child, candidate.relation.clone()) {
            Ok(_) => grafted += 1,
            Err(e) => {
                debug!(
                    "Skipping graft of {} under {}: {e}",
                    peaks[candidate.child].id, peaks[candidate.parent].id
                );
                skipped.push(candidate.clone());
            }
        }
    }
    debug!("Grafted {grafted} trees, {} trees remain", forest.len());

    GraftReport {
        candidates,
        grafted,
        skipped,
        unresolved,
    }
}

/// Graft trees related by adducts or neutral losses formed in the ion source
pub fn merge_trees_by_insrc_modifications(
    forest: &mut Forest,
    peaks: &PeakList,
    patterns: &PatternTable,
    error_tolerance: Tolerance,
    rt_tolerance: f64,
) -> GraftReport {
    merge_trees_by_modifications(
        forest,
        peaks,
        patterns,
        RetentionTimeRule::InSource {
            tolerance: rt_tolerance,
        },
        error_tolerance,
    )
}

/// Graft trees related by a chemical derivatization, which must elute later
pub fn merge_trees_by_derivatization(
    forest: &mut Forest,
    peaks: &PeakList,
    patterns: &PatternTable,
    error_tolerance: Tolerance,
) -> GraftReport {
    merge_trees_by_modifications(
        forest,
        peaks,
        patterns,
        RetentionTimeRule::Derivatization,
        error_tolerance,
    )
}
