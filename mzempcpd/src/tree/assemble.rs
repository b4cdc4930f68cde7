use std::collections::{HashSet, VecDeque};

use identity_hash::BuildIdentityHasher;
use mzpeaks::Tolerance;
use tracing::{debug, trace, warn};

use crate::index::MzIndex;
use crate::patterns::PatternTable;
use crate::peaks::{PeakKey, PeakList};

use super::forest::Forest;
use super::node::TreeError;

/// A directed isotope relationship from a lighter peak to a heavier one
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopePair {
    pub lighter: PeakKey,
    pub heavier: PeakKey,
    pub relation: String,
}

/// Parameters for building isotope trees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TreeParams {
    pub mz_tolerance_ppm: f64,
    /// The maximum apex distance between the two peaks of an isotope pair
    pub isotope_rt_tolerance: f64,
    pub check_ratio: bool,
    /// The maximum number of isotope steps from a root, also bounding how many times
    /// branches whose parent is not yet placed are retried
    pub tree_depth_limit: usize,
    /// Give every peak not placed in an isotope tree a tree of its own
    pub include_singletons: bool,
    /// The apex distance allowed between in-source modification roots
    pub graft_rt_tolerance: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            mz_tolerance_ppm: 5.0,
            isotope_rt_tolerance: 2.0,
            check_ratio: false,
            tree_depth_limit: 10,
            include_singletons: false,
            graft_rt_tolerance: 10.0,
        }
    }
}

impl TreeParams {
    pub fn error_tolerance(&self) -> Tolerance {
        Tolerance::PPM(self.mz_tolerance_ppm)
    }
}

/// Find every lighter to heavier isotope pair, in peak list then pattern order.
pub fn find_isotopic_pairs(
    peaks: &PeakList,
    index: &MzIndex,
    patterns: &PatternTable,
    params: &TreeParams,
) -> Vec<IsotopePair> {
    let error_tolerance = params.error_tolerance();
    let mut pairs = Vec::new();
    for (lighter, p1) in peaks.keys().zip(peaks.iter()) {
        for pattern in patterns {
            for (heavier, p2) in index.query_peaks(peaks, p1.search_mz() + pattern.delta, error_tolerance) {
                if heavier == lighter || (p1.apex - p2.apex).abs() > params.isotope_rt_tolerance {
                    continue;
                }
                if params.check_ratio && !pattern.ratio_accepts(p1.height, p2.height) {
                    continue;
                }
                pairs.push(IsotopePair {
                    lighter,
                    heavier,
                    relation: pattern.relation.clone(),
                });
            }
        }
    }
    pairs
}

/// The outcome of [`construct_isotopic_trees`]
#[derive(Debug, Clone, Default)]
pub struct IsotopeTreeAssembly {
    pub forest: Forest,
    pub pair_count: usize,
    /// The number of pairs whose lighter peak was itself the heavier peak of some pair
    pub initial_branches: usize,
    /// Pairs never attached, because their lighter peak was never placed or because
    /// the heavier peak would sit deeper than [`TreeParams::tree_depth_limit`]
    pub remaining: Vec<IsotopePair>,
    /// Pairs whose heavier peak was already placed in a different tree
    pub ambiguous: Vec<IsotopePair>,
    /// How many retry passes over the branch worklist ran
    pub iterations: usize,
    pub singletons: usize,
}

impl IsotopeTreeAssembly {
    pub fn unplaced_count(&self, peaks: &PeakList) -> usize {
        peaks.len() - self.forest.node_count()
    }
}

enum Placement {
    Placed,
    Deferred,
    Rejected,
    TooDeep,
}

fn place_pair(
    forest: &mut Forest,
    peaks: &PeakList,
    pair: &IsotopePair,
    depth_limit: usize,
    ambiguous: &mut Vec<IsotopePair>,
) -> Placement {
    let Some(source_tree) = forest.tree_of(pair.lighter) else {
        return Placement::Deferred;
    };
    let depth = forest
        .get(source_tree)
        .and_then(|t| t.depth_of(pair.lighter))
        .unwrap_or_default();
    if depth + 1 > depth_limit {
        trace!(
            "Not attaching {} beneath {} at depth {}",
            peaks[pair.heavier].id,
            peaks[pair.lighter].id,
            depth + 1
        );
        return Placement::TooDeep;
    }
    match forest.attach(
        pair.lighter,
        pair.heavier,
        peaks[pair.heavier].tag(),
        pair.relation.clone(),
    ) {
        Ok(_) => Placement::Placed,
        Err(TreeError::DuplicatedNode(_)) => {
            if forest.tree_of(pair.heavier) != Some(source_tree) {
                warn!(
                    "Peak {} is related to trees rooted at {} and {}, leaving it in the first",
                    peaks[pair.heavier].id,
                    forest
                        .tree_containing(pair.heavier)
                        .map(|t| peaks[t.root_peak()].id.as_str())
                        .unwrap_or_default(),
                    forest
                        .tree_containing(pair.lighter)
                        .map(|t| peaks[t.root_peak()].id.as_str())
                        .unwrap_or_default(),
                );
                ambiguous.push(pair.clone());
            }
            Placement::Rejected
        }
        Err(_) => Placement::Deferred,
    }
}

/// Build isotope trees from the directed isotope pairs among `peaks`.
///
/// Pairs whose lighter peak is never a heavier peak start trees. The remaining pairs
/// are attached in one pass, and those whose lighter peak was not yet placed are
/// retried at most [`TreeParams::tree_depth_limit`] more times, stopping early once a
/// pass changes nothing. No peak is placed deeper than the depth limit.
pub fn construct_isotopic_trees(
    peaks: &PeakList,
    patterns: &PatternTable,
    params: &TreeParams,
) -> IsotopeTreeAssembly {
    let index = MzIndex::build(peaks);
    let pairs = find_isotopic_pairs(peaks, &index, patterns, params);
    let targets: HashSet<PeakKey, BuildIdentityHasher<PeakKey>> =
        pairs.iter().map(|p| p.heavier).collect();

    let depth_limit = params.tree_depth_limit;
    let mut forest = Forest::new();
    let mut ambiguous = Vec::new();
    let mut too_deep = Vec::new();
    let mut branches = Vec::new();
    for pair in pairs.iter() {
        if targets.contains(&pair.lighter) {
            branches.push(pair);
            continue;
        }
        if !forest.contains(pair.lighter) {
            // A root that was placed by an earlier pair keeps its tree
            if let Err(e) = forest.plant(pair.lighter, peaks[pair.lighter].tag()) {
                warn!("Failed to start a tree at {}: {e}", peaks[pair.lighter].id);
                continue;
            }
        }
        if let Placement::TooDeep = place_pair(&mut forest, peaks, pair, depth_limit, &mut ambiguous) {
            too_deep.push(pair.clone());
        }
    }
    let initial_branches = branches.len();
    debug!(
        "Found {} isotopic pairs, {} trees and {} in branches",
        pairs.len(),
        forest.len(),
        initial_branches
    );

    let mut worklist: VecDeque<&_> = VecDeque::new();
    for pair in branches {
        match place_pair(&mut forest, peaks, pair, depth_limit, &mut ambiguous) {
            Placement::Deferred => worklist.push_back(pair),
            Placement::TooDeep => too_deep.push(pair.clone()),
            Placement::Placed | Placement::Rejected => {}
        }
    }

    let mut iterations = 0;
    while !worklist.is_empty() && iterations < depth_limit {
        let n = worklist.len();
        for _ in 0..n {
            let Some(pair) = worklist.pop_front() else {
                break;
            };
            match place_pair(&mut forest, peaks, pair, depth_limit, &mut ambiguous) {
                Placement::Deferred => worklist.push_back(pair),
                Placement::TooDeep => too_deep.push(pair.clone()),
                Placement::Placed | Placement::Rejected => {}
            }
        }
        iterations += 1;
        if worklist.len() == n {
            break;
        }
    }
    let mut remaining = too_deep;
    remaining.extend(worklist.into_iter().cloned());
    if !remaining.is_empty() {
        debug!(
            "{} isotope pairs were left unplaced after {iterations} passes",
            remaining.len()
        );
    }

    let mut singletons = 0;
    if params.include_singletons {
        for key in peaks.keys() {
            if !forest.contains(key) && forest.plant(key, peaks[key].tag()).is_ok() {
                singletons += 1;
            }
        }
    }

    IsotopeTreeAssembly {
        forest,
        pair_count: pairs.len(),
        initial_branches,
        remaining,
        ambiguous,
        iterations,
        singletons,
    }
}
