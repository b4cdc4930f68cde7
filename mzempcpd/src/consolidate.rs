//! Removing redundant signatures and deciding which compound owns each peak.

use std::collections::HashMap;

use identity_hash::BuildIdentityHasher;
use tracing::{debug, warn};

use crate::compound::EmpiricalCompound;
use crate::peaks::PeakKey;
use crate::signature::Signature;

/// Which compound a peak belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    Owned(usize),
    /// The peak is claimed by every listed compound, none of them a subset of another
    Unresolved(Vec<usize>),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

/// How to treat a peak claimed by several compounds when neither is a subset of the other
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OwnershipPolicy {
    /// Keep every compound and mark the peak [`Resolution::Unresolved`]
    #[default]
    Flag,
    /// Give the peak to the last compound that claims it, dropping compounds left
    /// owning nothing
    PreferLatest,
}

pub type Ownership = HashMap<PeakKey, Resolution, BuildIdentityHasher<PeakKey>>;

/// The result of consolidating signatures into empirical compounds
#[derive(Debug, Clone, Default)]
pub struct Consolidation {
    pub compounds: Vec<EmpiricalCompound>,
    pub ownership: Ownership,
    /// The number of signatures discarded for being a subset of another
    pub subsets_removed: usize,
    /// The number of signatures discarded by [`OwnershipPolicy::PreferLatest`]
    pub dispossessed: usize,
    /// The number of peaks claimed by more than one compound
    pub conflicts: usize,
}

impl Consolidation {
    pub fn unresolved(&self) -> impl Iterator<Item = (&PeakKey, &[usize])> + '_ {
        self.ownership.iter().filter_map(|(k, r)| match r {
            Resolution::Owned(_) => None,
            Resolution::Unresolved(ids) => Some((k, ids.as_slice())),
        })
    }

    pub fn owner_of(&self, peak: PeakKey) -> Option<&Resolution> {
        self.ownership.get(&peak)
    }

    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Consolidator {
    pub policy: OwnershipPolicy,
}

impl Consolidator {
    pub fn new(policy: OwnershipPolicy) -> Self {
        Self { policy }
    }

    /// Find the signatures that are a subset of another signature. When two signatures
    /// cover the same peaks, the later one is marked.
    fn mark_subsets(signatures: &[Signature]) -> Vec<bool> {
        let by_peak = Self::collect_claims(signatures);
        signatures
            .iter()
            .enumerate()
            .map(|(i, sig)| {
                // Any superset must also hold the anchor
                let Some(candidates) = by_peak.get(&sig.anchor()) else {
                    return false;
                };
                candidates.iter().copied().any(|j| {
                    if i == j {
                        return false;
                    }
                    let other = &signatures[j];
                    if !sig.is_subset_of(other) {
                        return false;
                    }
                    other.len() > sig.len() || j < i
                })
            })
            .collect()
    }

    pub fn consolidate(&self, signatures: Vec<Signature>) -> Consolidation {
        let n_input = signatures.len();
        let subset_mask = Self::mark_subsets(&signatures);
        let mut survivors: Vec<Signature> = signatures
            .into_iter()
            .zip(subset_mask)
            .filter_map(|(sig, is_subset)| (!is_subset).then_some(sig))
            .collect();
        let subsets_removed = n_input - survivors.len();

        let claims = Self::collect_claims(&survivors);
        let conflicts = claims.values().filter(|c| c.len() > 1).count();

        let mut dispossessed = 0;
        if matches!(self.policy, OwnershipPolicy::PreferLatest) {
            let mut owns_any = vec![false; survivors.len()];
            for claimants in claims.values() {
                if let Some(last) = claimants.last() {
                    owns_any[*last] = true;
                }
            }
            let before = survivors.len();
            survivors = survivors
                .into_iter()
                .zip(owns_any)
                .filter_map(|(sig, keep)| keep.then_some(sig))
                .collect();
            dispossessed = before - survivors.len();
        }

        let claims = Self::collect_claims(&survivors);
        let mut ownership = Ownership::default();
        for (peak, claimants) in claims {
            let resolution = match (self.policy, claimants.as_slice()) {
                (_, [owner]) => Resolution::Owned(*owner),
                (OwnershipPolicy::PreferLatest, [.., last]) => Resolution::Owned(*last),
                (OwnershipPolicy::Flag, _) => {
                    warn!("Unresolved ownership of peak {peak} between compounds {claimants:?}");
                    Resolution::Unresolved(claimants)
                }
                (OwnershipPolicy::PreferLatest, []) => continue,
            };
            ownership.insert(peak, resolution);
        }
        if matches!(self.policy, OwnershipPolicy::PreferLatest) && conflicts > 0 {
            warn!("{conflicts} peaks were claimed by more than one compound, the latest claim was kept");
        }

        let compounds: Vec<EmpiricalCompound> = survivors
            .into_iter()
            .enumerate()
            .map(|(i, sig)| EmpiricalCompound::new(i, sig))
            .collect();

        debug!(
            "Consolidated {n_input} signatures into {} compounds, removing {subsets_removed} subsets and {dispossessed} dispossessed",
            compounds.len()
        );
        Consolidation {
            compounds,
            ownership,
            subsets_removed,
            dispossessed,
            conflicts,
        }
    }

    fn collect_claims(
        signatures: &[Signature],
    ) -> HashMap<PeakKey, Vec<usize>, BuildIdentityHasher<PeakKey>> {
        let mut claims: HashMap<PeakKey, Vec<usize>, BuildIdentityHasher<PeakKey>> =
            HashMap::default();
        for (i, sig) in signatures.iter().enumerate() {
            for p in sig.peaks() {
                claims.entry(p).or_default().push(i);
            }
        }
        claims
    }
}
