//! Two step construction of empirical compounds: conservative seeds, then extension
//! over the peaks the seeds did not claim.

use std::collections::HashSet;

use identity_hash::BuildIdentityHasher;
use tracing::debug;

use crate::coelution::CoelutionPolicy;
use crate::index::MzIndex;
use crate::patterns::PatternTable;
use crate::peaks::{PeakKey, PeakList};
use crate::signature::{find_signatures, SearchParams, Signature};

pub type PeakKeySet = HashSet<PeakKey, BuildIdentityHasher<PeakKey>>;

/// The seed signatures and every peak they include
#[derive(Debug, Clone, Default)]
pub struct Seeds {
    pub signatures: Vec<Signature>,
    pub claimed: PeakKeySet,
}

impl Seeds {
    pub fn new(signatures: Vec<Signature>) -> Self {
        let claimed = signatures.iter().flat_map(|s| s.peaks()).collect();
        Self {
            signatures,
            claimed,
        }
    }

    pub fn is_claimed(&self, key: PeakKey) -> bool {
        self.claimed.contains(&key)
    }

    /// The keys of `peaks` not claimed by any seed, in list order
    pub fn remaining_keys<'a>(&'a self, peaks: &'a PeakList) -> impl Iterator<Item = PeakKey> + 'a {
        peaks.keys().filter(|k| !self.is_claimed(*k))
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Search every peak for signatures under the seed patterns.
pub fn build_seeds<C: CoelutionPolicy + ?Sized>(
    peaks: &PeakList,
    seed_patterns: &PatternTable,
    params: &SearchParams,
    coelution: &C,
) -> Seeds {
    let index = MzIndex::build(peaks);
    let signatures = find_signatures(peaks, &index, seed_patterns, params, coelution);
    let seeds = Seeds::new(signatures);
    debug!(
        "Built {} seeds claiming {} of {} peaks",
        seeds.len(),
        seeds.claimed.len(),
        peaks.len()
    );
    seeds
}

/// Extend every seed with co-eluting peaks that match an extension pattern relative to
/// any seed member. Only peaks outside of [`Seeds::claimed`] are eligible.
///
/// Extension hits are labeled `{member relation},{pattern relation}`. No isotope
/// retention time or ratio rule is applied at this stage.
pub fn extend_seeds<C: CoelutionPolicy + ?Sized>(
    seeds: &Seeds,
    peaks: &PeakList,
    extension_patterns: &PatternTable,
    params: &SearchParams,
    coelution: &C,
) -> Vec<Signature> {
    let index = MzIndex::build_from_keys(peaks, seeds.remaining_keys(peaks));
    let error_tolerance = params.error_tolerance();
    let mut n_added = 0usize;
    let extended: Vec<Signature> = seeds
        .signatures
        .iter()
        .map(|seed| {
            let mut signature = seed.clone();
            for member in seed.iter() {
                let p1 = &peaks[member.peak];
                for pattern in extension_patterns {
                    let target = p1.search_mz() + pattern.delta;
                    for (key, p2) in index.query_peaks(peaks, target, error_tolerance) {
                        if coelution.is_coeluted(p1, p2, params.coelution_rt_tolerance) {
                            let relation = format!("{},{}", member.relation, pattern.relation);
                            signature.push_relation(key, &relation);
                        }
                    }
                }
            }
            n_added += signature.len() - seed.len();
            signature
        })
        .collect();
    debug!(
        "Extended {} seeds over {} unclaimed peaks, adding {n_added} members",
        extended.len(),
        index.len()
    );
    extended
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coelution::OverlapCoelution;
    use crate::patterns::MassDeltaPattern;
    use crate::peaks::Peak;

    fn make_peaks() -> PeakList {
        PeakList::new(vec![
            Peak::new("M", 100.0, 50.0, 1e6).with_bases(45.0, 55.0),
            Peak::new("M13C", 101.003355, 50.0, 1e5).with_bases(46.0, 54.0),
            Peak::new("MNa", 121.982, 51.0, 3e5).with_bases(46.0, 56.0),
            Peak::new("MNH4", 117.033823, 50.0, 2e5).with_bases(45.0, 55.0),
            Peak::new("MNaH2O", 139.9926, 51.0, 2e4).with_bases(46.0, 56.0),
            Peak::new("Late", 118.0106, 90.0, 2e5).with_bases(85.0, 95.0),
        ])
        .unwrap()
    }

    fn seed_table() -> PatternTable {
        PatternTable::new(vec![
            MassDeltaPattern::with_ratio_bounds(1.003355, "13C/12C", 0.0, 0.8),
            MassDeltaPattern::new(21.982, "Na/H"),
        ])
        .unwrap()
    }

    fn extension_table() -> PatternTable {
        PatternTable::new(vec![
            MassDeltaPattern::new(17.033823, "+NH4"),
            MassDeltaPattern::new(18.0106, "+H2O"),
        ])
        .unwrap()
    }

    #[test]
    fn test_seeds() {
        let peaks = make_peaks();
        let seeds = build_seeds(&peaks, &seed_table(), &SearchParams::default(), &OverlapCoelution);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds.claimed.len(), 3);
        assert!(seeds.is_claimed(PeakKey(2)));
        let rest: Vec<_> = seeds.remaining_keys(&peaks).collect();
        assert_eq!(rest, [PeakKey(3), PeakKey(4), PeakKey(5)]);
    }

    #[test]
    fn test_extension_is_disjoint_from_claims() {
        let peaks = make_peaks();
        let params = SearchParams::default();
        let seeds = build_seeds(&peaks, &seed_table(), &params, &OverlapCoelution);
        let extended = extend_seeds(&seeds, &peaks, &extension_table(), &params, &OverlapCoelution);
        assert_eq!(extended.len(), 1);
        let sig = &extended[0];
        assert_eq!(sig.anchor(), PeakKey(0));
        assert_eq!(sig.relation_of(PeakKey(3)), Some("anchor,+NH4"));
        assert_eq!(sig.relation_of(PeakKey(4)), Some("Na/H,+H2O"));
        // apex is far outside the anchor's elution span
        assert!(!sig.contains(PeakKey(5)));

        for member in sig.iter().skip(seeds.signatures[0].len()) {
            assert!(!seeds.is_claimed(member.peak));
        }
    }

    #[test]
    fn test_no_seeds_no_extension() {
        let peaks = PeakList::new(vec![Peak::new("A", 100.0, 1.0, 1.0)]).unwrap();
        let params = SearchParams::default();
        let seeds = build_seeds(&peaks, &seed_table(), &params, &OverlapCoelution);
        assert!(seeds.is_empty());
        assert!(extend_seeds(&seeds, &peaks, &extension_table(), &params, &OverlapCoelution).is_empty());
    }
}
