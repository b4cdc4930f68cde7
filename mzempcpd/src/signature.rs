//! Searching for groups of peaks related to an anchor peak by registered mass differences.

use std::collections::HashMap;

use mzpeaks::Tolerance;
use tracing::{debug, trace};

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use crate::coelution::CoelutionPolicy;
use crate::index::MzIndex;
use crate::patterns::PatternTable;
use crate::peaks::{PeakKey, PeakList};

/// The relation label of the first member of every [`Signature`]
pub const ANCHOR: &str = "anchor";

/// A peak and its relation to the anchor of a [`Signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignatureMember {
    pub peak: PeakKey,
    pub relation: String,
}

impl SignatureMember {
    pub fn new<S: Into<String>>(peak: PeakKey, relation: S) -> Self {
        Self {
            peak,
            relation: relation.into(),
        }
    }
}

/// An ordered list of related peaks with the anchor first. Each peak appears at most
/// once, a peak matched under several labels carries them comma-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    members: Vec<SignatureMember>,
}

impl Signature {
    pub fn new(anchor: PeakKey) -> Self {
        Self {
            members: vec![SignatureMember::new(anchor, ANCHOR)],
        }
    }

    /// Build a signature from an explicit member list. The first member is the anchor
    /// regardless of its label, and repeated peaks are merged.
    pub fn from_members(members: Vec<SignatureMember>) -> Option<Self> {
        let mut it = members.into_iter();
        let first = it.next()?;
        let mut this = Self {
            members: vec![first],
        };
        for m in it {
            this.push_relation(m.peak, &m.relation);
        }
        Some(this)
    }

    pub fn anchor(&self) -> PeakKey {
        self.members[0].peak
    }

    /// Add `peak` with `relation`. If the peak is already a member, the label is
    /// appended to its existing labels unless already present.
    pub fn push_relation(&mut self, peak: PeakKey, relation: &str) {
        if let Some(member) = self.members.iter_mut().find(|m| m.peak == peak) {
            if !has_label(&member.relation, relation) {
                member.relation.push(',');
                member.relation.push_str(relation);
            }
        } else {
            self.members.push(SignatureMember::new(peak, relation));
        }
    }

    pub fn contains(&self, peak: PeakKey) -> bool {
        self.members.iter().any(|m| m.peak == peak)
    }

    pub fn relation_of(&self, peak: PeakKey) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.peak == peak)
            .map(|m| m.relation.as_str())
    }

    pub fn peaks(&self) -> impl Iterator<Item = PeakKey> + '_ {
        self.members.iter().map(|m| m.peak)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SignatureMember> {
        self.members.iter()
    }

    pub fn members(&self) -> &[SignatureMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether every peak of this signature is also in `other`
    pub fn is_subset_of(&self, other: &Signature) -> bool {
        self.peaks().all(|p| other.contains(p))
    }

    pub fn shares_peak_with(&self, other: &Signature) -> bool {
        self.peaks().any(|p| other.contains(p))
    }
}

/// Labels may themselves contain commas, so match on whole comma-delimited runs
fn has_label(joined: &str, label: &str) -> bool {
    joined == label
        || joined.starts_with(&format!("{label},"))
        || joined.ends_with(&format!(",{label}"))
        || joined.contains(&format!(",{label},"))
}

impl<'a> IntoIterator for &'a Signature {
    type Item = &'a SignatureMember;

    type IntoIter = std::slice::Iter<'a, SignatureMember>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

/// Parameters for a signature search
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SearchParams {
    /// The m/z matching tolerance in parts-per-million
    pub mz_tolerance_ppm: f64,
    /// The maximum apex distance between an anchor and a matched peak
    pub isotope_rt_tolerance: f64,
    /// The apex distance used by the distance co-elution rule
    pub coelution_rt_tolerance: f64,
    /// Whether to enforce pattern height ratio bounds
    pub check_ratio: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            mz_tolerance_ppm: 5.0,
            isotope_rt_tolerance: 5.0,
            coelution_rt_tolerance: 10.0,
            check_ratio: true,
        }
    }
}

impl SearchParams {
    pub fn new(
        mz_tolerance_ppm: f64,
        isotope_rt_tolerance: f64,
        coelution_rt_tolerance: f64,
        check_ratio: bool,
    ) -> Self {
        Self {
            mz_tolerance_ppm,
            isotope_rt_tolerance,
            coelution_rt_tolerance,
            check_ratio,
        }
    }

    pub fn error_tolerance(&self) -> Tolerance {
        Tolerance::PPM(self.mz_tolerance_ppm)
    }
}

/// Search for the peaks related to `anchor` by any pattern in `patterns`.
///
/// Returns a signature even when nothing matched, callers drop length 1 results.
pub fn search_anchor<C: CoelutionPolicy + ?Sized>(
    anchor: PeakKey,
    peaks: &PeakList,
    index: &MzIndex,
    patterns: &PatternTable,
    params: &SearchParams,
    coelution: &C,
) -> Signature {
    let mut signature = Signature::new(anchor);
    let Some(p1) = peaks.get(anchor) else {
        return signature;
    };
    let error_tolerance = params.error_tolerance();
    for pattern in patterns {
        let target = p1.search_mz() + pattern.delta;
        for (key, p2) in index.query_peaks(peaks, target, error_tolerance) {
            if key == anchor {
                continue;
            }
            if (p1.apex - p2.apex).abs() > params.isotope_rt_tolerance {
                continue;
            }
            if !coelution.is_coeluted(p1, p2, params.coelution_rt_tolerance) {
                continue;
            }
            if params.check_ratio && !pattern.ratio_accepts(p1.height, p2.height) {
                continue;
            }
            trace!(
                "{} matched {} by {}",
                p1.id,
                p2.id,
                pattern.relation
            );
            signature.push_relation(key, &pattern.relation);
        }
    }
    signature
}

/// Search every peak of `anchors` as an anchor, keeping signatures with more than one member.
///
/// The output follows the order of `anchors`.
pub fn find_signatures_for<C: CoelutionPolicy + ?Sized>(
    anchors: &[PeakKey],
    peaks: &PeakList,
    index: &MzIndex,
    patterns: &PatternTable,
    params: &SearchParams,
    coelution: &C,
) -> Vec<Signature> {
    #[cfg(feature = "parallelism")]
    let it = anchors.par_iter();
    #[cfg(not(feature = "parallelism"))]
    let it = anchors.iter();

    let signatures: Vec<Signature> = it
        .map(|anchor| search_anchor(*anchor, peaks, index, patterns, params, coelution))
        .filter(|sig| sig.len() > 1)
        .collect();
    debug!(
        "Found {} signatures from {} anchors with {} patterns",
        signatures.len(),
        anchors.len(),
        patterns.len()
    );
    signatures
}

/// Search every peak in `peaks` as an anchor against `index`
pub fn find_signatures<C: CoelutionPolicy + ?Sized>(
    peaks: &PeakList,
    index: &MzIndex,
    patterns: &PatternTable,
    params: &SearchParams,
    coelution: &C,
) -> Vec<Signature> {
    let anchors: Vec<PeakKey> = peaks.keys().collect();
    find_signatures_for(&anchors, peaks, index, patterns, params, coelution)
}

/// A pair of peaks separated by a pattern's mass difference
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MzDiffPair {
    pub lighter: PeakKey,
    pub heavier: PeakKey,
    pub relation: String,
}

/// For every peak and pattern, pair the peak with the closest peak at `mz + delta`.
///
/// No retention time or ratio rules are applied, this is meant for estimating how
/// often mass differences occur in a dataset.
pub fn find_mzdiff_pairs(
    peaks: &PeakList,
    patterns: &PatternTable,
    error_tolerance: Tolerance,
) -> Vec<MzDiffPair> {
    let index = MzIndex::build(peaks);
    let mut pairs = Vec::new();
    for (key, peak) in peaks.keys().zip(peaks.iter()) {
        for pattern in patterns {
            if let Some(hit) = index.best_match(peak.search_mz() + pattern.delta, error_tolerance) {
                if hit != key {
                    pairs.push(MzDiffPair {
                        lighter: key,
                        heavier: hit,
                        relation: pattern.relation.clone(),
                    });
                }
            }
        }
    }
    pairs
}

/// Count how many pairs each relation produced, in pattern table order
pub fn count_relations<'a>(
    pairs: &[MzDiffPair],
    patterns: &'a PatternTable,
) -> Vec<(&'a str, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for pair in pairs {
        *counts.entry(pair.relation.as_str()).or_default() += 1;
    }
    patterns
        .iter()
        .map(|p| {
            (
                p.relation.as_str(),
                counts.get(p.relation.as_str()).copied().unwrap_or_default(),
            )
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coelution::{DistanceCoelution, OverlapCoelution};
    use crate::patterns::MassDeltaPattern;
    use crate::peaks::Peak;

    fn scenario() -> (PeakList, PatternTable) {
        let peaks = PeakList::new(vec![
            Peak::new("anchor", 100.0, 50.0, 1e6),
            Peak::new("c13", 101.0034, 50.0, 5e4),
            Peak::new("na", 121.9820, 51.0, 2e5),
            Peak::new("noise", 130.0, 50.0, 1e6),
        ])
        .unwrap();
        let patterns = PatternTable::new(vec![
            MassDeltaPattern::with_ratio_bounds(1.003355, "13C/12C", 0.0, 0.8),
            MassDeltaPattern::new(21.982, "Na/H"),
        ])
        .unwrap();
        (peaks, patterns)
    }

    #[test]
    fn test_find_signatures() {
        let (peaks, patterns) = scenario();
        let index = MzIndex::build(&peaks);
        let params = SearchParams::new(5.0, 2.0, 2.0, true);
        let sigs = find_signatures(&peaks, &index, &patterns, &params, &OverlapCoelution);
        assert_eq!(sigs.len(), 1);
        let sig = &sigs[0];
        let labels: Vec<_> = sig
            .iter()
            .map(|m| (peaks[m.peak].id.as_str(), m.relation.as_str()))
            .collect();
        assert_eq!(
            labels,
            [("anchor", "anchor"), ("c13", "13C/12C"), ("na", "Na/H")]
        );
    }

    #[test]
    fn test_ratio_and_rt_rules() {
        let (peaks, patterns) = scenario();
        let index = MzIndex::build(&peaks);

        let params = SearchParams::new(5.0, 0.5, 2.0, true);
        let sig = search_anchor(PeakKey(0), &peaks, &index, &patterns, &params, &DistanceCoelution);
        assert_eq!(sig.len(), 2, "the Na adduct is 1 unit away");

        let mut heavy = peaks.clone().into_inner();
        heavy[1].height = 9e5;
        let peaks = PeakList::new(heavy).unwrap();
        let params = SearchParams::new(5.0, 2.0, 2.0, true);
        let sig = search_anchor(PeakKey(0), &peaks, &index, &patterns, &params, &DistanceCoelution);
        assert!(!sig.contains(PeakKey(1)));
        let params = SearchParams::new(5.0, 2.0, 2.0, false);
        let sig = search_anchor(PeakKey(0), &peaks, &index, &patterns, &params, &DistanceCoelution);
        assert!(sig.contains(PeakKey(1)));
    }

    #[test]
    fn test_zero_ppm_pattern_match() {
        let anchor = Peak::new("M", 100.0, 10.0, 1e6);
        let isotope = Peak::new("M13C", anchor.search_mz() + 1.003355, 10.0, 1e5);
        let peaks = PeakList::new(vec![anchor, isotope]).unwrap();
        let patterns = PatternTable::new(vec![MassDeltaPattern::new(1.003355, "13C/12C")]).unwrap();
        let index = MzIndex::build(&peaks);
        let params = SearchParams::new(0.0, 2.0, 2.0, false);
        let sig = search_anchor(PeakKey(0), &peaks, &index, &patterns, &params, &DistanceCoelution);
        assert_eq!(sig.relation_of(PeakKey(1)), Some("13C/12C"));
    }

    #[test]
    fn test_merged_labels() {
        let peaks = PeakList::new(vec![
            Peak::new("a", 200.0, 10.0, 100.0),
            Peak::new("b", 202.0, 10.0, 10.0),
        ])
        .unwrap();
        let patterns = PatternTable::new(vec![
            MassDeltaPattern::new(2.0, "first"),
            MassDeltaPattern::new(2.0000001, "second"),
        ])
        .unwrap();
        let index = MzIndex::build(&peaks);
        let sig = search_anchor(
            PeakKey(0),
            &peaks,
            &index,
            &patterns,
            &SearchParams::default(),
            &OverlapCoelution,
        );
        assert_eq!(sig.len(), 2);
        assert_eq!(sig.relation_of(PeakKey(1)), Some("first,second"));
    }

    #[test]
    fn test_push_relation() {
        let mut sig = Signature::new(PeakKey(3));
        sig.push_relation(PeakKey(4), "H");
        sig.push_relation(PeakKey(4), "H");
        sig.push_relation(PeakKey(4), "Na/H");
        assert_eq!(sig.len(), 2);
        assert_eq!(sig.relation_of(PeakKey(4)), Some("H,Na/H"));
        assert_eq!(sig.anchor(), PeakKey(3));
    }

    #[test]
    fn test_mzdiff_pairs() {
        let (peaks, patterns) = scenario();
        let pairs = find_mzdiff_pairs(&peaks, &patterns, Tolerance::PPM(5.0));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].heavier, PeakKey(1));
        let counts = count_relations(&pairs, &patterns);
        assert_eq!(counts, [("13C/12C", 1), ("Na/H", 1)]);
    }
}
