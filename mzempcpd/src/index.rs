//! A coarse m/z bucket index for tolerance queries over a [`PeakList`].

use std::collections::HashMap;

use mzpeaks::Tolerance;

use crate::peaks::{Peak, PeakKey, PeakList};

/// The number of buckets per m/z unit
const BUCKETS_PER_MZ: f64 = 100.0;

#[inline]
fn bucket_of(mz: f64) -> i64 {
    (mz * BUCKETS_PER_MZ).floor() as i64
}

/// Peaks bucketed by `floor(100 * mz)`, using each peak's [`Peak::search_mz`].
///
/// An index may cover only part of a [`PeakList`], but the keys it returns are always
/// valid for the full list it was built from.
#[derive(Debug, Clone, Default)]
pub struct MzIndex {
    buckets: HashMap<i64, Vec<(PeakKey, f64)>>,
    size: usize,
}

impl MzIndex {
    /// Index every peak in `peaks`
    pub fn build(peaks: &PeakList) -> Self {
        Self::build_from_keys(peaks, peaks.keys())
    }

    /// Index only the peaks identified by `keys`. Keys not in `peaks` are ignored.
    pub fn build_from_keys<I: IntoIterator<Item = PeakKey>>(peaks: &PeakList, keys: I) -> Self {
        let mut buckets: HashMap<i64, Vec<(PeakKey, f64)>> = HashMap::new();
        let mut size = 0;
        for key in keys {
            if let Some(peak) = peaks.get(key) {
                let mz = peak.search_mz();
                buckets.entry(bucket_of(mz)).or_default().push((key, mz));
                size += 1;
            }
        }
        Self { buckets, size }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn candidates(&self, target: f64, error_tolerance: Tolerance) -> impl Iterator<Item = (PeakKey, f64, f64)> + '_ {
        let (lower, upper) = error_tolerance.bounds(target);
        let center = bucket_of(target);
        let first = bucket_of(lower).min(center - 1);
        let last = bucket_of(upper).max(center + 1);
        (first..=last)
            .filter_map(|k| self.buckets.get(&k))
            .flatten()
            // an exact hit is kept even when the window is empty at zero tolerance
            .filter(move |(_, mz)| (lower < *mz && *mz < upper) || *mz == target)
            .map(move |(key, mz)| (*key, *mz, (mz - target).abs()))
    }

    /// Find all peaks whose m/z lies strictly within `error_tolerance` of `target`.
    ///
    /// The matches are returned in the order they were indexed within each bucket,
    /// buckets in ascending m/z order.
    pub fn query(&self, target: f64, error_tolerance: Tolerance) -> Vec<PeakKey> {
        if !target.is_finite() {
            return Vec::new();
        }
        self.candidates(target, error_tolerance)
            .map(|(key, _, _)| key)
            .collect()
    }

    /// Find the single closest peak to `target` within `error_tolerance`. The first
    /// encountered peak wins ties.
    pub fn best_match(&self, target: f64, error_tolerance: Tolerance) -> Option<PeakKey> {
        if !target.is_finite() {
            return None;
        }
        let mut best: Option<(PeakKey, f64)> = None;
        for (key, _, err) in self.candidates(target, error_tolerance) {
            match best {
                Some((_, best_err)) if err >= best_err => {}
                _ => best = Some((key, err)),
            }
        }
        best.map(|(key, _)| key)
    }

    /// Find all peaks within `error_tolerance` of `target` and resolve them against `peaks`
    pub fn query_peaks<'a>(
        &self,
        peaks: &'a PeakList,
        target: f64,
        error_tolerance: Tolerance,
    ) -> Vec<(PeakKey, &'a Peak)> {
        self.query(target, error_tolerance)
            .into_iter()
            .filter_map(|k| peaks.get(k).map(|p| (k, p)))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_peaks() -> PeakList {
        let mzs = [
            100.0, 100.0004, 100.0006, 99.9999, 100.009, 101.003355, 150.5, 150.50001, 299.99999,
            300.0,
        ];
        PeakList::new(
            mzs.iter()
                .enumerate()
                .map(|(i, mz)| Peak::new(format!("F{i}"), *mz, 10.0, 1000.0))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_ppm_boundary() {
        let peaks = make_peaks();
        let index = MzIndex::build(&peaks);
        // 5 ppm at m/z 100 is 0.0005
        let hits = index.query(100.0, Tolerance::PPM(5.0));
        let ids: Vec<_> = hits.iter().map(|k| peaks[*k].id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"F0"));
        assert!(ids.contains(&"F1"));
        assert!(ids.contains(&"F3"));
        assert!(!ids.contains(&"F2"));
    }

    #[test]
    fn test_crosses_buckets() {
        let peaks = make_peaks();
        let index = MzIndex::build(&peaks);
        let hits = index.query(300.0, Tolerance::PPM(5.0));
        assert_eq!(hits.len(), 2);
        let hits = index.query(100.0, Tolerance::Da(0.01));
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_against_brute_force() {
        let peaks = make_peaks();
        let index = MzIndex::build(&peaks);
        for target in [99.99, 100.0, 100.0005, 101.0034, 150.5, 299.9999, 300.001, 500.0] {
            for tol in [Tolerance::PPM(5.0), Tolerance::PPM(20.0), Tolerance::Da(0.02)] {
                let (lo, hi) = tol.bounds(target);
                let mut expected: Vec<_> = peaks
                    .keys()
                    .filter(|k| lo < peaks[*k].mz && peaks[*k].mz < hi)
                    .collect();
                let mut observed = index.query(target, tol);
                expected.sort();
                observed.sort();
                assert_eq!(expected, observed, "{target} {tol:?}");
            }
        }
    }

    #[test]
    fn test_best_match() {
        let peaks = make_peaks();
        let index = MzIndex::build(&peaks);
        let key = index.best_match(150.50002, Tolerance::PPM(5.0)).unwrap();
        assert_eq!(peaks[key].id, "F7");
        assert!(index.best_match(200.0, Tolerance::PPM(5.0)).is_none());
        assert!(index.query(f64::NAN, Tolerance::PPM(5.0)).is_empty());
    }

    #[test]
    fn test_subset_index() {
        let peaks = make_peaks();
        let index = MzIndex::build_from_keys(&peaks, [PeakKey(1), PeakKey(9)]);
        assert_eq!(index.len(), 2);
        let hits = index.query(100.0, Tolerance::PPM(5.0));
        assert_eq!(hits, vec![PeakKey(1)]);
    }

    #[test]
    fn test_zero_tolerance_exact_match() {
        let peaks = PeakList::new(vec![
            Peak::new("M", 100.0, 1.0, 1.0),
            Peak::new("M+1", 101.0, 1.0, 1.0),
        ])
        .unwrap();
        let index = MzIndex::build(&peaks);
        let target = peaks[PeakKey(0)].search_mz() + 1.0;
        assert_eq!(index.query(target, Tolerance::PPM(0.0)), vec![PeakKey(1)]);
        assert_eq!(index.best_match(target, Tolerance::PPM(0.0)), Some(PeakKey(1)));
        assert!(index.query(target + 1e-9, Tolerance::PPM(0.0)).is_empty());

        // 5 ppm of 101 is about 0.000505
        let width = 101.0 * 5.0e-6;
        assert_eq!(
            index.query(101.0 - 0.9 * width, Tolerance::PPM(5.0)),
            vec![PeakKey(1)]
        );
        assert_eq!(
            index.query(101.0 + 0.9 * width, Tolerance::PPM(5.0)),
            vec![PeakKey(1)]
        );
        assert!(index.query(101.0 - 1.1 * width, Tolerance::PPM(5.0)).is_empty());
        assert!(index.query(101.0 + 1.1 * width, Tolerance::PPM(5.0)).is_empty());
    }

    #[test]
    fn test_calibrated_mz_is_used() {
        let peaks = PeakList::new(vec![
            Peak::new("A", 100.0, 1.0, 1.0).with_calibrated_mz(100.01),
        ])
        .unwrap();
        let index = MzIndex::build(&peaks);
        assert!(index.query(100.0, Tolerance::PPM(5.0)).is_empty());
        assert_eq!(index.query(100.01, Tolerance::PPM(5.0)), vec![PeakKey(0)]);
    }
}
