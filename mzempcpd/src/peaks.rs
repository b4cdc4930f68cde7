//! Peak records and the keyed, validated peak list every search runs over.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::ops::Index;

use identity_hash::IdentityHashable;
use mzpeaks::coordinate::SimpleInterval;
use mzpeaks::{CoordinateLike, MZ};
use thiserror::Error;

/// A detected chromatographic peak, as produced by an upstream peak detection step.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    /// An identifier that is unique within a run
    pub id: String,
    /// The observed m/z
    pub mz: f64,
    /// The m/z after an external calibration step, preferred for matching when present
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub calibrated_mz: Option<f64>,
    /// The apex time, either a scan index or a retention time
    pub apex: f64,
    /// The peak height or representative intensity
    pub height: f64,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub left_base: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub right_base: Option<f64>,
    /// The relation to the anchor of the empirical compound this peak was assigned to
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub ion_relation: Option<String>,
}

impl Peak {
    pub fn new<S: Into<String>>(id: S, mz: f64, apex: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            mz,
            apex,
            height,
            ..Default::default()
        }
    }

    /// Attach peak boundaries in the same unit as `apex`
    pub fn with_bases(mut self, left_base: f64, right_base: f64) -> Self {
        self.left_base = Some(left_base);
        self.right_base = Some(right_base);
        self
    }

    pub fn with_calibrated_mz(mut self, calibrated_mz: f64) -> Self {
        self.calibrated_mz = Some(calibrated_mz);
        self
    }

    /// The m/z used for mass matching, the calibrated value when one is available.
    #[inline]
    pub fn search_mz(&self) -> f64 {
        self.calibrated_mz.unwrap_or(self.mz)
    }

    /// The elution span of the peak, if both boundaries are known
    pub fn boundaries(&self) -> Option<SimpleInterval<f64>> {
        match (self.left_base, self.right_base) {
            (Some(left), Some(right)) => Some(SimpleInterval::new(left, right)),
            _ => None,
        }
    }

    /// The label shown for this peak in tree views, `round(mz, 4)@round(apex, 1)`
    pub fn tag(&self) -> String {
        let mz = (self.mz * 10_000.0).round() / 10_000.0;
        let apex = (self.apex * 10.0).round() / 10.0;
        format!("{mz:?}@{apex:?}")
    }
}

impl PartialOrd for Peak {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.search_mz().partial_cmp(&other.search_mz())
    }
}

impl CoordinateLike<MZ> for Peak {
    fn coordinate(&self) -> f64 {
        self.search_mz()
    }
}

/// The position of a [`Peak`] in its [`PeakList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakKey(pub u32);

impl Hash for PeakKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u32(self.0)
    }
}

impl IdentityHashable for PeakKey {}

impl PeakKey {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for PeakKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for PeakKey {
    fn from(value: usize) -> Self {
        PeakKey(value as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeakListError {
    #[error("Peak {0} has an invalid m/z {1}, it must be finite and greater than zero")]
    InvalidMZ(String, f64),
    #[error("Peak {0} has a non-finite apex time {1}")]
    InvalidApex(String, f64),
    #[error("Peak identifier {0} occurs more than once")]
    DuplicateId(String),
    #[error("Too many peaks to index: {0}")]
    TooManyPeaks(usize),
}

/// An ordered collection of [`Peak`]s with unique identifiers, addressed by [`PeakKey`].
///
/// The list owns the peaks for the duration of a grouping run. Apart from
/// [`Peak::ion_relation`], nothing in this crate mutates a peak once it is in a list.
#[derive(Debug, Clone, Default)]
pub struct PeakList {
    peaks: Vec<Peak>,
    ids: HashMap<String, PeakKey>,
}

impl PeakList {
    pub fn new(peaks: Vec<Peak>) -> Result<Self, PeakListError> {
        if peaks.len() > u32::MAX as usize {
            return Err(PeakListError::TooManyPeaks(peaks.len()));
        }
        let mut ids = HashMap::with_capacity(peaks.len());
        for (i, peak) in peaks.iter().enumerate() {
            let mz = peak.search_mz();
            if !mz.is_finite() || mz <= 0.0 || !peak.mz.is_finite() || peak.mz <= 0.0 {
                return Err(PeakListError::InvalidMZ(peak.id.clone(), mz));
            }
            if !peak.apex.is_finite() {
                return Err(PeakListError::InvalidApex(peak.id.clone(), peak.apex));
            }
            if ids.insert(peak.id.clone(), PeakKey::from(i)).is_some() {
                return Err(PeakListError::DuplicateId(peak.id.clone()));
            }
        }
        Ok(Self { peaks, ids })
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get(&self, key: PeakKey) -> Option<&Peak> {
        self.peaks.get(key.index())
    }

    pub fn get_mut(&mut self, key: PeakKey) -> Option<&mut Peak> {
        self.peaks.get_mut(key.index())
    }

    /// Look up the key for a peak identifier
    pub fn key_of(&self, id: &str) -> Option<PeakKey> {
        self.ids.get(id).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = PeakKey> {
        (0..self.peaks.len()).map(PeakKey::from)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn into_inner(self) -> Vec<Peak> {
        self.peaks
    }

    /// Clear all [`Peak::ion_relation`] annotations
    pub fn clear_annotations(&mut self) {
        self.peaks.iter_mut().for_each(|p| p.ion_relation = None);
    }
}

impl Index<PeakKey> for PeakList {
    type Output = Peak;

    fn index(&self, index: PeakKey) -> &Self::Output {
        &self.peaks[index.index()]
    }
}

impl<'a> IntoIterator for &'a PeakList {
    type Item = &'a Peak;

    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

impl TryFrom<Vec<Peak>> for PeakList {
    type Error = PeakListError;

    fn try_from(value: Vec<Peak>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validation() {
        let peaks = vec![Peak::new("F1", 100.0, 5.0, 10.0), Peak::new("F1", 101.0, 5.0, 10.0)];
        assert_eq!(
            PeakList::new(peaks).unwrap_err(),
            PeakListError::DuplicateId("F1".to_string())
        );

        let peaks = vec![Peak::new("F1", -1.0, 5.0, 10.0)];
        assert!(matches!(
            PeakList::new(peaks),
            Err(PeakListError::InvalidMZ(_, _))
        ));

        let peaks = vec![Peak::new("F1", 100.0, f64::NAN, 10.0)];
        assert!(matches!(
            PeakList::new(peaks),
            Err(PeakListError::InvalidApex(_, _))
        ));
    }

    #[test]
    fn test_keys_and_lookup() {
        let peaks = PeakList::new(vec![
            Peak::new("F1", 100.0, 5.0, 10.0),
            Peak::new("F2", 101.0, 5.0, 10.0).with_calibrated_mz(101.001),
        ])
        .unwrap();
        let key = peaks.key_of("F2").unwrap();
        assert_eq!(key, PeakKey(1));
        assert_eq!(peaks[key].search_mz(), 101.001);
        assert_eq!(peaks.keys().count(), 2);
        assert!(peaks.get(PeakKey(2)).is_none());
    }

    #[test]
    fn test_tag() {
        let peak = Peak::new("F649", 179.11234, 172.94, 1e5);
        assert_eq!(peak.tag(), "179.1123@172.9");
        let peak = Peak::new("F1", 100.0, 50.0, 1e5);
        assert_eq!(peak.tag(), "100.0@50.0");
    }
}
