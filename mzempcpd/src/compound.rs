use crate::peaks::{Peak, PeakKey, PeakList};
use crate::signature::Signature;

/// A group of peaks believed to derive from one molecule, related to an anchor ion
/// by isotope and adduct mass differences.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmpiricalCompound {
    pub id: usize,
    pub signature: Signature,
}

impl EmpiricalCompound {
    pub fn new(id: usize, signature: Signature) -> Self {
        Self { id, signature }
    }

    pub fn anchor(&self) -> PeakKey {
        self.signature.anchor()
    }

    pub fn len(&self) -> usize {
        self.signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }

    pub fn contains(&self, peak: PeakKey) -> bool {
        self.signature.contains(peak)
    }

    /// The `(peak id, ion relation)` pairs of this compound, anchor first
    pub fn list_peaks<'a>(&'a self, peaks: &'a PeakList) -> Vec<(&'a str, &'a str)> {
        self.signature
            .iter()
            .filter_map(|m| {
                peaks
                    .get(m.peak)
                    .map(|p| (p.id.as_str(), m.relation.as_str()))
            })
            .collect()
    }

    /// Materialize this compound with copies of its member peaks, each carrying its
    /// relation to the anchor
    pub fn to_record(&self, peaks: &PeakList) -> EmpiricalCompoundRecord {
        let mut list_peaks = Vec::with_capacity(self.len());
        let mut members = Vec::with_capacity(self.len());
        for member in self.signature.iter() {
            if let Some(peak) = peaks.get(member.peak) {
                list_peaks.push((peak.id.clone(), member.relation.clone()));
                let mut peak = peak.clone();
                peak.ion_relation = Some(member.relation.clone());
                members.push(peak);
            }
        }
        EmpiricalCompoundRecord {
            id: self.id,
            list_peaks,
            members,
            neutral_formula: None,
            neutral_formula_mass: None,
        }
    }
}

/// A self-contained rendition of an [`EmpiricalCompound`] for export.
///
/// The formula fields are left for a downstream annotation step to fill in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmpiricalCompoundRecord {
    pub id: usize,
    pub list_peaks: Vec<(String, String)>,
    #[cfg_attr(feature = "serde", serde(rename = "MS1_pseudo_Spectra"))]
    pub members: Vec<Peak>,
    pub neutral_formula: Option<String>,
    pub neutral_formula_mass: Option<f64>,
}

/// Write each compound member's relation onto [`Peak::ion_relation`]. A peak listed by
/// more than one compound keeps the relation from the first of them.
pub fn annotate_peaks(compounds: &[EmpiricalCompound], peaks: &mut PeakList) {
    for compound in compounds {
        for member in compound.signature.iter() {
            if let Some(peak) = peaks.get_mut(member.peak) {
                if peak.ion_relation.is_none() {
                    peak.ion_relation = Some(member.relation.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record() {
        let mut peaks = PeakList::new(vec![
            Peak::new("F1", 100.0, 5.0, 100.0),
            Peak::new("F2", 101.003355, 5.0, 10.0),
        ])
        .unwrap();
        let mut sig = Signature::new(PeakKey(0));
        sig.push_relation(PeakKey(1), "13C/12C");
        let cpd = EmpiricalCompound::new(7, sig);
        assert_eq!(cpd.list_peaks(&peaks), [("F1", "anchor"), ("F2", "13C/12C")]);

        let rec = cpd.to_record(&peaks);
        assert_eq!(rec.id, 7);
        assert_eq!(rec.members.len(), 2);
        assert_eq!(rec.members[1].ion_relation.as_deref(), Some("13C/12C"));
        assert!(rec.neutral_formula.is_none());
        assert!(rec.neutral_formula_mass.is_none());

        let other = EmpiricalCompound::new(8, Signature::new(PeakKey(1)));
        annotate_peaks(&[cpd, other], &mut peaks);
        assert_eq!(peaks[PeakKey(0)].ion_relation.as_deref(), Some("anchor"));
        assert_eq!(peaks[PeakKey(1)].ion_relation.as_deref(), Some("13C/12C"));
    }
}
