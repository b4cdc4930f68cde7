//! Mass difference patterns relating ions of the same compound, and the default
//! tables of isotopes, adducts and derivatization reagents.

use std::fmt::Display;
use std::ops::Index;
use std::str::FromStr;

use thiserror::Error;

/// A mass difference between two ions of the same compound, with an optional constraint
/// on the ratio of their heights.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MassDeltaPattern {
    /// The m/z difference from the lighter ion to the heavier ion
    pub delta: f64,
    /// The label recorded for a peak matched by this pattern
    pub relation: String,
    /// The open interval (min, max) the heavier peak's height must fall in, as a
    /// multiple of the lighter peak's height
    #[cfg_attr(feature = "serde", serde(default))]
    pub ratio_bounds: Option<(f64, f64)>,
}

impl MassDeltaPattern {
    pub fn new<S: Into<String>>(delta: f64, relation: S) -> Self {
        Self {
            delta,
            relation: relation.into(),
            ratio_bounds: None,
        }
    }

    pub fn with_ratio_bounds<S: Into<String>>(delta: f64, relation: S, min: f64, max: f64) -> Self {
        Self {
            delta,
            relation: relation.into(),
            ratio_bounds: Some((min, max)),
        }
    }

    /// Check the height ratio constraint, if any.
    #[inline]
    pub fn ratio_accepts(&self, lighter_height: f64, heavier_height: f64) -> bool {
        match self.ratio_bounds {
            Some((min, max)) => {
                min * lighter_height < heavier_height && heavier_height < max * lighter_height
            }
            None => true,
        }
    }

    fn validate(&self) -> Result<(), PatternError> {
        if !self.delta.is_finite() || self.delta <= 0.0 {
            return Err(PatternError::InvalidDelta(self.relation.clone(), self.delta));
        }
        if self.relation.trim().is_empty() {
            return Err(PatternError::EmptyLabel(self.delta));
        }
        if let Some((min, max)) = self.ratio_bounds {
            if !(min.is_finite() && max.is_finite() && 0.0 <= min && min <= max) {
                return Err(PatternError::InvalidRatioBounds(
                    self.relation.clone(),
                    min,
                    max,
                ));
            }
        }
        Ok(())
    }
}

impl Display for MassDeltaPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.relation, self.delta)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    #[error("Pattern {0} has an invalid mass delta {1}, it must be finite and greater than zero")]
    InvalidDelta(String, f64),
    #[error("The pattern with mass delta {0} has an empty label")]
    EmptyLabel(f64),
    #[error("Pattern {0} has invalid ratio bounds ({1}, {2})")]
    InvalidRatioBounds(String, f64, f64),
    #[error("Unknown ion mode {0:?}, expected one of pos, positive, +, neg, negative, -")]
    UnknownIonMode(String),
}

/// An ordered, validated list of [`MassDeltaPattern`]s.
///
/// Search order follows table order, which determines the order labels are
/// joined in when one peak matches more than one pattern.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<MassDeltaPattern>", into = "Vec<MassDeltaPattern>"))]
pub struct PatternTable {
    patterns: Vec<MassDeltaPattern>,
}

impl PatternTable {
    pub fn new(patterns: Vec<MassDeltaPattern>) -> Result<Self, PatternError> {
        for pat in patterns.iter() {
            pat.validate()?;
        }
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MassDeltaPattern> {
        self.patterns.iter()
    }

    pub fn contains(&self, pattern: &MassDeltaPattern) -> bool {
        self.patterns.contains(pattern)
    }

    /// The patterns of this table that do not appear in `other`, in order
    pub fn difference(&self, other: &PatternTable) -> PatternTable {
        let patterns = self
            .patterns
            .iter()
            .filter(|p| !other.contains(p))
            .cloned()
            .collect();
        Self { patterns }
    }

    /// A copy of this table without any ratio constraints
    pub fn without_ratio_bounds(&self) -> PatternTable {
        let patterns = self
            .patterns
            .iter()
            .map(|p| MassDeltaPattern::new(p.delta, p.relation.clone()))
            .collect();
        Self { patterns }
    }

    /// Build a table from the static `(delta, label)` and `(delta, label, (min, max))` tables below.
    fn from_static(simple: &[(f64, &str)], bounded: &[(f64, &str, (f64, f64))]) -> Self {
        let patterns = bounded
            .iter()
            .map(|(delta, label, (lo, hi))| MassDeltaPattern::with_ratio_bounds(*delta, *label, *lo, *hi))
            .chain(
                simple
                    .iter()
                    .map(|(delta, label)| MassDeltaPattern::new(*delta, *label)),
            )
            .collect();
        Self { patterns }
    }
}

impl Index<usize> for PatternTable {
    type Output = MassDeltaPattern;

    fn index(&self, index: usize) -> &Self::Output {
        &self.patterns[index]
    }
}

impl<'a> IntoIterator for &'a PatternTable {
    type Item = &'a MassDeltaPattern;

    type IntoIter = std::slice::Iter<'a, MassDeltaPattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

impl TryFrom<Vec<MassDeltaPattern>> for PatternTable {
    type Error = PatternError;

    fn try_from(value: Vec<MassDeltaPattern>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PatternTable> for Vec<MassDeltaPattern> {
    fn from(value: PatternTable) -> Self {
        value.patterns
    }
}

/// The ionization mode of a run, selecting the adduct tables to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IonMode {
    #[default]
    Positive,
    Negative,
}

impl FromStr for IonMode {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pos" | "positive" | "+" => Ok(Self::Positive),
            "neg" | "negative" | "-" => Ok(Self::Negative),
            _ => Err(PatternError::UnknownIonMode(s.to_string())),
        }
    }
}

impl Display for IonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IonMode::Positive => f.write_str("pos"),
            IonMode::Negative => f.write_str("neg"),
        }
    }
}

const ISOTOPIC_PATTERNS: &[(f64, &str, (f64, f64))] = &[
    (1.003355, "13C/12C", (0.0, 0.8)),
    (0.997035, "15N/14N", (0.0, 0.2)),
    (2.004245, "18O/16O", (0.0, 0.2)),
    (1.995796, "34S/32S", (0.0, 0.4)),
    (0.999388, "33S/32S", (0.0, 0.1)),
    (2.00039, "M(13C),M(15N)", (0.0, 0.2)),
    (2.999151, "M(13C),M(34S)", (0.0, 0.4)),
    (0.5017, "13C/12C, double charged", (0.0, 0.8)),
    (0.4985, "15N/14N, double charged", (0.0, 0.2)),
];

const CARBON_ISOTOPE: (f64, &str, (f64, f64)) = (1.003355, "13C/12C", (0.0, 0.8));

const COMMON_ADDUCTS_POS: &[(f64, &str)] = &[
    (1.0078, "H"),
    (21.9820, "Na/H"),
    (10.991, "Na/H, double charged"),
    (18.0106, "+H2O"),
    (18.033823, "+NH4"),
    (37.9559, "39K/H"),
    (39.9540, "41K/H"),
    (41.026549, "Acetonitrile"),
];

const COMMON_ADDUCTS_NEG: &[(f64, &str)] = &[
    (1.0078, "H"),
    (22.9893, "Na"),
    (20.97474706646, "+Na-2H"),
    (18.0106, "H2O"),
    (34.9689, "35Cl"),
    (36.9659, "37Cl"),
    (40.01926853323, "+ACN-H"),
    (44.998201, "COOH"),
    (59.013295, "CH3COO"),
];

const SEED_ADDUCTS_POS: &[(f64, &str)] = &[(1.0078, "H"), (21.9820, "Na/H")];

const SEED_ADDUCTS_NEG: &[(f64, &str)] = &[
    (1.0078, "H"),
    (20.97474706646, "+Na-2H"),
    (34.9689, "35Cl"),
];

const EXTENDED_ADDUCTS: &[(f64, &str)] = &[
    (1.0078, "H"),
    (17.02655, "NH3"),
    (18.0106, "H2O"),
    (18.033823, "NH4"),
    (27.01089904, "HCN"),
    (27.99492, "CO"),
    (32.026215, "CH3OH"),
    (35.9767, "HCl"),
    (37.94694, "Ca/H2"),
    (43.96389, "Na2/H2"),
    (46.00548, "CO2H2"),
    (67.987424, "NaCOOH"),
    (83.961361, "KCOOH"),
    (97.96737927, "H2SO4"),
    (97.97689507, "H3PO4"),
];

const IN_SOURCE_DEFAULT: &[(f64, &str)] = &[
    (1.0078, "H"),
    (21.9820, "Na/H"),
    (41.026549, "Acetonitrile"),
];

const DERIVATIZATION_DEFAULT: &[(f64, &str)] = &[
    (161.08407, "DmPA"),
    (233.05105, "Dens"),
    (247.07793, "DnsHz"),
];

/// The stable isotope mass differences searched for isotopic signatures and trees
pub fn isotopic_patterns() -> PatternTable {
    PatternTable::from_static(&[], ISOTOPIC_PATTERNS)
}

/// Just the 13C/12C isotope shift
pub fn carbon_isotope() -> PatternTable {
    PatternTable::from_static(&[], &[CARBON_ISOTOPE])
}

/// Common adducts relative to the primary ion of each mode
pub fn common_adducts(mode: IonMode) -> PatternTable {
    match mode {
        IonMode::Positive => PatternTable::from_static(COMMON_ADDUCTS_POS, &[]),
        IonMode::Negative => PatternTable::from_static(COMMON_ADDUCTS_NEG, &[]),
    }
}

/// The conservative seed set: the 13C isotope followed by the mode's most reliable adducts
pub fn seed_patterns(mode: IonMode) -> PatternTable {
    match mode {
        IonMode::Positive => PatternTable::from_static(SEED_ADDUCTS_POS, &[CARBON_ISOTOPE]),
        IonMode::Negative => PatternTable::from_static(SEED_ADDUCTS_NEG, &[CARBON_ISOTOPE]),
    }
}

/// The common adducts of `mode` not already in the seed set
pub fn extension_patterns(mode: IonMode) -> PatternTable {
    common_adducts(mode).difference(&seed_patterns(mode))
}

/// A wider, mode independent list of adducts and small neutral additions
pub fn extended_adducts() -> PatternTable {
    PatternTable::from_static(EXTENDED_ADDUCTS, &[])
}

/// Adducts grafted between isotope trees formed in the ion source
pub fn in_source_patterns() -> PatternTable {
    PatternTable::from_static(IN_SOURCE_DEFAULT, &[])
}

/// Chemical derivatization reagent mass shifts
pub fn derivatization_patterns() -> PatternTable {
    PatternTable::from_static(DERIVATIZATION_DEFAULT, &[])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_tables_are_valid() {
        for table in [
            isotopic_patterns(),
            carbon_isotope(),
            common_adducts(IonMode::Positive),
            common_adducts(IonMode::Negative),
            seed_patterns(IonMode::Positive),
            seed_patterns(IonMode::Negative),
            extended_adducts(),
            in_source_patterns(),
            derivatization_patterns(),
        ] {
            let patterns: Vec<_> = table.into();
            PatternTable::new(patterns).unwrap();
        }
    }

    #[test]
    fn test_seed_order() {
        let seeds = seed_patterns(IonMode::Positive);
        let labels: Vec<_> = seeds.iter().map(|p| p.relation.as_str()).collect();
        assert_eq!(labels, ["13C/12C", "H", "Na/H"]);
        assert_eq!(seeds[0].ratio_bounds, Some((0.0, 0.8)));
        assert!(seeds[1].ratio_bounds.is_none());
    }

    #[test]
    fn test_extension_excludes_seeds() {
        let ext = extension_patterns(IonMode::Positive);
        let labels: Vec<_> = ext.iter().map(|p| p.relation.as_str()).collect();
        assert_eq!(
            labels,
            ["Na/H, double charged", "+H2O", "+NH4", "39K/H", "41K/H", "Acetonitrile"]
        );

        let ext = extension_patterns(IonMode::Negative);
        let labels: Vec<_> = ext.iter().map(|p| p.relation.as_str()).collect();
        assert_eq!(labels, ["Na", "H2O", "37Cl", "+ACN-H", "COOH", "CH3COO"]);
    }

    #[test]
    fn test_validation() {
        let err = PatternTable::new(vec![MassDeltaPattern::new(-1.0, "x")]).unwrap_err();
        assert!(matches!(err, PatternError::InvalidDelta(_, _)));
        let err = PatternTable::new(vec![MassDeltaPattern::new(f64::NAN, "x")]).unwrap_err();
        assert!(matches!(err, PatternError::InvalidDelta(_, _)));
        let err = PatternTable::new(vec![MassDeltaPattern::new(1.0, " ")]).unwrap_err();
        assert!(matches!(err, PatternError::EmptyLabel(_)));
        let err = PatternTable::new(vec![MassDeltaPattern::with_ratio_bounds(1.0, "x", 0.8, 0.1)])
            .unwrap_err();
        assert!(matches!(err, PatternError::InvalidRatioBounds(_, _, _)));
    }

    #[test]
    fn test_ratio_bounds() {
        let pat = MassDeltaPattern::with_ratio_bounds(1.003355, "13C/12C", 0.0, 0.8);
        assert!(pat.ratio_accepts(100.0, 5.0));
        assert!(!pat.ratio_accepts(100.0, 80.0));
        assert!(!pat.ratio_accepts(100.0, 0.0));
        assert!(MassDeltaPattern::new(1.0, "H").ratio_accepts(1.0, 1e9));
    }

    #[test]
    fn test_ion_mode() {
        for alias in ["pos", "positive", "+", "POS"] {
            assert_eq!(alias.parse::<IonMode>().unwrap(), IonMode::Positive);
        }
        for alias in ["neg", "negative", "-"] {
            assert_eq!(alias.parse::<IonMode>().unwrap(), IonMode::Negative);
        }
        assert!("neutral".parse::<IonMode>().is_err());
        assert_eq!(IonMode::Negative.to_string(), "neg");
    }
}
