use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzempcpd::{
    patterns::{carbon_isotope, extension_patterns, in_source_patterns, seed_patterns},
    IonMode, OwnershipPolicy, PatternTable,
};

/// Which grouping model to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMethod {
    #[default]
    /// Flat empirical compounds, written as JSON records
    Epd,
    /// Isotope trees with modified forms grafted beneath them, written as TSV
    Trees,
}

impl Display for GroupingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgIonMode {
    #[default]
    #[value(alias = "positive")]
    Pos,
    #[value(alias = "negative")]
    Neg,
}

impl From<ArgIonMode> for IonMode {
    fn from(value: ArgIonMode) -> Self {
        match value {
            ArgIonMode::Pos => IonMode::Positive,
            ArgIonMode::Neg => IonMode::Negative,
        }
    }
}

impl Display for ArgIonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", IonMode::from(*self))
    }
}

/// How two peaks are judged to co-elute
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgCoelution {
    #[default]
    /// Compare peak boundaries, falling back to apex distance when they are missing
    Overlap,
    /// Compare apex distance only
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgOwnershipPolicy {
    #[default]
    /// Leave contested peaks unresolved and report them
    Flag,
    /// Give a contested peak to the latest compound claiming it
    PreferLatest,
}

impl From<ArgOwnershipPolicy> for OwnershipPolicy {
    fn from(value: ArgOwnershipPolicy) -> Self {
        match value {
            ArgOwnershipPolicy::Flag => OwnershipPolicy::Flag,
            ArgOwnershipPolicy::PreferLatest => OwnershipPolicy::PreferLatest,
        }
    }
}

/// Pattern tables read from a configuration file in place of the built in tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOverrides {
    pub seed_patterns: Option<PatternTable>,
    pub extension_patterns: Option<PatternTable>,
    pub isotope_patterns: Option<PatternTable>,
    pub graft_patterns: Option<PatternTable>,
}

impl PatternOverrides {
    pub fn seed_patterns(&self, mode: IonMode) -> PatternTable {
        self.seed_patterns
            .clone()
            .unwrap_or_else(|| seed_patterns(mode))
    }

    pub fn extension_patterns(&self, mode: IonMode) -> PatternTable {
        self.extension_patterns
            .clone()
            .unwrap_or_else(|| extension_patterns(mode))
    }

    pub fn isotope_patterns(&self) -> PatternTable {
        self.isotope_patterns.clone().unwrap_or_else(carbon_isotope)
    }

    pub fn graft_patterns(&self) -> PatternTable {
        self.graft_patterns.clone().unwrap_or_else(in_source_patterns)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mzempcpd::MassDeltaPattern;

    #[test]
    fn test_overrides_fall_back() {
        let mut overrides = PatternOverrides::default();
        assert_eq!(
            overrides.seed_patterns(IonMode::Negative),
            seed_patterns(IonMode::Negative)
        );
        overrides.seed_patterns =
            Some(PatternTable::new(vec![MassDeltaPattern::new(21.982, "Na/H")]).unwrap());
        assert_eq!(overrides.seed_patterns(IonMode::Positive).len(), 1);
        assert_eq!(overrides.isotope_patterns(), carbon_isotope());
    }

    #[test]
    fn test_arg_ion_mode() {
        assert_eq!(IonMode::from(ArgIonMode::Neg), IonMode::Negative);
        assert_eq!(ArgIonMode::Pos.to_string(), "pos");
        assert_eq!(
            ArgIonMode::from_str("negative", true).unwrap(),
            ArgIonMode::Neg
        );
    }
}
