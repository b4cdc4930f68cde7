//! High level APIs for grouping peaks into empirical compounds or trees
use std::fmt::Display;

use thiserror::Error;
use tracing::info;

use crate::coelution::{CoelutionPolicy, OverlapCoelution};
use crate::compound::EmpiricalCompound;
use crate::consolidate::{Consolidation, Consolidator, OwnershipPolicy, Resolution};
use crate::construct::{build_seeds, extend_seeds};
use crate::patterns::{
    carbon_isotope, extension_patterns, in_source_patterns, seed_patterns, IonMode, PatternError,
    PatternTable,
};
use crate::peaks::{Peak, PeakList, PeakListError};
use crate::signature::{SearchParams, Signature};
use crate::tree::{
    construct_isotopic_trees, merge_trees_by_derivatization, merge_trees_by_insrc_modifications,
    GraftReport, IsotopeTreeAssembly, TreeParams,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroupingError {
    #[error("Invalid peak list: {0}")]
    PeakListError(#[from] PeakListError),
    #[error("Invalid pattern table: {0}")]
    PatternError(#[from] PatternError),
}

/// Parameters controlling the flat empirical compound construction
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConstructorParams {
    pub search: SearchParams,
    pub ownership: OwnershipPolicy,
    /// Give every peak not in any compound a compound of its own
    pub include_singletons: bool,
}

/// Counts describing a single grouping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupingSummary {
    pub peaks: usize,
    pub seeds: usize,
    /// Peaks claimed by a seed
    pub seeded_peaks: usize,
    /// Members added by extension across all seeds
    pub extended_members: usize,
    pub subsets_removed: usize,
    pub compounds: usize,
    pub singletons: usize,
    /// Peaks claimed by more than one compound
    pub unresolved_peaks: usize,
}

impl Display for GroupingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} peaks: {} seeds over {} peaks, {} extension members, {} subsets removed, {} compounds ({} singletons), {} unresolved peaks",
            self.peaks,
            self.seeds,
            self.seeded_peaks,
            self.extended_members,
            self.subsets_removed,
            self.compounds,
            self.singletons,
            self.unresolved_peaks
        )
    }
}

/// Builds empirical compounds from a [`PeakList`] in two steps: seeds from a
/// conservative pattern set, then extension over the peaks no seed claimed, followed by
/// consolidation.
#[derive(Debug, Clone)]
pub struct EmpiricalCompoundConstructor<P: CoelutionPolicy = OverlapCoelution> {
    pub seed_patterns: PatternTable,
    pub extension_patterns: PatternTable,
    pub params: ConstructorParams,
    pub coelution: P,
}

impl EmpiricalCompoundConstructor<OverlapCoelution> {
    /// Use the default pattern tables for `mode`
    pub fn new(mode: IonMode) -> Self {
        Self {
            seed_patterns: seed_patterns(mode),
            extension_patterns: extension_patterns(mode),
            params: ConstructorParams::default(),
            coelution: OverlapCoelution,
        }
    }
}

impl<P: CoelutionPolicy> EmpiricalCompoundConstructor<P> {
    pub fn with_patterns(mut self, seed_patterns: PatternTable, extension_patterns: PatternTable) -> Self {
        self.seed_patterns = seed_patterns;
        self.extension_patterns = extension_patterns;
        self
    }

    pub fn with_params(mut self, params: ConstructorParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_coelution<Q: CoelutionPolicy>(self, coelution: Q) -> EmpiricalCompoundConstructor<Q> {
        EmpiricalCompoundConstructor {
            seed_patterns: self.seed_patterns,
            extension_patterns: self.extension_patterns,
            params: self.params,
            coelution,
        }
    }

    /// Group `peaks` into empirical compounds.
    ///
    /// # Note
    /// Compound ids are assigned sequentially from zero in output order. Any singleton
    /// compounds follow the grouped compounds, in peak list order.
    pub fn peaks_to_epds(&self, peaks: &PeakList) -> (Consolidation, GroupingSummary) {
        let search = &self.params.search;
        let seeds = build_seeds(peaks, &self.seed_patterns, search, &self.coelution);
        let seeded_peaks = seeds.claimed.len();
        let seed_members: usize = seeds.signatures.iter().map(|s| s.len()).sum();

        let extended = extend_seeds(
            &seeds,
            peaks,
            &self.extension_patterns,
            search,
            &self.coelution,
        );
        let extended_members = extended.iter().map(|s| s.len()).sum::<usize>() - seed_members;

        let mut consolidation = Consolidator::new(self.params.ownership).consolidate(extended);

        let mut singletons = 0;
        if self.params.include_singletons {
            for key in peaks.keys() {
                if !consolidation.ownership.contains_key(&key) {
                    let id = consolidation.compounds.len();
                    consolidation
                        .compounds
                        .push(EmpiricalCompound::new(id, Signature::new(key)));
                    consolidation.ownership.insert(key, Resolution::Owned(id));
                    singletons += 1;
                }
            }
        }

        let summary = GroupingSummary {
            peaks: peaks.len(),
            seeds: seeds.len(),
            seeded_peaks,
            extended_members,
            subsets_removed: consolidation.subsets_removed,
            compounds: consolidation.compounds.len(),
            singletons,
            unresolved_peaks: consolidation.conflicts,
        };
        info!("{summary}");
        (consolidation, summary)
    }
}

/// Group a collection of peaks into empirical compounds with the default tables for
/// the ion mode named by `mode`.
///
/// # Arguments
/// - `peaks`: The peaks to group, with unique identifiers
/// - `mode`: The ionization mode, `pos` or `neg` or one of their aliases
/// - `params`: The search and consolidation parameters
///
/// # See also
/// [`EmpiricalCompoundConstructor::peaks_to_epds`]
pub fn group_peaks(
    peaks: Vec<Peak>,
    mode: &str,
    params: ConstructorParams,
) -> Result<(PeakList, Consolidation, GroupingSummary), GroupingError> {
    let mode: IonMode = mode.parse()?;
    let peaks = PeakList::new(peaks)?;
    let constructor = EmpiricalCompoundConstructor::new(mode).with_params(params);
    let (consolidation, summary) = constructor.peaks_to_epds(&peaks);
    Ok((peaks, consolidation, summary))
}

/// Builds isotope trees and then grafts trees of modified forms beneath their parents.
#[derive(Debug, Clone)]
pub struct TreeAssembler {
    pub isotope_patterns: PatternTable,
    pub in_source_patterns: PatternTable,
    /// Derivatization reagents, grafted after in-source modifications when present
    pub derivatization_patterns: Option<PatternTable>,
    pub params: TreeParams,
}

impl Default for TreeAssembler {
    fn default() -> Self {
        Self {
            isotope_patterns: carbon_isotope(),
            in_source_patterns: in_source_patterns(),
            derivatization_patterns: None,
            params: TreeParams::default(),
        }
    }
}

/// The trees built by a [`TreeAssembler`] and what each stage did
#[derive(Debug, Clone, Default)]
pub struct TreeAssemblyResult {
    pub assembly: IsotopeTreeAssembly,
    pub in_source: GraftReport,
    pub derivatization: Option<GraftReport>,
}

impl TreeAssembler {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn assemble(&self, peaks: &PeakList) -> TreeAssemblyResult {
        let mut assembly = construct_isotopic_trees(peaks, &self.isotope_patterns, &self.params);
        let error_tolerance = self.params.error_tolerance();
        let in_source = merge_trees_by_insrc_modifications(
            &mut assembly.forest,
            peaks,
            &self.in_source_patterns,
            error_tolerance,
            self.params.graft_rt_tolerance,
        );
        let derivatization = self.derivatization_patterns.as_ref().map(|patterns| {
            merge_trees_by_derivatization(&mut assembly.forest, peaks, patterns, error_tolerance)
        });
        info!(
            "Built {} trees over {} of {} peaks from {} isotope pairs, {} left unplaced, {} ambiguous",
            assembly.forest.len(),
            assembly.forest.node_count(),
            peaks.len(),
            assembly.pair_count,
            assembly.remaining.len(),
            assembly.ambiguous.len()
        );
        TreeAssemblyResult {
            assembly,
            in_source,
            derivatization,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coelution::DistanceCoelution;

    #[test]
    fn test_group_peaks() {
        let peaks = vec![
            Peak::new("F1", 100.0, 50.0, 1e6),
            Peak::new("F2", 101.0034, 50.0, 5e4),
            Peak::new("F3", 121.982, 51.0, 2e5),
            Peak::new("F4", 500.0, 50.0, 2e5),
        ];
        let params = ConstructorParams {
            include_singletons: true,
            ..Default::default()
        };
        let (peaks, result, summary) = group_peaks(peaks, "positive", params).unwrap();
        assert_eq!(summary.seeds, 1);
        assert_eq!(summary.singletons, 1);
        assert_eq!(result.compounds.len(), 2);
        assert_eq!(
            result.compounds[1].list_peaks(&peaks),
            [("F4", "anchor")]
        );
        assert!(matches!(
            group_peaks(Vec::new(), "sideways", params),
            Err(GroupingError::PatternError(PatternError::UnknownIonMode(_)))
        ));
    }

    #[test]
    fn test_coelution_swap() {
        let peaks = PeakList::new(vec![
            Peak::new("F1", 100.0, 50.0, 1e6).with_bases(40.0, 60.0),
            Peak::new("F2", 101.0034, 50.0, 5e4).with_bases(58.0, 70.0),
        ])
        .unwrap();
        let constructor = EmpiricalCompoundConstructor::new(IonMode::Positive);
        let (result, _) = constructor.peaks_to_epds(&peaks);
        assert!(result.is_empty());
        let (result, _) = constructor
            .with_coelution(DistanceCoelution)
            .peaks_to_epds(&peaks);
        assert_eq!(result.len(), 1);
    }
}
