//! Group LC-MS peaks into empirical compounds, sets of ions believed to come from the
//! same molecule, by their isotope and adduct mass differences. No formula database
//! is required.
//!
//! The flat model is built by [`api::EmpiricalCompoundConstructor`], the tree model by
//! [`api::TreeAssembler`].
pub mod coelution;
pub mod compound;
pub mod consolidate;
pub mod construct;
pub mod index;
pub mod patterns;
pub mod peaks;
pub mod signature;
pub mod tree;
pub mod api;

pub use api::{
    group_peaks, ConstructorParams, EmpiricalCompoundConstructor, GroupingError,
    GroupingSummary, TreeAssembler, TreeAssemblyResult,
};
pub use coelution::{CoelutionPolicy, DistanceCoelution, OverlapCoelution};
pub use compound::{annotate_peaks, EmpiricalCompound, EmpiricalCompoundRecord};
pub use consolidate::{Consolidation, Consolidator, OwnershipPolicy, Resolution};
pub use index::MzIndex;
pub use patterns::{IonMode, MassDeltaPattern, PatternError, PatternTable};
pub use peaks::{Peak, PeakKey, PeakList, PeakListError};
pub use signature::{SearchParams, Signature, SignatureMember};
