//! An alternative to flat empirical compounds: trees of isotopologues, with trees of
//! modified forms grafted beneath their parent's root.
mod assemble;
mod forest;
mod graft;
mod node;

pub use assemble::{
    construct_isotopic_trees, find_isotopic_pairs, IsotopePair, IsotopeTreeAssembly, TreeParams,
};
pub use forest::{Forest, TreeId};
pub use graft::{
    merge_trees_by_derivatization, merge_trees_by_insrc_modifications,
    merge_trees_by_modifications, GraftCandidate, GraftReport, RetentionTimeRule,
};
pub use node::{NodeId, Tree, TreeError, TreeNode};
