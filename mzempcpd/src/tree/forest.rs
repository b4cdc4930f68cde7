use std::collections::HashMap;
use std::io::{self, Write};

use identity_hash::BuildIdentityHasher;

use crate::peaks::{PeakKey, PeakList};

use super::node::{Tree, TreeError};

/// The position of a tree within its [`Forest`]
pub type TreeId = usize;

/// A set of disjoint [`Tree`]s with a peak to tree lookup.
///
/// Grafting one tree into another leaves an empty slot behind, so [`TreeId`]s stay
/// stable for the lifetime of the forest.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    trees: Vec<Option<Tree>>,
    node_to_tree: HashMap<PeakKey, TreeId, BuildIdentityHasher<PeakKey>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of live trees
    pub fn len(&self) -> usize {
        self.trees.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of peaks placed in any tree
    pub fn node_count(&self) -> usize {
        self.node_to_tree.len()
    }

    pub fn tree_of(&self, peak: PeakKey) -> Option<TreeId> {
        self.node_to_tree.get(&peak).copied()
    }

    pub fn tree_containing(&self, peak: PeakKey) -> Option<&Tree> {
        self.tree_of(peak).and_then(|i| self.get(i))
    }

    pub fn get(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(id).and_then(|t| t.as_ref())
    }

    pub fn contains(&self, peak: PeakKey) -> bool {
        self.node_to_tree.contains_key(&peak)
    }

    /// Whether `peak` is the root of a live tree
    pub fn is_root(&self, peak: PeakKey) -> bool {
        self.tree_containing(peak)
            .is_some_and(|t| t.root_peak() == peak)
    }

    /// Iterate over the live trees in creation order
    pub fn iter(&self) -> impl Iterator<Item = (TreeId, &Tree)> + '_ {
        self.trees
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (i, t)))
    }

    pub fn roots(&self) -> Vec<PeakKey> {
        self.iter().map(|(_, t)| t.root_peak()).collect()
    }

    /// The peak to tree mapping
    pub fn mapping(&self) -> &HashMap<PeakKey, TreeId, BuildIdentityHasher<PeakKey>> {
        &self.node_to_tree
    }

    /// Start a new tree rooted at `root`
    pub fn plant(&mut self, root: PeakKey, tag: String) -> Result<TreeId, TreeError> {
        if self.contains(root) {
            return Err(TreeError::DuplicatedNode(root));
        }
        let id = self.trees.len();
        self.trees.push(Some(Tree::new(root, tag)));
        self.node_to_tree.insert(root, id);
        Ok(id)
    }

    /// Add `child` beneath `parent` in whichever tree holds `parent`
    pub fn attach(
        &mut self,
        parent: PeakKey,
        child: PeakKey,
        tag: String,
        relation: String,
    ) -> Result<TreeId, TreeError> {
        if self.contains(child) {
            return Err(TreeError::DuplicatedNode(child));
        }
        let tree_id = self.tree_of(parent).ok_or(TreeError::MissingParent(parent))?;
        let tree = self
            .trees
            .get_mut(tree_id)
            .and_then(|t| t.as_mut())
            .ok_or(TreeError::MissingParent(parent))?;
        tree.add_child(parent, child, tag, relation)?;
        self.node_to_tree.insert(child, tree_id);
        Ok(tree_id)
    }

    /// Move the whole tree rooted at `child_root` beneath `parent`.
    pub fn graft(&mut self, parent: PeakKey, child_root: PeakKey, relation: String) -> Result<TreeId, TreeError> {
        let parent_tree = self.tree_of(parent).ok_or(TreeError::MissingParent(parent))?;
        let child_tree = self.tree_of(child_root).ok_or(TreeError::NotARoot(child_root))?;
        if parent_tree == child_tree {
            return Err(TreeError::SameTree(parent, child_root));
        }
        if !self.is_root(child_root) {
            return Err(TreeError::NotARoot(child_root));
        }
        let target = self
            .get(parent_tree)
            .ok_or(TreeError::MissingParent(parent))?;
        let other = self
            .get(child_tree)
            .ok_or(TreeError::NotARoot(child_root))?;
        target.check_graft(parent, other)?;
        let moved: Vec<PeakKey> = other.peaks().collect();

        // checked above, so once the child tree is taken the graft cannot fail
        let other = self.trees[child_tree]
            .take()
            .ok_or(TreeError::NotARoot(child_root))?;
        let target = self.trees[parent_tree]
            .as_mut()
            .ok_or(TreeError::MissingParent(parent))?;
        target.graft(parent, other, relation)?;
        for peak in moved {
            self.node_to_tree.insert(peak, parent_tree);
        }
        Ok(parent_tree)
    }

    /// Write one row per node, `Feature_ID  Feature_tag  root  root_tag  relation`, tab separated.
    pub fn export_tsv<W: Write>(&self, peaks: &PeakList, mut writer: W) -> io::Result<()> {
        writeln!(writer, "Feature_ID\tFeature_tag\troot\troot_tag\trelation")?;
        for (_, tree) in self.iter() {
            let root = tree.root();
            let root_id = peaks.get(root.peak).map(|p| p.id.as_str()).unwrap_or_default();
            for node in tree.nodes() {
                let node_id = peaks.get(node.peak).map(|p| p.id.as_str()).unwrap_or_default();
                writeln!(
                    writer,
                    "{node_id}\t{}\t{root_id}\t{}\t{}",
                    node.tag, root.tag, node.relation
                )?;
            }
        }
        Ok(())
    }
}
