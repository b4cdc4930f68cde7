use std::collections::HashMap;
use std::fmt::Write as _;

use identity_hash::BuildIdentityHasher;
use thiserror::Error;

use crate::peaks::PeakKey;
use crate::signature::ANCHOR;

/// The position of a node within its [`Tree`]'s arena
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Peak {0} is already a node")]
    DuplicatedNode(PeakKey),
    #[error("Parent peak {0} is not a node")]
    MissingParent(PeakKey),
    #[error("Peak {0} is not the root of a tree")]
    NotARoot(PeakKey),
    #[error("Peaks {0} and {1} are already in the same tree")]
    SameTree(PeakKey, PeakKey),
}

/// A peak placed in a [`Tree`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeNode {
    pub peak: PeakKey,
    /// The display label, `round(mz, 4)@round(apex, 1)`
    pub tag: String,
    /// The relation of this peak to its parent, or [`ANCHOR`] for the root
    pub relation: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn new(peak: PeakKey, tag: String, relation: String, parent: Option<NodeId>) -> Self {
        Self {
            peak,
            tag,
            relation,
            parent,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A rooted tree of peaks stored in insertion order, the root at position 0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Tree {
    nodes: Vec<TreeNode>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: HashMap<PeakKey, NodeId, BuildIdentityHasher<PeakKey>>,
}

impl Tree {
    pub fn new(root: PeakKey, tag: String) -> Self {
        let mut index: HashMap<PeakKey, NodeId, BuildIdentityHasher<PeakKey>> = HashMap::default();
        index.insert(root, 0);
        Self {
            nodes: vec![TreeNode::new(root, tag, ANCHOR.to_string(), None)],
            index,
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn root_peak(&self) -> PeakKey {
        self.nodes[0].peak
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, peak: PeakKey) -> bool {
        self.index.contains_key(&peak)
    }

    pub fn get(&self, peak: PeakKey) -> Option<&TreeNode> {
        self.index.get(&peak).map(|i| &self.nodes[*i])
    }

    pub fn nodes(&self) -> std::slice::Iter<'_, TreeNode> {
        self.nodes.iter()
    }

    pub fn peaks(&self) -> impl Iterator<Item = PeakKey> + '_ {
        self.nodes.iter().map(|n| n.peak)
    }

    /// The number of edges between `peak` and the root
    pub fn depth_of(&self, peak: PeakKey) -> Option<usize> {
        let mut i = *self.index.get(&peak)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[i].parent {
            i = parent;
            depth += 1;
        }
        Some(depth)
    }

    pub fn depth(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| self.depth_of(n.peak))
            .max()
            .unwrap_or_default()
    }

    pub fn add_child(
        &mut self,
        parent: PeakKey,
        child: PeakKey,
        tag: String,
        relation: String,
    ) -> Result<NodeId, TreeError> {
        if self.contains(child) {
            return Err(TreeError::DuplicatedNode(child));
        }
        let parent_id = *self
            .index
            .get(&parent)
            .ok_or(TreeError::MissingParent(parent))?;
        let id = self.nodes.len();
        self.nodes
            .push(TreeNode::new(child, tag, relation, Some(parent_id)));
        self.nodes[parent_id].children.push(id);
        self.index.insert(child, id);
        Ok(id)
    }

    /// Check that `other` could be grafted beneath `parent`, returning the parent's node
    pub fn check_graft(&self, parent: PeakKey, other: &Tree) -> Result<NodeId, TreeError> {
        let parent_id = *self
            .index
            .get(&parent)
            .ok_or(TreeError::MissingParent(parent))?;
        if let Some(dup) = other.peaks().find(|p| self.contains(*p)) {
            return Err(TreeError::DuplicatedNode(dup));
        }
        Ok(parent_id)
    }

    /// Move every node of `other` under `parent`, setting the relation of `other`'s
    /// root to `relation`.
    pub fn graft(&mut self, parent: PeakKey, other: Tree, relation: String) -> Result<(), TreeError> {
        let parent_id = self.check_graft(parent, &other)?;
        let offset = self.nodes.len();
        for (i, mut node) in other.nodes.into_iter().enumerate() {
            match node.parent {
                Some(p) => node.parent = Some(p + offset),
                None => {
                    node.parent = Some(parent_id);
                    node.relation = relation.clone();
                }
            }
            node.children.iter_mut().for_each(|c| *c += offset);
            self.index.insert(node.peak, i + offset);
            self.nodes.push(node);
        }
        self.nodes[parent_id].children.push(offset);
        Ok(())
    }

    /// Draw the tree with box drawing characters, one node per line, siblings sorted by tag.
    pub fn render(&self) -> String {
        let mut buf = String::new();
        let _ = writeln!(buf, "{}", self.root().tag);
        self.render_children(0, "", &mut buf);
        buf
    }

    fn render_children(&self, node: NodeId, prefix: &str, buf: &mut String) {
        let mut children = self.nodes[node].children.clone();
        children.sort_by(|a, b| self.nodes[*a].tag.cmp(&self.nodes[*b].tag));
        let n = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let last = i + 1 == n;
            let (branch, extension) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            let _ = writeln!(
                buf,
                "{prefix}{branch}{} ({})",
                self.nodes[child].tag, self.nodes[child].relation
            );
            self.render_children(child, &format!("{prefix}{extension}"), buf);
        }
    }
}
