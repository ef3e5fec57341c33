use std::fmt;

/// Position of a node inside a tree's node arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(u32);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Return the arena position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node of a fitted decision tree.
///
/// Children are referenced by [`NodeIndex`] into the owning tree's arena,
/// so a whole tree serializes as a flat `Vec<Node>`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// Interior node: samples with `value[feature] <= threshold` go left.
    Split {
        /// Zero-based feature column tested at this node.
        feature: usize,
        /// Split threshold (midpoint between two adjacent training values).
        threshold: f64,
        /// Left child.
        left: NodeIndex,
        /// Right child.
        right: NodeIndex,
        /// Training samples that reached this node.
        n_samples: usize,
        /// Weighted impurity decrease credited to `feature`.
        gain: f64,
    },
    /// Terminal node holding the class distribution of its training samples.
    Leaf {
        /// Class probabilities, one entry per class, summing to 1.0.
        distribution: Vec<f64>,
        /// Training samples that reached this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Build a leaf from raw class counts.
    pub(crate) fn leaf(class_counts: &[usize]) -> Self {
        let n_samples: usize = class_counts.iter().sum();
        let total = n_samples.max(1) as f64;
        Node::Leaf {
            distribution: class_counts.iter().map(|&c| c as f64 / total).collect(),
            n_samples,
        }
    }

    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Majority class of a leaf; ties go to the lowest class index.
    /// Returns `None` for split nodes.
    #[must_use]
    pub fn majority_class(&self) -> Option<usize> {
        match self {
            Node::Leaf { distribution, .. } => Some(argmax(distribution)),
            Node::Split { .. } => None,
        }
    }
}

/// Index of the largest value; the first one wins on ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
