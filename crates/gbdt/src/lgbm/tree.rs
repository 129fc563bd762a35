//! Decision tree structures for the leaf-wise booster
//!
//! Leaf values already include the learning rate.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the feature vector
/// - `categories` is `Some` for categorical splits, holding the codes that go left
/// - `default_left` routes missing numeric values
///
/// For leaf nodes `feature_idx == -1` and `leaf` holds the output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: i32,
    pub left: i32,
    pub right: i32,
    pub feature_idx: i32,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u32>>,
    #[serde(default)]
    pub default_left: bool,
    #[serde(default)]
    pub gain: f64,
    pub leaf: Option<f64>,
}

impl Node {
    /// Numeric split: `value <= threshold` goes left.
    pub fn numeric(id: i32, feature_idx: i32, threshold: f64, default_left: bool, gain: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx,
            threshold,
            categories: None,
            default_left,
            gain,
            leaf: None,
        }
    }

    /// Categorical split: listed codes go left, everything else right.
    pub fn categorical(id: i32, feature_idx: i32, mut categories: Vec<u32>, gain: f64) -> Self {
        categories.sort_unstable();
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx,
            threshold: 0.0,
            categories: Some(categories),
            default_left: false,
            gain,
            leaf: None,
        }
    }

    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            categories: None,
            default_left: false,
            gain: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Whether a feature value is routed to the left child.
    #[inline]
    pub fn goes_left(&self, value: f64) -> bool {
        match &self.categories {
            Some(codes) => category_code(value)
                .map(|code| codes.binary_search(&code).is_ok())
                .unwrap_or(false),
            None => {
                if value.is_nan() {
                    self.default_left
                } else {
                    value <= self.threshold
                }
            }
        }
    }
}

/// Integer category code of a value; NaN, negative and fractional values have none.
#[inline]
pub(crate) fn category_code(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Node 0 is the root
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Output for one row; `feature` returns the value of a feature index.
    pub fn evaluate<F: Fn(usize) -> f64>(&self, feature: F) -> f64 {
        let mut idx = 0usize;
        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }
            let next = if node.goes_left(feature(node.feature_idx as usize)) {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Add each split's gain to `gains[feature_idx]`.
    pub fn accumulate_gain(&self, gains: &mut [f64]) {
        for node in self.nodes.iter().filter(|n| !n.is_leaf()) {
            if let Some(slot) = gains.get_mut(node.feature_idx as usize) {
                *slot += node.gain;
            }
        }
    }

    /// Validate tree structure against a feature count
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    _ => return Err(format!("leaf node {} has no finite value", i)),
                }
                continue;
            }
            for child in [node.left, node.right] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("node {} has invalid child {}", i, child));
                }
            }
            if node.feature_idx < 0 || node.feature_idx as usize >= n_features {
                return Err(format!(
                    "node {} splits on unknown feature {}",
                    i, node.feature_idx
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(default_left: bool) -> Tree {
        let mut root = Node::numeric(0, 0, 50.0, default_left, 1.0);
        root.left = 1;
        root.right = 2;
        Tree::new(vec![root, Node::leaf(1, 100.0), Node::leaf(2, 200.0)])
    }

    #[test]
    fn test_numeric_evaluation() {
        let tree = stump(false);
        let row = |v: f64| move |_: usize| v;
        assert_eq!(tree.evaluate(row(30.0)), 100.0);
        assert_eq!(tree.evaluate(row(50.0)), 100.0);
        assert_eq!(tree.evaluate(row(60.0)), 200.0);
        assert_eq!(tree.evaluate(row(f64::NAN)), 200.0);
        assert_eq!(stump(true).evaluate(row(f64::NAN)), 100.0);
    }

    #[test]
    fn test_categorical_evaluation() {
        let mut root = Node::categorical(0, 0, vec![3, 1], 2.0);
        root.left = 1;
        root.right = 2;
        let tree = Tree::new(vec![root, Node::leaf(1, -1.0), Node::leaf(2, 1.0)]);

        assert_eq!(tree.evaluate(|_| 1.0), -1.0);
        assert_eq!(tree.evaluate(|_| 3.0), -1.0);
        assert_eq!(tree.evaluate(|_| 2.0), 1.0);
        assert_eq!(tree.evaluate(|_| f64::NAN), 1.0);
        assert_eq!(tree.evaluate(|_| -1.0), 1.0);
    }

    #[test]
    fn test_validate() {
        assert!(stump(false).validate(1).is_ok());
        assert!(stump(false).validate(0).is_err());

        let mut broken = stump(false);
        broken.nodes[0].left = 7;
        assert!(broken.validate(1).is_err());
    }

    #[test]
    fn test_gain_accumulation() {
        let mut gains = vec![0.0; 2];
        stump(false).accumulate_gain(&mut gains);
        assert_eq!(gains, vec![1.0, 0.0]);
    }
}
