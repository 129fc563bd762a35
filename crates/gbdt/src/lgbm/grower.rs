//! Leaf-wise tree growth on histogram bins
//!
//! The leaf with the largest split gain is split next until `num_leaves` is
//! reached or no leaf has a positive-gain split. Missing numeric values are
//! tried on both sides and the better direction is stored in the node.

use crate::binning::BinMapper;
use crate::dataset::FeatureMatrix;
use crate::deterministic::{prefer, SplitTieBreaker};
use crate::errors::{GbdtError, Result};

use super::tree::{category_code, Node, Tree};

/// Bin assigned to NaN (and to invalid categorical values)
pub(crate) const MISSING: u32 = u32::MAX;
/// Largest accepted categorical code
const MAX_CATEGORY_CODE: u32 = 1 << 20;

pub(crate) enum BinKind {
    Numeric(BinMapper),
    Categorical,
}

pub(crate) struct FeatureBins {
    pub bins: Vec<u32>,
    pub n_bins: usize,
    pub kind: BinKind,
}

/// Binned copy of a training matrix
pub(crate) struct BinnedData {
    pub features: Vec<FeatureBins>,
}

impl BinnedData {
    pub fn build(x: &FeatureMatrix, categorical: &[usize], max_bin: usize) -> Result<Self> {
        let mut features = Vec::with_capacity(x.n_features());

        for feature in 0..x.n_features() {
            let values = x.column(feature);

            if categorical.contains(&feature) {
                let mut bins = Vec::with_capacity(values.len());
                let mut n_bins = 0usize;
                for &v in values {
                    if v.is_nan() {
                        bins.push(MISSING);
                        continue;
                    }
                    match category_code(v) {
                        Some(code) if code <= MAX_CATEGORY_CODE => {
                            n_bins = n_bins.max(code as usize + 1);
                            bins.push(code);
                        }
                        _ => {
                            return Err(GbdtError::InvalidData(format!(
                                "categorical feature {} has value {}, expected a non-negative integer",
                                x.feature_names()[feature],
                                v
                            )))
                        }
                    }
                }
                features.push(FeatureBins {
                    bins,
                    n_bins,
                    kind: BinKind::Categorical,
                });
            } else {
                let mapper = BinMapper::fit(values, max_bin);
                let bins = values
                    .iter()
                    .map(|&v| mapper.bin(v).unwrap_or(MISSING))
                    .collect();
                features.push(FeatureBins {
                    bins,
                    n_bins: mapper.n_bins(),
                    kind: BinKind::Numeric(mapper),
                });
            }
        }

        Ok(Self { features })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GrowerConfig {
    pub num_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub min_child_weight: f64,
    pub min_split_gain: f64,
    pub reg_lambda: f64,
    pub learning_rate: f64,
    pub max_cat_to_onehot: usize,
    pub cat_smooth: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct BinStat {
    grad: f64,
    hess: f64,
    count: usize,
}

impl BinStat {
    fn add(&mut self, other: &BinStat) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }

    fn minus(&self, other: &BinStat) -> BinStat {
        BinStat {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

#[derive(Debug, Clone)]
enum SplitRule {
    Numeric {
        bin: u32,
        threshold: f64,
        default_left: bool,
    },
    Categorical {
        codes: Vec<u32>,
    },
}

#[derive(Debug, Clone)]
struct SplitInfo {
    feature_idx: usize,
    gain: f64,
    tie: SplitTieBreaker,
    rule: SplitRule,
}

struct LeafState {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: Option<SplitInfo>,
}

pub(crate) struct TreeGrower<'a> {
    data: &'a BinnedData,
    config: &'a GrowerConfig,
    grad: &'a [f64],
    hess: &'a [f64],
}

impl<'a> TreeGrower<'a> {
    pub fn new(
        data: &'a BinnedData,
        config: &'a GrowerConfig,
        grad: &'a [f64],
        hess: &'a [f64],
    ) -> Self {
        Self {
            data,
            config,
            grad,
            hess,
        }
    }

    /// Grow one tree over `rows`, considering only `features`.
    pub fn grow(&self, rows: Vec<usize>, features: &[usize]) -> Tree {
        let mut nodes = vec![Node::leaf(0, self.leaf_output(&rows))];
        let root_split = self.find_best_split(&rows, features, 0, 0);
        let mut leaves = vec![LeafState {
            node: 0,
            rows,
            depth: 0,
            split: root_split,
        }];

        while leaves.len() < self.config.num_leaves {
            let mut best: Option<(usize, f64, usize)> = None;
            for (pos, leaf) in leaves.iter().enumerate() {
                if let Some(split) = &leaf.split {
                    let better = match best {
                        None => true,
                        Some((_, gain, node)) => {
                            split.gain > gain || (split.gain == gain && leaf.node < node)
                        }
                    };
                    if better {
                        best = Some((pos, split.gain, leaf.node));
                    }
                }
            }
            let Some((pos, _, _)) = best else {
                break;
            };

            let leaf = leaves.swap_remove(pos);
            let Some(split) = leaf.split else {
                break;
            };
            let (left_rows, right_rows) = self.partition(&leaf.rows, &split);

            let left_id = nodes.len();
            let right_id = left_id + 1;
            let mut internal = match &split.rule {
                SplitRule::Numeric {
                    threshold,
                    default_left,
                    ..
                } => Node::numeric(
                    leaf.node as i32,
                    split.feature_idx as i32,
                    *threshold,
                    *default_left,
                    split.gain,
                ),
                SplitRule::Categorical { codes } => Node::categorical(
                    leaf.node as i32,
                    split.feature_idx as i32,
                    codes.clone(),
                    split.gain,
                ),
            };
            internal.left = left_id as i32;
            internal.right = right_id as i32;
            nodes[leaf.node] = internal;
            nodes.push(Node::leaf(left_id as i32, self.leaf_output(&left_rows)));
            nodes.push(Node::leaf(right_id as i32, self.leaf_output(&right_rows)));

            let depth = leaf.depth + 1;
            for (node, child_rows) in [(left_id, left_rows), (right_id, right_rows)] {
                let split = self.find_best_split(&child_rows, features, node, depth);
                leaves.push(LeafState {
                    node,
                    rows: child_rows,
                    depth,
                    split,
                });
            }
        }

        Tree::new(nodes)
    }

    fn leaf_output(&self, rows: &[usize]) -> f64 {
        let (g, h) = rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.grad[r], h + self.hess[r])
        });
        let denom = h + self.config.reg_lambda;
        if denom <= 0.0 {
            0.0
        } else {
            -g / denom * self.config.learning_rate
        }
    }

    fn score(&self, stat: &BinStat) -> f64 {
        let denom = stat.hess + self.config.reg_lambda;
        if denom <= 0.0 {
            0.0
        } else {
            stat.grad * stat.grad / denom
        }
    }

    fn admissible(&self, stat: &BinStat) -> bool {
        stat.count >= self.config.min_child_samples.max(1)
            && stat.hess >= self.config.min_child_weight
    }

    fn split_gain(&self, left: &BinStat, right: &BinStat, parent: &BinStat) -> Option<f64> {
        if !self.admissible(left) || !self.admissible(right) {
            return None;
        }
        let gain = self.score(left) + self.score(right) - self.score(parent);
        (gain > self.config.min_split_gain && gain > 0.0).then_some(gain)
    }

    fn find_best_split(
        &self,
        rows: &[usize],
        features: &[usize],
        node_id: usize,
        depth: usize,
    ) -> Option<SplitInfo> {
        if let Some(limit) = self.config.max_depth {
            if depth >= limit {
                return None;
            }
        }
        if rows.len() < 2 * self.config.min_child_samples.max(1) {
            return None;
        }

        let mut best: Option<SplitInfo> = None;
        for &feature_idx in features {
            let candidate = match &self.data.features[feature_idx].kind {
                BinKind::Numeric(mapper) => self.numeric_split(rows, feature_idx, mapper, node_id),
                BinKind::Categorical => self.categorical_split(rows, feature_idx, node_id),
            };
            if let Some(candidate) = candidate {
                if prefer(
                    candidate.gain,
                    candidate.tie,
                    best.as_ref().map(|b| (b.gain, b.tie)),
                ) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn histogram(&self, rows: &[usize], feature_idx: usize) -> (Vec<BinStat>, BinStat) {
        let feature = &self.data.features[feature_idx];
        let mut hist = vec![BinStat::default(); feature.n_bins];
        let mut missing = BinStat::default();
        for &r in rows {
            let slot = match feature.bins[r] {
                MISSING => &mut missing,
                b => &mut hist[b as usize],
            };
            slot.grad += self.grad[r];
            slot.hess += self.hess[r];
            slot.count += 1;
        }
        (hist, missing)
    }

    fn numeric_split(
        &self,
        rows: &[usize],
        feature_idx: usize,
        mapper: &BinMapper,
        node_id: usize,
    ) -> Option<SplitInfo> {
        let (hist, missing) = self.histogram(rows, feature_idx);
        let mut parent = missing;
        for stat in &hist {
            parent.add(stat);
        }

        let mut best: Option<SplitInfo> = None;
        let mut left = BinStat::default();
        for bin in 0..hist.len().saturating_sub(1) {
            left.add(&hist[bin]);
            let tie = SplitTieBreaker::new(feature_idx, bin, node_id);

            let directions: &[bool] = if missing.count > 0 {
                &[false, true]
            } else {
                &[false]
            };
            for &default_left in directions {
                let mut l = left;
                if default_left {
                    l.add(&missing);
                }
                let r = parent.minus(&l);
                let Some(gain) = self.split_gain(&l, &r, &parent) else {
                    continue;
                };
                if prefer(gain, tie, best.as_ref().map(|b| (b.gain, b.tie))) {
                    best = Some(SplitInfo {
                        feature_idx,
                        gain,
                        tie,
                        rule: SplitRule::Numeric {
                            bin: bin as u32,
                            threshold: mapper.threshold(bin),
                            default_left,
                        },
                    });
                }
            }
        }
        best
    }

    fn categorical_split(&self, rows: &[usize], feature_idx: usize, node_id: usize) -> Option<SplitInfo> {
        let (hist, missing) = self.histogram(rows, feature_idx);
        let mut parent = missing;
        for stat in &hist {
            parent.add(stat);
        }

        let mut present: Vec<u32> = (0..hist.len() as u32)
            .filter(|&c| hist[c as usize].count > 0)
            .collect();
        if present.len() < 2 {
            return None;
        }

        let mut best: Option<SplitInfo> = None;
        let mut consider = |codes: &[u32], left: BinStat, position: usize| {
            let right = parent.minus(&left);
            let Some(gain) = self.split_gain(&left, &right, &parent) else {
                return;
            };
            let tie = SplitTieBreaker::new(feature_idx, position, node_id);
            if prefer(gain, tie, best.as_ref().map(|b| (b.gain, b.tie))) {
                best = Some(SplitInfo {
                    feature_idx,
                    gain,
                    tie,
                    rule: SplitRule::Categorical {
                        codes: codes.to_vec(),
                    },
                });
            }
        };

        if present.len() <= self.config.max_cat_to_onehot {
            for (position, &code) in present.iter().enumerate() {
                consider(&[code], hist[code as usize], position);
            }
        } else {
            let smooth = self.config.cat_smooth;
            present.sort_by(|&a, &b| {
                let ra = hist[a as usize].grad / (hist[a as usize].hess + smooth);
                let rb = hist[b as usize].grad / (hist[b as usize].hess + smooth);
                ra.total_cmp(&rb).then(a.cmp(&b))
            });
            let mut left = BinStat::default();
            for k in 0..present.len() - 1 {
                left.add(&hist[present[k] as usize]);
                consider(&present[..=k], left, k);
            }
        }

        best
    }

    fn partition(&self, rows: &[usize], split: &SplitInfo) -> (Vec<usize>, Vec<usize>) {
        let bins = &self.data.features[split.feature_idx].bins;
        rows.iter().partition(|&&r| {
            let bin = bins[r];
            match &split.rule {
                SplitRule::Numeric {
                    bin: cut,
                    default_left,
                    ..
                } => {
                    if bin == MISSING {
                        *default_left
                    } else {
                        bin <= *cut
                    }
                }
                SplitRule::Categorical { codes } => bin != MISSING && codes.contains(&bin),
            }
        })
    }
}
