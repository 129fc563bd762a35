//! Cross-validation splitters
//!
//! Every splitter returns folds whose validation rows partition the rows it
//! was given. Row lists inside a fold are sorted ascending.

use foldboost_gbdt::deterministic::LcgRng;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{Result, ValidationError};
use crate::target::type_of_target;

/// Default number of folds
pub const DEFAULT_N_SPLITS: usize = 5;

/// One train/validation partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

impl Fold {
    pub fn new(mut train: Vec<usize>, mut valid: Vec<usize>) -> Self {
        train.sort_unstable();
        valid.sort_unstable();
        Self { train, valid }
    }

    /// Build a fold from its validation rows; the rest of `0..n_rows` trains.
    fn from_valid(n_rows: usize, valid: Vec<usize>) -> Self {
        let mut is_valid = vec![false; n_rows];
        for &r in &valid {
            is_valid[r] = true;
        }
        let train = (0..n_rows).filter(|&r| !is_valid[r]).collect();
        Self::new(train, valid)
    }
}

pub trait CvSplitter: fmt::Debug + Send + Sync {
    fn n_splits(&self) -> usize;

    fn split(&self, n_rows: usize, y: &[f64], groups: Option<&[String]>) -> Result<Vec<Fold>>;
}

fn check_n_splits(n_splits: usize, n_rows: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(ValidationError::InvalidSplit(format!(
            "n_splits must be at least 2, got {}",
            n_splits
        )));
    }
    if n_splits > n_rows {
        return Err(ValidationError::InvalidSplit(format!(
            "cannot have n_splits={} greater than the number of samples {}",
            n_splits, n_rows
        )));
    }
    Ok(())
}

/// Contiguous folds over (optionally shuffled) rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle,
            seed,
        }
    }
}

impl CvSplitter for KFold {
    fn n_splits(&self) -> usize {
        self.n_splits
    }

    fn split(&self, n_rows: usize, _y: &[f64], _groups: Option<&[String]>) -> Result<Vec<Fold>> {
        check_n_splits(self.n_splits, n_rows)?;

        let mut order: Vec<usize> = (0..n_rows).collect();
        if self.shuffle {
            LcgRng::new(self.seed).shuffle(&mut order);
        }

        let base = n_rows / self.n_splits;
        let extra = n_rows % self.n_splits;
        let mut start = 0;
        let mut folds = Vec::with_capacity(self.n_splits);
        for k in 0..self.n_splits {
            let size = base + usize::from(k < extra);
            folds.push(Fold::from_valid(n_rows, order[start..start + size].to_vec()));
            start += size;
        }
        Ok(folds)
    }
}

/// Folds that keep each class's share within one row of the others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle,
            seed,
        }
    }
}

impl CvSplitter for StratifiedKFold {
    fn n_splits(&self) -> usize {
        self.n_splits
    }

    fn split(&self, n_rows: usize, y: &[f64], _groups: Option<&[String]>) -> Result<Vec<Fold>> {
        check_n_splits(self.n_splits, n_rows)?;
        if y.len() != n_rows {
            return Err(ValidationError::LengthMismatch {
                what: "target".into(),
                expected: n_rows,
                got: y.len(),
            });
        }

        let mut classes: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (row, &label) in y.iter().enumerate() {
            classes.entry(ordered_key(label)).or_default().push(row);
        }

        let mut rng = LcgRng::new(self.seed);
        let mut valid: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut next = 0usize;
        for rows in classes.values_mut() {
            if self.shuffle {
                rng.shuffle(rows);
            }
            for &row in rows.iter() {
                valid[next].push(row);
                next = (next + 1) % self.n_splits;
            }
        }

        Ok(valid
            .into_iter()
            .map(|rows| Fold::from_valid(n_rows, rows))
            .collect())
    }
}

/// Sort key of an `f64` that orders like the value itself
fn ordered_key(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

/// Folds that never split a group; groups are balanced by row count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKFold {
    pub n_splits: usize,
}

impl GroupKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }
}

impl CvSplitter for GroupKFold {
    fn n_splits(&self) -> usize {
        self.n_splits
    }

    fn split(&self, n_rows: usize, _y: &[f64], groups: Option<&[String]>) -> Result<Vec<Fold>> {
        let groups = groups.ok_or(ValidationError::MissingGroups)?;
        if groups.len() != n_rows {
            return Err(ValidationError::LengthMismatch {
                what: "groups".into(),
                expected: n_rows,
                got: groups.len(),
            });
        }

        let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (row, group) in groups.iter().enumerate() {
            members.entry(group.as_str()).or_default().push(row);
        }
        if self.n_splits < 2 || members.len() < self.n_splits {
            return Err(ValidationError::InvalidSplit(format!(
                "cannot have n_splits={} with {} groups",
                self.n_splits,
                members.len()
            )));
        }

        // Largest groups first, each into the currently smallest fold
        let mut ordered: Vec<(&str, Vec<usize>)> = members.into_iter().collect();
        ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));

        let mut valid: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for (_, rows) in ordered {
            let target = (0..self.n_splits)
                .min_by_key(|&k| (valid[k].len(), k))
                .unwrap_or(0);
            valid[target].extend(rows);
        }

        Ok(valid
            .into_iter()
            .map(|rows| Fold::from_valid(n_rows, rows))
            .collect())
    }
}

/// Explicit, caller-supplied folds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredefinedSplit {
    folds: Vec<Fold>,
}

impl PredefinedSplit {
    pub fn new(folds: Vec<Fold>) -> Self {
        Self { folds }
    }
}

impl CvSplitter for PredefinedSplit {
    fn n_splits(&self) -> usize {
        self.folds.len()
    }

    fn split(&self, n_rows: usize, _y: &[f64], _groups: Option<&[String]>) -> Result<Vec<Fold>> {
        for (i, fold) in self.folds.iter().enumerate() {
            if let Some(&row) = fold.train.iter().chain(&fold.valid).find(|&&r| r >= n_rows) {
                return Err(ValidationError::InvalidSplit(format!(
                    "fold {} refers to row {} of {}",
                    i + 1,
                    row,
                    n_rows
                )));
            }
        }
        Ok(self.folds.clone())
    }
}

/// Ways a caller can describe cross-validation
#[derive(Debug)]
pub enum CvStrategy {
    Default,
    NFolds(usize),
    Splitter(Box<dyn CvSplitter>),
    Splits(Vec<Fold>),
}

impl Default for CvStrategy {
    fn default() -> Self {
        CvStrategy::Default
    }
}

impl From<usize> for CvStrategy {
    fn from(n_splits: usize) -> Self {
        CvStrategy::NFolds(n_splits)
    }
}

/// Normalize a strategy into a splitter.
///
/// Fold counts shuffle with `seed`; they stratify only when asked and the
/// target is a classification target.
pub fn check_cv(cv: CvStrategy, y: &[f64], stratified: bool, seed: u64) -> Result<Box<dyn CvSplitter>> {
    let n_splits = match cv {
        CvStrategy::Default => DEFAULT_N_SPLITS,
        CvStrategy::NFolds(n) => n,
        CvStrategy::Splitter(splitter) => return Ok(splitter),
        CvStrategy::Splits(folds) => return Ok(Box::new(PredefinedSplit::new(folds))),
    };
    if n_splits < 2 {
        return Err(ValidationError::InvalidSplit(format!(
            "n_splits must be at least 2, got {}",
            n_splits
        )));
    }

    if stratified && type_of_target(y).is_classification() {
        Ok(Box::new(StratifiedKFold::new(n_splits, true, seed)))
    } else {
        Ok(Box::new(KFold::new(n_splits, true, seed)))
    }
}
