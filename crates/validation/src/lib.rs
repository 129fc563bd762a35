//! foldboost validation - cross-validation for GBDT estimators
//!
//! - `target`: binary / multiclass / continuous inference
//! - `split`: KFold, StratifiedKFold, GroupKFold, predefined folds and `check_cv`
//! - `cross_validate`: fold-wise fit with out-of-fold and test predictions

pub mod cross_validate;
pub mod errors;
pub mod split;
pub mod target;

pub use cross_validate::{cross_validate, CvResult, FoldLogger, TracingLogger};
pub use errors::{Result, ValidationError};
pub use split::{
    check_cv, CvSplitter, CvStrategy, Fold, GroupKFold, KFold, PredefinedSplit,
    StratifiedKFold, DEFAULT_N_SPLITS,
};
pub use target::{type_of_target, TargetType};
