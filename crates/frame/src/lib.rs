//! foldboost frame - typed tabular data for experiment pipelines
//!
//! Provides the small slice of data-frame functionality the cross-validation
//! runner needs:
//!
//! - `frame`: columns with pandas-style dtypes and a named index
//! - `series`: named numeric targets
//! - `io`: CSV read/write with dtype inference, JSON records
//! - `npy`: NumPy `.npy` arrays

pub mod errors;
pub mod frame;
pub mod io;
pub mod npy;
pub mod series;

pub use errors::{FrameError, Result};
pub use frame::{Column, ColumnData, DType, DataFrame, Index};
pub use npy::{read_npy, write_npy};
pub use series::Series;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
