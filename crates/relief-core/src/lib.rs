//! # relief-core
//!
//! Core types for terrain raster processing.
//!
//! This crate provides the foundational types used throughout relief-rs:
//!
//! - [`Grid`] - Row-major 2D numeric buffer (elevation in, illumination out)
//! - [`Region`] - Rectangle in grid coordinates, used for tiles and windows
//! - [`Raster`] - Labeled-array envelope carrying name, dims, coords and attrs
//!
//! ## Crate Structure
//!
//! ```text
//! relief-core (this crate)
//!    ^
//!    |
//!    +-- relief-compute (illumination engine, backends, tiling)
//!    +-- relief-bench
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` - Enable serialization for grids, regions and raster metadata

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod grid;
pub mod raster;
pub mod region;

pub use error::{Error, Result};
pub use grid::{Grid, GridShape};
pub use raster::{Raster, DEFAULT_DIMS};
pub use region::Region;

/// Prelude module for convenient imports.
///
/// ```
/// use relief_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::grid::{Grid, GridShape};
    pub use crate::raster::Raster;
    pub use crate::region::Region;
}
