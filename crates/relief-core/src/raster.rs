//! Labeled-array envelope.
//!
//! A [`Raster`] pairs a 2D payload with the metadata a caller wants carried
//! through processing untouched: an optional name, two dimension names, one
//! coordinate vector per dimension and free-form string attributes. The
//! payload type is generic so the same envelope wraps host grids, device
//! buffers or chunked storage.
//!
//! Kernels never look at the metadata. They take the payload, compute, and
//! hand the result back through [`Raster::rewrap`], which copies dims,
//! coords and attrs verbatim under a new name.
//!
//! # Example
//!
//! ```rust
//! use relief_core::{Grid, Raster};
//!
//! let dem = Grid::filled(3, 2, 100.0f64);
//! let raster = Raster::new(dem)
//!     .with_name("elevation")
//!     .with_coord("x", vec![10.0, 20.0]).unwrap()
//!     .with_attr("units", "m");
//!
//! let shaded = Grid::filled(3, 2, 0.5f64);
//! let out = raster.rewrap(shaded, Some("illumination")).unwrap();
//! assert_eq!(out.name(), Some("illumination"));
//! assert_eq!(out.attrs()["units"], "m");
//! assert_eq!(out.coord("x"), Some(&[10.0, 20.0][..]));
//! ```

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, GridShape, Result};

/// Dimension names used when none are given: rows are `y`, columns `x`.
pub const DEFAULT_DIMS: [&str; 2] = ["y", "x"];

/// 2D payload plus name, dims, coords and attrs.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Raster<D> {
    data: D,
    name: Option<String>,
    dims: [String; 2],
    coords: BTreeMap<String, Vec<f64>>,
    attrs: BTreeMap<String, String>,
}

impl<D> Raster<D> {
    /// Wraps a payload with default dims and no other metadata.
    pub fn new(data: D) -> Self {
        Self {
            data,
            name: None,
            dims: DEFAULT_DIMS.map(String::from),
            coords: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Renames both dimensions. Existing coordinates follow their dimension.
    pub fn with_dims(mut self, row_dim: impl Into<String>, col_dim: impl Into<String>) -> Self {
        let new = [row_dim.into(), col_dim.into()];
        for (old, new) in self.dims.iter().zip(new.iter()) {
            if let Some(values) = self.coords.remove(old) {
                self.coords.insert(new.clone(), values);
            }
        }
        self.dims = new;
        self
    }

    /// Adds a string attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Payload.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Dimension names `[row_dim, col_dim]`.
    pub fn dims(&self) -> &[String; 2] {
        &self.dims
    }

    /// Coordinates for `dim`, if set.
    pub fn coord(&self, dim: &str) -> Option<&[f64]> {
        self.coords.get(dim).map(Vec::as_slice)
    }

    /// All coordinates keyed by dimension.
    pub fn coords(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.coords
    }

    /// Attributes.
    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }
}

impl<D: GridShape> Raster<D> {
    /// Attaches coordinates to one of the two dimensions.
    ///
    /// The vector length must equal the extent of that dimension.
    pub fn with_coord(mut self, dim: &str, values: Vec<f64>) -> Result<Self> {
        let (rows, cols) = self.data.shape();
        let expected = if dim == self.dims[0] {
            rows
        } else if dim == self.dims[1] {
            cols
        } else {
            return Err(Error::InvalidDimensions(format!(
                "unknown dimension '{dim}', raster has {:?}",
                self.dims
            )));
        };
        if values.len() != expected {
            return Err(Error::CoordLengthMismatch {
                dim: dim.to_string(),
                expected,
                actual: values.len(),
            });
        }
        self.coords.insert(dim.to_string(), values);
        Ok(self)
    }

    /// Wraps `data` with this raster's dims, coords and attrs under `name`.
    ///
    /// The new payload must have the same shape as the current one.
    pub fn rewrap<U: GridShape>(&self, data: U, name: Option<&str>) -> Result<Raster<U>> {
        if data.shape() != self.data.shape() {
            let (r0, c0) = self.data.shape();
            let (r1, c1) = data.shape();
            return Err(Error::InvalidDimensions(format!(
                "payload {r1}x{c1} does not match raster {r0}x{c0}"
            )));
        }
        Ok(Raster {
            data,
            name: name.map(String::from),
            dims: self.dims.clone(),
            coords: self.coords.clone(),
            attrs: self.attrs.clone(),
        })
    }
}

impl<D: GridShape> GridShape for Raster<D> {
    fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Grid;

    #[test]
    fn test_coord_length_checked() {
        let r = Raster::new(Grid::filled(3, 4, 0.0f64));
        let err = r.with_coord("y", vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, Error::CoordLengthMismatch { expected: 3, actual: 4, .. }));
    }

    #[test]
    fn test_unknown_dim() {
        let r = Raster::new(Grid::filled(3, 4, 0.0f64));
        assert!(r.with_coord("lat", vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_with_dims_moves_coords() {
        let r = Raster::new(Grid::filled(2, 3, 0.0f64))
            .with_coord("x", vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_dims("lat", "lon");
        assert_eq!(r.dims(), &["lat".to_string(), "lon".to_string()]);
        assert_eq!(r.coord("lon"), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(r.coord("x"), None);
    }

    #[test]
    fn test_rewrap_shape_mismatch() {
        let r = Raster::new(Grid::filled(2, 3, 0.0f64));
        assert!(r.rewrap(Grid::filled(3, 2, 0.0f64), None).is_err());
    }

    #[test]
    fn test_rewrap_copies_metadata() {
        let r = Raster::new(Grid::filled(2, 2, 1.0f64))
            .with_name("dem")
            .with_attr("res", "1")
            .with_coord("y", vec![5.0, 6.0])
            .unwrap();
        let out = r.rewrap(Grid::filled(2, 2, 0.0f32), None).unwrap();
        assert_eq!(out.name(), None);
        assert_eq!(out.attrs().get("res").map(String::as_str), Some("1"));
        assert_eq!(out.coord("y"), Some(&[5.0, 6.0][..]));
        assert_eq!(out.dims(), r.dims());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip_metadata() {
        let r = Raster::new(Grid::filled(1, 2, 3.0f64))
            .with_name("dem")
            .with_attr("units", "m");
        let json = serde_json::to_string(&r).unwrap();
        let back: Raster<Grid<f64>> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), Some("dem"));
        assert_eq!(back.data().shape(), (1, 2));
    }
}
