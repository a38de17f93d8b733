//! Latitude/longitude grids and the 2-D fields that live on them.
//!
//! Every axis carries explicit coordinates. Longitudes are always stored in
//! `[0, 360)` and ascending; latitudes may run in either direction.

pub mod extent;
pub mod merge;

pub use extent::Extent;
pub use merge::{MergeError, merge};

use crate::nearest::{nearest_index, nearest_longitude_index};
use ndarray::{Array2, Axis};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("{0} axis is empty")]
    EmptyAxis(&'static str),
    #[error("non-finite coordinate in {0} axis")]
    NonFiniteCoordinate(&'static str),
    #[error("latitude axis must be strictly ascending or strictly descending")]
    LatitudeNotMonotonic,
    #[error("longitude axis must be strictly ascending within [0, 360)")]
    LongitudeNotAscending,
    #[error("variable {name} has shape {found:?}, grid is {expected:?}")]
    ShapeMismatch {
        name: String,
        found: (usize, usize),
        expected: (usize, usize),
    },
    #[error("variable {0} is already present")]
    DuplicateVariable(String),
    #[error("invalid extent: {0}")]
    InvalidExtent(&'static str),
}

/// Wraps a longitude in degrees into `[0, 360)`.
pub fn normalize_longitude(longitude: f64) -> f64 {
    let wrapped = longitude.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    latitude: Vec<f64>,
    longitude: Vec<f64>,
}

impl Grid {
    pub fn new(latitude: Vec<f64>, longitude: Vec<f64>) -> Result<Self, GridError> {
        if latitude.is_empty() {
            return Err(GridError::EmptyAxis("latitude"));
        }
        if longitude.is_empty() {
            return Err(GridError::EmptyAxis("longitude"));
        }
        if latitude.iter().any(|v| !v.is_finite()) {
            return Err(GridError::NonFiniteCoordinate("latitude"));
        }
        if longitude.iter().any(|v| !v.is_finite()) {
            return Err(GridError::NonFiniteCoordinate("longitude"));
        }

        let ascending = latitude.windows(2).all(|w| w[0] < w[1]);
        let descending = latitude.windows(2).all(|w| w[0] > w[1]);
        if !ascending && !descending {
            return Err(GridError::LatitudeNotMonotonic);
        }

        let in_range = longitude.iter().all(|v| (0.0..360.0).contains(v));
        if !in_range || !longitude.windows(2).all(|w| w[0] < w[1]) {
            return Err(GridError::LongitudeNotAscending);
        }

        Ok(Grid {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> &[f64] {
        &self.latitude
    }

    pub fn longitude(&self) -> &[f64] {
        &self.longitude
    }

    /// `(n_latitude, n_longitude)`, the row/column shape of every variable.
    pub fn shape(&self) -> (usize, usize) {
        (self.latitude.len(), self.longitude.len())
    }

    pub fn extent(&self) -> Extent {
        let first_lat = self.latitude[0];
        let last_lat = self.latitude[self.latitude.len() - 1];
        Extent {
            lat_min: first_lat.min(last_lat),
            lat_max: first_lat.max(last_lat),
            lon_min: self.longitude[0],
            lon_max: self.longitude[self.longitude.len() - 1],
        }
    }

    /// Row/column of the cell nearest to a point.
    ///
    /// The grid is rectilinear, so the per-axis nearest indices give the
    /// Euclidean-nearest cell. Longitude distance wraps at 360. Ties resolve
    /// to the first cell in coordinate order.
    pub fn nearest_cell(&self, latitude: f64, longitude: f64) -> Option<(usize, usize)> {
        let row = nearest_index(&self.latitude, latitude)?;
        let col = nearest_longitude_index(&self.longitude, normalize_longitude(longitude))?;
        Some((row, col))
    }
}

/// Named 2-D variables sharing one grid.
#[derive(Debug, Clone)]
pub struct GriddedField {
    grid: Grid,
    variables: BTreeMap<String, Array2<f64>>,
}

impl GriddedField {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            variables: BTreeMap::new(),
        }
    }

    /// Builds a field from coordinates in any longitude convention.
    ///
    /// Longitudes are wrapped into `[0, 360)` and the columns of every
    /// variable are reordered so the axis ascends.
    pub fn from_unsorted_longitude(
        latitude: Vec<f64>,
        longitude: Vec<f64>,
        variables: Vec<(String, Array2<f64>)>,
    ) -> Result<Self, GridError> {
        if longitude.iter().any(|v| !v.is_finite()) {
            return Err(GridError::NonFiniteCoordinate("longitude"));
        }

        let wrapped: Vec<f64> = longitude.iter().map(|&v| normalize_longitude(v)).collect();
        let mut order: Vec<usize> = (0..wrapped.len()).collect();
        order.sort_by(|&a, &b| wrapped[a].total_cmp(&wrapped[b]));
        let sorted = order.iter().map(|&i| wrapped[i]).collect();

        let mut field = GriddedField::new(Grid::new(latitude, sorted)?);
        for (name, values) in variables {
            if values.ncols() != order.len() {
                return Err(GridError::ShapeMismatch {
                    name,
                    found: values.dim(),
                    expected: field.grid.shape(),
                });
            }
            field.insert(name, values.select(Axis(1), &order))?;
        }
        Ok(field)
    }

    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        values: Array2<f64>,
    ) -> Result<Self, GridError> {
        self.insert(name, values)?;
        Ok(self)
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        values: Array2<f64>,
    ) -> Result<(), GridError> {
        let name = name.into();
        if values.dim() != self.grid.shape() {
            return Err(GridError::ShapeMismatch {
                name,
                found: values.dim(),
                expected: self.grid.shape(),
            });
        }
        if self.variables.contains_key(&name) {
            return Err(GridError::DuplicateVariable(name));
        }
        self.variables.insert(name, values);
        Ok(())
    }

    /// Renames a variable; returns `false` when `from` is absent.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<bool, GridError> {
        if from == to {
            return Ok(self.variables.contains_key(from));
        }
        if self.variables.contains_key(to) {
            return Err(GridError::DuplicateVariable(to.to_string()));
        }
        match self.variables.remove(from) {
            Some(values) => {
                self.variables.insert(to.to_string(), values);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn variable(&self, name: &str) -> Option<&Array2<f64>> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Array2<f64>)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn value_at(&self, name: &str, row: usize, col: usize) -> Option<f64> {
        self.variables.get(name)?.get((row, col)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_grid_validation() {
        assert!(Grid::new(vec![10.0, 0.0, -10.0], vec![0.0, 1.0]).is_ok());
        assert!(Grid::new(vec![-10.0, 0.0, 10.0], vec![0.0, 1.0]).is_ok());

        assert_eq!(
            Grid::new(vec![], vec![0.0]),
            Err(GridError::EmptyAxis("latitude"))
        );
        assert_eq!(
            Grid::new(vec![0.0, 10.0, 5.0], vec![0.0]),
            Err(GridError::LatitudeNotMonotonic)
        );
        assert_eq!(
            Grid::new(vec![0.0], vec![-10.0, 0.0]),
            Err(GridError::LongitudeNotAscending)
        );
        assert_eq!(
            Grid::new(vec![0.0], vec![10.0, 0.0]),
            Err(GridError::LongitudeNotAscending)
        );
        assert_eq!(
            Grid::new(vec![f64::NAN], vec![0.0]),
            Err(GridError::NonFiniteCoordinate("latitude"))
        );
    }

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert_eq!(normalize_longitude(-0.25), 359.75);
        assert_eq!(normalize_longitude(360.0), 0.0);
        assert_eq!(normalize_longitude(725.0), 5.0);
        assert!(normalize_longitude(-1e-20) < 360.0);
    }

    #[test]
    fn test_from_unsorted_longitude_reorders_columns() {
        let field = GriddedField::from_unsorted_longitude(
            vec![0.0],
            vec![-90.0, 0.0, 90.0, 180.0 - 1.0],
            vec![("rh".to_string(), array![[1.0, 2.0, 3.0, 4.0]])],
        )
        .unwrap();

        assert_eq!(field.grid().longitude(), &[0.0, 90.0, 179.0, 270.0]);
        assert_eq!(field.variable("rh").unwrap(), &array![[2.0, 3.0, 4.0, 1.0]]);
    }

    #[test]
    fn test_insert_rejects_shape_and_duplicates() {
        let grid = Grid::new(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        let mut field = GriddedField::new(grid);

        assert!(field.insert("a", Array2::zeros((2, 2))).is_ok());
        assert_eq!(
            field.insert("a", Array2::zeros((2, 2))),
            Err(GridError::DuplicateVariable("a".into()))
        );
        assert!(matches!(
            field.insert("b", Array2::zeros((3, 2))),
            Err(GridError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rename() {
        let grid = Grid::new(vec![0.0], vec![0.0]).unwrap();
        let mut field = GriddedField::new(grid)
            .with_variable("r", array![[55.0]])
            .unwrap();

        assert!(field.rename("r", "relative_humidity_pl").unwrap());
        assert!(!field.rename("missing", "x").unwrap());
        assert_eq!(field.value_at("relative_humidity_pl", 0, 0), Some(55.0));
        assert!(!field.contains("r"));
    }

    #[test]
    fn test_nearest_cell() {
        let grid = Grid::new(vec![50.0, 49.0, 48.0], vec![0.0, 1.0, 359.0]).unwrap();
        assert_eq!(grid.nearest_cell(48.9, 0.9), Some((1, 1)));
        // -1 wraps to 359
        assert_eq!(grid.nearest_cell(50.2, -1.0), Some((0, 2)));
        // equidistant between 49 and 48, first in coordinate order wins
        assert_eq!(grid.nearest_cell(48.5, 0.0), Some((1, 0)));
    }

    #[test]
    fn test_nearest_cell_west_of_greenwich() {
        let longitude: Vec<f64> = (0..900).map(|i| i as f64 * 0.4).collect();
        let grid = Grid::new(vec![51.2, 50.8], longitude).unwrap();

        assert_eq!(grid.nearest_cell(51.0, -0.1), Some((0, 0)));
        assert_eq!(grid.nearest_cell(51.0, -0.3), Some((0, 899)));
    }
}
