//! Regridding of a secondary field onto a reference grid.

use super::{GridError, GriddedField};
use ndarray::Array2;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    #[error("variable {0} exists in both fields")]
    DuplicateVariable(String),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Interpolation bracket along one axis: lower index, upper index and the
/// weight of the upper one.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lower: usize,
    upper: usize,
    weight: f64,
}

impl Bracket {
    fn single(index: usize) -> Self {
        Self {
            lower: index,
            upper: index,
            weight: 0.0,
        }
    }
}

/// Locates `x` on a strictly monotonic axis, clamping to the end values
/// outside the axis range.
fn bracket(axis: &[f64], x: f64) -> Bracket {
    let n = axis.len();
    if n == 1 {
        return Bracket::single(0);
    }

    let ascending = axis[n - 1] > axis[0];
    let (low_end, high_end) = if ascending { (0, n - 1) } else { (n - 1, 0) };

    if x <= axis[low_end] {
        return Bracket::single(low_end);
    }
    if x >= axis[high_end] {
        return Bracket::single(high_end);
    }

    // x is strictly inside the axis range here, so upper >= 1
    let upper = if ascending {
        axis.partition_point(|&v| v <= x)
    } else {
        axis.partition_point(|&v| v >= x)
    };
    let lower = upper - 1;
    let weight = (x - axis[lower]) / (axis[upper] - axis[lower]);

    Bracket {
        lower,
        upper,
        weight,
    }
}

/// Bilinear value from the four corners around a point.
///
/// With non-finite corners the nearest finite one is used, NaN if none is.
fn bilinear(values: &Array2<f64>, row: Bracket, col: Bracket) -> f64 {
    let (wy, wx) = (row.weight, col.weight);
    let corners = [
        (values[[row.lower, col.lower]], (1.0 - wy) * (1.0 - wx)),
        (values[[row.lower, col.upper]], (1.0 - wy) * wx),
        (values[[row.upper, col.lower]], wy * (1.0 - wx)),
        (values[[row.upper, col.upper]], wy * wx),
    ];

    if corners.iter().all(|(v, _)| v.is_finite()) {
        corners.iter().map(|(v, w)| v * w).sum()
    } else {
        corners
            .iter()
            .filter(|(v, _)| v.is_finite())
            // heaviest weight, first corner on ties
            .min_by(|a, b| b.1.total_cmp(&a.1))
            .map_or(f64::NAN, |(v, _)| *v)
    }
}

/// Resamples every variable of `secondary` onto the grid of `reference` and
/// returns both sets of variables on that grid.
///
/// Reference cells outside the secondary extent take the nearest boundary
/// value.
pub fn merge(
    reference: &GriddedField,
    secondary: &GriddedField,
) -> Result<GriddedField, MergeError> {
    let target = reference.grid();
    let source = secondary.grid();

    let target_extent = target.extent();
    if !source.extent().covers(&target_extent) {
        warn!(
            source = ?source.extent(),
            target = ?target_extent,
            "secondary grid does not cover the reference grid, clamping edge cells"
        );
    }

    let rows: Vec<Bracket> = target
        .latitude()
        .iter()
        .map(|&lat| bracket(source.latitude(), lat))
        .collect();
    let cols: Vec<Bracket> = target
        .longitude()
        .iter()
        .map(|&lon| bracket(source.longitude(), lon))
        .collect();

    let mut merged = reference.clone();
    for (name, values) in secondary.variables() {
        if merged.contains(name) {
            return Err(MergeError::DuplicateVariable(name.to_string()));
        }
        let resampled = Array2::from_shape_fn(target.shape(), |(i, j)| {
            bilinear(values, rows[i], cols[j])
        });
        debug!(variable = name, shape = ?target.shape(), "regridded variable");
        merged.insert(name, resampled)?;
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use ndarray::{Array2, array};

    fn linear_field(lat: Vec<f64>, lon: Vec<f64>) -> GriddedField {
        let grid = Grid::new(lat.clone(), lon.clone()).unwrap();
        let values = Array2::from_shape_fn(grid.shape(), |(i, j)| 2.0 * lat[i] + 0.5 * lon[j]);
        GriddedField::new(grid).with_variable("rh", values).unwrap()
    }

    fn reference(lat: Vec<f64>, lon: Vec<f64>) -> GriddedField {
        let grid = Grid::new(lat, lon).unwrap();
        let shape = grid.shape();
        GriddedField::new(grid)
            .with_variable("aod550", Array2::from_elem(shape, 0.2))
            .unwrap()
    }

    #[test]
    fn test_bracket_ascending_and_descending() {
        let axis = [0.0, 10.0, 20.0];
        assert_eq!(
            bracket(&axis, 15.0),
            Bracket {
                lower: 1,
                upper: 2,
                weight: 0.5
            }
        );
        assert_eq!(bracket(&axis, -5.0), Bracket::single(0));
        assert_eq!(bracket(&axis, 25.0), Bracket::single(2));

        let axis = [20.0, 10.0, 0.0];
        assert_eq!(
            bracket(&axis, 15.0),
            Bracket {
                lower: 0,
                upper: 1,
                weight: 0.5
            }
        );
        assert_eq!(bracket(&axis, -5.0), Bracket::single(2));
        assert_eq!(bracket(&axis, 25.0), Bracket::single(0));
    }

    #[test]
    fn test_merge_reproduces_linear_field() {
        let coarse = linear_field(vec![60.0, 50.0, 40.0], vec![0.0, 10.0, 20.0]);
        let fine = reference(vec![42.5, 47.0, 55.5], vec![1.0, 12.5, 19.0]);

        let merged = merge(&fine, &coarse).unwrap();

        assert!(merged.contains("aod550"));
        let rh = merged.variable("rh").unwrap();
        for (i, lat) in fine.grid().latitude().iter().enumerate() {
            for (j, lon) in fine.grid().longitude().iter().enumerate() {
                let expected = 2.0 * lat + 0.5 * lon;
                assert!(
                    (rh[[i, j]] - expected).abs() < 1e-9,
                    "({lat}, {lon}): {} != {expected}",
                    rh[[i, j]]
                );
            }
        }
    }

    #[test]
    fn test_merge_clamps_outside_coverage() {
        let small = linear_field(vec![40.0, 50.0], vec![10.0, 20.0]);
        let wide = reference(vec![30.0, 45.0, 70.0], vec![0.0, 15.0, 30.0]);

        let merged = merge(&wide, &small).unwrap();
        let rh = merged.variable("rh").unwrap();

        // corners clamp to the nearest source corner
        assert_eq!(rh[[0, 0]], 2.0 * 40.0 + 0.5 * 10.0);
        assert_eq!(rh[[2, 2]], 2.0 * 50.0 + 0.5 * 20.0);
        // inside stays interpolated
        assert!((rh[[1, 1]] - (2.0 * 45.0 + 0.5 * 15.0)).abs() < 1e-9);
        assert!(rh.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_merge_nan_corner_falls_back_to_nearest_finite() {
        let grid = Grid::new(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        let source = GriddedField::new(grid)
            .with_variable("rh", array![[10.0, f64::NAN], [30.0, 40.0]])
            .unwrap();
        let target = reference(vec![0.25], vec![0.75]);

        let merged = merge(&target, &source).unwrap();
        // weights: (0,0)=0.1875 (0,1)=0.5625 NaN, (1,0)=0.0625, (1,1)=0.1875
        assert_eq!(merged.value_at("rh", 0, 0), Some(10.0));

        let all_nan = GriddedField::new(Grid::new(vec![0.0], vec![0.0]).unwrap())
            .with_variable("rh", array![[f64::NAN]])
            .unwrap();
        let merged = merge(&target, &all_nan).unwrap();
        assert!(merged.value_at("rh", 0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_merge_rejects_duplicate_variables() {
        let a = reference(vec![0.0], vec![0.0]);
        let b = reference(vec![0.0], vec![0.0]);
        assert_eq!(
            merge(&a, &b).unwrap_err(),
            MergeError::DuplicateVariable("aod550".into())
        );
    }
}
