//! Reduction of multi-slice variables (time steps, pressure levels) to one
//! 2-D array.

use super::time_units::TimeUnits;
use super::types::{FieldRequest, ReadError};
use crate::config::DimSelection;

use ndarray::{Array2, Zip};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One 2-D slice and its position along each extra dimension.
#[derive(Debug, Clone)]
pub(crate) struct Slice {
    pub coords: BTreeMap<String, String>,
    pub values: Array2<f64>,
}

/// Distinct values of a dimension, in slice order.
fn positions<'a>(slices: &'a [Slice], dimension: &str) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for value in slices.iter().filter_map(|s| s.coords.get(dimension)) {
        if !seen.contains(&value.as_str()) {
            seen.push(value);
        }
    }
    seen
}

fn nan_mean(slices: &[Slice]) -> Array2<f64> {
    let shape = slices[0].values.dim();
    let mut sum = Array2::<f64>::zeros(shape);
    let mut count = Array2::<f64>::zeros(shape);
    for slice in slices {
        Zip::from(&mut sum)
            .and(&mut count)
            .and(&slice.values)
            .for_each(|s, c, &v| {
                if v.is_finite() {
                    *s += v;
                    *c += 1.0;
                }
            });
    }
    Zip::from(&sum)
        .and(&count)
        .map_collect(|&s, &c| if c > 0.0 { s / c } else { f64::NAN })
}

/// Positions along `dimension` whose decoded time falls on the request date.
fn positions_on_date(
    path: &Path,
    variable: &str,
    dimension: &str,
    available: &[&str],
    request: &FieldRequest,
    units: &BTreeMap<String, String>,
) -> Result<Vec<String>, ReadError> {
    let date = request.date.ok_or_else(|| ReadError::NoDate {
        path: path.to_path_buf(),
        variable: variable.to_string(),
        dimension: dimension.to_string(),
    })?;
    let time_units = units
        .get(dimension)
        .and_then(|u| TimeUnits::parse(u))
        .ok_or_else(|| ReadError::TimeUnits {
            path: path.to_path_buf(),
            variable: variable.to_string(),
            dimension: dimension.to_string(),
        })?;

    let mut on_date = Vec::new();
    for &position in available {
        let day = time_units.day_of(position).ok_or_else(|| ReadError::TimeUnits {
            path: path.to_path_buf(),
            variable: variable.to_string(),
            dimension: dimension.to_string(),
        })?;
        if day == date {
            on_date.push(position.to_string());
        }
    }

    if on_date.is_empty() {
        return Err(ReadError::NoStepsOnDate {
            path: path.to_path_buf(),
            variable: variable.to_string(),
            dimension: dimension.to_string(),
            date,
        });
    }
    debug!(
        variable,
        dimension,
        steps = on_date.len(),
        available = available.len(),
        %date,
        "selected steps on date"
    );
    Ok(on_date)
}

/// Applies the requested selections and returns the single remaining
/// slice, or the mean over the averaged dimensions.
///
/// `units` maps a dimension name to its CF units, needed by `day`.
pub(crate) fn reduce_slices(
    path: &Path,
    variable: &str,
    mut slices: Vec<Slice>,
    request: &FieldRequest,
    units: &BTreeMap<String, String>,
) -> Result<Array2<f64>, ReadError> {
    if slices.is_empty() {
        return Err(ReadError::MissingVariable {
            path: path.to_path_buf(),
            variable: variable.to_string(),
        });
    }

    for (dimension, selection) in &request.dimensions {
        let available = positions(&slices, dimension);
        if available.is_empty() {
            debug!(variable, dimension = %dimension, "dimension not present, selection ignored");
            continue;
        }

        let keep: Vec<String> = match selection {
            DimSelection::Index(index) => {
                let position = available.get(*index).ok_or_else(|| ReadError::Selection {
                    path: path.to_path_buf(),
                    variable: variable.to_string(),
                    dimension: dimension.clone(),
                    index: *index,
                })?;
                vec![position.to_string()]
            }
            DimSelection::Last => vec![available[available.len() - 1].to_string()],
            DimSelection::Day => {
                positions_on_date(path, variable, dimension, &available, request, units)?
            }
            DimSelection::Mean => continue,
        };

        slices.retain(|s| s.coords.get(dimension).is_some_and(|p| keep.contains(p)));
    }

    if slices.len() == 1 {
        return Ok(slices.remove(0).values);
    }

    // Every dimension still spanning several positions must be averaged.
    let dimension_names: Vec<&String> = slices[0].coords.keys().collect();
    let ambiguous = dimension_names.iter().any(|dimension| {
        positions(&slices, dimension).len() > 1
            && !request
                .dimensions
                .get(*dimension)
                .is_some_and(DimSelection::averages)
    });
    if ambiguous {
        return Err(ReadError::AmbiguousSlices {
            path: path.to_path_buf(),
            variable: variable.to_string(),
            bands: slices.len(),
        });
    }

    debug!(variable, slices = slices.len(), "averaging slices");
    Ok(nan_mean(&slices))
}
