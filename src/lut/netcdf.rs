//! Optical property tables stored as NetCDF, read through GDAL's
//! multidimensional API.

use super::optical_table::{OpticalTable, SpeciesColumn, TableError};

use gdal::cpl::CslStringList;
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use ndarray::{Array2, Array3};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

fn netcdf_error(path: &Path, variable: &str, e: gdal::errors::GdalError) -> TableError {
    TableError::NetCDF(format!("{} ({}): {}", path.display(), variable, e))
}

/// A variable's values in file order together with its dimension sizes.
fn read_variable(
    dataset: &Dataset,
    path: &Path,
    name: &str,
) -> Result<(Vec<f64>, Vec<usize>), TableError> {
    let group = dataset.root_group().map_err(|e| netcdf_error(path, name, e))?;
    let array = group
        .open_md_array(name, CslStringList::new())
        .map_err(|e| netcdf_error(path, name, e))?;
    let shape: Vec<usize> = array
        .dimensions()
        .map_err(|e| netcdf_error(path, name, e))?
        .iter()
        .map(|d| d.size())
        .collect();

    let values = array
        .read_as::<f64>(vec![0; shape.len()], shape.clone())
        .map_err(|e| netcdf_error(path, name, e))?;
    debug!(file = %path.display(), variable = name, ?shape, "read table variable");
    Ok((values, shape))
}

fn read_axis(dataset: &Dataset, path: &Path, name: &'static str) -> Result<Vec<f64>, TableError> {
    let (values, shape) = read_variable(dataset, path, name)?;
    if shape.len() != 1 {
        return Err(TableError::Shape {
            array: name,
            found: format!("{shape:?}"),
            expected: "one dimension".to_string(),
        });
    }
    Ok(values)
}

fn read_array3(
    dataset: &Dataset,
    path: &Path,
    name: &'static str,
) -> Result<Array3<f64>, TableError> {
    let (values, shape) = read_variable(dataset, path, name)?;
    match shape[..] {
        [columns, rh, wl] => {
            Array3::from_shape_vec((columns, rh, wl), values).map_err(|e| TableError::Shape {
                array: name,
                found: e.to_string(),
                expected: format!("({columns}, {rh}, {wl})"),
            })
        }
        _ => Err(TableError::Shape {
            array: name,
            found: format!("{shape:?}"),
            expected: "(column, relative_humidity, wavelength)".to_string(),
        }),
    }
}

fn read_array2(
    dataset: &Dataset,
    path: &Path,
    name: &'static str,
) -> Result<Array2<f64>, TableError> {
    let (values, shape) = read_variable(dataset, path, name)?;
    match shape[..] {
        [columns, wl] => {
            Array2::from_shape_vec((columns, wl), values).map_err(|e| TableError::Shape {
                array: name,
                found: e.to_string(),
                expected: format!("({columns}, {wl})"),
            })
        }
        _ => Err(TableError::Shape {
            array: name,
            found: format!("{shape:?}"),
            expected: "(column, wavelength)".to_string(),
        }),
    }
}

/// Reads `wavelength`, `relative_humidity`, `lidar_ratio_*` and `mass_ext_*`
/// from a NetCDF table. Hydrophilic arrays are `(column, rh, wavelength)`,
/// hydrophobic ones `(column, wavelength)`.
pub fn read_netcdf_table(
    path: &Path,
    species: BTreeMap<String, SpeciesColumn>,
) -> Result<OpticalTable, TableError> {
    let options = DatasetOptions {
        open_flags: GdalOpenFlags::GDAL_OF_MULTIDIM_RASTER,
        ..Default::default()
    };
    let dataset = Dataset::open_ex(path, options).map_err(|e| netcdf_error(path, "", e))?;

    OpticalTable::from_stored_axes(
        &read_axis(&dataset, path, "wavelength")?,
        &read_axis(&dataset, path, "relative_humidity")?,
        read_array3(&dataset, path, "lidar_ratio_hydrophilic")?,
        read_array3(&dataset, path, "mass_ext_hydrophilic")?,
        read_array2(&dataset, path, "lidar_ratio_hydrophobic")?,
        read_array2(&dataset, path, "mass_ext_hydrophobic")?,
        species,
    )
}
