use super::slices::{Slice, reduce_slices};
use super::types::{FieldReader, FieldRequest, ReadError};
use crate::grid::GriddedField;

use gdal::{Dataset, Metadata};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

const DIMENSION_PREFIX: &str = "NETCDF_DIM_";

/// NetCDF variables read through GDAL's `NETCDF:` subdatasets.
///
/// Every band of a variable is one 2-D slice; its position along the extra
/// dimensions comes from the `NETCDF_DIM_<name>` band metadata, and the
/// dimension's units from the `<name>#units` attribute.
pub struct NcReader {
    pub file_name: PathBuf,
}

struct RasterVariable {
    latitude: Vec<f64>,
    longitude: Vec<f64>,
    slices: Vec<Slice>,
    units: BTreeMap<String, String>,
}

impl NcReader {
    fn subdataset(&self, variable: &str) -> String {
        format!("NETCDF:\"{}\":{}", self.file_name.display(), variable)
    }

    fn gdal_error(&self, variable: &str, e: gdal::errors::GdalError) -> ReadError {
        ReadError::NetCDF(format!("{} ({}): {}", self.file_name.display(), variable, e))
    }

    fn read_variable(&self, variable: &str) -> Result<RasterVariable, ReadError> {
        let dataset = Dataset::open(self.subdataset(variable))
            .map_err(|e| self.gdal_error(variable, e))?;
        let (width, height) = dataset.raster_size();
        let transform = dataset.geo_transform().map_err(|e| self.gdal_error(variable, e))?;

        // pixel centres
        let longitude = (0..width)
            .map(|j| transform[0] + (j as f64 + 0.5) * transform[1])
            .collect();
        let latitude = (0..height)
            .map(|i| transform[3] + (i as f64 + 0.5) * transform[5])
            .collect();

        let mut slices = Vec::with_capacity(dataset.raster_count());
        for index in 1..=dataset.raster_count() {
            let band = dataset.rasterband(index).map_err(|e| self.gdal_error(variable, e))?;
            let buffer = band
                .read_as::<f64>((0, 0), (width, height), (width, height), None)
                .map_err(|e| self.gdal_error(variable, e))?;

            let scale = band.scale().unwrap_or(1.0);
            let offset = band.offset().unwrap_or(0.0);
            let missing_value = band.no_data_value();
            let data: Vec<f64> = buffer
                .data()
                .iter()
                .map(|&raw| {
                    if missing_value.is_some_and(|mv| raw == mv) {
                        f64::NAN
                    } else {
                        raw * scale + offset
                    }
                })
                .collect();

            let coords: BTreeMap<String, String> = band
                .metadata_domain("")
                .unwrap_or_default()
                .iter()
                .filter_map(|entry| {
                    let (key, value) = entry.split_once('=')?;
                    let dimension = key.strip_prefix(DIMENSION_PREFIX)?;
                    Some((dimension.to_string(), value.to_string()))
                })
                .collect();

            let found = data.len();
            let values =
                Array2::from_shape_vec((height, width), data).map_err(|_| ReadError::Shape {
                    path: self.file_name.clone(),
                    variable: variable.to_string(),
                    found,
                    expected: width * height,
                })?;
            slices.push(Slice { coords, values });
        }

        let units: BTreeMap<String, String> = slices
            .iter()
            .flat_map(|s| s.coords.keys())
            .filter_map(|dimension| {
                let units = dataset.metadata_item(&format!("{dimension}#units"), "")?;
                Some((dimension.clone(), units))
            })
            .collect();

        debug!(
            file = %self.file_name.display(),
            variable,
            bands = slices.len(),
            width,
            height,
            "read NetCDF variable"
        );

        Ok(RasterVariable {
            latitude,
            longitude,
            slices,
            units,
        })
    }
}

impl FieldReader for NcReader {
    fn read_field(&self, request: &FieldRequest) -> Result<GriddedField, ReadError> {
        let mut coordinates: Option<(Vec<f64>, Vec<f64>)> = None;
        let mut variables = Vec::with_capacity(request.variables.len());

        for name in &request.variables {
            let raster = self.read_variable(name)?;
            let values = reduce_slices(
                &self.file_name,
                name,
                raster.slices,
                request,
                &raster.units,
            )?;

            match &coordinates {
                Some((latitude, longitude))
                    if (latitude.len(), longitude.len()) != values.dim() =>
                {
                    return Err(ReadError::Shape {
                        path: self.file_name.clone(),
                        variable: name.clone(),
                        found: values.len(),
                        expected: latitude.len() * longitude.len(),
                    });
                }
                Some(_) => {}
                None => coordinates = Some((raster.latitude, raster.longitude)),
            }
            variables.push((name.clone(), values));
        }

        let (latitude, longitude) = coordinates.unwrap_or_default();
        Ok(GriddedField::from_unsorted_longitude(latitude, longitude, variables)?)
    }
}
