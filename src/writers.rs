//! Output files of a run: the per-station a-priori JSON and, with the `gdal`
//! feature, one multi-band GeoTIFF per bulk property.

use crate::collocation::CollocationResult;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const OUTPUT_PREFIX: &str = "aer_ifs";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} axis is not evenly spaced, cannot write a GeoTIFF")]
    IrregularGrid(&'static str),
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// `{output}/YYYY/MM`
pub fn output_directory(output: &Path, date: NaiveDate) -> PathBuf {
    output
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
}

/// `{output}/YYYY/MM/aer_ifs-YYYYMMDD.json`
pub fn apriori_path(output: &Path, date: NaiveDate) -> PathBuf {
    output_directory(output, date).join(format!("{OUTPUT_PREFIX}-{}.json", date.format("%Y%m%d")))
}

fn create_file(path: &Path) -> Result<BufWriter<File>, WriteError> {
    let io_error = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    Ok(BufWriter::new(File::create(path).map_err(io_error)?))
}

/// Writes the collocation result with 4-space indentation and returns the
/// file path.
pub fn write_apriori(
    result: &CollocationResult,
    output: &Path,
    date: NaiveDate,
) -> Result<PathBuf, WriteError> {
    let path = apriori_path(output, date);
    let mut writer = create_file(&path)?;

    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    result.serialize(&mut serializer)?;
    writer.flush().map_err(|source| WriteError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), stations = result.stations().len(), "wrote a-priori file");
    Ok(path)
}

/// Cell size of an evenly spaced axis; one-cell axes get size 1.
fn axis_step(name: &'static str, axis: &[f64]) -> Result<f64, WriteError> {
    if axis.len() < 2 {
        return Ok(1.0);
    }
    let step = (axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64;
    let tolerance = step.abs() * 1e-3;
    if axis.windows(2).all(|w| ((w[1] - w[0]) - step).abs() <= tolerance) {
        Ok(step)
    } else {
        Err(WriteError::IrregularGrid(name))
    }
}

#[cfg(feature = "gdal")]
mod geotiff {
    use super::*;
    use crate::aerosol::BulkField;
    use gdal::raster::Buffer;
    use gdal::spatial_ref::SpatialRef;
    use gdal::{DriverManager, Metadata};

    /// `{output}/YYYY/MM/aer_ifs-{lr|mec}-YYYYMMDD.tif`
    pub fn bulk_field_path(field: &BulkField, output: &Path, date: NaiveDate) -> PathBuf {
        output_directory(output, date).join(format!(
            "{OUTPUT_PREFIX}-{}-{}.tif",
            field.quantity().short_name(),
            date.format("%Y%m%d")
        ))
    }

    /// Writes one band per (wavelength, rh) slice.
    pub fn write_bulk_field(
        field: &BulkField,
        output: &Path,
        date: NaiveDate,
    ) -> Result<PathBuf, WriteError> {
        let grid = field.grid();
        let dx = axis_step("longitude", grid.longitude())?;
        let dy = axis_step("latitude", grid.latitude())?;
        let (height, width) = grid.shape();
        let bands = field.wavelengths().len() * field.relative_humidities().len();

        let path = bulk_field_path(field, output, date);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f64, _>(&path, width, height, bands)?;
        dataset.set_geo_transform(&[
            grid.longitude()[0] - dx / 2.0,
            dx,
            0.0,
            grid.latitude()[0] - dy / 2.0,
            0.0,
            dy,
        ])?;
        dataset.set_spatial_ref(&SpatialRef::from_epsg(4326)?)?;

        for (index, (wavelength, rh, slice)) in field.slices().enumerate() {
            let mut band = dataset.rasterband(index + 1)?;
            let data: Vec<f64> = slice.iter().copied().collect();
            band.write((0, 0), (width, height), &mut Buffer::new((width, height), data))?;
            band.set_no_data_value(Some(f64::NAN))?;
            band.set_description(&format!(
                "{} at {wavelength}nm and RH: {rh}%",
                field.quantity()
            ))?;
            band.set_metadata_item("units", field.quantity().units(), "")?;
        }

        info!(path = %path.display(), bands, "wrote {} field", field.quantity());
        Ok(path)
    }
}

#[cfg(feature = "gdal")]
pub use geotiff::{bulk_field_path, write_bulk_field};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aerosol::{SpeciesSet, derive_bulk_property};
    use crate::collocation::{CollocationDataset, StationCatalog, StationRecord, collocate};
    use crate::grid::{Grid, GriddedField};
    use crate::lut::Quantity;
    use crate::lut::optical_table::tests::fixture;
    use ndarray::array;
    use tempfile::tempdir;

    fn result(date: NaiveDate) -> CollocationResult {
        let table = fixture();
        let merged = GriddedField::new(Grid::new(vec![0.0], vec![0.0, 1.0]).unwrap())
            .with_variable("duaod550", array![[0.2, 0.0]])
            .unwrap()
            .with_variable("aod550", array![[0.2, 0.0]])
            .unwrap()
            .with_variable("relative_humidity_pl", array![[50.0, 50.0]])
            .unwrap();
        let species = SpeciesSet::resolve(&["duaod550".to_string()], "aod550", &table).unwrap();
        let derive = |quantity| {
            derive_bulk_property(&merged, &species, &[532], &[50], &table, quantity).unwrap()
        };
        let lr = derive(Quantity::LidarRatio);
        let mec = derive(Quantity::MassExtinctionCoefficient);
        let stations: StationCatalog = [
            StationRecord::new("0-1", "A", 0.0, 0.0, 532),
            StationRecord::new("0-2", "A", 0.0, 1.0, 532),
        ]
        .into_iter()
        .collect();
        let dataset = CollocationDataset {
            merged: &merged,
            lidar_ratio: &lr,
            mass_extinction: &mec,
            humidity_variable: "relative_humidity_pl",
        };
        collocate(
            dataset,
            &stations,
            &["aod550".to_string(), "relative_humidity_pl".to_string()],
            date,
        )
        .unwrap()
    }

    #[test]
    fn test_write_apriori() {
        let dir = tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let path = write_apriori(&result(date), dir.path(), date).unwrap();

        assert_eq!(path, dir.path().join("2024").join("03").join("aer_ifs-20240301.json"));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"0-1-A\": {\n        \"data\": {"), "{text}");

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["0-1-A"]["lr"], 60.0);
        assert_eq!(value["0-1-A"]["mec"], 0.9);
        assert_eq!(value["0-1-A"]["data"]["relative_humidity_pl"], 50.0);
        // zero total AOD
        assert!(value["0-2-A"]["lr"].is_null());
        assert_eq!(value["attributes"]["default"]["lr"], 50);
        assert!(value["attributes"]["default"]["mec"].is_null());
        assert_eq!(value["attributes"]["date"], "2024-03-01");
    }

    #[test]
    fn test_axis_step() {
        assert_eq!(axis_step("longitude", &[0.0, 0.5, 1.0, 1.5]).unwrap(), 0.5);
        assert_eq!(axis_step("latitude", &[10.0, 9.5, 9.0]).unwrap(), -0.5);
        assert_eq!(axis_step("latitude", &[3.0]).unwrap(), 1.0);
        assert!(matches!(
            axis_step("longitude", &[0.0, 1.0, 3.0]),
            Err(WriteError::IrregularGrid("longitude"))
        ));
    }
}
