//! Station lists: a JSON catalog or a day directory of L2 profile files.

use super::types::ReadError;
use crate::collocation::{StationCatalog, StationRecord};

use chrono::NaiveDate;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads a JSON list of station records.
pub fn read_station_catalog(path: &Path) -> Result<StationCatalog, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<StationRecord> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ReadError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let catalog: StationCatalog = records.into_iter().collect();
    info!(path = %path.display(), stations = catalog.len(), "read station catalog");
    Ok(catalog)
}

/// `{root}/YYYY/MM/DD`
pub fn profile_directory(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(date.format("%d").to_string())
}

/// L2 profile files of one day, sorted by name.
pub fn profile_files(root: &Path, date: NaiveDate) -> Vec<PathBuf> {
    let directory = profile_directory(root, date);
    walkdir::WalkDir::new(&directory)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            entry.file_type().is_file() && entry.file_name().to_string_lossy().contains("L2_")
        })
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(feature = "gdal")]
mod profiles {
    use super::*;
    use gdal::{Dataset, Metadata};
    use tracing::warn;

    fn attribute(dataset: &Dataset, name: &str) -> Option<String> {
        dataset
            .metadata_item(&format!("NC_GLOBAL#{name}"), "")
            .or_else(|| dataset.metadata_item(name, ""))
            .map(|v| v.trim().trim_matches('"').to_string())
    }

    fn numeric(dataset: &Dataset, name: &str) -> Option<f64> {
        attribute(dataset, name)?
            // single-value arrays come as "{51.97}"
            .trim_matches(|c| c == '{' || c == '}')
            .parse()
            .ok()
    }

    fn read_profile(path: &Path) -> Result<StationRecord, String> {
        let dataset = Dataset::open(path).map_err(|e| e.to_string())?;
        let missing = |name: &str| format!("missing attribute {name}");

        let wavelength =
            numeric(&dataset, "l0_wavelength").ok_or_else(|| missing("l0_wavelength"))?;
        if !wavelength.is_finite() || wavelength < 0.0 {
            return Err(format!("invalid l0_wavelength {wavelength}"));
        }

        Ok(StationRecord::new(
            attribute(&dataset, "wigos_station_id").ok_or_else(|| missing("wigos_station_id"))?,
            attribute(&dataset, "instrument_id").ok_or_else(|| missing("instrument_id"))?,
            numeric(&dataset, "station_latitude").ok_or_else(|| missing("station_latitude"))?,
            numeric(&dataset, "station_longitude").ok_or_else(|| missing("station_longitude"))?,
            wavelength.trunc() as u32,
        ))
    }

    /// Reads the station attributes of every L2 profile of the day.
    ///
    /// Unreadable files are logged and skipped.
    pub fn read_station_profiles(root: &Path, date: NaiveDate) -> StationCatalog {
        let files = profile_files(root, date);
        let mut catalog = StationCatalog::new();
        for file in &files {
            match read_profile(file) {
                Ok(station) => catalog.insert(station),
                Err(e) => warn!(file = %file.display(), error = %e, "skipping profile file"),
            }
        }
        info!(
            directory = %profile_directory(root, date).display(),
            files = files.len(),
            stations = catalog.len(),
            "read station profiles"
        );
        catalog
    }
}

#[cfg(feature = "gdal")]
pub use profiles::read_station_profiles;
