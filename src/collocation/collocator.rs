use super::result::{CollocationResult, StationApriori, StationError, StationFailure};
use super::station::{StationCatalog, StationRecord};
use crate::aerosol::mixing::BulkField;
use crate::aerosol::{APRIORI_DECIMALS, DATA_DECIMALS};
use crate::grid::GriddedField;
use crate::utils::round_to;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum CollocationError {
    #[error("variable {0} is missing from the merged field")]
    MissingVariable(String),
    #[error("{0} field is not on the merged grid")]
    GridMismatch(&'static str),
    #[error("lidar ratio and MEC fields have different wavelength or humidity coordinates")]
    CoordinateMismatch,
}

/// The fields stations are matched against.
#[derive(Debug, Clone, Copy)]
pub struct CollocationDataset<'a> {
    pub merged: &'a GriddedField,
    pub lidar_ratio: &'a BulkField,
    pub mass_extinction: &'a BulkField,
    /// Merged variable holding the relative humidity (%) that selects the
    /// humidity slice.
    pub humidity_variable: &'a str,
}

/// Nearest-cell lookup of bulk properties and passthrough values.
#[derive(Debug)]
pub struct Collocator<'a> {
    dataset: CollocationDataset<'a>,
    passthrough: Vec<String>,
}

impl<'a> Collocator<'a> {
    pub fn new(
        dataset: CollocationDataset<'a>,
        passthrough_variables: &[String],
    ) -> Result<Self, CollocationError> {
        let grid = dataset.merged.grid();
        if dataset.lidar_ratio.grid() != grid {
            return Err(CollocationError::GridMismatch("lidar ratio"));
        }
        if dataset.mass_extinction.grid() != grid {
            return Err(CollocationError::GridMismatch("MEC"));
        }
        let (lr, mec) = (dataset.lidar_ratio, dataset.mass_extinction);
        if lr.wavelengths() != mec.wavelengths()
            || lr.relative_humidities() != mec.relative_humidities()
        {
            return Err(CollocationError::CoordinateMismatch);
        }

        let required = std::iter::once(dataset.humidity_variable)
            .chain(passthrough_variables.iter().map(String::as_str));
        for name in required {
            if !dataset.merged.contains(name) {
                return Err(CollocationError::MissingVariable(name.to_string()));
            }
        }

        Ok(Self {
            dataset,
            passthrough: passthrough_variables.to_vec(),
        })
    }

    pub fn collocate_station(
        &self,
        station: &StationRecord,
    ) -> Result<StationApriori, StationError> {
        let CollocationDataset {
            merged,
            lidar_ratio,
            mass_extinction,
            humidity_variable,
        } = self.dataset;

        let (row, col) = merged
            .grid()
            .nearest_cell(station.latitude, station.longitude)
            .ok_or(StationError::InvalidPosition {
                latitude: station.latitude,
                longitude: station.longitude,
            })?;

        let wavelength_index =
            lidar_ratio
                .wavelength_index(station.wavelength)
                .ok_or_else(|| StationError::WavelengthNotInField {
                    wavelength: station.wavelength,
                    available: lidar_ratio.wavelengths().to_vec(),
                })?;

        let humidity = merged
            .value_at(humidity_variable, row, col)
            .filter(|rh| rh.is_finite())
            .ok_or(StationError::NoHumidity { row, col })?;
        let rh_index = lidar_ratio
            .humidity_index(humidity)
            .ok_or(StationError::NoHumidity { row, col })?;

        // nearest_cell and the index lookups above keep these in bounds
        let lr = lidar_ratio
            .value(wavelength_index, rh_index, row, col)
            .unwrap_or(f64::NAN);
        let mec = mass_extinction
            .value(wavelength_index, rh_index, row, col)
            .unwrap_or(f64::NAN);

        let data = self
            .passthrough
            .iter()
            .map(|name| {
                let value = merged.value_at(name, row, col).unwrap_or(f64::NAN);
                (name.clone(), round_to(value, DATA_DECIMALS))
            })
            .collect();

        debug!(
            station = %station.id(),
            row,
            col,
            humidity,
            rh = lidar_ratio.relative_humidities()[rh_index],
            "collocated station"
        );

        Ok(StationApriori {
            data,
            lr: round_to(lr, APRIORI_DECIMALS),
            mec: round_to(mec, APRIORI_DECIMALS),
        })
    }

    /// Collocates every station; failures are recorded and skipped.
    pub fn collocate(&self, stations: &StationCatalog, date: NaiveDate) -> CollocationResult {
        let mut records = BTreeMap::new();
        let mut failures = Vec::new();

        for (id, station) in stations.iter() {
            match self.collocate_station(station) {
                Ok(apriori) => {
                    records.insert(id.to_string(), apriori);
                }
                Err(error) => {
                    warn!(station = id, %error, "skipping station");
                    failures.push(StationFailure {
                        station: id.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            collocated = records.len(),
            failed = failures.len(),
            "station collocation done"
        );
        CollocationResult::new(records, failures, date)
    }
}

/// Matches every station against the dataset.
///
/// Per-station problems end up in [`CollocationResult::failures`]; only an
/// inconsistent dataset is an error.
pub fn collocate(
    dataset: CollocationDataset<'_>,
    stations: &StationCatalog,
    passthrough_variables: &[String],
    date: NaiveDate,
) -> Result<CollocationResult, CollocationError> {
    Ok(Collocator::new(dataset, passthrough_variables)?.collocate(stations, date))
}
