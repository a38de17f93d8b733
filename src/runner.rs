//! One evaluation date, end to end.

use crate::aerosol::{MixingError, SpeciesError, SpeciesSet, derive_bulk_property};
use crate::collocation::{CollocationDataset, CollocationError, StationCatalog, collocate};
use crate::config::{RunConfig, StationSource};
use crate::grid::{MergeError, merge};
use crate::lut::{OpticalTable, Quantity, TableError};
use crate::readers::{ReadError, SourceReadError, read_source, read_station_catalog};
use crate::sources::{NotFound, resolve_first};
use crate::utils::log_field_statistics;
use crate::writers::{WriteError, write_apriori};

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("optical table {path}: {source}")]
    Table { path: PathBuf, source: TableError },
    #[error(transparent)]
    Species(#[from] SpeciesError),
    #[error("{input} input: {source}")]
    Source { input: &'static str, source: NotFound },
    #[error("{input} input: {source}")]
    Read {
        input: &'static str,
        source: SourceReadError,
    },
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Mixing(#[from] MixingError),
    #[error("stations: {0}")]
    Stations(#[from] ReadError),
    #[error("station profiles need the gdal feature")]
    ProfilesUnsupported,
    #[error(transparent)]
    Collocation(#[from] CollocationError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// What a run read and wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub aod_file: PathBuf,
    pub humidity_file: PathBuf,
    pub field_files: Vec<PathBuf>,
    pub apriori_file: Option<PathBuf>,
    pub collocated: usize,
    pub failed: usize,
}

pub struct Runner<'a> {
    config: &'a RunConfig,
    date: NaiveDate,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a RunConfig, date: NaiveDate) -> Self {
        Self { config, date }
    }

    fn read_stations(&self, source: &StationSource) -> Result<StationCatalog, RunError> {
        match source {
            StationSource::Catalog(path) => Ok(read_station_catalog(path)?),
            #[cfg(feature = "gdal")]
            StationSource::Profiles(root) => {
                Ok(crate::readers::read_station_profiles(root, self.date))
            }
            #[cfg(not(feature = "gdal"))]
            StationSource::Profiles(_) => Err(RunError::ProfilesUnsupported),
        }
    }

    #[cfg(feature = "gdal")]
    fn write_fields(
        &self,
        fields: &[&crate::aerosol::BulkField],
        output: &Path,
    ) -> Result<Vec<PathBuf>, RunError> {
        fields
            .iter()
            .map(|field| Ok(crate::writers::write_bulk_field(field, output, self.date)?))
            .collect()
    }

    #[cfg(not(feature = "gdal"))]
    fn write_fields(
        &self,
        _fields: &[&crate::aerosol::BulkField],
        _output: &Path,
    ) -> Result<Vec<PathBuf>, RunError> {
        tracing::debug!("built without gdal, skipping field rasters");
        Ok(Vec::new())
    }

    pub fn run(&self) -> Result<RunSummary, RunError> {
        let config = self.config;
        info!(date = %self.date, store = %config.store(), "starting run");

        // Table and species first: a bad configuration fails before any data is read.
        let table = OpticalTable::load(config.optical_table(), config.species_columns())
            .map_err(|source| RunError::Table {
                path: config.optical_table().to_path_buf(),
                source,
            })?;
        let species = SpeciesSet::resolve(config.variables(), config.total_variable(), &table)?;
        info!(species = species.len(), "species resolved against optical table");

        let aod = resolve_first(&config.sources().aod, self.date, config.store())
            .map_err(|source| RunError::Source { input: "aod", source })?;
        let mut aod_variables = config.variables().to_vec();
        aod_variables.push(config.total_variable().to_string());
        let aod_field = read_source(&aod, &aod_variables)
            .map_err(|source| RunError::Read { input: "aod", source })?;

        let humidity = resolve_first(&config.sources().humidity, self.date, config.store())
            .map_err(|source| RunError::Source {
                input: "humidity",
                source,
            })?;
        let humidity_field = read_source(&humidity, &[config.humidity_variable().to_string()])
            .map_err(|source| RunError::Read {
                input: "humidity",
                source,
            })?;

        let merged = merge(&aod_field, &humidity_field)?;
        info!(shape = ?merged.grid().shape(), "merged humidity onto the aod grid");

        let derive = |quantity| {
            derive_bulk_property(
                &merged,
                &species,
                config.wavelengths(),
                config.relative_humidities(),
                &table,
                quantity,
            )
        };
        let lidar_ratio = derive(Quantity::LidarRatio)?;
        let mass_extinction = derive(Quantity::MassExtinctionCoefficient)?;
        for field in [&lidar_ratio, &mass_extinction] {
            if let Some((wavelength, rh, slice)) = field.slices().next() {
                let label = format!("{} {wavelength}nm {rh}%", field.quantity().short_name());
                log_field_statistics(&label, slice);
            }
        }

        let output = config.output_directory();
        let field_files = self.write_fields(&[&lidar_ratio, &mass_extinction], output)?;

        let mut summary = RunSummary {
            date: self.date,
            aod_file: aod.path,
            humidity_file: humidity.path,
            field_files,
            apriori_file: None,
            collocated: 0,
            failed: 0,
        };

        let Some(station_source) = config.stations() else {
            info!("no station source configured, skipping collocation");
            return Ok(summary);
        };
        let stations = self.read_stations(station_source)?;

        let dataset = CollocationDataset {
            merged: &merged,
            lidar_ratio: &lidar_ratio,
            mass_extinction: &mass_extinction,
            humidity_variable: config.humidity_variable(),
        };
        let result = collocate(dataset, &stations, &config.passthrough_variables(), self.date)?;

        summary.apriori_file = Some(write_apriori(&result, output, self.date)?);
        summary.collocated = result.stations().len();
        summary.failed = result.failures().len();
        Ok(summary)
    }
}
