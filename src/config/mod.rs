use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::aerosol::{
    IFS_HUMIDITY_VARIABLE, IFS_SPECIES_VARIABLES, IFS_TOTAL_VARIABLE, RELATIVE_HUMIDITY_STEPS,
    species_code,
};
use crate::sources::DataSource;

pub mod error;
pub use error::ConfigError;

pub mod selection;
pub use selection::{DimSelection, Store};

const DEFAULT_WAVELENGTHS: [u32; 3] = [1064, 905, 532];
const DEFAULT_OUTPUT_DIRECTORY: &str = "./data/";

/// Ordered candidate files per input.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Sources {
    pub aod: Vec<DataSource>,
    pub humidity: Vec<DataSource>,
}

/// Where station descriptions come from.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum StationSource {
    /// JSON list of station records.
    #[serde(rename = "catalog")]
    Catalog(PathBuf),
    /// Root of a `YYYY/MM/DD` tree of L2 profile files.
    #[serde(rename = "profiles")]
    Profiles(PathBuf),
}

/// Settings of one run, loaded once and passed by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    variables: Vec<String>,
    total_variable: String,
    humidity_variable: String,
    wavelengths: Vec<u32>,
    relative_humidities: Vec<u32>,
    optical_table: PathBuf,
    species_columns: Option<PathBuf>,
    sources: Sources,
    stations: Option<StationSource>,
    output_directory: PathBuf,
    store: Store,
}

fn check_unique<T: Ord + Display>(list: &'static str, values: &[T]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(ConfigError::Duplicate {
                list,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

fn check_sources(list: &'static str, sources: &[DataSource]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Empty(list));
    }
    match sources.iter().find(|s| !s.filename.contains("YYYYMMDD")) {
        Some(source) => Err(ConfigError::MissingDatePlaceholder(source.name.clone())),
        None => Ok(()),
    }
}

// Deserializes a RunConfig, filling the model defaults and rejecting empty or
// invalid lists before anything is read.
impl<'de> Deserialize<'de> for RunConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RunConfigHelper {
            variables: Option<Vec<String>>,
            total_variable: Option<String>,
            humidity_variable: Option<String>,
            wavelengths: Option<Vec<u32>>,
            relative_humidities: Option<Vec<u32>>,
            optical_table: PathBuf,
            species_columns: Option<PathBuf>,
            sources: Sources,
            stations: Option<StationSource>,
            output_directory: Option<PathBuf>,
            #[serde(default)]
            store: Store,
        }

        let helper = RunConfigHelper::deserialize(deserializer)?;

        let variables = helper
            .variables
            .unwrap_or_else(|| IFS_SPECIES_VARIABLES.iter().map(|v| v.to_string()).collect());
        if variables.is_empty() {
            return Err(D::Error::custom(ConfigError::Empty("variables")));
        }
        for variable in &variables {
            species_code(variable)
                .map_err(|_| D::Error::custom(ConfigError::InvalidVariable(variable.clone())))?;
        }
        check_unique("variables", &variables).map_err(D::Error::custom)?;

        let wavelengths = helper.wavelengths.unwrap_or_else(|| DEFAULT_WAVELENGTHS.to_vec());
        if wavelengths.is_empty() {
            return Err(D::Error::custom(ConfigError::Empty("wavelengths")));
        }
        if wavelengths.contains(&0) {
            return Err(D::Error::custom(ConfigError::InvalidWavelength));
        }
        check_unique("wavelengths", &wavelengths).map_err(D::Error::custom)?;

        let relative_humidities = helper
            .relative_humidities
            .unwrap_or_else(|| RELATIVE_HUMIDITY_STEPS.to_vec());
        if relative_humidities.is_empty() {
            return Err(D::Error::custom(ConfigError::Empty("relative_humidities")));
        }
        if let Some(rh) = relative_humidities
            .iter()
            .find(|rh| !RELATIVE_HUMIDITY_STEPS.contains(rh))
        {
            return Err(D::Error::custom(ConfigError::InvalidRelativeHumidity(*rh)));
        }
        check_unique("relative_humidities", &relative_humidities).map_err(D::Error::custom)?;

        check_sources("sources.aod", &helper.sources.aod).map_err(D::Error::custom)?;
        check_sources("sources.humidity", &helper.sources.humidity).map_err(D::Error::custom)?;

        Ok(RunConfig {
            variables,
            total_variable: helper
                .total_variable
                .unwrap_or_else(|| IFS_TOTAL_VARIABLE.to_string()),
            humidity_variable: helper
                .humidity_variable
                .unwrap_or_else(|| IFS_HUMIDITY_VARIABLE.to_string()),
            wavelengths,
            relative_humidities,
            optical_table: helper.optical_table,
            species_columns: helper.species_columns,
            sources: helper.sources,
            stations: helper.stations,
            output_directory: helper
                .output_directory
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIRECTORY)),
            store: helper.store,
        })
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: RunConfig = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn with_store(mut self, store: Store) -> Self {
        self.store = store;
        self
    }

    pub fn with_output_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.output_directory = directory.into();
        self
    }

    pub fn without_stations(mut self) -> Self {
        self.stations = None;
        self
    }

    /// Species AOD variables, in summation order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn total_variable(&self) -> &str {
        &self.total_variable
    }

    pub fn humidity_variable(&self) -> &str {
        &self.humidity_variable
    }

    pub fn wavelengths(&self) -> &[u32] {
        &self.wavelengths
    }

    pub fn relative_humidities(&self) -> &[u32] {
        &self.relative_humidities
    }

    pub fn optical_table(&self) -> &Path {
        &self.optical_table
    }

    /// Species to table column mapping, kept apart from NetCDF tables.
    pub fn species_columns(&self) -> Option<&Path> {
        self.species_columns.as_deref()
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn stations(&self) -> Option<&StationSource> {
        self.stations.as_ref()
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn store(&self) -> Store {
        self.store
    }

    /// Model variables reported per station: the species, then humidity.
    pub fn passthrough_variables(&self) -> Vec<String> {
        self.variables
            .iter()
            .cloned()
            .chain(std::iter::once(self.humidity_variable.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
    {
        "optical_table": "./data/config/aerosol_ifs_49R1_20230725.nc",
        "sources": {
            "aod": [{
                "name": "00utc",
                "directory": "/lustre/{store}/cifs",
                "filename": "od_YYYYMMDD_00.nc"
            }],
            "humidity": [{
                "name": "rh",
                "directory": "/lustre/{store}/nc",
                "filename": "rh_YYYYMMDD.nc",
                "day_offset": -1,
                "rename": {"r": "relative_humidity_pl"},
                "dimensions": {"time": "day", "pressure": "last"}
            }]
        }
    }
    "#;

    fn parse(json: &str) -> Result<RunConfig, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.json");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = RunConfig::from_file(file_path).unwrap();

        assert_eq!(config.variables().len(), 7);
        assert_eq!(config.total_variable(), "aod550");
        assert_eq!(config.wavelengths(), &[1064, 905, 532]);
        assert_eq!(config.relative_humidities().len(), 11);
        assert_eq!(config.store(), Store::StoreB);
        assert_eq!(config.stations(), None);
        assert_eq!(config.species_columns(), None);

        let humidity = &config.sources().humidity[0];
        assert_eq!(humidity.day_offset, -1);
        assert_eq!(humidity.dimensions["time"], DimSelection::Day);
        assert_eq!(humidity.dimensions["pressure"], DimSelection::Last);
        assert_eq!(humidity.rename["r"], "relative_humidity_pl");
    }

    #[test]
    fn test_overrides() {
        let json = MINIMAL.replacen(
            "{",
            r#"{
                "variables": ["duaod550", "ssaod550"],
                "wavelengths": [532],
                "relative_humidities": [0, 50],
                "stations": {"catalog": "stations.json"},
                "store": "storeA",
                "species_columns": "species_column.json","#,
            1,
        );
        let config = parse(&json)
            .unwrap()
            .with_output_directory("/tmp/out")
            .with_store(Store::StoreB);

        assert_eq!(config.variables(), &["duaod550", "ssaod550"]);
        assert_eq!(
            config.passthrough_variables(),
            ["duaod550", "ssaod550", "relative_humidity_pl"]
        );
        assert_eq!(config.relative_humidities(), &[0, 50]);
        assert_eq!(config.species_columns(), Some(Path::new("species_column.json")));
        assert_eq!(config.stations(), Some(&StationSource::Catalog("stations.json".into())));
        assert_eq!(config.output_directory(), Path::new("/tmp/out"));
        assert_eq!(config.store(), Store::StoreB);
        assert_eq!(config.without_stations().stations(), None);
    }

    #[test]
    fn test_rejects_invalid_lists() {
        let with = |field: &str| MINIMAL.replacen("{", &format!("{{ {field},"), 1);

        for (field, message) in [
            (r#""variables": []"#, "variables must not be empty"),
            (r#""wavelengths": []"#, "wavelengths must not be empty"),
            (r#""relative_humidities": [0, 45]"#, "relative humidity 45"),
            (r#""relative_humidities": [10, 10]"#, "contains 10 twice"),
            (r#""variables": ["DU"]"#, "variable DU"),
            (r#""wavelengths": [532, 0]"#, "positive number"),
        ] {
            let err = parse(&with(field)).unwrap_err();
            assert!(err.to_string().contains(message), "{field}: {err}");
        }
    }

    #[test]
    fn test_rejects_bad_sources() {
        let json = MINIMAL.replace("od_YYYYMMDD_00.nc", "od_latest.nc");
        let err = parse(&json).unwrap_err();
        assert!(err.to_string().contains("source 00utc"), "{err}");

        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        value["sources"]["aod"] = serde_json::json!([]);
        let err = serde_json::from_value::<RunConfig>(value).unwrap_err();
        assert!(err.to_string().contains("sources.aod must not be empty"), "{err}");
    }
}
