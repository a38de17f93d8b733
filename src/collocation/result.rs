use crate::aerosol::DEFAULT_LIDAR_RATIO;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why one station has no a-priori record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StationError {
    #[error("station position ({latitude}, {longitude}) is not a valid coordinate")]
    InvalidPosition { latitude: f64, longitude: f64 },
    #[error("wavelength {wavelength} nm is not in the field (available: {available:?})")]
    WavelengthNotInField { wavelength: u32, available: Vec<u32> },
    #[error("no relative humidity at the nearest cell ({row}, {col})")]
    NoHumidity { row: usize, col: usize },
}

/// Collocated model values for one station.
///
/// Non-finite values are kept in memory and serialize as `null`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StationApriori {
    pub data: BTreeMap<String, f64>,
    pub lr: f64,
    pub mec: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationFailure {
    pub station: String,
    pub error: StationError,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DefaultApriori {
    pub lr: u32,
    pub mec: Option<f64>,
}

/// Fallback record for consumers without a station match.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Attributes {
    pub default: DefaultApriori,
    pub date: NaiveDate,
}

impl Attributes {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            default: DefaultApriori {
                lr: DEFAULT_LIDAR_RATIO,
                mec: None,
            },
            date,
        }
    }
}

/// Per-station a-priori values of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct CollocationResult {
    stations: BTreeMap<String, StationApriori>,
    failures: Vec<StationFailure>,
    attributes: Attributes,
}

impl CollocationResult {
    pub(crate) fn new(
        stations: BTreeMap<String, StationApriori>,
        failures: Vec<StationFailure>,
        date: NaiveDate,
    ) -> Self {
        Self {
            stations,
            failures,
            attributes: Attributes::new(date),
        }
    }

    pub fn stations(&self) -> &BTreeMap<String, StationApriori> {
        &self.stations
    }

    pub fn station(&self, id: &str) -> Option<&StationApriori> {
        self.stations.get(id)
    }

    pub fn failures(&self) -> &[StationFailure] {
        &self.failures
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

// Stations first, then the `attributes` entry, all in one flat object.
impl Serialize for CollocationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.stations.len() + 1))?;
        for (id, apriori) in &self.stations {
            map.serialize_entry(id, apriori)?;
        }
        map.serialize_entry("attributes", &self.attributes)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let stations = BTreeMap::from([(
            "0-1-A".to_string(),
            StationApriori {
                data: BTreeMap::from([
                    ("aod550".to_string(), 0.1234),
                    ("duaod550".to_string(), f64::NAN),
                ]),
                lr: 48.0,
                mec: 3.21,
            },
        )]);
        let result = CollocationResult::new(stations, Vec::new(), date);

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"0-1-A":{"data":{"aod550":0.1234,"duaod550":null},"lr":48.0,"mec":3.21},"#,
                r#""attributes":{"default":{"lr":50,"mec":null},"date":"2024-03-05"}}"#,
            )
        );
    }

    #[test]
    fn test_attributes_come_last() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let apriori = StationApriori {
            data: BTreeMap::new(),
            lr: 1.0,
            mec: 1.0,
        };
        let stations = BTreeMap::from([
            ("b".to_string(), apriori.clone()),
            ("zz".to_string(), apriori),
        ]);
        let result = CollocationResult::new(stations, Vec::new(), date);
        let json = serde_json::to_string(&result).unwrap();

        let b = json.find("\"b\"").unwrap();
        let zz = json.find("\"zz\"").unwrap();
        let attributes = json.find("\"attributes\"").unwrap();
        assert!(b < zz && zz < attributes);
    }
}
