use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// An observing instrument, as described by its L2 profile attributes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationRecord {
    #[serde(rename = "wigos_station_id")]
    pub wigos_id: String,
    pub instrument_id: String,
    #[serde(rename = "station_latitude")]
    pub latitude: f64,
    #[serde(rename = "station_longitude")]
    pub longitude: f64,
    /// Nominal wavelength in nm.
    #[serde(rename = "l0_wavelength", deserialize_with = "truncated_wavelength")]
    pub wavelength: u32,
}

// Profiles store the wavelength as a float (e.g. 1064.0); only the integer
// part is meaningful.
fn truncated_wavelength<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "invalid l0_wavelength: {value}"
        )));
    }
    Ok(value.trunc() as u32)
}

impl StationRecord {
    pub fn new(
        wigos_id: impl Into<String>,
        instrument_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        wavelength: u32,
    ) -> Self {
        Self {
            wigos_id: wigos_id.into(),
            instrument_id: instrument_id.into(),
            latitude,
            longitude,
            wavelength,
        }
    }

    /// `{wigos_id}-{instrument_id}`
    pub fn id(&self) -> String {
        format!("{}-{}", self.wigos_id, self.instrument_id)
    }
}

impl fmt::Display for StationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.3}, {:.3}) at {} nm",
            self.id(),
            self.latitude,
            self.longitude,
            self.wavelength
        )
    }
}

/// Stations keyed and ordered by identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationCatalog {
    stations: BTreeMap<String, StationRecord>,
}

impl StationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a station; a later record with the same identifier replaces the
    /// earlier one.
    pub fn insert(&mut self, station: StationRecord) {
        let id = station.id();
        if let Some(previous) = self.stations.insert(id.clone(), station) {
            warn!(station = %id, replaced = %previous, "duplicate station identifier");
        }
    }

    pub fn get(&self, id: &str) -> Option<&StationRecord> {
        self.stations.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StationRecord)> {
        self.stations.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl FromIterator<StationRecord> for StationCatalog {
    fn from_iter<I: IntoIterator<Item = StationRecord>>(iter: I) -> Self {
        let mut catalog = StationCatalog::new();
        for station in iter {
            catalog.insert(station);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_profile_attributes() {
        let json = r#"{
            "wigos_station_id": "0-20000-0-06348",
            "instrument_id": "A",
            "station_latitude": 51.97,
            "station_longitude": 4.93,
            "l0_wavelength": 1064.0
        }"#;
        let station: StationRecord = serde_json::from_str(json).unwrap();

        assert_eq!(station.id(), "0-20000-0-06348-A");
        assert_eq!(station.wavelength, 1064);
        assert_eq!(station.latitude, 51.97);
    }

    #[test]
    fn test_wavelength_is_truncated_and_validated() {
        let json = |wl: &str| {
            format!(
                r#"{{"wigos_station_id": "w", "instrument_id": "i", "station_latitude": 0.0,
                    "station_longitude": 0.0, "l0_wavelength": {wl}}}"#
            )
        };
        let station: StationRecord = serde_json::from_str(&json("905.7")).unwrap();
        assert_eq!(station.wavelength, 905);
        assert!(serde_json::from_str::<StationRecord>(&json("-1.0")).is_err());
    }

    #[test]
    fn test_catalog_is_ordered_by_id() {
        let catalog: StationCatalog = [
            StationRecord::new("0-2", "B", 0.0, 0.0, 1064),
            StationRecord::new("0-1", "A", 0.0, 0.0, 905),
            StationRecord::new("0-2", "A", 0.0, 0.0, 532),
        ]
        .into_iter()
        .collect();

        let ids: Vec<&str> = catalog.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["0-1-A", "0-2-A", "0-2-B"]);
    }

    #[test]
    fn test_catalog_duplicate_replaces() {
        let catalog: StationCatalog = [
            StationRecord::new("0-1", "A", 0.0, 0.0, 905),
            StationRecord::new("0-1", "A", 1.0, 1.0, 1064),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("0-1-A").map(|s| s.wavelength), Some(1064));
    }
}
