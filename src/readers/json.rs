use super::slices::{Slice, reduce_slices};
use super::types::{FieldReader, FieldRequest, ReadError};
use crate::grid::GriddedField;

use ndarray::Array2;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Gridded fields stored as JSON, rows along latitude.
///
/// ```json
/// {
///   "latitude": [52.0, 51.0],
///   "longitude": [-1.0, 0.0, 1.0],
///   "variables": {
///     "aod550": [[0.1, 0.2, 0.3], [0.2, 0.3, 0.4]],
///     "r": {"slices": [{"coords": {"time": "0"}, "values": [[...], [...]]}]}
///   },
///   "units": {"time": "hours since 2024-03-01 00:00:00"}
/// }
/// ```
pub struct JsonReader {
    pub file_name: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FieldDocument {
    latitude: Vec<f64>,
    longitude: Vec<f64>,
    variables: BTreeMap<String, VariableDocument>,
    /// CF units of the slice dimensions.
    #[serde(default)]
    units: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VariableDocument {
    Plain(Vec<Vec<Option<f64>>>),
    Sliced { slices: Vec<SliceDocument> },
}

#[derive(Debug, Deserialize)]
struct SliceDocument {
    #[serde(default)]
    coords: BTreeMap<String, String>,
    values: Vec<Vec<Option<f64>>>,
}

impl JsonReader {
    // null marks a missing value
    fn to_array(
        &self,
        variable: &str,
        rows: Vec<Vec<Option<f64>>>,
        shape: (usize, usize),
    ) -> Result<Array2<f64>, ReadError> {
        let found = rows.iter().map(Vec::len).sum::<usize>();
        if rows.len() != shape.0 || rows.iter().any(|r| r.len() != shape.1) {
            return Err(ReadError::Shape {
                path: self.file_name.clone(),
                variable: variable.to_string(),
                found,
                expected: shape.0 * shape.1,
            });
        }
        let flat: Vec<f64> = rows
            .into_iter()
            .flatten()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        Array2::from_shape_vec(shape, flat).map_err(|_| ReadError::Shape {
            path: self.file_name.clone(),
            variable: variable.to_string(),
            found,
            expected: shape.0 * shape.1,
        })
    }

    fn open(&self) -> Result<FieldDocument, ReadError> {
        let file = File::open(&self.file_name).map_err(|source| ReadError::Io {
            path: self.file_name.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ReadError::Json {
            path: self.file_name.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_name
    }
}

impl FieldReader for JsonReader {
    fn read_field(&self, request: &FieldRequest) -> Result<GriddedField, ReadError> {
        let mut document = self.open()?;
        let shape = (document.latitude.len(), document.longitude.len());

        let mut variables = Vec::with_capacity(request.variables.len());
        for name in &request.variables {
            let entry = document
                .variables
                .remove(name)
                .ok_or_else(|| ReadError::MissingVariable {
                    path: self.file_name.clone(),
                    variable: name.clone(),
                })?;

            let values = match entry {
                VariableDocument::Plain(rows) => self.to_array(name, rows, shape)?,
                VariableDocument::Sliced { slices } => {
                    let slices = slices
                        .into_iter()
                        .map(|s| {
                            Ok(Slice {
                                coords: s.coords,
                                values: self.to_array(name, s.values, shape)?,
                            })
                        })
                        .collect::<Result<Vec<_>, ReadError>>()?;
                    reduce_slices(&self.file_name, name, slices, request, &document.units)?
                }
            };
            variables.push((name.clone(), values));
        }

        Ok(GriddedField::from_unsorted_longitude(
            document.latitude,
            document.longitude,
            variables,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DimSelection;
    use ndarray::array;
    use std::io::Write;
    use tempfile::tempdir;

    const DOCUMENT: &str = r#"
    {
        "latitude": [52.0, 51.0],
        "longitude": [-1.0, 0.0],
        "variables": {
            "aod550": [[0.1, 0.2], [null, 0.4]],
            "r": {"slices": [
                {"coords": {"time": "0"}, "values": [[10, 20], [30, 40]]},
                {"coords": {"time": "12"}, "values": [[30, 40], [50, 60]]}
            ]}
        }
    }
    "#;

    fn reader(contents: &str) -> (tempfile::TempDir, JsonReader) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("field.json");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, JsonReader { file_name: file_path })
    }

    fn request(variables: &[&str]) -> FieldRequest {
        FieldRequest {
            variables: variables.iter().map(|s| s.to_string()).collect(),
            dimensions: BTreeMap::from([("time".to_string(), DimSelection::Mean)]),
            date: None,
        }
    }

    #[test]
    fn test_read_field_wraps_longitude() {
        let (_dir, reader) = reader(DOCUMENT);
        let field = reader.read_field(&request(&["aod550", "r"])).unwrap();

        assert_eq!(field.grid().longitude(), &[0.0, 359.0]);
        let aod = field.variable("aod550").unwrap();
        assert_eq!(aod[[0, 0]], 0.2);
        assert!(aod[[1, 1]].is_nan());
        assert_eq!(field.variable("r").unwrap(), &array![[30.0, 20.0], [50.0, 40.0]]);
    }

    #[test]
    fn test_missing_variable_and_bad_shape() {
        let (_dir, reader_a) = reader(DOCUMENT);
        assert!(matches!(
            reader_a.read_field(&request(&["duaod550"])),
            Err(ReadError::MissingVariable { variable, .. }) if variable == "duaod550"
        ));

        let (_dir, reader_b) = reader(&DOCUMENT.replace("[null, 0.4]", "[0.4]"));
        assert!(matches!(
            reader_b.read_field(&request(&["aod550"])),
            Err(ReadError::Shape { found: 3, expected: 4, .. })
        ));
    }
}
