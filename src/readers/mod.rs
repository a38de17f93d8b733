pub mod json;
#[cfg(feature = "gdal")]
pub mod nc;
mod slices;
pub mod stations;
mod time_units;
pub mod types;
pub mod utils;

pub use json::JsonReader;
#[cfg(feature = "gdal")]
pub use nc::NcReader;
pub use stations::{profile_directory, profile_files, read_station_catalog};
#[cfg(feature = "gdal")]
pub use stations::read_station_profiles;
pub use types::{FieldReader, FieldRequest, FileError, FileType, ReadError};
pub use utils::reader_from_filetype;

use crate::grid::GriddedField;
use crate::sources::ResolvedSource;
use std::path::Path;
use thiserror::Error;

pub fn create_reader(file_name: &Path) -> Result<Box<dyn FieldReader>, FileError> {
    let file_name = file_name.to_path_buf();
    match reader_from_filetype(&file_name) {
        #[cfg(feature = "gdal")]
        Ok(FileType::NetCDF) => Ok(Box::new(NcReader { file_name })),
        #[cfg(not(feature = "gdal"))]
        Ok(FileType::NetCDF) => Err(FileError::Unsupported(FileType::NetCDF)),
        Ok(FileType::Json) => Ok(Box::new(JsonReader { file_name })),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Error)]
pub enum SourceReadError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Reads the given field variables from a resolved source, translating
/// between file and field variable names.
pub fn read_source(
    resolved: &ResolvedSource,
    variables: &[String],
) -> Result<GriddedField, SourceReadError> {
    let source = &resolved.source;
    let request = FieldRequest {
        variables: variables
            .iter()
            .map(|v| source.file_variable(v).to_string())
            .collect(),
        dimensions: source.dimensions.clone(),
        date: Some(resolved.date),
    };

    let mut field = create_reader(&resolved.path)?.read_field(&request)?;
    for (from, to) in &source.rename {
        field.rename(from, to).map_err(ReadError::from)?;
    }
    Ok(field)
}
