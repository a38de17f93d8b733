use super::types::{FileError, FileType};
use std::path::Path;

pub fn reader_from_filetype(path: &Path) -> Result<FileType, FileError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("nc") => Ok(FileType::NetCDF),
        Some("json") => Ok(FileType::Json),
        _ => Err(FileError::UnknownFileType(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_from_filetype() {
        assert_eq!(reader_from_filetype(Path::new("a/od_20240301.nc")), Ok(FileType::NetCDF));
        assert_eq!(reader_from_filetype(Path::new("fixture.json")), Ok(FileType::Json));
        assert!(matches!(
            reader_from_filetype(Path::new("pp.tif")),
            Err(FileError::UnknownFileType(_))
        ));
    }
}
