use crate::config::DimSelection;
use crate::grid::{GridError, GriddedField};

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub trait FieldReader {
    /// Reads the requested variables, under their names in the file.
    fn read_field(&self, request: &FieldRequest) -> Result<GriddedField, ReadError>;
}

/// Variables to read and how to reduce their extra dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRequest {
    pub variables: Vec<String>,
    pub dimensions: BTreeMap<String, DimSelection>,
    /// Evaluation date for `day` selections.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path}: variable {variable} not found")]
    MissingVariable { path: PathBuf, variable: String },
    #[error("{path}: variable {variable} has {found} values, expected {expected}")]
    Shape {
        path: PathBuf,
        variable: String,
        found: usize,
        expected: usize,
    },
    #[error("{path}: {variable} has {bands} slices left after dimension selection")]
    AmbiguousSlices {
        path: PathBuf,
        variable: String,
        bands: usize,
    },
    #[error("{path}: {variable} has no position {index} along {dimension}")]
    Selection {
        path: PathBuf,
        variable: String,
        dimension: String,
        index: usize,
    },
    #[error("{path}: {variable} needs an evaluation date to select {dimension} by day")]
    NoDate {
        path: PathBuf,
        variable: String,
        dimension: String,
    },
    #[error("{path}: {variable} has no readable time units for {dimension}")]
    TimeUnits {
        path: PathBuf,
        variable: String,
        dimension: String,
    },
    #[error("{path}: {variable} has no {dimension} step on {date}")]
    NoStepsOnDate {
        path: PathBuf,
        variable: String,
        dimension: String,
        date: NaiveDate,
    },
    #[error("NetCDF error: {0}")]
    NetCDF(String),
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Debug, Error, PartialEq)]
pub enum FileError {
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),
    #[error("{0} files need the gdal feature")]
    Unsupported(FileType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    NetCDF,
    Json,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::NetCDF => write!(f, "NetCDF"),
            FileType::Json => write!(f, "JSON"),
        }
    }
}
