use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{list} contains {value} twice")]
    Duplicate { list: &'static str, value: String },
    #[error("variable {0} does not start with a two-letter species code")]
    InvalidVariable(String),
    #[error("wavelength must be a positive number of nm")]
    InvalidWavelength,
    #[error("relative humidity {0} should be one of 0, 10, 20, ..., 100")]
    InvalidRelativeHumidity(u32),
    #[error("source {0}: filename must contain YYYYMMDD")]
    MissingDatePlaceholder(String),
}
