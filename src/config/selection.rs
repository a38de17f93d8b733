use serde::Deserialize;
use std::fmt;

/// How to reduce one extra dimension (time, pressure level) of a gridded
/// variable to a single 2-D slice.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DimSelection {
    /// Position along the dimension, in file order.
    #[serde(rename = "index")]
    Index(usize),
    /// Last position in file order, e.g. the lowest pressure level.
    #[serde(rename = "last")]
    Last,
    /// Mean over the dimension, ignoring missing values.
    #[serde(rename = "mean")]
    Mean,
    /// Mean over the time steps falling on the evaluation date. Positions are
    /// decoded with the dimension's CF `units`.
    #[serde(rename = "day")]
    Day,
}

impl DimSelection {
    /// Whether several remaining positions are averaged.
    pub fn averages(&self) -> bool {
        matches!(self, DimSelection::Mean | DimSelection::Day)
    }
}

/// Storage system substituted for `{store}` in source directories.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Store {
    #[serde(rename = "storeA")]
    #[value(name = "storeA")]
    StoreA,
    #[default]
    #[serde(rename = "storeB")]
    #[value(name = "storeB")]
    StoreB,
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Store::StoreA => write!(f, "storeA"),
            Store::StoreB => write!(f, "storeB"),
        }
    }
}
