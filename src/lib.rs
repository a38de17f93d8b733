//! Bulk aerosol optical properties (lidar ratio, mass extinction coefficient)
//! from IFS speciated AOD, collocated with ground-based lidar/ceilometer
//! stations as retrieval a-priori.

pub mod aerosol;
pub mod collocation;
pub mod config;
pub mod grid;
pub mod lut;
pub mod nearest;
pub mod readers;
pub mod runner;
pub mod sources;
pub mod utils;
pub mod writers;
