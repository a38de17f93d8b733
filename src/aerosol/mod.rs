//! Aerosol species mixing
//!
//! This module turns per-species aerosol optical depth into bulk lidar ratio
//! and mass extinction coefficient fields, using the optical property table.

pub mod constants;
pub mod mixing;
pub mod species;

pub use constants::*;
pub use mixing::*;
pub use species::*;
