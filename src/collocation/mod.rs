//! Station collocation
//!
//! Matches observing stations to the nearest grid cell of the derived bulk
//! fields, at the station's wavelength and the model humidity of that cell.

pub mod collocator;
pub mod result;
pub mod station;

pub use collocator::{CollocationDataset, CollocationError, Collocator, collocate};
pub use result::{
    Attributes, CollocationResult, DefaultApriori, StationApriori, StationError, StationFailure,
};
pub use station::{StationCatalog, StationRecord};
