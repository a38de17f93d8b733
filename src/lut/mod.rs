#[cfg(feature = "gdal")]
mod netcdf;
pub mod optical_table;

// Re-export the main structures for convenience
pub use optical_table::{
    HygroscopicClass, OpticalTable, Quantity, SpeciesColumn, TableError, TableSlot,
    read_species_columns,
};
