//! Bulk optical properties from speciated aerosol optical depth
//!
//! The model AOD is split into per-species fractions of the total AOD. Each
//! fraction is weighted by the species' tabulated optical property and the
//! weighted fractions are summed:
//!
//! ```text
//! bulk(λ, rh) = Σ_s  AOD_s / AOD_total · coefficient_s(λ, rh)
//! ```
//!
//! 1. **Fractions**: `AOD_s / AOD_total` per cell. A zero total gives NaN.
//! 2. **Coefficient**: nearest table wavelength; hydrophilic species also use
//!    the nearest table humidity, hydrophobic species have no humidity axis.
//! 3. **Units**: the coefficient is scaled by [`Quantity::output_scale`]
//!    (MEC tables are in m2 kg-1, the output in m2 g-1).
//! 4. **Sum**: contributions are added in species-set order, so identical
//!    inputs give bit-identical fields.
//!
//! Since the fractions sum to one wherever the total is positive, the sum is
//! already a fraction-weighted mixture.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use aer_ifs::aerosol::{SpeciesSet, derive_bulk_property};
//! use aer_ifs::grid::GriddedField;
//! use aer_ifs::lut::{OpticalTable, Quantity};
//! use std::path::Path;
//!
//! # fn run(merged: &GriddedField) -> Result<(), Box<dyn std::error::Error>> {
//! let table = OpticalTable::load(
//!     Path::new("./data/config/aerosol_ifs_49R1_20230725.nc"),
//!     Some(Path::new("./data/config/species_column.json")),
//! )?;
//! let variables = vec!["duaod550".to_string(), "ssaod550".to_string()];
//! let species = SpeciesSet::resolve(&variables, "aod550", &table)?;
//!
//! let lr = derive_bulk_property(
//!     merged,
//!     &species,
//!     &[532, 1064],
//!     &[0, 50, 90],
//!     &table,
//!     Quantity::LidarRatio,
//! )?;
//! println!("{} slices", lr.wavelengths().len() * lr.relative_humidities().len());
//! # Ok(())
//! # }
//! ```

use super::species::SpeciesSet;
use crate::grid::{Grid, GriddedField};
use crate::lut::{OpticalTable, Quantity, TableError};

use ndarray::{Array2, Array4, ArrayView2, Zip, s};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MixingError {
    #[error("variable {0} is missing from the merged field")]
    MissingVariable(String),
    #[error("no wavelengths requested")]
    NoWavelengths,
    #[error("no relative humidities requested")]
    NoRelativeHumidities,
    #[error(transparent)]
    Table(#[from] TableError),
}

/// A bulk property on (wavelength, relative humidity, latitude, longitude).
#[derive(Debug, Clone, PartialEq)]
pub struct BulkField {
    quantity: Quantity,
    grid: Grid,
    wavelengths: Vec<u32>,
    relative_humidities: Vec<u32>,
    values: Array4<f64>,
}

impl BulkField {
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Wavelength coordinates in nm.
    pub fn wavelengths(&self) -> &[u32] {
        &self.wavelengths
    }

    /// Relative humidity coordinates in %.
    pub fn relative_humidities(&self) -> &[u32] {
        &self.relative_humidities
    }

    pub fn values(&self) -> &Array4<f64> {
        &self.values
    }

    /// Position of a wavelength coordinate; exact match only.
    pub fn wavelength_index(&self, wavelength_nm: u32) -> Option<usize> {
        self.wavelengths.iter().position(|&w| w == wavelength_nm)
    }

    /// Nearest relative humidity coordinate, ties to the lower index.
    pub fn humidity_index(&self, relative_humidity: f64) -> Option<usize> {
        let axis: Vec<f64> = self.relative_humidities.iter().map(|&rh| rh as f64).collect();
        crate::nearest::nearest_index(&axis, relative_humidity)
    }

    /// The latitude × longitude slice at one (wavelength, rh) index pair.
    pub fn slice(&self, wavelength_index: usize, rh_index: usize) -> ArrayView2<'_, f64> {
        self.values.slice(s![wavelength_index, rh_index, .., ..])
    }

    pub fn value(
        &self,
        wavelength_index: usize,
        rh_index: usize,
        row: usize,
        col: usize,
    ) -> Option<f64> {
        self.values
            .get((wavelength_index, rh_index, row, col))
            .copied()
    }

    /// Slices in storage order, with their coordinates.
    pub fn slices(&self) -> impl Iterator<Item = (u32, u32, ArrayView2<'_, f64>)> {
        self.wavelengths.iter().enumerate().flat_map(move |(wi, &wl)| {
            self.relative_humidities
                .iter()
                .enumerate()
                .map(move |(ri, &rh)| (wl, rh, self.slice(wi, ri)))
        })
    }
}

fn variable<'a>(field: &'a GriddedField, name: &str) -> Result<&'a Array2<f64>, MixingError> {
    field
        .variable(name)
        .ok_or_else(|| MixingError::MissingVariable(name.to_string()))
}

/// Per-species share of the total AOD, in species-set order.
///
/// Cells with a zero total are NaN for every species.
pub fn species_fractions(
    field: &GriddedField,
    species: &SpeciesSet,
) -> Result<Vec<Array2<f64>>, MixingError> {
    let total = variable(field, species.total_variable())?;

    let zero_cells = total.iter().filter(|&&t| t == 0.0).count();
    if zero_cells > 0 {
        warn!(
            cells = zero_cells,
            variable = species.total_variable(),
            "total AOD is zero, species fractions set to NaN"
        );
    }

    species
        .iter()
        .map(|record| {
            let aod = variable(field, record.variable())?;
            Ok(Zip::from(aod)
                .and(total)
                .map_collect(|&a, &t| if t == 0.0 { f64::NAN } else { a / t }))
        })
        .collect()
}

/// Derives one bulk property for every requested (wavelength, rh) pair.
pub fn derive_bulk_property(
    merged: &GriddedField,
    species: &SpeciesSet,
    wavelengths: &[u32],
    relative_humidities: &[u32],
    table: &OpticalTable,
    quantity: Quantity,
) -> Result<BulkField, MixingError> {
    if wavelengths.is_empty() {
        return Err(MixingError::NoWavelengths);
    }
    if relative_humidities.is_empty() {
        return Err(MixingError::NoRelativeHumidities);
    }

    let fractions = species_fractions(merged, species)?;
    let (n_lat, n_lon) = merged.grid().shape();
    let shape = (wavelengths.len(), relative_humidities.len(), n_lat, n_lon);
    let mut values = Array4::<f64>::zeros(shape);

    for (wi, &wavelength) in wavelengths.iter().enumerate() {
        for (ri, &rh) in relative_humidities.iter().enumerate() {
            let mut bulk = values.slice_mut(s![wi, ri, .., ..]);
            for (record, fraction) in species.iter().zip(&fractions) {
                let coefficient = table.lookup(
                    quantity,
                    record.table_column(),
                    wavelength as f64,
                    rh as f64,
                )? * quantity.output_scale();
                bulk.scaled_add(coefficient, fraction);
            }
            debug!(%quantity, wavelength, rh, "bulk slice assembled");
        }
    }

    Ok(BulkField {
        quantity,
        grid: merged.grid().clone(),
        wavelengths: wavelengths.to_vec(),
        relative_humidities: relative_humidities.to_vec(),
        values,
    })
}
