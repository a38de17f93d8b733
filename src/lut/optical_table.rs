use crate::aerosol::constants::MEC_UNIT_SCALE;
use crate::nearest::nearest_index;
use crate::readers::{FileError, FileType, reader_from_filetype};

use ndarray::{Array2, Array3};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stored wavelengths are in meters.
pub const WAVELENGTH_SCALE: f64 = 1e9;
/// Stored relative humidities become percent after this factor.
pub const RELATIVE_HUMIDITY_SCALE: f64 = 1e4;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse optical table: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    File(#[from] FileError),
    #[error("NetCDF error: {0}")]
    NetCDF(String),
    #[error("{0} carries no species columns; set species_columns")]
    SpeciesColumnsRequired(PathBuf),
    #[error("{0} axis is empty or contains non-finite values")]
    InvalidAxis(&'static str),
    #[error("{array} has shape {found}, expected {expected}")]
    Shape {
        array: &'static str,
        found: String,
        expected: String,
    },
    #[error("species {species} uses column {column}, but the {class} tables have {available}")]
    ColumnOutOfRange {
        species: String,
        class: HygroscopicClass,
        column: usize,
        available: usize,
    },
    #[error("species {0} has column 0; columns are numbered from 1")]
    ZeroColumn(String),
    #[error("no table entry for {class} species at wavelength {wavelength} nm")]
    NoEntry {
        class: HygroscopicClass,
        wavelength: f64,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum HygroscopicClass {
    #[serde(rename = "hydrophilic")]
    Hydrophilic,
    #[serde(rename = "hydrophobic")]
    Hydrophobic,
}

impl fmt::Display for HygroscopicClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HygroscopicClass::Hydrophilic => write!(f, "hydrophilic"),
            HygroscopicClass::Hydrophobic => write!(f, "hydrophobic"),
        }
    }
}

/// The bulk optical property a table array holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    LidarRatio,
    MassExtinctionCoefficient,
}

impl Quantity {
    pub fn short_name(&self) -> &'static str {
        match self {
            Quantity::LidarRatio => "lr",
            Quantity::MassExtinctionCoefficient => "mec",
        }
    }

    /// Units of the gridded output, after [`Quantity::output_scale`].
    pub fn units(&self) -> &'static str {
        match self {
            Quantity::LidarRatio => "sr",
            Quantity::MassExtinctionCoefficient => "m2 g-1",
        }
    }

    /// Factor from table units to gridded output units.
    pub fn output_scale(&self) -> f64 {
        match self {
            Quantity::LidarRatio => 1.0,
            Quantity::MassExtinctionCoefficient => MEC_UNIT_SCALE,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::LidarRatio => write!(f, "Lidar Ratio"),
            Quantity::MassExtinctionCoefficient => write!(f, "MEC"),
        }
    }
}

/// Where a species lives in the table. `column` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeciesColumn {
    pub class: HygroscopicClass,
    pub column: usize,
}

/// Resolved non-wavelength index into one class of arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSlot {
    Hydrophilic { rh_index: usize },
    Hydrophobic,
}

#[derive(Debug, Clone)]
struct ClassArrays<A> {
    lidar_ratio: A,
    mass_extinction: A,
}

impl<A> ClassArrays<A> {
    fn get(&self, quantity: Quantity) -> &A {
        match quantity {
            Quantity::LidarRatio => &self.lidar_ratio,
            Quantity::MassExtinctionCoefficient => &self.mass_extinction,
        }
    }
}

/// On-disk layout: raw axes and `[column][rh][wavelength]` /
/// `[column][wavelength]` nested arrays.
#[derive(Debug, Deserialize)]
struct OpticalTableDocument {
    wavelength: Vec<f64>,
    relative_humidity: Vec<f64>,
    lidar_ratio_hydrophilic: Vec<Vec<Vec<f64>>>,
    lidar_ratio_hydrophobic: Vec<Vec<f64>>,
    mass_ext_hydrophilic: Vec<Vec<Vec<f64>>>,
    mass_ext_hydrophobic: Vec<Vec<f64>>,
    #[serde(default)]
    species: BTreeMap<String, SpeciesEntry>,
}

#[derive(Debug, Deserialize)]
struct SpeciesEntry {
    #[serde(rename = "type")]
    class: HygroscopicClass,
    column: usize,
}

/// Per-species lidar ratio and mass extinction coefficients.
///
/// Axes are normalized on load: wavelengths in nm, relative humidity in
/// percent. Immutable once built.
#[derive(Debug, Clone)]
pub struct OpticalTable {
    wavelengths: Vec<f64>,
    relative_humidities: Vec<f64>,
    // [column, rh, wavelength]
    hydrophilic: ClassArrays<Array3<f64>>,
    // [column, wavelength]
    hydrophobic: ClassArrays<Array2<f64>>,
    species: BTreeMap<String, SpeciesColumn>,
}

impl OpticalTable {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let document: OpticalTableDocument = serde_json::from_reader(reader)?;

        let n_rh = document.relative_humidity.len();
        let n_wl = document.wavelength.len();

        Self::from_stored_axes(
            &document.wavelength,
            &document.relative_humidity,
            to_array3("lidar_ratio_hydrophilic", document.lidar_ratio_hydrophilic, (n_rh, n_wl))?,
            to_array3("mass_ext_hydrophilic", document.mass_ext_hydrophilic, (n_rh, n_wl))?,
            to_array2("lidar_ratio_hydrophobic", document.lidar_ratio_hydrophobic, n_wl)?,
            to_array2("mass_ext_hydrophobic", document.mass_ext_hydrophobic, n_wl)?,
            species_from_entries(document.species)?,
        )
    }

    /// Loads a table by extension: a JSON document, or a NetCDF file with
    /// the same variables. A separate species-columns file replaces the
    /// species embedded in a JSON table and is required for NetCDF.
    pub fn load(table: &Path, species_columns: Option<&Path>) -> Result<Self, TableError> {
        let species = species_columns.map(read_species_columns).transpose()?;

        match reader_from_filetype(table)? {
            FileType::Json => {
                let loaded = Self::from_file(table)?;
                match species {
                    Some(species) => loaded.with_species(species),
                    None => Ok(loaded),
                }
            }
            #[cfg(feature = "gdal")]
            FileType::NetCDF => {
                let species = species
                    .ok_or_else(|| TableError::SpeciesColumnsRequired(table.to_path_buf()))?;
                super::netcdf::read_netcdf_table(table, species)
            }
            #[cfg(not(feature = "gdal"))]
            FileType::NetCDF => Err(FileError::Unsupported(FileType::NetCDF).into()),
        }
    }

    /// Builds a table from axes as stored on disk (m, scaled humidity).
    pub(crate) fn from_stored_axes(
        wavelength: &[f64],
        relative_humidity: &[f64],
        lidar_ratio_hydrophilic: Array3<f64>,
        mass_ext_hydrophilic: Array3<f64>,
        lidar_ratio_hydrophobic: Array2<f64>,
        mass_ext_hydrophobic: Array2<f64>,
        species: BTreeMap<String, SpeciesColumn>,
    ) -> Result<Self, TableError> {
        Self::new(
            wavelength.iter().map(|w| w * WAVELENGTH_SCALE).collect(),
            relative_humidity
                .iter()
                .map(|rh| rh * RELATIVE_HUMIDITY_SCALE)
                .collect(),
            lidar_ratio_hydrophilic,
            mass_ext_hydrophilic,
            lidar_ratio_hydrophobic,
            mass_ext_hydrophobic,
            species,
        )
    }

    /// Same coefficients, different species mapping.
    pub fn with_species(
        self,
        species: BTreeMap<String, SpeciesColumn>,
    ) -> Result<Self, TableError> {
        Self::new(
            self.wavelengths,
            self.relative_humidities,
            self.hydrophilic.lidar_ratio,
            self.hydrophilic.mass_extinction,
            self.hydrophobic.lidar_ratio,
            self.hydrophobic.mass_extinction,
            species,
        )
    }

    /// Builds a table from normalized axes (nm, percent).
    pub fn new(
        wavelengths: Vec<f64>,
        relative_humidities: Vec<f64>,
        lidar_ratio_hydrophilic: Array3<f64>,
        mass_ext_hydrophilic: Array3<f64>,
        lidar_ratio_hydrophobic: Array2<f64>,
        mass_ext_hydrophobic: Array2<f64>,
        species: BTreeMap<String, SpeciesColumn>,
    ) -> Result<Self, TableError> {
        if wavelengths.is_empty() || wavelengths.iter().any(|v| !v.is_finite()) {
            return Err(TableError::InvalidAxis("wavelength"));
        }
        if relative_humidities.is_empty() || relative_humidities.iter().any(|v| !v.is_finite()) {
            return Err(TableError::InvalidAxis("relative_humidity"));
        }

        let (n_rh, n_wl) = (relative_humidities.len(), wavelengths.len());
        check_shape3("lidar_ratio_hydrophilic", &lidar_ratio_hydrophilic, (n_rh, n_wl))?;
        check_shape3("mass_ext_hydrophilic", &mass_ext_hydrophilic, (n_rh, n_wl))?;
        check_shape2("lidar_ratio_hydrophobic", &lidar_ratio_hydrophobic, n_wl)?;
        check_shape2("mass_ext_hydrophobic", &mass_ext_hydrophobic, n_wl)?;

        let same_columns = |a: usize, b: usize, name: &'static str| {
            if a == b {
                Ok(())
            } else {
                Err(TableError::Shape {
                    array: name,
                    found: format!("{b} columns"),
                    expected: format!("{a} columns"),
                })
            }
        };
        same_columns(
            lidar_ratio_hydrophilic.dim().0,
            mass_ext_hydrophilic.dim().0,
            "mass_ext_hydrophilic",
        )?;
        same_columns(
            lidar_ratio_hydrophobic.dim().0,
            mass_ext_hydrophobic.dim().0,
            "mass_ext_hydrophobic",
        )?;

        for (code, entry) in &species {
            let available = match entry.class {
                HygroscopicClass::Hydrophilic => lidar_ratio_hydrophilic.dim().0,
                HygroscopicClass::Hydrophobic => lidar_ratio_hydrophobic.dim().0,
            };
            if entry.column >= available {
                return Err(TableError::ColumnOutOfRange {
                    species: code.clone(),
                    class: entry.class,
                    column: entry.column + 1,
                    available,
                });
            }
        }

        Ok(OpticalTable {
            wavelengths,
            relative_humidities,
            hydrophilic: ClassArrays {
                lidar_ratio: lidar_ratio_hydrophilic,
                mass_extinction: mass_ext_hydrophilic,
            },
            hydrophobic: ClassArrays {
                lidar_ratio: lidar_ratio_hydrophobic,
                mass_extinction: mass_ext_hydrophobic,
            },
            species,
        })
    }

    /// Wavelength axis in nm.
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// Relative humidity axis in percent.
    pub fn relative_humidities(&self) -> &[f64] {
        &self.relative_humidities
    }

    pub fn species_column(&self, code: &str) -> Option<SpeciesColumn> {
        self.species.get(code).copied()
    }

    pub fn species_codes(&self) -> impl Iterator<Item = &str> {
        self.species.keys().map(String::as_str)
    }

    pub fn wavelength_index(&self, wavelength_nm: f64) -> Option<usize> {
        nearest_index(&self.wavelengths, wavelength_nm)
    }

    pub fn humidity_index(&self, relative_humidity: f64) -> Option<usize> {
        nearest_index(&self.relative_humidities, relative_humidity)
    }

    /// Resolves the class-specific part of a table address.
    pub fn slot(&self, class: HygroscopicClass, relative_humidity: f64) -> Option<TableSlot> {
        match class {
            HygroscopicClass::Hydrophilic => self
                .humidity_index(relative_humidity)
                .map(|rh_index| TableSlot::Hydrophilic { rh_index }),
            HygroscopicClass::Hydrophobic => Some(TableSlot::Hydrophobic),
        }
    }

    /// Raw table coefficient, in table units.
    pub fn coefficient(
        &self,
        quantity: Quantity,
        column: usize,
        slot: TableSlot,
        wavelength_index: usize,
    ) -> Option<f64> {
        match slot {
            TableSlot::Hydrophilic { rh_index } => self
                .hydrophilic
                .get(quantity)
                .get((column, rh_index, wavelength_index))
                .copied(),
            TableSlot::Hydrophobic => self
                .hydrophobic
                .get(quantity)
                .get((column, wavelength_index))
                .copied(),
        }
    }

    /// Nearest-entry lookup for one species, in table units.
    pub fn lookup(
        &self,
        quantity: Quantity,
        species: SpeciesColumn,
        wavelength_nm: f64,
        relative_humidity: f64,
    ) -> Result<f64, TableError> {
        let no_entry = || TableError::NoEntry {
            class: species.class,
            wavelength: wavelength_nm,
        };
        let wavelength_index = self.wavelength_index(wavelength_nm).ok_or_else(no_entry)?;
        let slot = self
            .slot(species.class, relative_humidity)
            .ok_or_else(no_entry)?;
        self.coefficient(quantity, species.column, slot, wavelength_index)
            .ok_or_else(no_entry)
    }
}

/// Reads a `{"ss": {"type": "hydrophilic", "column": 1}, ...}` file.
pub fn read_species_columns(path: &Path) -> Result<BTreeMap<String, SpeciesColumn>, TableError> {
    let file = File::open(path)?;
    let entries: BTreeMap<String, SpeciesEntry> = serde_json::from_reader(BufReader::new(file))?;
    species_from_entries(entries)
}

fn species_from_entries(
    entries: BTreeMap<String, SpeciesEntry>,
) -> Result<BTreeMap<String, SpeciesColumn>, TableError> {
    entries
        .into_iter()
        .map(|(code, entry)| {
            // the file numbers columns from 1
            let column = entry
                .column
                .checked_sub(1)
                .ok_or_else(|| TableError::ZeroColumn(code.clone()))?;
            Ok((
                code,
                SpeciesColumn {
                    class: entry.class,
                    column,
                },
            ))
        })
        .collect()
}

fn to_array3(
    name: &'static str,
    nested: Vec<Vec<Vec<f64>>>,
    (n_rh, n_wl): (usize, usize),
) -> Result<Array3<f64>, TableError> {
    let n_col = nested.len();
    let mut flat = Vec::with_capacity(n_col * n_rh * n_wl);
    for (c, by_rh) in nested.into_iter().enumerate() {
        if by_rh.len() != n_rh {
            return Err(shape_error(name, format!("[{c}] has {} rows", by_rh.len()), n_rh));
        }
        for (r, by_wl) in by_rh.into_iter().enumerate() {
            if by_wl.len() != n_wl {
                let found = format!("[{c}][{r}] has {} values", by_wl.len());
                return Err(shape_error(name, found, n_wl));
            }
            flat.extend(by_wl);
        }
    }
    Array3::from_shape_vec((n_col, n_rh, n_wl), flat).map_err(|e| TableError::Shape {
        array: name,
        found: e.to_string(),
        expected: format!("({n_col}, {n_rh}, {n_wl})"),
    })
}

fn to_array2(
    name: &'static str,
    nested: Vec<Vec<f64>>,
    n_wl: usize,
) -> Result<Array2<f64>, TableError> {
    let n_col = nested.len();
    let mut flat = Vec::with_capacity(n_col * n_wl);
    for (c, by_wl) in nested.into_iter().enumerate() {
        if by_wl.len() != n_wl {
            return Err(shape_error(name, format!("[{c}] has {} values", by_wl.len()), n_wl));
        }
        flat.extend(by_wl);
    }
    Array2::from_shape_vec((n_col, n_wl), flat).map_err(|e| TableError::Shape {
        array: name,
        found: e.to_string(),
        expected: format!("({n_col}, {n_wl})"),
    })
}

fn shape_error(array: &'static str, found: String, expected: usize) -> TableError {
    TableError::Shape {
        array,
        found,
        expected: expected.to_string(),
    }
}

fn check_shape3(
    name: &'static str,
    array: &Array3<f64>,
    (n_rh, n_wl): (usize, usize),
) -> Result<(), TableError> {
    let (_, rh, wl) = array.dim();
    if (rh, wl) == (n_rh, n_wl) {
        Ok(())
    } else {
        Err(TableError::Shape {
            array: name,
            found: format!("{:?}", array.dim()),
            expected: format!("(_, {n_rh}, {n_wl})"),
        })
    }
}

fn check_shape2(name: &'static str, array: &Array2<f64>, n_wl: usize) -> Result<(), TableError> {
    if array.dim().1 == n_wl {
        Ok(())
    } else {
        Err(TableError::Shape {
            array: name,
            found: format!("{:?}", array.dim()),
            expected: format!("(_, {n_wl})"),
        })
    }
}
