//! Fixed values of the derivation and of its reported output.

/// Table mass extinction coefficients are in m2 kg-1; the gridded output is
/// in m2 g-1.
pub const MEC_UNIT_SCALE: f64 = 1e-3;

/// A-priori lidar ratio (sr) for stations without a collocated record.
pub const DEFAULT_LIDAR_RATIO: u32 = 50;

/// Decimal places of reported lidar ratio and MEC.
pub const APRIORI_DECIMALS: i32 = 2;

/// Decimal places of reported passthrough model values.
pub const DATA_DECIMALS: i32 = 4;

/// Relative humidity coordinates (%) a bulk field may be evaluated at.
pub const RELATIVE_HUMIDITY_STEPS: [u32; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// Default model variables: ammonium, black carbon, dust, nitrate, organic
/// matter, sea salt and sulphate AOD at 550 nm.
pub const IFS_SPECIES_VARIABLES: [&str; 7] = [
    "amaod550", "bcaod550", "duaod550", "niaod550", "omaod550", "ssaod550", "suaod550",
];

pub const IFS_TOTAL_VARIABLE: &str = "aod550";

pub const IFS_HUMIDITY_VARIABLE: &str = "relative_humidity_pl";
