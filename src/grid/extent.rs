use super::GridError;

/// Geographic bounds of a grid, longitudes in `[0, 360]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Extent {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self, GridError> {
        if !(0.0..=360.0).contains(&lon_min) || !(0.0..=360.0).contains(&lon_max) {
            return Err(GridError::InvalidExtent(
                "longitude values must be between 0 and 360",
            ));
        }

        if !(-90.0..=90.0).contains(&lat_min) || !(-90.0..=90.0).contains(&lat_max) {
            return Err(GridError::InvalidExtent(
                "latitude values must be between -90 and 90",
            ));
        }

        if lon_min > lon_max || lat_min > lat_max {
            return Err(GridError::InvalidExtent("min values must be <= max values"));
        }

        Ok(Extent {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    pub fn covers(&self, other: &Extent) -> bool {
        self.lat_min <= other.lat_min
            && self.lat_max >= other.lat_max
            && self.lon_min <= other.lon_min
            && self.lon_max >= other.lon_max
    }
}
