//! CF time coordinates (`<unit> since <epoch>`).

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

const EPOCH_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    milliseconds_per_step: f64,
    epoch: NaiveDateTime,
}

impl TimeUnits {
    /// Parses e.g. `hours since 1900-01-01 00:00:00.0`.
    pub fn parse(units: &str) -> Option<Self> {
        let (unit, epoch) = units.trim().split_once(" since ")?;
        let milliseconds_per_step = match unit.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1e3,
            "minutes" | "minute" | "mins" | "min" => 6e4,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3.6e6,
            "days" | "day" | "d" => 8.64e7,
            _ => return None,
        };

        Some(Self {
            milliseconds_per_step,
            epoch: parse_epoch(epoch)?,
        })
    }

    pub fn decode(&self, value: f64) -> Option<NaiveDateTime> {
        if !value.is_finite() {
            return None;
        }
        let milliseconds = (value * self.milliseconds_per_step).round() as i64;
        let delta = TimeDelta::try_milliseconds(milliseconds)?;
        self.epoch.checked_add_signed(delta)
    }

    /// Calendar day of a coordinate value as written in the file.
    pub fn day_of(&self, coordinate: &str) -> Option<NaiveDate> {
        let value = coordinate.trim().parse::<f64>().ok()?;
        self.decode(value).map(|t| t.date())
    }
}

fn parse_epoch(epoch: &str) -> Option<NaiveDateTime> {
    let epoch = epoch.trim().trim_end_matches("UTC").trim_end_matches('Z').trim();
    EPOCH_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(epoch, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(epoch, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_cf_units() {
        let units = TimeUnits::parse("hours since 1900-01-01 00:00:00.0").unwrap();
        assert_eq!(units.decode(1_087_548.0), Some(at(2024, 1, 25, 12)));

        let units = TimeUnits::parse("seconds since 1970-01-01T00:00:00Z").unwrap();
        assert_eq!(units.decode(86_400.0 * 2.5), Some(at(1970, 1, 3, 12)));

        let units = TimeUnits::parse("days since 2024-02-28").unwrap();
        assert_eq!(units.day_of("2"), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_rejects_unknown_units() {
        assert_eq!(TimeUnits::parse("months since 2024-01-01"), None);
        assert_eq!(TimeUnits::parse("hours"), None);
        assert_eq!(TimeUnits::parse("hours since yesterday"), None);

        let units = TimeUnits::parse("hours since 2024-03-01").unwrap();
        assert_eq!(units.day_of("step"), None);
        assert_eq!(units.decode(f64::NAN), None);
    }
}
