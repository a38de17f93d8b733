/// Index of the axis value closest to `query`.
///
/// Ties go to the lowest index. Returns `None` for an empty axis or a
/// non-finite query.
pub fn nearest_index(axis: &[f64], query: f64) -> Option<usize> {
    nearest_by(axis, query, |value, query| (value - query).abs())
}

/// [`nearest_index`] for longitudes in degrees, with distances measured
/// around the circle so that 359.6 and 0.0 are 0.4 apart.
pub fn nearest_longitude_index(axis: &[f64], query: f64) -> Option<usize> {
    nearest_by(axis, query, |value, query| {
        let distance = (value - query).rem_euclid(360.0);
        distance.min(360.0 - distance)
    })
}

fn nearest_by(axis: &[f64], query: f64, distance: impl Fn(f64, f64) -> f64) -> Option<usize> {
    if !query.is_finite() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in axis.iter().enumerate() {
        let distance = distance(value, query);
        match best {
            // strictly smaller only, so the first match survives a tie
            Some((_, best_distance)) if distance >= best_distance => {}
            _ if distance.is_nan() => {}
            _ => best = Some((i, distance)),
        }
    }

    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_index_minimizes_distance() {
        let axis = [355.0, 400.0, 532.0, 905.0, 1064.0];
        for query in [350.0, 410.0, 600.0, 1000.0, 2000.0] {
            let idx = nearest_index(&axis, query).unwrap();
            let best = axis
                .iter()
                .map(|v| (v - query).abs())
                .fold(f64::INFINITY, f64::min);
            assert_eq!((axis[idx] - query).abs(), best, "query {query}");
        }
    }

    #[test]
    fn test_nearest_index_tie_goes_to_lower_index() {
        let axis = [40.0, 50.0, 60.0];
        assert_eq!(nearest_index(&axis, 45.0), Some(0));
        assert_eq!(nearest_index(&axis, 55.0), Some(1));

        // descending axis: the lower index is the larger value
        let axis = [60.0, 50.0, 40.0];
        assert_eq!(nearest_index(&axis, 55.0), Some(0));
    }

    #[test]
    fn test_nearest_index_relative_humidity() {
        let rh: Vec<f64> = (0..=10).map(|i| (i * 10) as f64).collect();
        assert_eq!(nearest_index(&rh, 47.0), Some(5));
        assert_eq!(rh[nearest_index(&rh, 47.0).unwrap()], 50.0);
        assert_eq!(nearest_index(&rh, 130.0), Some(10));
    }

    #[test]
    fn test_nearest_longitude_wraps_around() {
        let axis: Vec<f64> = (0..900).map(|i| i as f64 * 0.4).collect();
        assert_eq!(nearest_longitude_index(&axis, 359.9), Some(0));
        assert_eq!(nearest_longitude_index(&axis, 359.7), Some(899));
        assert_eq!(nearest_longitude_index(&axis, 10.1), Some(25));

        // 359.5 is 0.5 from both 359 and 0
        assert_eq!(nearest_longitude_index(&[0.0, 1.0, 359.0], 359.5), Some(0));
        assert_eq!(nearest_longitude_index(&[0.0, 1.0], f64::NAN), None);
    }

    #[test]
    fn test_nearest_index_degenerate_inputs() {
        assert_eq!(nearest_index(&[], 1.0), None);
        assert_eq!(nearest_index(&[1.0, 2.0], f64::NAN), None);
        assert_eq!(nearest_index(&[f64::NAN, 2.0], 1.0), Some(1));
    }
}
