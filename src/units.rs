//! Metric to display-unit conversions.
//!
//! Every function takes and returns `Option<f64>`: a missing upstream value
//! stays missing, it is never replaced by zero.

const FEET_PER_METER: f64 = 3.28084;
const MPH_PER_KMH: f64 = 0.621371;
const MPH_PER_MPS: f64 = 2.23694;
const INCHES_PER_MM: f64 = 0.0393701;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Meters to feet, one decimal
pub fn meters_to_feet(meters: Option<f64>) -> Option<f64> {
    meters.map(|m| round_to(m * FEET_PER_METER, 1))
}

/// km/h to mph, one decimal
pub fn kmh_to_mph(kmh: Option<f64>) -> Option<f64> {
    kmh.map(|v| round_to(v * MPH_PER_KMH, 1))
}

/// m/s to mph, one decimal. Buoy feeds report wind in m/s.
pub fn mps_to_mph(mps: Option<f64>) -> Option<f64> {
    mps.map(|v| round_to(v * MPH_PER_MPS, 1))
}

/// Millimeters to inches, two decimals
pub fn mm_to_inches(mm: Option<f64>) -> Option<f64> {
    mm.map(|v| round_to(v * INCHES_PER_MM, 2))
}

/// Celsius to Fahrenheit, nearest whole degree
pub fn celsius_to_fahrenheit(celsius: Option<f64>) -> Option<f64> {
    celsius.map(|c| (c * 9.0 / 5.0 + 32.0).round())
}

/// Compass direction as whole degrees
pub fn rounded_degrees(degrees: Option<f64>) -> Option<f64> {
    degrees.map(f64::round)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_to_feet() {
        assert_eq!(meters_to_feet(Some(1.0)), Some(3.3));
        assert_eq!(meters_to_feet(Some(1.22)), Some(4.0));
        assert_eq!(meters_to_feet(Some(0.0)), Some(0.0));
        assert_eq!(meters_to_feet(None), None);
    }

    #[test]
    fn test_kmh_to_mph() {
        assert_eq!(kmh_to_mph(Some(16.0)), Some(9.9));
        assert_eq!(kmh_to_mph(Some(100.0)), Some(62.1));
        assert_eq!(kmh_to_mph(None), None);
    }

    #[test]
    fn test_mps_to_mph() {
        assert_eq!(mps_to_mph(Some(5.0)), Some(11.2));
        assert_eq!(mps_to_mph(None), None);
    }

    #[test]
    fn test_mm_to_inches() {
        assert_eq!(mm_to_inches(Some(25.4)), Some(1.0));
        assert_eq!(mm_to_inches(Some(0.0)), Some(0.0));
        assert_eq!(mm_to_inches(None), None);
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert_eq!(celsius_to_fahrenheit(Some(0.0)), Some(32.0));
        assert_eq!(celsius_to_fahrenheit(Some(100.0)), Some(212.0));
        assert_eq!(celsius_to_fahrenheit(Some(18.3)), Some(65.0));
        assert_eq!(celsius_to_fahrenheit(Some(-40.0)), Some(-40.0));
        assert_eq!(celsius_to_fahrenheit(None), None);
    }

    #[test]
    fn test_conversions_are_monotonic() {
        let inputs: Vec<f64> = (-200..=600).map(|i| i as f64 * 0.137).collect();
        for pair in inputs.windows(2) {
            let (lo, hi) = (Some(pair[0]), Some(pair[1]));
            assert!(meters_to_feet(lo) <= meters_to_feet(hi));
            assert!(kmh_to_mph(lo) <= kmh_to_mph(hi));
            assert!(mps_to_mph(lo) <= mps_to_mph(hi));
            assert!(mm_to_inches(lo) <= mm_to_inches(hi));
            assert!(celsius_to_fahrenheit(lo) <= celsius_to_fahrenheit(hi));
        }
    }
}
