/// Derived physical quantities computed from temperature and humidity
use crate::models::DerivedMetrics;
use crate::utils::round_to;

// August-Roche-Magnus coefficients
const MAGNUS_A: f64 = 17.625;
const MAGNUS_B: f64 = 243.04;

/// Compute heat index, dew point and absolute humidity
///
/// All three values are rounded to one decimal. If any input is not a finite
/// number the result is all zeros, and any single result that overflows is
/// reported as zero; the function never panics and never returns NaN.
///
/// # Arguments
/// * `temp` - Air temperature in °C
/// * `hum` - Relative humidity in %
/// * `pres` - Pressure in kPa (validated, but not used by any formula)
pub fn derive_metrics(temp: f64, hum: f64, pres: f64) -> DerivedMetrics {
    if !temp.is_finite() || !hum.is_finite() || !pres.is_finite() {
        return DerivedMetrics::default();
    }

    // ln(0) at 0 % humidity sends the dew point to -inf, absolute zero divides
    // by zero and huge temperatures overflow the regression
    DerivedMetrics {
        heat_index: finite_or_zero(round_to(heat_index(temp, hum), 1)),
        dew_point: finite_or_zero(round_to(dew_point(temp, hum), 1)),
        absolute_humidity: finite_or_zero(round_to(absolute_humidity(temp, hum), 1)),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Same as [`derive_metrics`] but for channels that may not have been reported yet
pub fn derive_from_optional(
    temp: Option<f64>,
    hum: Option<f64>,
    pres: Option<f64>,
) -> DerivedMetrics {
    derive_metrics(
        temp.unwrap_or(f64::NAN),
        hum.unwrap_or(f64::NAN),
        pres.unwrap_or(f64::NAN),
    )
}

/// Rothfusz-style regression for apparent temperature in °C
fn heat_index(t: f64, h: f64) -> f64 {
    -8.784695 + 1.61139411 * t + 2.338549 * h
        - 0.14611605 * t * h
        - 0.012308094 * t.powi(2)
        - 0.016424828 * h.powi(2)
        + 0.002211732 * t.powi(2) * h
        + 0.00072546 * t * h.powi(2)
        - 0.000003582 * t.powi(2) * h.powi(2)
}

fn dew_point(t: f64, h: f64) -> f64 {
    let alpha = (h / 100.0).ln() + (MAGNUS_A * t) / (MAGNUS_B + t);
    (MAGNUS_B * alpha) / (MAGNUS_A - alpha)
}

/// Grams of water vapour per cubic metre of air
fn absolute_humidity(t: f64, h: f64) -> f64 {
    6.112 * ((17.67 * t) / (t + 243.5)).exp() * h * 2.1674 / (273.15 + t)
}

/// Linear dew point approximation `T - (100 - H) / 5`
///
/// Only reasonable above ~50 % humidity. Kept for comparing against older
/// readings; [`derive_metrics`] always uses the Magnus formula.
pub fn dew_point_linear(temp: f64, hum: f64) -> f64 {
    if !temp.is_finite() || !hum.is_finite() {
        return 0.0;
    }
    round_to(temp - (100.0 - hum) / 5.0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_room_conditions() {
        let m = derive_metrics(25.0, 60.0, 101.3);

        assert!((25.5..=26.5).contains(&m.heat_index), "{:?}", m);
        assert!((16.0..=17.5).contains(&m.dew_point), "{:?}", m);
        assert!((13.0..=14.5).contains(&m.absolute_humidity), "{:?}", m);
    }

    #[test]
    fn exact_values_for_reference_point() {
        let m = derive_metrics(25.0, 60.0, 101.3);
        assert_eq!(m.dew_point, 16.7);
        assert_eq!(m.absolute_humidity, 13.8);
    }

    #[test]
    fn non_finite_inputs_give_zeros() {
        let zero = DerivedMetrics::default();
        assert_eq!(derive_metrics(f64::NAN, 60.0, 101.3), zero);
        assert_eq!(derive_metrics(25.0, f64::INFINITY, 101.3), zero);
        assert_eq!(derive_metrics(25.0, 60.0, f64::NEG_INFINITY), zero);
        assert_eq!(derive_from_optional(Some(25.0), None, Some(101.3)), zero);
    }

    #[test]
    fn pressure_does_not_affect_results() {
        assert_eq!(
            derive_metrics(18.0, 75.0, 99.0),
            derive_metrics(18.0, 75.0, 104.0)
        );
    }

    #[test]
    fn deterministic_and_finite_over_grid() {
        for t in (-20..=50).step_by(5) {
            for h in (0..=100).step_by(10) {
                let (t, h) = (t as f64, h as f64);
                let a = derive_metrics(t, h, 101.3);
                let b = derive_metrics(t, h, 101.3);
                assert_eq!(a, b);
                assert!(a.heat_index.is_finite());
                assert!(a.dew_point.is_finite());
                assert!(a.absolute_humidity.is_finite());
            }
        }
    }

    #[test]
    fn extreme_finite_inputs_stay_finite() {
        let cases = [
            (-273.15, 50.0),
            (-243.04, 50.0),
            (-243.5, 50.0),
            (1e160, 50.0),
            (-1e160, 50.0),
            (f64::MAX, 100.0),
            (25.0, 0.0),
            (25.0, 1e300),
        ];
        for (t, h) in cases {
            let m = derive_metrics(t, h, 101.3);
            assert!(m.heat_index.is_finite(), "{} {} -> {:?}", t, h, m);
            assert!(m.dew_point.is_finite(), "{} {} -> {:?}", t, h, m);
            assert!(m.absolute_humidity.is_finite(), "{} {} -> {:?}", t, h, m);
        }
        assert_eq!(derive_metrics(-273.15, 50.0, 101.3).absolute_humidity, 0.0);
    }

    #[test]
    fn linear_dew_point_is_close_when_humid() {
        let linear = dew_point_linear(25.0, 80.0);
        let magnus = derive_metrics(25.0, 80.0, 101.3).dew_point;
        assert_eq!(linear, 21.0);
        assert!((linear - magnus).abs() < 1.0);
    }
}
