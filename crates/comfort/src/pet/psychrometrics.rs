//! Magnus-type vapour pressure relations (hPa, °C)

/// Saturation vapour pressure of ambient air over water, hPa.
pub fn saturation_vapour_pressure(temp: f64) -> f64 {
    6.107 * 10f64.powf(7.5 * temp / (238.0 + temp))
}

/// Water vapour pressure of air at `temp` °C and `rel_humidity` %, hPa.
pub fn vapour_pressure(temp: f64, rel_humidity: f64) -> f64 {
    rel_humidity * saturation_vapour_pressure(temp) / 100.0
}

/// Relative humidity (%) at which air at `temp` °C holds `vapour_pressure` hPa.
///
/// The PET reference climate fixes vapour pressure at 12 hPa rather than a
/// humidity; this converts it for callers that work in humidity.
pub fn relative_humidity(temp: f64, vapour_pressure: f64) -> f64 {
    100.0 * vapour_pressure / saturation_vapour_pressure(temp)
}

/// Saturation vapour pressure at skin temperature and of exhaled air, hPa.
///
/// Uses the slightly different Magnus coefficients of the MEMI body model.
pub(crate) fn body_vapour_pressure(temp: f64) -> f64 {
    6.11 * 10f64.powf(7.45 * temp / (235.0 + temp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_saturation_at_common_temperatures() {
        assert_abs_diff_eq!(saturation_vapour_pressure(0.0), 6.107, epsilon = 1e-12);
        assert_abs_diff_eq!(saturation_vapour_pressure(20.0), 23.293, epsilon = 0.001);
        assert_abs_diff_eq!(body_vapour_pressure(34.0), 53.417, epsilon = 0.001);
    }

    #[test]
    fn test_humidity_inverse() {
        let rh = relative_humidity(20.0, 12.0);
        assert_abs_diff_eq!(rh, 51.518, epsilon = 0.001);
        assert_abs_diff_eq!(vapour_pressure(20.0, rh), 12.0, epsilon = 1e-10);
    }
}
