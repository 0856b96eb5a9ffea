//! Practical salinity (PSS-78) from conductivity, temperature and pressure.

/// Conductivity of standard seawater at S = 35, 15 °C, 0 dbar (mS/cm).
pub const STANDARD_CONDUCTIVITY: f64 = 42.914;

const A: [f64; 6] = [0.0080, -0.1692, 25.3851, 14.0941, -7.0261, 2.7081];
const B: [f64; 6] = [0.0005, -0.0056, -0.0066, -0.0375, 0.0636, -0.0144];
const C: [f64; 5] = [0.676_609_7, 2.005_64e-2, 1.104_259e-4, -6.9698e-7, 1.0031e-9];
const D: [f64; 4] = [3.426e-2, 4.464e-4, 4.215e-1, -3.107e-3];
const E: [f64; 3] = [2.070e-5, -6.370e-10, 3.989e-15];
const K: f64 = 0.0162;

/// Ratio between the two temperature scales; sensor temperatures are divided
/// by it before the salinity equation.
pub const TEMPERATURE_SCALE_FACTOR: f64 = 1.00024;

/// Practical salinity of seawater.
///
/// # Arguments
/// * `conductivity` - Conductivity in mS/cm
/// * `temperature` - Temperature in °C (IPTS-68)
/// * `pressure` - Gauge pressure in dbar
///
/// Returns 0 for non-positive conductivity.
pub fn practical_salinity(conductivity: f64, temperature: f64, pressure: f64) -> f64 {
    if conductivity <= 0.0 {
        return 0.0;
    }
    let t = temperature;
    let p = pressure;
    let r = conductivity / STANDARD_CONDUCTIVITY;

    let rt_coeff = C.iter().rev().fold(0.0, |acc, c| acc * t + c);
    let rp = 1.0
        + p * (E[0] + E[1] * p + E[2] * p * p)
            / (1.0 + D[0] * t + D[1] * t * t + (D[2] + D[3] * t) * r);
    let rt = r / (rp * rt_coeff);
    if rt <= 0.0 {
        return 0.0;
    }

    let root = rt.sqrt();
    let series = |coeffs: &[f64; 6]| coeffs.iter().rev().fold(0.0, |acc, c| acc * root + c);
    let dt = t - 15.0;
    series(&A) + dt / (1.0 + K * dt) * series(&B)
}

/// Salinity of a cistern sample at the surface.
///
/// `raw` is the sensor reading and `coefficient` scales it to µS/cm, which is
/// divided by 1000 to give mS/cm. `temperature` is the inflow temperature as
/// measured and is divided by [`TEMPERATURE_SCALE_FACTOR`].
pub fn cistern_salinity(raw: f64, coefficient: f64, temperature: f64) -> f64 {
    practical_salinity(
        raw * coefficient / 1000.0,
        temperature / TEMPERATURE_SCALE_FACTOR,
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_seawater() {
        let s = practical_salinity(STANDARD_CONDUCTIVITY, 15.0, 0.0);
        assert!((s - 35.0).abs() < 1e-3, "S = {s}");
    }

    #[test]
    fn test_unesco_check_value() {
        // UNESCO 44 check value: R = 1.888091, 40 °C, 10000 dbar -> S = 40.
        let s = practical_salinity(1.888_091 * STANDARD_CONDUCTIVITY, 40.0, 10_000.0);
        assert!((s - 40.0).abs() < 5e-3, "S = {s}");
    }

    #[test]
    fn test_dilute_water() {
        let fresh = practical_salinity(0.5, 20.0, 0.0);
        let brackish = practical_salinity(20.0, 20.0, 0.0);
        assert!(fresh > 0.0 && fresh < 1.0);
        assert!(brackish > fresh && brackish < 35.0);
        assert_eq!(practical_salinity(0.0, 20.0, 0.0), 0.0);
        assert_eq!(practical_salinity(-1.0, 20.0, 0.0), 0.0);
    }

    #[test]
    fn test_cistern_scaling() {
        // 56690 raw * 0.757 / 1000 = 42.914 mS/cm
        let s = cistern_salinity(56_690.0, 0.757, 15.0 * TEMPERATURE_SCALE_FACTOR);
        assert!((s - 35.0).abs() < 1e-2, "S = {s}");
    }

    #[test]
    fn test_cistern_temperature_is_rescaled() {
        let raw = 40_000.0;
        let s = cistern_salinity(raw, 0.757, 25.0);
        let expected = practical_salinity(raw * 0.757 / 1000.0, 25.0 / TEMPERATURE_SCALE_FACTOR, 0.0);
        assert_eq!(s, expected);
        assert_ne!(s, practical_salinity(raw * 0.757 / 1000.0, 25.0, 0.0));
    }
}
