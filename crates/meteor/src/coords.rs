//! Polar to Cartesian conversion for transverse momenta.

/// Convert a transverse magnitude and azimuth to `[x, y]`.
pub fn polar_to_cartesian(r: f32, phi: f32) -> [f32; 2] {
    let (sin, cos) = phi.sin_cos();
    [r * cos, r * sin]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_phi_zero() {
        assert_eq!(polar_to_cartesian(10.0, 0.0), [10.0, 0.0]);
    }

    #[test]
    fn test_phi_half_pi() {
        let [x, y] = polar_to_cartesian(10.0, FRAC_PI_2);
        assert!(x.abs() < 1e-5);
        assert!((y - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_phi_pi_points_backwards() {
        let [x, y] = polar_to_cartesian(3.0, PI);
        assert!((x + 3.0).abs() < 1e-5);
        assert!(y.abs() < 1e-5);
    }

    #[test]
    fn test_zero_magnitude() {
        let [x, y] = polar_to_cartesian(0.0, 1.234);
        assert_eq!(x, 0.0);
        assert_eq!(y, 0.0);
    }
}
