//! ==============================================================================
//! physics.rs - pressure / altitude / boiling point model
//! ==============================================================================
//!
//! purpose:
//!     pure conversions between atmospheric pressure, altitude and the boiling
//!     point of water. the SAME functions back both the live display path and
//!     the synthetic (degraded mode) generator, so a live reading and a
//!     synthetic reading at the same pressure always imply the same boiling
//!     point.
//!
//! relationships:
//!     - used by: domain.rs (boiling point is derived, never decoded)
//!     - used by: client.rs (synthetic readings, simulated history)
//!     - used by: sync.rs (altitude presets)
//!
//! all inputs are clamped rather than rejected - there are no error cases here.
//!
//! ==============================================================================

/// boiling point of water at 1 atm (°C)
pub const BASE_BOILING_POINT_C: f64 = 100.0;

/// first-order slope of boiling point against pressure (°C per atm)
pub const BOILING_SLOPE_C_PER_ATM: f64 = 25.0;

/// linear pressure drop per meter of altitude (atm / m)
pub const PRESSURE_DROP_PER_M: f64 = 0.00012;

/// altitude model never reports less than this
pub const MIN_PRESSURE_ATM: f64 = 0.3;

/// boiling point (°C) at the given pressure, 0 for non-positive pressure
pub fn boiling_point(pressure_atm: f64) -> f64 {
    if pressure_atm <= 0.0 {
        return 0.0;
    }
    BASE_BOILING_POINT_C + BOILING_SLOPE_C_PER_ATM * (pressure_atm - 1.0)
}

/// pressure (atm) at the given altitude, clamped to [0.3, 1.0]
pub fn altitude_to_pressure(altitude_m: f64) -> f64 {
    if altitude_m <= 0.0 {
        return 1.0;
    }
    (1.0 - altitude_m * PRESSURE_DROP_PER_M).max(MIN_PRESSURE_ATM)
}

/// inverse of [`altitude_to_pressure`] outside the clamp region
pub fn pressure_to_altitude(pressure_atm: f64) -> f64 {
    if pressure_atm >= 1.0 {
        return 0.0;
    }
    ((1.0 - pressure_atm) / PRESSURE_DROP_PER_M).max(0.0)
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

// ==============================================================================
// altitude presets
// ==============================================================================
// named locations the operator can pick instead of typing an altitude.
// the device resolves the name itself; we only validate it client-side.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudePreset {
    pub key: &'static str,
    pub name: &'static str,
    pub altitude_m: f64,
}

pub const ALTITUDE_PRESETS: &[AltitudePreset] = &[
    AltitudePreset { key: "sea_level", name: "Sea Level", altitude_m: 0.0 },
    AltitudePreset { key: "denver", name: "Denver, CO", altitude_m: 1609.0 },
    AltitudePreset { key: "mexico_city", name: "Mexico City", altitude_m: 2240.0 },
    AltitudePreset { key: "la_paz", name: "La Paz, Bolivia", altitude_m: 3515.0 },
    AltitudePreset { key: "everest_base", name: "Everest Base Camp", altitude_m: 5364.0 },
];

/// look up a preset by its wire key (e.g. "denver")
pub fn find_preset(key: &str) -> Option<&'static AltitudePreset> {
    ALTITUDE_PRESETS.iter().find(|p| p.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn boiling_point_is_affine_in_pressure() {
        for p in [0.3, 0.5, 0.95, 1.0, 1.05, 2.0] {
            let expected = 100.0 + 25.0 * (p - 1.0);
            assert!((boiling_point(p) - expected).abs() < EPS, "pressure {p}");
        }
        assert_eq!(boiling_point(0.0), 0.0);
        assert_eq!(boiling_point(-1.0), 0.0);
    }

    #[test]
    fn altitude_below_sea_level_is_one_atm() {
        assert_eq!(altitude_to_pressure(0.0), 1.0);
        assert_eq!(altitude_to_pressure(-250.0), 1.0);
    }

    #[test]
    fn high_altitude_clamps_to_minimum_pressure() {
        assert_eq!(altitude_to_pressure(10_000.0), 0.3);
    }

    #[test]
    fn altitude_round_trips_outside_clamp_region() {
        let mut a = 0.0;
        while a <= 5000.0 {
            let back = pressure_to_altitude(altitude_to_pressure(a));
            assert!((back - a).abs() < 1e-6, "altitude {a} came back as {back}");
            a += 125.0;
        }
    }

    #[test]
    fn pressure_at_or_above_one_atm_is_sea_level() {
        assert_eq!(pressure_to_altitude(1.0), 0.0);
        assert_eq!(pressure_to_altitude(1.2), 0.0);
    }

    #[test]
    fn temperature_conversions() {
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < EPS);
        assert!((fahrenheit_to_celsius(32.0)).abs() < EPS);
    }

    #[test]
    fn presets_resolve_by_key() {
        assert_eq!(find_preset("denver").map(|p| p.altitude_m), Some(1609.0));
        assert!(find_preset("atlantis").is_none());
    }
}
