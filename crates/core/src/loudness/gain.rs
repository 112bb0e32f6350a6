//! Gain correction.

/// Default peak level the normalizer aims for.
pub const DEFAULT_TARGET_PEAK_DB: f64 = -3.0;
/// Default upper bound on applied gain.
pub const DEFAULT_MAX_GAIN_DB: f64 = 20.0;

/// Gain that brings `peak_db` to `target_peak_db`, never above `max_gain_db`.
///
/// Attenuation is unbounded.
pub fn compute_gain(target_peak_db: f64, peak_db: f64, max_gain_db: f64) -> f64 {
    (target_peak_db - peak_db).min(max_gain_db)
}
