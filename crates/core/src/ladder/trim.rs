//! Duration trimming for the final rung.

use super::rung::EncodingRung;

/// Default duration ceiling in seconds.
pub const DEFAULT_DURATION_CEILING_SECS: u32 = 240;

/// The `-t` limit to pass for `rung`, if any.
///
/// Only rungs carrying a duration ceiling trim, and only when the content is
/// actually longer than that ceiling.
pub fn trim_limit(rung: &EncodingRung, duration_secs: f64) -> Option<u32> {
    rung.trim_to_secs
        .filter(|ceiling| duration_secs > f64::from(*ceiling))
}

/// Duration the encoded output will have for `rung`.
pub fn output_duration(rung: &EncodingRung, duration_secs: f64) -> f64 {
    match trim_limit(rung, duration_secs) {
        Some(limit) => f64::from(limit),
        None => duration_secs,
    }
}
