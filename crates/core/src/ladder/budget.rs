//! Bitrate budget: how a byte ceiling splits into audio and video bitrates.
//!
//! Bitrates are in kbps with 1 kbit = 1024 bits, so that
//! `total_kbps * duration * 1024 / 8` lands exactly on the byte ceiling.

use serde::{Deserialize, Serialize};

use super::rung::{EncodingRung, Ladder};
use super::trim;
use crate::media::MediaKind;

/// Bitrates chosen for one rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateBudget {
    /// Nominal video bitrate; `None` for audio-only output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_kbps: Option<u32>,
    pub audio_kbps: u32,
}

impl BitrateBudget {
    /// `-maxrate` for the video stream: 1.5x nominal.
    pub fn video_maxrate_kbps(&self) -> Option<u32> {
        self.video_kbps.map(|v| v.saturating_mul(3) / 2)
    }

    /// `-bufsize` for the video stream: 2x nominal.
    pub fn video_bufsize_kbps(&self) -> Option<u32> {
        self.video_kbps.map(|v| v.saturating_mul(2))
    }

    /// Combined nominal bitrate.
    pub fn total_kbps(&self) -> u32 {
        self.video_kbps.unwrap_or(0) + self.audio_kbps
    }

    /// Bytes an encoder hitting the nominal bitrates would produce.
    pub fn nominal_bytes(&self, duration_secs: f64) -> f64 {
        f64::from(self.total_kbps()) * 1024.0 / 8.0 * duration_secs.max(0.0)
    }
}

/// Whole-file bitrate that fills `ceiling_bytes` over `duration_secs`.
///
/// Returns `None` when the duration is unknown.
pub fn total_kbps(duration_secs: f64, ceiling_bytes: u64) -> Option<u32> {
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return None;
    }
    let kbps = (ceiling_bytes as f64 * 8.0 / (duration_secs * 1024.0)).floor();
    Some(kbps.min(f64::from(u32::MAX)) as u32)
}

/// Budget for a single rung.
///
/// Audio-only output takes the rung's fixed audio bitrate. Video gets what is
/// left after audio, never less than `min_video_kbps` and never more than the
/// rung's cap. With an unknown duration the cap is used directly.
pub fn budget(
    duration_secs: f64,
    ceiling_bytes: u64,
    rung: &EncodingRung,
    kind: MediaKind,
    min_video_kbps: u32,
) -> BitrateBudget {
    let audio_kbps = rung.audio_bitrate_kbps;

    let video_kbps = match kind {
        MediaKind::Audio => None,
        MediaKind::Video => Some(match total_kbps(duration_secs, ceiling_bytes) {
            Some(total) => total
                .saturating_sub(audio_kbps)
                .max(min_video_kbps)
                .min(rung.max_video_kbps),
            None => rung.max_video_kbps,
        }),
    };

    BitrateBudget {
        video_kbps,
        audio_kbps,
    }
}

/// Budgets for every rung of `ladder`, in order.
///
/// Each rung is budgeted over its own output duration (the trimmed duration
/// on the final rung). The nominal size never grows from one rung to the
/// next: a rung that would come out larger than its predecessor has its
/// video bitrate lowered to match.
pub fn plan(
    duration_secs: f64,
    ceiling_bytes: u64,
    ladder: &Ladder,
    kind: MediaKind,
    min_video_kbps: u32,
) -> Vec<BitrateBudget> {
    let mut budgets: Vec<BitrateBudget> = Vec::with_capacity(ladder.len());
    let mut previous_bytes: Option<f64> = None;

    for rung in ladder.rungs() {
        let rung_duration = trim::output_duration(rung, duration_secs);
        let mut current = budget(rung_duration, ceiling_bytes, rung, kind, min_video_kbps);

        if let (Some(prev), Some(video)) = (previous_bytes, current.video_kbps) {
            if rung_duration > 0.0 && current.nominal_bytes(rung_duration) > prev {
                let allowed_total = (prev * 8.0 / 1024.0 / rung_duration).floor() as u32;
                let allowed_video = allowed_total.saturating_sub(current.audio_kbps).max(1);
                current.video_kbps = Some(video.min(allowed_video));
            }
        }

        previous_bytes = Some(current.nominal_bytes(rung_duration));
        budgets.push(current);
    }

    budgets
}

#[cfg(test)]
mod tests {
    use super::*;

    const NINE_MIB: u64 = 9 * 1024 * 1024;

    #[test]
    fn test_budget_arithmetic() {
        assert_eq!(total_kbps(60.0, NINE_MIB), Some(1228));

        let ladder = Ladder::reference(240);
        let rung = &ladder.rungs()[0];
        assert_eq!(rung.audio_bitrate_kbps, 128);

        let b = budget(60.0, NINE_MIB, rung, MediaKind::Video, 64);
        assert_eq!(b.video_kbps, Some(1100));
        assert_eq!(b.audio_kbps, 128);
    }

    #[test]
    fn test_short_clip_is_capped() {
        let ladder = Ladder::reference(240);
        let rung = &ladder.rungs()[0];
        let b = budget(5.0, NINE_MIB, rung, MediaKind::Video, 64);
        assert_eq!(b.video_kbps, Some(rung.max_video_kbps));
    }

    #[test]
    fn test_long_clip_hits_floor() {
        let ladder = Ladder::reference(240);
        let rung = &ladder.rungs()[0];
        // 10 minutes: total is 122 kbps, less than the audio alone.
        assert_eq!(total_kbps(600.0, NINE_MIB), Some(122));
        let b = budget(600.0, NINE_MIB, rung, MediaKind::Video, 64);
        assert_eq!(b.video_kbps, Some(64));
    }

    #[test]
    fn test_unknown_duration_uses_cap() {
        let ladder = Ladder::reference(240);
        let rung = &ladder.rungs()[2];
        assert_eq!(total_kbps(0.0, NINE_MIB), None);
        let b = budget(0.0, NINE_MIB, rung, MediaKind::Video, 64);
        assert_eq!(b.video_kbps, Some(rung.max_video_kbps));
    }

    #[test]
    fn test_audio_only_uses_rung_table() {
        let ladder = Ladder::reference(240);
        let audio: Vec<u32> = ladder
            .rungs()
            .iter()
            .map(|r| budget(180.0, NINE_MIB, r, MediaKind::Audio, 64).audio_kbps)
            .collect();
        assert_eq!(audio, vec![128, 112, 96, 80, 64, 64]);
        assert!(budget(180.0, NINE_MIB, &ladder.rungs()[0], MediaKind::Audio, 64)
            .video_kbps
            .is_none());
    }

    #[test]
    fn test_safety_caps() {
        let b = BitrateBudget {
            video_kbps: Some(1000),
            audio_kbps: 96,
        };
        assert_eq!(b.video_maxrate_kbps(), Some(1500));
        assert_eq!(b.video_bufsize_kbps(), Some(2000));
    }

    #[test]
    fn test_plan_trim_rung_stays_below_previous() {
        let ladder = Ladder::reference(240);
        let plan = plan(601.0, NINE_MIB, &ladder, MediaKind::Video, 64);
        assert_eq!(plan.len(), 6);

        let bytes: Vec<f64> = ladder
            .rungs()
            .iter()
            .zip(&plan)
            .map(|(r, b)| b.nominal_bytes(trim::output_duration(r, 601.0)))
            .collect();
        for pair in bytes.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}", bytes);
        }
    }
}
