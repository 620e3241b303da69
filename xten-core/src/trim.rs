//! Trim planning: resolves requested timestamps to safe cut points.
//!
//! Stream copy is the default because it is fast and lossless, but a copy
//! can only start cleanly on a keyframe. The engine snaps the start cut
//! forward to the nearest keyframe when that stays within the configured
//! tolerance, and otherwise falls back to re-encoding at the exact
//! timestamps. The fall-back is a surfaced decision (visible in the
//! returned window's mode), never a silent override.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::external::ffprobe_executor::MediaProbe;

/// How the trim will be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    /// Lossless stream copy between keyframe-safe cut points.
    Copy,
    /// Frame-accurate re-encode; used when copy would miss the request
    /// by more than the tolerance.
    Reencode,
}

/// A validated, resolved trim interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimWindow {
    /// Resolved start cut in seconds. In copy mode this is the snapped
    /// keyframe timestamp; in re-encode mode the exact request.
    pub start_secs: f64,
    pub end_secs: f64,
    pub mode: TrimMode,
}

impl TrimWindow {
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Plans a trim window from requested timestamps and the keyframe map.
///
/// Validates `0 <= start < end <= duration` (failing with `InvalidRange`
/// before anything is spawned), then decides copy vs re-encode:
///
/// * the first keyframe at or after the requested start, when it lies
///   within `config.keyframe_tolerance_secs`, becomes the copy-mode cut;
/// * otherwise the window re-encodes at the exact timestamps.
///
/// Either way the resolved start satisfies
/// `start <= resolved <= start + tolerance`.
pub fn plan_trim(
    probe: &MediaProbe,
    keyframes: &[f64],
    start_secs: f64,
    end_secs: f64,
    config: &CoreConfig,
) -> CoreResult<TrimWindow> {
    if !start_secs.is_finite() || !end_secs.is_finite() || start_secs < 0.0 {
        return Err(CoreError::InvalidRange(format!(
            "start must be non-negative, got {start_secs}"
        )));
    }
    if end_secs <= start_secs {
        return Err(CoreError::InvalidRange(format!(
            "end ({end_secs:.3}s) must be after start ({start_secs:.3}s)"
        )));
    }
    if end_secs > probe.duration_secs {
        return Err(CoreError::InvalidRange(format!(
            "end ({:.3}s) exceeds media duration ({:.3}s)",
            end_secs, probe.duration_secs
        )));
    }

    // The container start is always a safe cut even when the packet scan
    // produced nothing.
    if start_secs == 0.0 && keyframes.is_empty() {
        return Ok(TrimWindow {
            start_secs,
            end_secs,
            mode: TrimMode::Copy,
        });
    }

    let snap = keyframes
        .iter()
        .copied()
        .find(|kf| *kf >= start_secs - f64::EPSILON);

    match snap {
        Some(kf) if kf - start_secs <= config.keyframe_tolerance_secs && kf < end_secs => {
            let resolved = kf.max(start_secs);
            log::debug!(
                "Trim start {start_secs:.3}s snaps to keyframe {resolved:.3}s, using stream copy"
            );
            Ok(TrimWindow {
                start_secs: resolved,
                end_secs,
                mode: TrimMode::Copy,
            })
        }
        _ => {
            log::debug!(
                "No keyframe within {:.3}s of trim start {start_secs:.3}s, falling back to re-encode",
                config.keyframe_tolerance_secs
            );
            Ok(TrimWindow {
                start_secs,
                end_secs,
                mode: TrimMode::Reencode,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_fixture(duration_secs: f64) -> MediaProbe {
        MediaProbe {
            duration_secs,
            video_codec: "h264".to_string(),
            audio_codec: Some("aac".to_string()),
            width: 1280,
            height: 720,
            frame_rate: 30.0,
            audio_channels: Some(2),
            audio_sample_rate: Some(44_100),
            container_format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            file_size: 10_000_000,
        }
    }

    // Keyframes every two seconds, like a typical x264 GOP.
    fn gop2_keyframes() -> Vec<f64> {
        (0..=60).map(|i| f64::from(i) * 2.0).collect()
    }

    #[test]
    fn test_start_on_keyframe_copies() {
        let window = plan_trim(
            &probe_fixture(120.0),
            &gop2_keyframes(),
            10.0,
            20.0,
            &CoreConfig::default(),
        )
        .unwrap();

        assert_eq!(window.mode, TrimMode::Copy);
        assert_eq!(window.start_secs, 10.0);
        assert_eq!(window.end_secs, 20.0);
    }

    #[test]
    fn test_start_near_keyframe_snaps_forward() {
        let window = plan_trim(
            &probe_fixture(120.0),
            &gop2_keyframes(),
            9.6,
            20.0,
            &CoreConfig::default(),
        )
        .unwrap();

        assert_eq!(window.mode, TrimMode::Copy);
        assert_eq!(window.start_secs, 10.0);
        // Resolved cut stays within [start, start + tolerance].
        assert!(window.start_secs >= 9.6);
        assert!(window.start_secs <= 9.6 + CoreConfig::default().keyframe_tolerance_secs);
    }

    #[test]
    fn test_start_far_from_keyframe_reencodes_exactly() {
        let window = plan_trim(
            &probe_fixture(120.0),
            &gop2_keyframes(),
            10.8,
            20.0,
            &CoreConfig::default(),
        )
        .unwrap();

        assert_eq!(window.mode, TrimMode::Reencode);
        assert_eq!(window.start_secs, 10.8);
    }

    #[test]
    fn test_tolerance_is_configurable() {
        let mut config = CoreConfig::default();
        config.keyframe_tolerance_secs = 2.0;

        let window = plan_trim(&probe_fixture(120.0), &gop2_keyframes(), 10.8, 20.0, &config)
            .unwrap();
        assert_eq!(window.mode, TrimMode::Copy);
        assert_eq!(window.start_secs, 12.0);
    }

    #[test]
    fn test_snap_past_end_falls_back_to_reencode() {
        // Nearest keyframe after 10.9 is 12.0, but the clip ends at 11.5.
        let mut config = CoreConfig::default();
        config.keyframe_tolerance_secs = 2.0;

        let window = plan_trim(&probe_fixture(120.0), &gop2_keyframes(), 10.9, 11.5, &config)
            .unwrap();
        assert_eq!(window.mode, TrimMode::Reencode);
        assert_eq!(window.start_secs, 10.9);
    }

    #[test]
    fn test_end_past_duration_is_invalid() {
        let err = plan_trim(
            &probe_fixture(120.0),
            &gop2_keyframes(),
            10.0,
            120.5,
            &CoreConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange(_)));
    }

    #[test]
    fn test_inverted_and_degenerate_ranges_are_invalid() {
        let probe = probe_fixture(120.0);
        let keyframes = gop2_keyframes();
        let config = CoreConfig::default();

        assert!(matches!(
            plan_trim(&probe, &keyframes, 20.0, 10.0, &config).unwrap_err(),
            CoreError::InvalidRange(_)
        ));
        assert!(matches!(
            plan_trim(&probe, &keyframes, 10.0, 10.0, &config).unwrap_err(),
            CoreError::InvalidRange(_)
        ));
        assert!(matches!(
            plan_trim(&probe, &keyframes, -1.0, 10.0, &config).unwrap_err(),
            CoreError::InvalidRange(_)
        ));
    }

    #[test]
    fn test_full_range_trim_is_allowed() {
        let window = plan_trim(
            &probe_fixture(120.0),
            &gop2_keyframes(),
            0.0,
            120.0,
            &CoreConfig::default(),
        )
        .unwrap();
        assert_eq!(window.mode, TrimMode::Copy);
        assert_eq!(window.duration_secs(), 120.0);
    }

    #[test]
    fn test_empty_keyframe_map_from_zero_copies() {
        let window = plan_trim(&probe_fixture(60.0), &[], 0.0, 30.0, &CoreConfig::default())
            .unwrap();
        assert_eq!(window.mode, TrimMode::Copy);
    }

    #[test]
    fn test_empty_keyframe_map_midstream_reencodes() {
        let window = plan_trim(&probe_fixture(60.0), &[], 5.0, 30.0, &CoreConfig::default())
            .unwrap();
        assert_eq!(window.mode, TrimMode::Reencode);
    }
}
