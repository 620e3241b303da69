//! Outcome verification: compares what the engine produced with the plan.
//!
//! A mismatch is a report, not a failure. Target-size planning is an
//! approximation (encoder rate control is non-linear), so an out-of-band
//! result surfaces as `SizeMismatch` and the caller decides whether to
//! accept it, retry with an adjusted target, or fall back to CRF mode.

use std::path::Path;

use crate::Outcome;
use crate::config::CoreConfig;
use crate::external::ffprobe_executor::probe_media;

/// Refines a supervisor `Success` against the planned target.
///
/// Re-probes the output file for its real size and duration, then applies
/// the configured tolerance band to size-targeted encodes. Non-success
/// outcomes pass through untouched. `target_bytes` is `None` for CRF
/// encodes and trims, which have no size contract to verify.
pub fn refine_outcome(
    outcome: Outcome,
    target_bytes: Option<u64>,
    output_path: &Path,
    config: &CoreConfig,
) -> Outcome {
    let (mut actual_bytes, mut actual_duration_secs) = match outcome {
        Outcome::Success {
            actual_bytes,
            actual_duration_secs,
        } => (actual_bytes, actual_duration_secs),
        other => return other,
    };

    match probe_media(output_path) {
        Ok(probe) => {
            actual_bytes = probe.file_size;
            actual_duration_secs = probe.duration_secs;
        }
        Err(e) => {
            // Keep the supervisor's numbers; the encode itself succeeded.
            log::warn!(
                "Could not re-probe output {} for verification: {e}",
                output_path.display()
            );
        }
    }

    if let Some(target) = target_bytes {
        if let Some(delta_ratio) = size_delta_outside_band(actual_bytes, target, config.size_tolerance)
        {
            log::warn!(
                "Output size {} misses target {} by {:+.1}%",
                crate::utils::format_bytes(actual_bytes),
                crate::utils::format_bytes(target),
                delta_ratio * 100.0
            );
            return Outcome::SizeMismatch {
                actual_bytes,
                target_bytes: target,
                delta_ratio,
            };
        }
    }

    Outcome::Success {
        actual_bytes,
        actual_duration_secs,
    }
}

/// Returns the signed delta ratio when the actual size falls outside the
/// tolerance band around the target, `None` when it is a hit.
fn size_delta_outside_band(actual: u64, target: u64, tolerance: f64) -> Option<f64> {
    if target == 0 {
        return None;
    }
    let delta_ratio = (actual as f64 - target as f64) / target as f64;
    (delta_ratio.abs() > tolerance).then_some(delta_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_band_is_a_hit() {
        assert_eq!(size_delta_outside_band(8_000_000, 8_000_000, 0.10), None);
        assert_eq!(size_delta_outside_band(8_700_000, 8_000_000, 0.10), None);
        assert_eq!(size_delta_outside_band(7_300_000, 8_000_000, 0.10), None);
        // Exactly on the band edge still counts as a hit.
        assert_eq!(size_delta_outside_band(8_800_000, 8_000_000, 0.10), None);
    }

    #[test]
    fn test_outside_band_reports_signed_delta() {
        let over = size_delta_outside_band(9_600_000, 8_000_000, 0.10).unwrap();
        assert!((over - 0.2).abs() < 1e-9);

        let under = size_delta_outside_band(4_000_000, 8_000_000, 0.10).unwrap();
        assert!((under + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_tolerance_is_configurable() {
        assert!(size_delta_outside_band(8_400_000, 8_000_000, 0.01).is_some());
        assert_eq!(size_delta_outside_band(8_400_000, 8_000_000, 0.20), None);
    }

    #[test]
    fn test_non_success_outcomes_pass_through() {
        let config = CoreConfig::default();
        let failed = Outcome::ProcessFailed {
            exit_code: Some(1),
            diagnostic_tail: "No such filter".to_string(),
        };
        let refined = refine_outcome(
            failed.clone(),
            Some(8_000_000),
            Path::new("/nonexistent/out.mp4"),
            &config,
        );
        assert_eq!(refined, failed);

        let cancelled = refine_outcome(
            Outcome::Cancelled,
            Some(8_000_000),
            Path::new("/nonexistent/out.mp4"),
            &config,
        );
        assert_eq!(cancelled, Outcome::Cancelled);
    }

    #[test]
    fn test_no_target_means_no_mismatch() {
        // CRF encodes and trims carry no size contract; an unprobeable
        // output keeps the supervisor's numbers and stays Success.
        let refined = refine_outcome(
            Outcome::Success {
                actual_bytes: 123,
                actual_duration_secs: 1.0,
            },
            None,
            Path::new("/nonexistent/out.mp4"),
            &CoreConfig::default(),
        );
        assert!(matches!(refined, Outcome::Success { .. }));
    }
}
