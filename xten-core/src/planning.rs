//! Bitrate planning: turns a size or quality target into encode parameters.
//!
//! Target-size compression is an inverse problem: the desired output byte
//! count has to be translated back into a video bitrate after reserving
//! room for container overhead and the audio track. The planner is a pure
//! function over (probe, target, audio policy, config) with no hidden state
//! and no I/O, so identical inputs always produce identical plans.

use crate::config::{CRF_RANGE, CoreConfig, VALID_PRESETS};
use crate::error::{CoreError, CoreResult};
use crate::external::ffprobe_executor::MediaProbe;

/// What the user asked for: a byte ceiling or a constant quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionTarget {
    /// Hit a specific output size in bytes.
    BySize { bytes: u64 },
    /// Encode at a constant rate factor; output size is a side effect.
    ByQuality { crf: u32 },
}

/// Number of encoder passes an execution will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassCount {
    One,
    Two,
}

impl PassCount {
    #[must_use]
    pub fn passes(self) -> u32 {
        match self {
            PassCount::One => 1,
            PassCount::Two => 2,
        }
    }
}

/// Concrete encode parameters derived from a [`CompressionTarget`].
///
/// Exactly one of `video_bitrate_kbps` / `crf` is set, matching the target
/// variant. Never mutated after planning; the command builder consumes it
/// as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    pub video_bitrate_kbps: Option<u32>,
    pub audio_bitrate_kbps: u32,
    pub crf: Option<u32>,
    pub pass_count: PassCount,
    /// Best-effort size prediction. Exact for nothing: informational for
    /// size targets, a rough preview for CRF mode.
    pub estimated_output_bytes: u64,
    pub preset: String,
}

/// Derives an [`EncodePlan`] from a probe and a target.
///
/// Size targets that would push the video stream below the configured
/// minimum bitrate floor fail with `InfeasibleTarget` so the caller can
/// renegotiate; a plan that would yield degenerate output is never
/// produced silently. CRF values outside the codec's range fail with
/// `InvalidQuality`.
pub fn plan_encode(
    probe: &MediaProbe,
    target: CompressionTarget,
    audio_bitrate_kbps: u32,
    config: &CoreConfig,
) -> CoreResult<EncodePlan> {
    if !VALID_PRESETS.contains(&config.encoder_preset.as_str()) {
        return Err(CoreError::InvalidConfig(format!(
            "unknown encoder preset '{}'",
            config.encoder_preset
        )));
    }

    match target {
        CompressionTarget::BySize { bytes } => {
            plan_by_size(probe, bytes, audio_bitrate_kbps, config)
        }
        CompressionTarget::ByQuality { crf } => {
            plan_by_quality(probe, crf, audio_bitrate_kbps, config)
        }
    }
}

fn plan_by_size(
    probe: &MediaProbe,
    target_bytes: u64,
    audio_bitrate_kbps: u32,
    config: &CoreConfig,
) -> CoreResult<EncodePlan> {
    if target_bytes == 0 {
        return Err(CoreError::InfeasibleTarget(
            "target size must be positive".to_string(),
        ));
    }

    let duration = probe.duration_secs;
    let total_bits = target_bytes as f64 * 8.0;
    let usable_bits = total_bits * (1.0 - config.container_overhead);
    let audio_bits = f64::from(audio_bitrate_kbps) * 1000.0 * duration;
    let video_bits = usable_bits - audio_bits;

    // Single documented rounding rule: truncate to whole kbps.
    let video_bitrate_kbps = (video_bits / duration / 1000.0).floor();

    if video_bitrate_kbps < f64::from(config.min_video_bitrate_kbps) {
        return Err(CoreError::InfeasibleTarget(format!(
            "target too small for duration: {} over {:.1}s leaves {:.0} kbps for video \
             (floor is {} kbps)",
            crate::utils::format_bytes(target_bytes),
            duration,
            video_bitrate_kbps.max(0.0),
            config.min_video_bitrate_kbps
        )));
    }

    let video_bitrate_kbps = video_bitrate_kbps as u32;
    let estimated_output_bytes =
        estimate_bytes(video_bitrate_kbps, audio_bitrate_kbps, duration, config);

    Ok(EncodePlan {
        video_bitrate_kbps: Some(video_bitrate_kbps),
        audio_bitrate_kbps,
        crf: None,
        // Two-pass rate control tracks an explicit bitrate far more tightly.
        pass_count: PassCount::Two,
        estimated_output_bytes,
        preset: config.encoder_preset.clone(),
    })
}

fn plan_by_quality(
    probe: &MediaProbe,
    crf: u32,
    audio_bitrate_kbps: u32,
    config: &CoreConfig,
) -> CoreResult<EncodePlan> {
    if !CRF_RANGE.contains(&crf) {
        return Err(CoreError::InvalidQuality(format!(
            "CRF {crf} outside valid range {}-{} for {}",
            CRF_RANGE.start(),
            CRF_RANGE.end(),
            config.video_codec
        )));
    }

    // CRF output size is not analytically predictable. Anchor at ~0.07
    // bits per pixel-frame around CRF 23, halving per +6 CRF. Preview only.
    let pixel_rate = f64::from(probe.width) * f64::from(probe.height) * probe.frame_rate;
    let bits_per_pixel = 0.07 * f64::powf(2.0, (23.0 - f64::from(crf)) / 6.0);
    let video_kbps = (pixel_rate * bits_per_pixel / 1000.0).max(1.0) as u32;
    let estimated_output_bytes =
        estimate_bytes(video_kbps, audio_bitrate_kbps, probe.duration_secs, config);

    Ok(EncodePlan {
        video_bitrate_kbps: None,
        audio_bitrate_kbps,
        crf: Some(crf),
        pass_count: PassCount::One,
        estimated_output_bytes,
        preset: config.encoder_preset.clone(),
    })
}

/// Predicted file size from stream bitrates, re-adding the overhead share
/// the size budget reserved.
fn estimate_bytes(
    video_kbps: u32,
    audio_kbps: u32,
    duration_secs: f64,
    config: &CoreConfig,
) -> u64 {
    let av_bits = f64::from(video_kbps + audio_kbps) * 1000.0 * duration_secs;
    (av_bits / (1.0 - config.container_overhead) / 8.0) as u64
}
