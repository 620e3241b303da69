//! Configuration structure and policy constants for the xten core library.
//!
//! Every tunable the planner, supervisor, trim engine, and verifier consult
//! lives here. The defaults are policy, not behavior: callers can override
//! any of them without touching the engine code.

use std::time::Duration;

use crate::error::{CoreError, CoreResult};

// Default constants

/// Default audio bitrate in kbps when the caller supplies no audio policy.
pub const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 128;

/// Fraction of the size budget reserved for container/muxing overhead.
pub const DEFAULT_CONTAINER_OVERHEAD: f64 = 0.02;

/// Minimum viable video bitrate in kbps. Targets that resolve below this
/// floor are rejected as infeasible rather than producing degenerate output.
pub const DEFAULT_MIN_VIDEO_BITRATE_KBPS: u32 = 100;

/// Tolerance band for size verification: actual output within +/- this
/// fraction of the target counts as a hit.
pub const DEFAULT_SIZE_TOLERANCE: f64 = 0.10;

/// Maximum distance in seconds between a requested trim start and the
/// nearest following keyframe for stream copy to remain acceptable.
pub const DEFAULT_KEYFRAME_TOLERANCE_SECS: f64 = 0.5;

/// Minimum interval between emitted progress events.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period between the graceful quit request and a forced kill.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(3);

/// Number of trailing diagnostic lines retained for failure reports.
pub const DEFAULT_DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Default x264 encoder preset.
pub const DEFAULT_ENCODER_PRESET: &str = "slow";

/// Default video encoder.
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";

/// Default audio encoder.
pub const DEFAULT_AUDIO_CODEC: &str = "aac";

/// CRF used when a trim has to fall back to re-encoding. 18 is visually
/// transparent for x264.
pub const DEFAULT_TRIM_REENCODE_CRF: u32 = 18;

/// Valid CRF range for libx264.
pub const CRF_RANGE: std::ops::RangeInclusive<u32> = 0..=51;

/// The x264 preset ladder, fastest to slowest.
pub const VALID_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// Main configuration structure for the xten core library.
///
/// Created by the consumer (xten-cli) and threaded through planning,
/// execution, and verification. All fields have defaults; a plain
/// `CoreConfig::default()` is a working configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Audio bitrate allocation in kbps for planned encodes
    pub audio_bitrate_kbps: u32,

    /// Fraction of the byte budget reserved for container overhead (0.0-0.5)
    pub container_overhead: f64,

    /// Minimum viable video bitrate floor in kbps
    pub min_video_bitrate_kbps: u32,

    /// Size verification tolerance as a fraction of the target
    pub size_tolerance: f64,

    /// Keyframe snap tolerance in seconds for copy-mode trims
    pub keyframe_tolerance_secs: f64,

    /// Minimum interval between progress events delivered downstream
    pub progress_interval: Duration,

    /// Grace period before a cancelled child process is force-killed
    pub termination_grace: Duration,

    /// Trailing diagnostic lines kept for process failure reports
    pub diagnostic_tail_lines: usize,

    /// x264 encoder preset ("ultrafast".."veryslow")
    pub encoder_preset: String,

    /// Video encoder passed to ffmpeg
    pub video_codec: String,

    /// Audio encoder passed to ffmpeg
    pub audio_codec: String,

    /// CRF for trim re-encode fallback
    pub trim_reencode_crf: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            audio_bitrate_kbps: DEFAULT_AUDIO_BITRATE_KBPS,
            container_overhead: DEFAULT_CONTAINER_OVERHEAD,
            min_video_bitrate_kbps: DEFAULT_MIN_VIDEO_BITRATE_KBPS,
            size_tolerance: DEFAULT_SIZE_TOLERANCE,
            keyframe_tolerance_secs: DEFAULT_KEYFRAME_TOLERANCE_SECS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            diagnostic_tail_lines: DEFAULT_DIAGNOSTIC_TAIL_LINES,
            encoder_preset: DEFAULT_ENCODER_PRESET.to_string(),
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            trim_reencode_crf: DEFAULT_TRIM_REENCODE_CRF,
        }
    }
}

impl CoreConfig {
    /// Validates the configuration, returning `InvalidConfig` on the first
    /// out-of-range field.
    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=0.5).contains(&self.container_overhead) {
            return Err(CoreError::InvalidConfig(format!(
                "container overhead must be within 0.0-0.5, got {}",
                self.container_overhead
            )));
        }
        if !(0.0..1.0).contains(&self.size_tolerance) {
            return Err(CoreError::InvalidConfig(format!(
                "size tolerance must be within 0.0-1.0, got {}",
                self.size_tolerance
            )));
        }
        if self.audio_bitrate_kbps == 0 {
            return Err(CoreError::InvalidConfig(
                "audio bitrate must be positive".to_string(),
            ));
        }
        if self.keyframe_tolerance_secs < 0.0 {
            return Err(CoreError::InvalidConfig(
                "keyframe tolerance cannot be negative".to_string(),
            ));
        }
        if !VALID_PRESETS.contains(&self.encoder_preset.as_str()) {
            return Err(CoreError::InvalidConfig(format!(
                "unknown encoder preset '{}', expected one of: {}",
                self.encoder_preset,
                VALID_PRESETS.join(", ")
            )));
        }
        if !CRF_RANGE.contains(&self.trim_reencode_crf) {
            return Err(CoreError::InvalidConfig(format!(
                "trim re-encode CRF must be within {}-{}",
                CRF_RANGE.start(),
                CRF_RANGE.end()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_overhead_rejected() {
        let mut config = CoreConfig::default();
        config.container_overhead = 0.9;
        assert!(config.validate().is_err());

        config.container_overhead = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_preset_rejected() {
        let mut config = CoreConfig::default();
        config.encoder_preset = "warpspeed".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_ladder_presets_accepted() {
        for preset in VALID_PRESETS {
            let mut config = CoreConfig::default();
            config.encoder_preset = (*preset).to_string();
            assert!(config.validate().is_ok(), "preset {preset} should be valid");
        }
    }
}
