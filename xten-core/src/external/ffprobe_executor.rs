//! FFprobe integration: media metadata, keyframe listing, raw JSON.
//!
//! Probing is read-only and fails closed: a probe that cannot produce a
//! positive duration is an error, never a half-filled `MediaProbe`.

use crate::error::{CoreError, CoreResult, command_failed_error, command_start_error};
use ffprobe::{FfProbeError, ffprobe};
use serde::Serialize;
use std::io;
use std::path::Path;
use std::process::Command;

/// Immutable snapshot of one source file at probe time.
#[derive(Debug, Clone, Serialize)]
pub struct MediaProbe {
    /// Container duration in seconds, always positive.
    pub duration_secs: f64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub audio_channels: Option<u32>,
    pub audio_sample_rate: Option<u32>,
    pub container_format: String,
    pub file_size: u64,
}

/// Probes a media file and returns its metadata.
///
/// Fails with `NotFound` when the path does not exist, `DependencyNotFound`
/// when ffprobe is not on the PATH, and `FfprobeParse` when the engine's
/// output is missing or corrupt (including zero/negative durations).
pub fn probe_media(input_path: &Path) -> CoreResult<MediaProbe> {
    if !input_path.exists() {
        return Err(CoreError::NotFound(input_path.display().to_string()));
    }

    log::debug!("Running ffprobe for media info on: {}", input_path.display());

    let metadata = ffprobe(input_path).map_err(|err| {
        log::error!("ffprobe failed for {}: {err:?}", input_path.display());
        map_ffprobe_error(err, "media info")
    })?;

    let duration_secs = metadata
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| {
            CoreError::FfprobeParse(format!(
                "missing or unparseable duration for {}",
                input_path.display()
            ))
        })?;

    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return Err(CoreError::FfprobeParse(format!(
            "non-positive duration ({duration_secs}) reported for {}",
            input_path.display()
        )));
    }

    let video_stream = metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            CoreError::FfprobeParse(format!("no video stream found in {}", input_path.display()))
        })?;

    let width = video_stream.width.filter(|w| *w > 0).ok_or_else(|| {
        CoreError::FfprobeParse(format!("video stream missing width in {}", input_path.display()))
    })? as u32;
    let height = video_stream.height.filter(|h| *h > 0).ok_or_else(|| {
        CoreError::FfprobeParse(format!(
            "video stream missing height in {}",
            input_path.display()
        ))
    })? as u32;

    let frame_rate = parse_rational(&video_stream.avg_frame_rate)
        .or_else(|| parse_rational(&video_stream.r_frame_rate))
        .unwrap_or(0.0);

    let audio_stream = metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let file_size = metadata
        .format
        .size
        .parse::<u64>()
        .ok()
        .or_else(|| std::fs::metadata(input_path).map(|m| m.len()).ok())
        .unwrap_or(0);

    Ok(MediaProbe {
        duration_secs,
        video_codec: video_stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        width,
        height,
        frame_rate,
        audio_channels: audio_stream
            .and_then(|s| s.channels)
            .filter(|c| *c > 0)
            .map(|c| c as u32),
        audio_sample_rate: audio_stream
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse::<u32>().ok()),
        container_format: metadata.format.format_name.clone(),
        file_size,
    })
}

/// Lists video keyframe timestamps (seconds, ascending) for a file.
///
/// The `ffprobe` crate does not expose packet listings, so this shells out
/// to ffprobe directly and reads the JSON packet dump, keeping only
/// packets flagged `K`.
pub fn probe_keyframes(input_path: &Path) -> CoreResult<Vec<f64>> {
    if !input_path.exists() {
        return Err(CoreError::NotFound(input_path.display().to_string()));
    }

    log::debug!("Running ffprobe for keyframes on: {}", input_path.display());

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "packet=pts_time,flags",
            "-of",
            "json",
        ])
        .arg(input_path)
        .output()
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CoreError::DependencyNotFound("ffprobe".to_string())
            } else {
                command_start_error("ffprobe (keyframes)", e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(command_failed_error(
            "ffprobe (keyframes)",
            output.status,
            stderr,
        ));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| CoreError::JsonParseError(format!("ffprobe packet listing: {e}")))?;

    let mut keyframes = parse_keyframe_packets(&json);
    keyframes.sort_unstable_by(|a, b| a.total_cmp(b));
    log::debug!("Found {} keyframes", keyframes.len());
    Ok(keyframes)
}

/// Extracts keyframe timestamps from a parsed ffprobe packet dump.
fn parse_keyframe_packets(json: &serde_json::Value) -> Vec<f64> {
    let mut keyframes = Vec::new();
    if let Some(packets) = json["packets"].as_array() {
        for packet in packets {
            let is_key = packet["flags"]
                .as_str()
                .is_some_and(|flags| flags.contains('K'));
            if !is_key {
                continue;
            }
            if let Some(pts) = packet["pts_time"].as_str().and_then(|t| t.parse::<f64>().ok()) {
                keyframes.push(pts);
            }
        }
    }
    keyframes
}

/// Full ffprobe format+streams dump as pretty JSON, for `info --json`.
pub fn probe_raw_json(input_path: &Path) -> CoreResult<String> {
    if !input_path.exists() {
        return Err(CoreError::NotFound(input_path.display().to_string()));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_format", "-show_streams", "-of", "json"])
        .arg(input_path)
        .output()
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CoreError::DependencyNotFound("ffprobe".to_string())
            } else {
                command_start_error("ffprobe (raw)", e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(command_failed_error("ffprobe (raw)", output.status, stderr));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| CoreError::FfprobeParse(format!("non-UTF8 ffprobe output: {e}")))
}

fn map_ffprobe_error(err: FfProbeError, context: &str) -> CoreError {
    match err {
        FfProbeError::Io(io_err) => {
            if io_err.kind() == io::ErrorKind::NotFound {
                CoreError::DependencyNotFound("ffprobe".to_string())
            } else {
                command_start_error(format!("ffprobe ({context})"), io_err)
            }
        }
        FfProbeError::Status(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            command_failed_error(format!("ffprobe ({context})"), output.status, stderr)
        }
        FfProbeError::Deserialize(err) => {
            CoreError::JsonParseError(format!("ffprobe {context} output deserialization: {err}"))
        }
        _ => CoreError::FfprobeParse(format!("unknown ffprobe error during {context}: {err:?}")),
    }
}

/// Parses an ffprobe rational like "30000/1001" (or a bare number) to f64.
fn parse_rational(value: &str) -> Option<f64> {
    if let Some((num, den)) = value.split_once('/') {
        let num = num.parse::<f64>().ok()?;
        let den = den.parse::<f64>().ok()?;
        if den == 0.0 {
            return None;
        }
        let rate = num / den;
        (rate > 0.0).then_some(rate)
    } else {
        value.parse::<f64>().ok().filter(|r| *r > 0.0)
    }
}
