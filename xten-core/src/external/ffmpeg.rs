//! FFmpeg argument vector construction.
//!
//! The builder is a pure transformation from a plan (plus an optional trim
//! window) to one or two [`Invocation`]s. It never touches the filesystem
//! and never spawns anything; dry-run rendering and actual execution both
//! consume the same value.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::planning::{EncodePlan, PassCount};
use crate::trim::{TrimMode, TrimWindow};

/// How an existing output file is treated by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Refuse to clobber: rendered as `-n`. The default.
    #[default]
    FailIfExists,
    /// Replace the file: rendered as `-y`. Only set when the caller's
    /// force flag is given; the builder never decides this itself.
    Overwrite,
}

impl OverwritePolicy {
    fn flag(self) -> &'static str {
        match self {
            OverwritePolicy::FailIfExists => "-n",
            OverwritePolicy::Overwrite => "-y",
        }
    }
}

/// A fully specified external-process invocation.
///
/// Constructed once, never mutated. `Display` renders the verbatim command
/// line for `--dry-run` output and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    fn ffmpeg(args: Vec<String>) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            args,
            working_dir: None,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Platform null sink for the analysis pass of a two-pass encode.
fn null_sink() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

/// Formats a cut point in seconds the way ffmpeg expects it.
fn format_seconds(secs: f64) -> String {
    format!("{secs:.3}")
}

/// Builds the invocation sequence for an encode plan.
///
/// Two invocations sharing the `passlog_prefix` scratch convention when the
/// plan is two-pass (the first pass analyzes into the log and discards its
/// output), one otherwise. An optional trim window restricts the encode to
/// a source interval.
pub fn build_encode_invocations(
    plan: &EncodePlan,
    trim: Option<&TrimWindow>,
    input_path: &Path,
    output_path: &Path,
    overwrite: OverwritePolicy,
    passlog_prefix: &Path,
    config: &CoreConfig,
) -> CoreResult<Vec<Invocation>> {
    let mut invocations = Vec::new();

    match plan.pass_count {
        PassCount::One => {
            let mut args = common_head(overwrite, trim, input_path);
            push_video_args(&mut args, plan, config);
            push_audio_args(&mut args, plan, config);
            args.extend(str_args(["-movflags", "+faststart"]));
            args.push(path_arg(output_path));
            invocations.push(Invocation::ffmpeg(args));
        }
        PassCount::Two => {
            // Pass 1: analysis only. No audio, output discarded.
            let mut args = vec!["-y".to_string()];
            args.extend(trim_args(trim));
            args.extend(str_args(["-i"]));
            args.push(path_arg(input_path));
            push_video_args(&mut args, plan, config);
            args.extend(str_args(["-pass", "1", "-passlogfile"]));
            args.push(path_arg(passlog_prefix));
            args.extend(str_args(["-an", "-f", "null"]));
            args.push(null_sink().to_string());
            invocations.push(Invocation::ffmpeg(args));

            // Pass 2: the real encode, honoring the overwrite policy.
            let mut args = common_head(overwrite, trim, input_path);
            push_video_args(&mut args, plan, config);
            args.extend(str_args(["-pass", "2", "-passlogfile"]));
            args.push(path_arg(passlog_prefix));
            push_audio_args(&mut args, plan, config);
            args.extend(str_args(["-movflags", "+faststart"]));
            args.push(path_arg(output_path));
            invocations.push(Invocation::ffmpeg(args));
        }
    }

    Ok(invocations)
}

/// Builds the single invocation for a trim.
///
/// Copy mode carries no bitrate component at all: the streams are copied
/// between the resolved cut points. Reencode mode uses the configured trim
/// CRF so the cut lands exactly where requested.
pub fn build_trim_invocation(
    window: &TrimWindow,
    input_path: &Path,
    output_path: &Path,
    overwrite: OverwritePolicy,
    config: &CoreConfig,
) -> CoreResult<Invocation> {
    let mut args = vec![overwrite.flag().to_string()];
    args.extend(str_args(["-ss"]));
    args.push(format_seconds(window.start_secs));
    args.extend(str_args(["-to"]));
    args.push(format_seconds(window.end_secs));
    args.extend(str_args(["-i"]));
    args.push(path_arg(input_path));

    match window.mode {
        TrimMode::Copy => {
            args.extend(str_args(["-c", "copy"]));
        }
        TrimMode::Reencode => {
            args.extend(str_args(["-c:v"]));
            args.push(config.video_codec.clone());
            args.extend(str_args(["-crf"]));
            args.push(config.trim_reencode_crf.to_string());
            args.extend(str_args(["-preset"]));
            args.push(config.encoder_preset.clone());
            args.extend(str_args(["-c:a"]));
            args.push(config.audio_codec.clone());
        }
    }

    args.extend(str_args(["-movflags", "+faststart"]));
    args.push(path_arg(output_path));

    Ok(Invocation::ffmpeg(args))
}

/// Overwrite flag, optional trim seek, and input.
fn common_head(
    overwrite: OverwritePolicy,
    trim: Option<&TrimWindow>,
    input_path: &Path,
) -> Vec<String> {
    let mut args = vec![overwrite.flag().to_string()];
    args.extend(trim_args(trim));
    args.push("-i".to_string());
    args.push(path_arg(input_path));
    args
}

fn trim_args(trim: Option<&TrimWindow>) -> Vec<String> {
    match trim {
        Some(window) => vec![
            "-ss".to_string(),
            format_seconds(window.start_secs),
            "-to".to_string(),
            format_seconds(window.end_secs),
        ],
        None => Vec::new(),
    }
}

fn push_video_args(args: &mut Vec<String>, plan: &EncodePlan, config: &CoreConfig) {
    args.push("-c:v".to_string());
    args.push(config.video_codec.clone());

    if let Some(kbps) = plan.video_bitrate_kbps {
        // Constrain the rate controller around the planned average so the
        // size target holds even on bursty content.
        args.push("-b:v".to_string());
        args.push(format!("{kbps}k"));
        args.push("-maxrate".to_string());
        args.push(format!("{}k", kbps + kbps / 2));
        args.push("-bufsize".to_string());
        args.push(format!("{}k", kbps * 2));
    }

    if let Some(crf) = plan.crf {
        args.push("-crf".to_string());
        args.push(crf.to_string());
    }

    args.push("-preset".to_string());
    args.push(plan.preset.clone());
}

fn push_audio_args(args: &mut Vec<String>, plan: &EncodePlan, config: &CoreConfig) {
    args.push("-c:a".to_string());
    args.push(config.audio_codec.clone());
    args.push("-b:a".to_string());
    args.push(format!("{}k", plan.audio_bitrate_kbps));
}

fn str_args<const N: usize>(parts: [&str; N]) -> impl Iterator<Item = String> {
    parts.into_iter().map(str::to_string)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{CompressionTarget, plan_encode};
    use crate::external::ffprobe_executor::MediaProbe;

    fn probe_fixture() -> MediaProbe {
        MediaProbe {
            duration_secs: 120.0,
            video_codec: "h264".to_string(),
            audio_codec: Some("aac".to_string()),
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            audio_channels: Some(2),
            audio_sample_rate: Some(48_000),
            container_format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            file_size: 50_000_000,
        }
    }

    fn size_plan() -> EncodePlan {
        plan_encode(
            &probe_fixture(),
            CompressionTarget::BySize { bytes: 8_000_000 },
            128,
            &CoreConfig::default(),
        )
        .unwrap()
    }

    fn crf_plan() -> EncodePlan {
        plan_encode(
            &probe_fixture(),
            CompressionTarget::ByQuality { crf: 23 },
            128,
            &CoreConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_two_pass_pair_shares_passlog() {
        let invocations = build_encode_invocations(
            &size_plan(),
            None,
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            OverwritePolicy::FailIfExists,
            Path::new("/tmp/xten-pass/log"),
            &CoreConfig::default(),
        )
        .unwrap();

        assert_eq!(invocations.len(), 2);
        for invocation in &invocations {
            assert!(invocation.args.contains(&"-passlogfile".to_string()));
            assert!(invocation.args.contains(&"/tmp/xten-pass/log".to_string()));
        }
        let pass1 = &invocations[0].args;
        assert!(pass1.contains(&"1".to_string()));
        assert!(pass1.contains(&"-an".to_string()));
        assert!(pass1.contains(&"null".to_string()));
        let pass2 = &invocations[1].args;
        assert!(pass2.contains(&"2".to_string()));
        assert!(pass2.contains(&"out.mp4".to_string()));
    }

    #[test]
    fn test_planned_bitrate_round_trips_into_args() {
        // The plan computed 394 kbps; the arg vector must carry it exactly.
        let plan = size_plan();
        assert_eq!(plan.video_bitrate_kbps, Some(394));

        let invocations = build_encode_invocations(
            &plan,
            None,
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            OverwritePolicy::FailIfExists,
            Path::new("log"),
            &CoreConfig::default(),
        )
        .unwrap();

        for invocation in &invocations {
            let pos = invocation
                .args
                .iter()
                .position(|a| a == "-b:v")
                .expect("bitrate flag present");
            assert_eq!(invocation.args[pos + 1], "394k");
        }
    }

    #[test]
    fn test_crf_round_trips_into_args() {
        let invocations = build_encode_invocations(
            &crf_plan(),
            None,
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            OverwritePolicy::FailIfExists,
            Path::new("log"),
            &CoreConfig::default(),
        )
        .unwrap();

        assert_eq!(invocations.len(), 1, "CRF mode is single pass");
        let args = &invocations[0].args;
        let pos = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[pos + 1], "23");
        assert!(!args.contains(&"-b:v".to_string()));
    }

    #[test]
    fn test_overwrite_policy_rendering() {
        let guarded = build_encode_invocations(
            &crf_plan(),
            None,
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            OverwritePolicy::FailIfExists,
            Path::new("log"),
            &CoreConfig::default(),
        )
        .unwrap();
        assert_eq!(guarded[0].args[0], "-n");

        let forced = build_encode_invocations(
            &crf_plan(),
            None,
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            OverwritePolicy::Overwrite,
            Path::new("log"),
            &CoreConfig::default(),
        )
        .unwrap();
        assert_eq!(forced[0].args[0], "-y");
    }

    #[test]
    fn test_trim_window_restricts_encode() {
        let window = TrimWindow {
            start_secs: 10.0,
            end_secs: 20.5,
            mode: TrimMode::Reencode,
        };
        let invocations = build_encode_invocations(
            &crf_plan(),
            Some(&window),
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            OverwritePolicy::FailIfExists,
            Path::new("log"),
            &CoreConfig::default(),
        )
        .unwrap();

        let args = &invocations[0].args;
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "10.000");
        let to = args.iter().position(|a| a == "-to").unwrap();
        assert_eq!(args[to + 1], "20.500");
        // Seek flags must precede the input for fast input seeking.
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input && to < input);
    }

    #[test]
    fn test_copy_trim_has_no_rate_control() {
        let window = TrimWindow {
            start_secs: 0.0,
            end_secs: 30.0,
            mode: TrimMode::Copy,
        };
        let invocation = build_trim_invocation(
            &window,
            Path::new("in.mp4"),
            Path::new("clip.mp4"),
            OverwritePolicy::FailIfExists,
            &CoreConfig::default(),
        )
        .unwrap();

        let args = &invocation.args;
        let c = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[c + 1], "copy");
        assert!(!args.contains(&"-b:v".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_reencode_trim_uses_configured_crf() {
        let window = TrimWindow {
            start_secs: 1.25,
            end_secs: 9.75,
            mode: TrimMode::Reencode,
        };
        let config = CoreConfig::default();
        let invocation = build_trim_invocation(
            &window,
            Path::new("in.mp4"),
            Path::new("clip.mp4"),
            OverwritePolicy::Overwrite,
            &config,
        )
        .unwrap();

        let args = &invocation.args;
        assert_eq!(args[0], "-y");
        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf + 1], config.trim_reencode_crf.to_string());
    }

    #[test]
    fn test_display_renders_verbatim_command() {
        let window = TrimWindow {
            start_secs: 0.0,
            end_secs: 5.0,
            mode: TrimMode::Copy,
        };
        let invocation = build_trim_invocation(
            &window,
            Path::new("in.mp4"),
            Path::new("my clip.mp4"),
            OverwritePolicy::FailIfExists,
            &CoreConfig::default(),
        )
        .unwrap();

        let rendered = invocation.to_string();
        assert!(rendered.starts_with("ffmpeg -n -ss 0.000 -to 5.000 -i in.mp4"));
        assert!(rendered.contains("\"my clip.mp4\""), "spaces get quoted: {rendered}");
    }
}
