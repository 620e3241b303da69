// xten-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "xten: local-first media utility",
    long_about = "Compresses, trims, and inspects video files by driving ffmpeg via the xten-core library."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compress a video to a target size or a constant quality level
    Compress(CompressArgs),
    /// Cut a clip out of a video, losslessly when the cut allows it
    Trim(TrimArgs),
    /// Show media information for a file
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
pub struct CompressArgs {
    /// Input video file
    #[arg(required = true, value_name = "INPUT")]
    pub input: PathBuf,

    /// Target output size (e.g. 8mb, 1.5gb, or a raw byte count)
    #[arg(short = 't', long, value_name = "SIZE", conflicts_with = "crf")]
    pub target: Option<String>,

    /// CRF quality mode (0-51, lower is higher quality)
    #[arg(long, value_name = "CRF")]
    pub crf: Option<u32>,

    /// Encoder preset (ultrafast..veryslow); slower presets compress better
    #[arg(long, value_name = "PRESET")]
    pub preset: Option<String>,

    /// Audio bitrate in kbps
    #[arg(long, value_name = "KBPS")]
    pub audio_bitrate: Option<u32>,

    /// Output file (defaults to <input>_xten.mp4, auto-incremented)
    #[arg(short = 'o', long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Overwrite the output file if it already exists
    #[arg(long)]
    pub force: bool,

    /// Print the ffmpeg command(s) instead of encoding
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct TrimArgs {
    /// Input video file
    #[arg(required = true, value_name = "INPUT")]
    pub input: PathBuf,

    /// Clip start (seconds or [HH:]MM:SS[.ms])
    #[arg(short = 's', long, value_name = "TIME")]
    pub start: String,

    /// Clip end (seconds or [HH:]MM:SS[.ms])
    #[arg(short = 'e', long, value_name = "TIME")]
    pub end: String,

    /// Max seconds a copy cut may drift from the requested start before
    /// falling back to re-encoding
    #[arg(long, value_name = "SECS")]
    pub tolerance: Option<f64>,

    /// Output file (defaults to <input>_xten_trim.mp4, auto-incremented)
    #[arg(short = 'o', long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Overwrite the output file if it already exists
    #[arg(long)]
    pub force: bool,

    /// Print the ffmpeg command instead of trimming
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Input media file
    #[arg(required = true, value_name = "INPUT")]
    pub input: PathBuf,

    /// Print the raw ffprobe JSON instead of the summary
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_compress_basic_args() {
        let cli = Cli::parse_from(["xten", "compress", "clip.mp4", "--target", "8mb"]);

        match cli.command {
            Commands::Compress(args) => {
                assert_eq!(args.input, PathBuf::from("clip.mp4"));
                assert_eq!(args.target.as_deref(), Some("8mb"));
                assert!(args.crf.is_none());
                assert!(args.output.is_none());
                assert!(!args.force);
                assert!(!args.dry_run);
            }
            _ => panic!("expected compress command"),
        }
    }

    #[test]
    fn test_parse_compress_crf_mode() {
        let cli = Cli::parse_from([
            "xten", "compress", "clip.mp4", "--crf", "21", "--preset", "veryslow", "--force",
        ]);

        match cli.command {
            Commands::Compress(args) => {
                assert_eq!(args.crf, Some(21));
                assert_eq!(args.preset.as_deref(), Some("veryslow"));
                assert!(args.force);
            }
            _ => panic!("expected compress command"),
        }
    }

    #[test]
    fn test_target_and_crf_conflict() {
        let result = Cli::try_parse_from([
            "xten", "compress", "clip.mp4", "--target", "8mb", "--crf", "23",
        ]);
        assert!(result.is_err(), "--target and --crf are mutually exclusive");
    }

    #[test]
    fn test_parse_trim_args() {
        let cli = Cli::parse_from([
            "xten", "trim", "clip.mp4", "--start", "1:30", "--end", "2:00", "--dry-run",
        ]);

        match cli.command {
            Commands::Trim(args) => {
                assert_eq!(args.start, "1:30");
                assert_eq!(args.end, "2:00");
                assert!(args.tolerance.is_none());
                assert!(args.dry_run);
            }
            _ => panic!("expected trim command"),
        }
    }

    #[test]
    fn test_parse_info_json_flag() {
        let cli = Cli::parse_from(["xten", "info", "clip.mp4", "--json"]);
        match cli.command {
            Commands::Info(args) => assert!(args.json),
            _ => panic!("expected info command"),
        }
    }
}
