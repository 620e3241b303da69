//! Implementation of the 'info' subcommand.

use xten_core::{
    CoreResult, check_dependency, format_bytes, format_duration, probe_media, probe_raw_json,
};

use crate::cli::InfoArgs;
use crate::output;

/// Prints a probe summary (or the raw ffprobe JSON) for a media file.
pub fn run_info(args: InfoArgs) -> CoreResult<i32> {
    check_dependency("ffprobe")?;

    if args.json {
        let raw = probe_raw_json(&args.input)?;
        // Re-indent when the dump parses; pass it through verbatim otherwise.
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or(raw)
            ),
            Err(_) => println!("{raw}"),
        }
        return Ok(0);
    }

    let probe = probe_media(&args.input)?;

    output::print_section("MEDIA INFO");
    output::print_status("File", &args.input.display().to_string());
    output::print_status("Container", &probe.container_format);
    output::print_status("Size", &format_bytes(probe.file_size));
    output::print_status("Duration", &format_duration(probe.duration_secs));
    output::print_status(
        "Video",
        &format!(
            "{} | {}x{} | {:.2} fps",
            probe.video_codec, probe.width, probe.height, probe.frame_rate
        ),
    );

    match &probe.audio_codec {
        Some(codec) => {
            let channels = probe
                .audio_channels
                .map_or_else(|| "?".to_string(), |c| c.to_string());
            let sample_rate = probe
                .audio_sample_rate
                .map_or_else(|| "?".to_string(), |r| r.to_string());
            output::print_status(
                "Audio",
                &format!("{codec} | {channels} ch | {sample_rate} Hz"),
            );
        }
        None => output::print_status("Audio", "none"),
    }

    Ok(0)
}
