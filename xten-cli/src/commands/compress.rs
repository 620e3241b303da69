//! Implementation of the 'compress' subcommand.
//!
//! Resolves the user's target, delegates planning and execution to
//! xten-core, and reports the outcome. Dry-run renders the exact ffmpeg
//! command lines instead of executing them.

use std::sync::Arc;

use log::debug;

use xten_core::events::EventDispatcher;
use xten_core::{
    CancellationToken, CompressionRequest, CompressionTarget, CoreConfig, CoreError, CoreResult,
    JobKind, PreparedJob, check_dependency, execute_prepared, format_bytes, format_duration,
    prepare_compression,
};

use crate::cli::CompressArgs;
use crate::output;
use crate::progress::ProgressBarHandler;

/// Runs the compression flow and returns the process exit code.
pub fn run_compress(args: CompressArgs, cancel: &CancellationToken) -> CoreResult<i32> {
    check_dependency("ffmpeg")?;
    check_dependency("ffprobe")?;

    let target = resolve_target(&args)?;

    let mut config = CoreConfig::default();
    if let Some(preset) = &args.preset {
        config.encoder_preset = preset.clone();
    }

    let base_output = args
        .output
        .clone()
        .unwrap_or_else(|| output::default_compress_output(&args.input));
    let output_path = output::resolve_output_path(&base_output, args.force);

    let request = CompressionRequest {
        input: args.input.clone(),
        output: output_path,
        target,
        audio_bitrate_kbps: args.audio_bitrate,
        force: args.force,
    };

    debug!("Compress run started: {}", chrono::Local::now());
    let job = prepare_compression(&request, &config)?;
    render_plan(&job);

    if args.dry_run {
        output::print_warning("Dry run mode - no encoding performed.");
        output::print_section("COMMAND PREVIEW");
        for invocation in &job.invocations {
            println!("{invocation}");
        }
        return Ok(0);
    }

    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_handler(Arc::new(ProgressBarHandler::new("Encoding")));

    let outcome = execute_prepared(&job, &dispatcher, cancel, &config)?;
    Ok(output::report_outcome(&outcome))
}

/// Maps the mutually exclusive --target/--crf flags onto a core target.
fn resolve_target(args: &CompressArgs) -> CoreResult<CompressionTarget> {
    match (&args.target, args.crf) {
        (Some(spec), None) => output::parse_size_spec(spec)
            .map(|bytes| CompressionTarget::BySize { bytes })
            .ok_or_else(|| {
                CoreError::InvalidConfig(format!(
                    "cannot parse target size '{spec}' (expected e.g. 8mb, 1.5gb, or bytes)"
                ))
            }),
        (None, Some(crf)) => Ok(CompressionTarget::ByQuality { crf }),
        _ => Err(CoreError::InvalidConfig(
            "choose a compression mode: --target <SIZE> or --crf <N>".to_string(),
        )),
    }
}

fn render_plan(job: &PreparedJob) {
    let JobKind::Encode { plan, target } = &job.kind else {
        return;
    };

    output::print_section("COMPRESSION PLAN");
    output::print_status("Input", &job.input_path.display().to_string());
    output::print_status("Output", &job.output_path.display().to_string());
    output::print_status("Duration", &format_duration(job.probe.duration_secs));
    output::print_status(
        "Source",
        &format!(
            "{} {}x{}",
            job.probe.video_codec, job.probe.width, job.probe.height
        ),
    );

    match target {
        CompressionTarget::BySize { bytes } => {
            output::print_status("Target", &format_bytes(*bytes));
            if let Some(kbps) = plan.video_bitrate_kbps {
                output::print_status("Video bitrate", &format!("{kbps} kbps"));
            }
        }
        CompressionTarget::ByQuality { crf } => {
            output::print_status("CRF", &crf.to_string());
        }
    }

    output::print_status("Audio bitrate", &format!("{} kbps", plan.audio_bitrate_kbps));
    output::print_status("Preset", &plan.preset);
    output::print_status("Passes", &plan.pass_count.passes().to_string());
    output::print_status(
        "Estimated size",
        &format_bytes(plan.estimated_output_bytes),
    );
}
