//! Implementation of the 'trim' subcommand.
//!
//! Parses the requested cut points, lets the core trim engine resolve them
//! to safe boundaries (stream copy when a keyframe is close enough,
//! re-encode otherwise), and executes or renders the result.

use std::sync::Arc;

use log::debug;

use xten_core::events::EventDispatcher;
use xten_core::{
    CancellationToken, CoreConfig, CoreError, CoreResult, JobKind, PreparedJob, TrimMode,
    TrimRequest, check_dependency, execute_prepared, format_duration, parse_timestamp,
    prepare_trim,
};

use crate::cli::TrimArgs;
use crate::output;
use crate::progress::ProgressBarHandler;

/// Runs the trim flow and returns the process exit code.
pub fn run_trim(args: TrimArgs, cancel: &CancellationToken) -> CoreResult<i32> {
    check_dependency("ffmpeg")?;
    check_dependency("ffprobe")?;

    let start_secs = parse_cut_point(&args.start, "start")?;
    let end_secs = parse_cut_point(&args.end, "end")?;

    let mut config = CoreConfig::default();
    if let Some(tolerance) = args.tolerance {
        config.keyframe_tolerance_secs = tolerance;
    }

    let base_output = args
        .output
        .clone()
        .unwrap_or_else(|| output::default_trim_output(&args.input));
    let output_path = output::resolve_output_path(&base_output, args.force);

    let request = TrimRequest {
        input: args.input.clone(),
        output: output_path,
        start_secs,
        end_secs,
        force: args.force,
    };

    debug!("Trim run started: {}", chrono::Local::now());
    let job = prepare_trim(&request, &config)?;
    render_plan(&job, start_secs);

    if args.dry_run {
        output::print_warning("Dry run mode - no trimming performed.");
        output::print_section("COMMAND PREVIEW");
        for invocation in &job.invocations {
            println!("{invocation}");
        }
        return Ok(0);
    }

    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_handler(Arc::new(ProgressBarHandler::new("Trimming")));

    let outcome = execute_prepared(&job, &dispatcher, cancel, &config)?;
    Ok(output::report_outcome(&outcome))
}

fn parse_cut_point(input: &str, which: &str) -> CoreResult<f64> {
    parse_timestamp(input).ok_or_else(|| {
        CoreError::InvalidRange(format!(
            "cannot parse {which} time '{input}' (expected seconds or [HH:]MM:SS[.ms])"
        ))
    })
}

fn render_plan(job: &PreparedJob, requested_start: f64) {
    let JobKind::Trim { window } = &job.kind else {
        return;
    };

    output::print_section("TRIM PLAN");
    output::print_status("Input", &job.input_path.display().to_string());
    output::print_status("Output", &job.output_path.display().to_string());
    output::print_status("Duration", &format_duration(job.probe.duration_secs));
    output::print_status(
        "Window",
        &format!("{:.3}s - {:.3}s", window.start_secs, window.end_secs),
    );

    match window.mode {
        TrimMode::Copy => {
            let drift = window.start_secs - requested_start;
            if drift.abs() > 0.001 {
                output::print_status(
                    "Mode",
                    &format!("lossless stream copy (start snapped +{drift:.3}s to a keyframe)"),
                );
            } else {
                output::print_status("Mode", "lossless stream copy");
            }
        }
        TrimMode::Reencode => {
            output::print_status(
                "Mode",
                "re-encode (no keyframe within tolerance of the requested start)",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cut_point_formats() {
        assert_eq!(parse_cut_point("90", "start").unwrap(), 90.0);
        assert_eq!(parse_cut_point("1:30", "start").unwrap(), 90.0);
        assert_eq!(parse_cut_point("0:01:30.5", "end").unwrap(), 90.5);
    }

    #[test]
    fn test_parse_cut_point_names_the_field() {
        let err = parse_cut_point("later", "end").unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange(_)));
        assert!(err.to_string().contains("end time 'later'"));
    }
}
