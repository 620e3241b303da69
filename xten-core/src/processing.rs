//! Operation orchestration: probe, plan, build, execute, verify.
//!
//! Preparation is split from execution so dry-run consumers can render the
//! exact invocations without spawning anything. The output-exists
//! precondition is checked here, before any process spawns; combined with
//! the builder's `-n`/`-y` flag this enforces the one-writer-per-path
//! invariant without any shared lock.

use std::path::{Path, PathBuf};

use crate::Outcome;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventDispatcher};
use crate::external::ffmpeg::{
    Invocation, OverwritePolicy, build_encode_invocations, build_trim_invocation,
};
use crate::external::ffmpeg_executor::{CancellationToken, execute_invocations};
use crate::external::ffprobe_executor::{MediaProbe, probe_keyframes, probe_media};
use crate::planning::{CompressionTarget, EncodePlan, PassCount, plan_encode};
use crate::trim::{TrimWindow, plan_trim};

/// A compression request as resolved by the CLI surface.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target: CompressionTarget,
    /// Audio allocation override; falls back to the configured default.
    pub audio_bitrate_kbps: Option<u32>,
    pub force: bool,
}

/// A trim request as resolved by the CLI surface.
#[derive(Debug, Clone)]
pub struct TrimRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub start_secs: f64,
    pub end_secs: f64,
    pub force: bool,
}

/// What a prepared job will do, with its derived parameters.
#[derive(Debug, Clone)]
pub enum JobKind {
    Encode {
        plan: EncodePlan,
        target: CompressionTarget,
    },
    Trim {
        window: TrimWindow,
    },
}

/// A fully planned operation: everything needed to execute or to render
/// for dry-run, with no side effects taken yet beyond read-only probes.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub probe: MediaProbe,
    pub kind: JobKind,
    pub invocations: Vec<Invocation>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Probes the input and plans a compression run end to end.
pub fn prepare_compression(
    request: &CompressionRequest,
    config: &CoreConfig,
) -> CoreResult<PreparedJob> {
    config.validate()?;

    let probe = probe_media(&request.input)?;
    let audio_bitrate = request
        .audio_bitrate_kbps
        .unwrap_or(config.audio_bitrate_kbps);
    let plan = plan_encode(&probe, request.target, audio_bitrate, config)?;

    ensure_output_writable(&request.output, request.force)?;
    let overwrite = overwrite_policy(request.force);

    let passlog = passlog_prefix(&request.output);
    let invocations = build_encode_invocations(
        &plan,
        None,
        &request.input,
        &request.output,
        overwrite,
        &passlog,
        config,
    )?;

    log::info!(
        "Planned {}: video {} / audio {} kbps, {} pass(es), estimated {}",
        request.input.display(),
        plan.video_bitrate_kbps
            .map_or_else(|| format!("CRF {}", plan.crf.unwrap_or_default()), |k| format!("{k} kbps")),
        plan.audio_bitrate_kbps,
        plan.pass_count.passes(),
        crate::utils::format_bytes(plan.estimated_output_bytes),
    );

    Ok(PreparedJob {
        probe,
        kind: JobKind::Encode {
            plan,
            target: request.target,
        },
        invocations,
        input_path: request.input.clone(),
        output_path: request.output.clone(),
    })
}

/// Probes the input (metadata and keyframes) and plans a trim run.
pub fn prepare_trim(request: &TrimRequest, config: &CoreConfig) -> CoreResult<PreparedJob> {
    config.validate()?;

    let probe = probe_media(&request.input)?;
    let keyframes = probe_keyframes(&request.input)?;
    let window = plan_trim(
        &probe,
        &keyframes,
        request.start_secs,
        request.end_secs,
        config,
    )?;

    ensure_output_writable(&request.output, request.force)?;
    let overwrite = overwrite_policy(request.force);

    let invocation =
        build_trim_invocation(&window, &request.input, &request.output, overwrite, config)?;

    log::info!(
        "Planned trim {:.3}s-{:.3}s of {} ({:?} mode)",
        window.start_secs,
        window.end_secs,
        request.input.display(),
        window.mode,
    );

    Ok(PreparedJob {
        probe,
        kind: JobKind::Trim { window },
        invocations: vec![invocation],
        input_path: request.input.clone(),
        output_path: request.output.clone(),
    })
}

/// Executes a prepared job under supervision and verifies the result.
pub fn execute_prepared(
    job: &PreparedJob,
    dispatcher: &EventDispatcher,
    cancel: &CancellationToken,
    config: &CoreConfig,
) -> CoreResult<Outcome> {
    dispatcher.emit(Event::EncodeStarted {
        input: job.input_path.display().to_string(),
        output: job.output_path.display().to_string(),
        pass_count: job.invocations.len() as u32,
    });

    // Progress positions are relative to the produced timeline: the whole
    // source for a compression, the window for a trim.
    let duration_hint = match &job.kind {
        JobKind::Encode { .. } => Some(job.probe.duration_secs),
        JobKind::Trim { window } => Some(window.duration_secs()),
    };

    let outcome = execute_invocations(
        &job.invocations,
        &job.output_path,
        duration_hint,
        dispatcher,
        cancel,
        config,
    )?;

    cleanup_passlog(job);

    let target_bytes = match &job.kind {
        JobKind::Encode {
            target: CompressionTarget::BySize { bytes },
            ..
        } => Some(*bytes),
        _ => None,
    };

    Ok(crate::validation::refine_outcome(
        outcome,
        target_bytes,
        &job.output_path,
        config,
    ))
}

fn overwrite_policy(force: bool) -> OverwritePolicy {
    if force {
        OverwritePolicy::Overwrite
    } else {
        OverwritePolicy::FailIfExists
    }
}

/// Explicit precondition: refuse to plan over an existing output unless
/// the caller forced it. Checked before spawn so two operations cannot
/// race to create the same path.
fn ensure_output_writable(output: &Path, force: bool) -> CoreResult<()> {
    if output.exists() && !force {
        return Err(CoreError::OutputExists(output.display().to_string()));
    }
    Ok(())
}

/// Scratch log prefix shared by the two passes of a bitrate encode.
fn passlog_prefix(output: &Path) -> PathBuf {
    let mut prefix = output.as_os_str().to_owned();
    prefix.push(".xten-pass");
    PathBuf::from(prefix)
}

/// Removes the analysis-pass log files ffmpeg leaves behind. Best effort.
fn cleanup_passlog(job: &PreparedJob) {
    let two_pass = matches!(
        &job.kind,
        JobKind::Encode { plan, .. } if plan.pass_count == PassCount::Two
    );
    if !two_pass {
        return;
    }
    let prefix = passlog_prefix(&job.output_path);
    for suffix in ["-0.log", "-0.log.mbtree"] {
        let mut path = prefix.as_os_str().to_owned();
        path.push(suffix);
        let path = PathBuf::from(path);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::debug!("Could not remove pass log {}: {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_guard_blocks_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("out.mp4");
        std::fs::write(&existing, b"partial").unwrap();

        let err = ensure_output_writable(&existing, false).unwrap_err();
        assert!(matches!(err, CoreError::OutputExists(_)));

        // Force bypasses the guard; a fresh path never trips it.
        assert!(ensure_output_writable(&existing, true).is_ok());
        assert!(ensure_output_writable(&dir.path().join("new.mp4"), false).is_ok());
    }

    #[test]
    fn test_passlog_prefix_derives_from_output() {
        let prefix = passlog_prefix(Path::new("/videos/out.mp4"));
        assert_eq!(prefix, PathBuf::from("/videos/out.mp4.xten-pass"));
    }
}
