//! FFmpeg process supervision: execution, progress, cancellation.
//!
//! One compression or trim operation maps to exactly one supervised child
//! process lifetime (two sequential lifetimes for two-pass plans). The
//! supervisor consumes the sidecar's event stream, coalesces progress to
//! the configured rate, retains a bounded diagnostic tail for failure
//! reports, and implements cooperative-then-forceful cancellation: a
//! graceful quit request, a bounded grace wait, then a kill. A cancelled
//! operation never deletes partial output.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel as FfmpegLogLevel};

use crate::Outcome;
use crate::config::CoreConfig;
use crate::error::{CoreResult, command_start_error, command_wait_error};
use crate::events::{Event, EventDispatcher};
use crate::external::ffmpeg::Invocation;
use crate::utils::parse_ffmpeg_time;

/// Shared cancellation flag between the caller (e.g. a Ctrl-C handler) and
/// the supervising loop. The only mutable state crossing that boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Ring buffer keeping the last N diagnostic lines from the engine.
struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn join(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Minimum-interval gate for progress emission.
struct ProgressGate {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressGate {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    fn should_emit(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

/// Per-pass event state: diagnostic tail, coalesced progress, last position.
struct PassMonitor {
    tail: DiagnosticTail,
    gate: ProgressGate,
    duration_secs: Option<f64>,
    last_elapsed_secs: f64,
}

impl PassMonitor {
    fn new(duration_secs: Option<f64>, config: &CoreConfig) -> Self {
        Self {
            tail: DiagnosticTail::new(config.diagnostic_tail_lines),
            gate: ProgressGate::new(config.progress_interval),
            duration_secs,
            last_elapsed_secs: 0.0,
        }
    }

    fn absorb(&mut self, event: &FfmpegEvent, dispatcher: &EventDispatcher) {
        match event {
            FfmpegEvent::Progress(progress) => {
                let elapsed_secs = parse_ffmpeg_time(&progress.time)
                    .or_else(|| progress.time.parse::<f64>().ok())
                    .unwrap_or(0.0);
                self.last_elapsed_secs = elapsed_secs;

                if !self.gate.should_emit(Instant::now()) {
                    return;
                }

                let percent = self
                    .duration_secs
                    .filter(|d| *d > 0.0)
                    .map(|d| ((elapsed_secs / d) * 100.0).min(100.0) as f32);
                let eta = self.duration_secs.and_then(|d| {
                    (progress.speed > 0.01 && d > elapsed_secs).then(|| {
                        Duration::from_secs_f64((d - elapsed_secs) / f64::from(progress.speed))
                    })
                });

                dispatcher.emit(Event::EncodingProgress {
                    elapsed_secs,
                    output_bytes: u64::from(progress.size_kb) * 1024,
                    speed: progress.speed,
                    percent,
                    eta,
                });
            }
            FfmpegEvent::Log(level, message) => {
                self.tail.push(message);
                forward_engine_log(level, message);
            }
            FfmpegEvent::Error(error) => {
                self.tail.push(error);
                if crate::external::is_non_critical_ffmpeg_message(error) {
                    log::debug!("ffmpeg non-critical message: {error}");
                } else {
                    log::error!(target: "ffmpeg_log", "{error}");
                }
            }
            _ => {}
        }
    }
}

/// Outcome of a single supervised pass.
enum PassResult {
    Completed { final_elapsed_secs: f64 },
    Cancelled,
    Failed {
        exit_code: Option<i32>,
        diagnostic_tail: String,
    },
}

/// Executes an invocation sequence as supervised child processes.
///
/// Passes run strictly in order; a failing or cancelled pass aborts the
/// remainder (a two-pass encode never runs pass 2 after a broken pass 1).
/// Returns a terminal [`Outcome`]; infrastructure problems (the engine
/// cannot even be spawned) surface as errors instead.
pub fn execute_invocations(
    invocations: &[Invocation],
    output_path: &Path,
    source_duration_secs: Option<f64>,
    dispatcher: &EventDispatcher,
    cancel: &CancellationToken,
    config: &CoreConfig,
) -> CoreResult<Outcome> {
    let total_passes = invocations.len() as u32;
    let mut final_elapsed = 0.0;

    for (index, invocation) in invocations.iter().enumerate() {
        if cancel.is_cancelled() {
            log::warn!("Cancellation requested before pass {}; stopping", index + 1);
            return Ok(Outcome::Cancelled);
        }
        let pass = index as u32 + 1;
        dispatcher.emit(Event::PassStarted {
            pass,
            of: total_passes,
        });
        log::info!("Starting ffmpeg pass {pass}/{total_passes}: {invocation}");

        match run_pass(invocation, source_duration_secs, dispatcher, cancel, config)? {
            PassResult::Completed { final_elapsed_secs } => {
                final_elapsed = final_elapsed_secs;
            }
            PassResult::Cancelled => {
                log::warn!("Encode cancelled during pass {pass}; partial output (if any) kept");
                return Ok(Outcome::Cancelled);
            }
            PassResult::Failed {
                exit_code,
                diagnostic_tail,
            } => {
                if pass < total_passes {
                    log::error!("Pass {pass} failed; aborting remaining passes");
                }
                return Ok(Outcome::ProcessFailed {
                    exit_code,
                    diagnostic_tail,
                });
            }
        }
    }

    dispatcher.emit(Event::EncodeFinished);

    // Report what is known without a re-probe; the verifier refines this.
    let actual_bytes = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
    Ok(Outcome::Success {
        actual_bytes,
        actual_duration_secs: final_elapsed,
    })
}

fn run_pass(
    invocation: &Invocation,
    duration_secs: Option<f64>,
    dispatcher: &EventDispatcher,
    cancel: &CancellationToken,
    config: &CoreConfig,
) -> CoreResult<PassResult> {
    let mut cmd = FfmpegCommand::new();
    cmd.args(&invocation.args);
    if let Some(dir) = &invocation.working_dir {
        cmd.as_inner_mut().current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|e| command_start_error("ffmpeg", e))?;

    let mut monitor = PassMonitor::new(duration_secs, config);
    let mut cancelled = false;

    let events = child.iter().map_err(|e| {
        crate::error::CoreError::OperationFailed(format!("ffmpeg event stream unavailable: {e}"))
    })?;
    for event in events {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        monitor.absorb(&event, dispatcher);
    }

    if cancelled || cancel.is_cancelled() {
        shutdown_child(&mut child, config.termination_grace);
        return Ok(PassResult::Cancelled);
    }

    let status = child.wait().map_err(|e| command_wait_error("ffmpeg", e))?;

    if status.success() {
        Ok(PassResult::Completed {
            final_elapsed_secs: monitor.last_elapsed_secs,
        })
    } else {
        let diagnostic_tail = monitor.tail.join();
        log::error!(
            "ffmpeg exited with status {:?}; diagnostic tail:\n{}",
            status.code(),
            diagnostic_tail
        );
        Ok(PassResult::Failed {
            exit_code: status.code(),
            diagnostic_tail,
        })
    }
}

/// Cooperative-then-forceful termination: graceful quit, bounded grace
/// period, then kill. The mandated ordering keeps the terminal and the
/// output file descriptor consistent.
fn shutdown_child(child: &mut ffmpeg_sidecar::child::FfmpegChild, grace: Duration) {
    if let Err(e) = child.quit() {
        log::debug!("Graceful quit request failed ({e}); killing directly");
    }

    let deadline = Instant::now() + grace;
    loop {
        match child.as_inner_mut().try_wait() {
            Ok(Some(status)) => {
                log::debug!("ffmpeg exited after graceful quit: {status}");
                return;
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                log::debug!("try_wait failed during shutdown: {e}");
                break;
            }
        }
    }

    log::warn!("ffmpeg did not exit within the grace period; killing");
    let _ = child.kill();
    let _ = child.wait();
}

fn forward_engine_log(level: &FfmpegLogLevel, message: &str) {
    if crate::external::is_non_critical_ffmpeg_message(message) {
        log::debug!(target: "ffmpeg_log", "{message}");
        return;
    }
    match level {
        FfmpegLogLevel::Fatal | FfmpegLogLevel::Error => {
            log::error!(target: "ffmpeg_log", "{message}");
        }
        FfmpegLogLevel::Warning => log::warn!(target: "ffmpeg_log", "{message}"),
        FfmpegLogLevel::Info => log::debug!(target: "ffmpeg_log", "{message}"),
        _ => log::trace!(target: "ffmpeg_log", "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use ffmpeg_sidecar::event::FfmpegProgress;
    use std::sync::Mutex;

    struct ProgressCounter(Mutex<Vec<(f64, u64)>>);

    impl EventHandler for ProgressCounter {
        fn handle(&self, event: &Event) {
            if let Event::EncodingProgress {
                elapsed_secs,
                output_bytes,
                ..
            } = event
            {
                self.0.lock().unwrap().push((*elapsed_secs, *output_bytes));
            }
        }
    }

    fn progress_event(time: &str, size_kb: u32) -> FfmpegEvent {
        FfmpegEvent::Progress(FfmpegProgress {
            frame: 100,
            fps: 30.0,
            q: 0.0,
            size_kb,
            time: time.to_string(),
            bitrate_kbps: 2000.0,
            speed: 2.0,
            raw_log_message: String::new(),
        })
    }

    #[test]
    fn test_diagnostic_tail_keeps_last_lines() {
        let mut tail = DiagnosticTail::new(3);
        for i in 0..10 {
            tail.push(&format!("line {i}"));
        }
        assert_eq!(tail.join(), "line 7\nline 8\nline 9");
    }

    #[test]
    fn test_diagnostic_tail_retains_filter_errors() {
        // An engine failure like a bad filter name must survive into the
        // retained tail for the caller's report.
        let mut monitor = PassMonitor::new(Some(120.0), &CoreConfig::default());
        let dispatcher = EventDispatcher::new();

        monitor.absorb(
            &FfmpegEvent::Error("No such filter: 'frobnicate'".to_string()),
            &dispatcher,
        );
        monitor.absorb(
            &FfmpegEvent::Log(FfmpegLogLevel::Error, "Error opening filters!".to_string()),
            &dispatcher,
        );

        let tail = monitor.tail.join();
        assert!(tail.contains("No such filter"), "tail was: {tail}");
        assert!(tail.contains("Error opening filters!"));
    }

    #[test]
    fn test_progress_gate_coalesces() {
        let mut gate = ProgressGate::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(gate.should_emit(t0), "first event always passes");
        assert!(!gate.should_emit(t0 + Duration::from_millis(10)));
        assert!(!gate.should_emit(t0 + Duration::from_millis(99)));
        assert!(gate.should_emit(t0 + Duration::from_millis(100)));
        assert!(!gate.should_emit(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_monitor_emits_progress_with_bytes_and_position() {
        let counter = Arc::new(ProgressCounter(Mutex::new(Vec::new())));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(counter.clone());

        let mut monitor = PassMonitor::new(Some(120.0), &CoreConfig::default());
        monitor.absorb(&progress_event("00:00:10.00", 2048), &dispatcher);

        let seen = counter.0.lock().unwrap().clone();
        assert_eq!(seen, vec![(10.0, 2048 * 1024)]);
        assert_eq!(monitor.last_elapsed_secs, 10.0);
    }

    #[test]
    fn test_monitor_tracks_position_even_when_coalesced() {
        // Two events inside one refresh interval: only one emission, but
        // the monitor's last position still advances.
        let counter = Arc::new(ProgressCounter(Mutex::new(Vec::new())));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(counter.clone());

        let mut monitor = PassMonitor::new(Some(120.0), &CoreConfig::default());
        monitor.absorb(&progress_event("00:00:10.00", 1024), &dispatcher);
        monitor.absorb(&progress_event("00:00:10.50", 1100), &dispatcher);

        assert_eq!(counter.0.lock().unwrap().len(), 1);
        assert_eq!(monitor.last_elapsed_secs, 10.5);
    }

    #[test]
    fn test_cancellation_token_round_trip() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled(), "clones share the flag");
    }
}
