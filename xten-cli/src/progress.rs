//! Bridges core progress events onto an indicatif progress bar.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use xten_core::events::{Event, EventHandler};
use xten_core::format_bytes;

/// Renders coalesced [`Event`]s from the supervisor as a terminal progress
/// bar. The bar is created lazily on the first pass and finished when the
/// encode completes; the supervisor's rate limiting means this never
/// redraws more than ~10 times a second.
pub struct ProgressBarHandler {
    operation: &'static str,
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressBarHandler {
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            bar: Mutex::new(None),
        }
    }

    fn make_bar(&self, message: String) -> ProgressBar {
        let bar = ProgressBar::new(1000);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {percent}% ({eta})")
                .expect("static template is valid")
                .progress_chars("█▓▒░ "),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl EventHandler for ProgressBarHandler {
    fn handle(&self, event: &Event) {
        match event {
            Event::EncodeStarted { input, output, .. } => {
                log::debug!("Encode started: {input} -> {output}");
            }
            Event::PassStarted { pass, of } => {
                let message = if *of > 1 {
                    format!("{} (pass {pass}/{of})", self.operation)
                } else {
                    self.operation.to_string()
                };
                let mut slot = self.bar.lock().unwrap();
                match slot.as_ref() {
                    Some(bar) => {
                        bar.set_position(0);
                        bar.set_message(message);
                    }
                    None => *slot = Some(self.make_bar(message)),
                }
            }
            Event::EncodingProgress {
                percent,
                output_bytes,
                speed,
                ..
            } => {
                if let Some(bar) = self.bar.lock().unwrap().as_ref() {
                    if let Some(percent) = percent {
                        bar.set_position((f64::from(*percent) * 10.0) as u64);
                    }
                    if *output_bytes > 0 {
                        bar.set_message(format!(
                            "{} ({}, {speed:.1}x)",
                            self.operation,
                            format_bytes(*output_bytes)
                        ));
                    }
                }
            }
            Event::EncodeFinished => {
                if let Some(bar) = self.bar.lock().unwrap().take() {
                    bar.finish_and_clear();
                }
            }
            Event::Warning { message } => {
                match self.bar.lock().unwrap().as_ref() {
                    Some(bar) => bar.println(format!("[WARN] {message}")),
                    None => eprintln!("[WARN] {message}"),
                }
            }
        }
    }
}

impl Drop for ProgressBarHandler {
    fn drop(&mut self) {
        // A failed or cancelled run never sees EncodeFinished; don't leave
        // a stuck bar on the terminal.
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.abandon();
            }
        }
    }
}
