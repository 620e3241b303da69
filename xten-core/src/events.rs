//! Progress and status events emitted during supervised encodes.
//!
//! The supervisor is the producer; handlers (the CLI progress bar, a JSON
//! emitter, a test collector) are consumers. Events are ephemeral: they are
//! dispatched once and never persisted. The supervisor coalesces progress
//! to the configured refresh interval, so handlers never see more than
//! roughly ten updates per second however chatty ffmpeg is.

use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Event {
    /// A supervised operation is about to spawn its first pass.
    EncodeStarted {
        input: String,
        output: String,
        pass_count: u32,
    },

    /// An individual pass began (1-based).
    PassStarted { pass: u32, of: u32 },

    /// Rate-coalesced progress snapshot from the engine's diagnostic stream.
    EncodingProgress {
        /// Source seconds already processed.
        elapsed_secs: f64,
        /// Bytes written to the output so far.
        output_bytes: u64,
        /// Encoding speed relative to realtime.
        speed: f32,
        /// Percent of the current pass, when the duration is known.
        percent: Option<f32>,
        /// Estimated time remaining for the current pass.
        eta: Option<Duration>,
    },

    /// The child process exited cleanly for all passes.
    EncodeFinished,

    /// Non-fatal condition worth surfacing.
    Warning { message: String },
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

/// Fans events out to registered handlers in registration order.
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: Event) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collector(Mutex<Vec<String>>);

    impl EventHandler for Collector {
        fn handle(&self, event: &Event) {
            let label = match event {
                Event::EncodeStarted { .. } => "started",
                Event::PassStarted { .. } => "pass",
                Event::EncodingProgress { .. } => "progress",
                Event::EncodeFinished => "finished",
                Event::Warning { .. } => "warning",
            };
            self.0.lock().unwrap().push(label.to_string());
        }
    }

    #[test]
    fn test_dispatcher_fans_out_in_order() {
        let collector = Arc::new(Collector(Mutex::new(Vec::new())));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(collector.clone());

        dispatcher.emit(Event::PassStarted { pass: 1, of: 2 });
        dispatcher.emit(Event::EncodingProgress {
            elapsed_secs: 1.0,
            output_bytes: 1024,
            speed: 1.5,
            percent: Some(10.0),
            eta: None,
        });
        dispatcher.emit(Event::EncodeFinished);

        let seen = collector.0.lock().unwrap().clone();
        assert_eq!(seen, vec!["pass", "progress", "finished"]);
    }
}
