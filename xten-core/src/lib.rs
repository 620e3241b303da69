//! Core library for the xten media utility.
//!
//! Plans, invokes, and supervises ffmpeg to compress and trim video files
//! predictably and non-destructively. The pipeline is probe -> plan ->
//! build -> supervise -> verify; each stage hands an immutable value to the
//! next, and the only mutable state in flight is the transient progress
//! stream.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use xten_core::{CancellationToken, CompressionRequest, CompressionTarget, CoreConfig};
//! use xten_core::events::EventDispatcher;
//!
//! let config = CoreConfig::default();
//! let request = CompressionRequest {
//!     input: PathBuf::from("talk.mp4"),
//!     output: PathBuf::from("talk_xten.mp4"),
//!     target: CompressionTarget::BySize { bytes: 8_000_000 },
//!     audio_bitrate_kbps: None,
//!     force: false,
//! };
//!
//! let job = xten_core::prepare_compression(&request, &config).unwrap();
//! let dispatcher = EventDispatcher::new();
//! let cancel = CancellationToken::new();
//! let outcome = xten_core::execute_prepared(&job, &dispatcher, &cancel, &config).unwrap();
//! println!("{outcome:?}");
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod external;
pub mod planning;
pub mod processing;
pub mod trim;
pub mod utils;
pub mod validation;

// Re-exports for the public API
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use external::ffmpeg::{Invocation, OverwritePolicy};
pub use external::ffmpeg_executor::CancellationToken;
pub use external::ffprobe_executor::{MediaProbe, probe_media, probe_raw_json};
pub use external::check_dependency;
pub use planning::{CompressionTarget, EncodePlan, PassCount, plan_encode};
pub use processing::{
    CompressionRequest, JobKind, PreparedJob, TrimRequest, execute_prepared, prepare_compression,
    prepare_trim,
};
pub use trim::{TrimMode, TrimWindow, plan_trim};
pub use utils::{format_bytes, format_duration, parse_ffmpeg_time, parse_timestamp};

/// Terminal result of one supervised operation.
///
/// Every variant maps to a distinct caller-visible status so the CLI can
/// choose distinct exit codes. `SizeMismatch` and `Cancelled` are
/// first-class outcomes, not errors: the plan executed, and the caller
/// decides what the result is worth.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The engine finished and verification (if any) passed.
    Success {
        actual_bytes: u64,
        actual_duration_secs: f64,
    },
    /// The encode finished but landed outside the size tolerance band.
    SizeMismatch {
        actual_bytes: u64,
        target_bytes: u64,
        /// Signed miss as a fraction of the target (+0.2 = 20% over).
        delta_ratio: f64,
    },
    /// The engine exited non-zero; the retained diagnostic tail explains.
    ProcessFailed {
        exit_code: Option<i32>,
        diagnostic_tail: String,
    },
    /// Cancellation was requested and honored. Partial output, if any,
    /// is left in place.
    Cancelled,
}
