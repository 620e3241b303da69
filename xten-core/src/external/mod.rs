//! Interactions with the external encoding engine (ffmpeg/ffprobe).
//!
//! The engine is a collaborator, never reimplemented: this module builds
//! argument vectors, spawns child processes, and parses their structured
//! output. Everything else in the crate is pure with respect to the
//! filesystem and the process table.

use crate::error::{CoreError, CoreResult};

use std::io;
use std::process::{Command, Stdio};

pub mod ffmpeg;
pub mod ffmpeg_executor;
pub mod ffprobe_executor;

pub use ffmpeg::{Invocation, OverwritePolicy};
pub use ffprobe_executor::MediaProbe;

/// Checks that a required external command is present and executable.
///
/// Runs `<cmd> -version` and discards the output. A missing binary is an
/// environment problem the caller cannot fix by retrying, so it is
/// reported once as `DependencyNotFound` and the operation aborts.
pub fn check_dependency(cmd_name: &str) -> CoreResult<()> {
    let result = Command::new(cmd_name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(_) => {
            log::debug!("Found dependency: {cmd_name}");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Dependency '{cmd_name}' not found on PATH.");
            Err(CoreError::DependencyNotFound(cmd_name.to_string()))
        }
        Err(e) => {
            log::error!("Failed to start dependency check for '{cmd_name}': {e}");
            Err(CoreError::CommandStart(cmd_name.to_string(), e))
        }
    }
}

/// Determines if an ffmpeg stderr message is known noise rather than a
/// real problem.
pub(crate) fn is_non_critical_ffmpeg_message(message: &str) -> bool {
    message.contains("deprecated pixel format")
        || message.contains("Stream map")
        || message.contains("automatically inserted filter")
        || message.contains("Timestamps are unset")
        || message.contains("Queue input is backward")
        || message.contains("first frame is no keyframe")
}
