//! Terminal presentation helpers and output path resolution.

use console::style;
use std::path::{Path, PathBuf};

use xten_core::{Outcome, format_bytes, format_duration};

/// Print a section heading with a separator line.
pub fn print_section(text: &str) {
    println!();
    println!("{}", style(format!("=== {text} ===")).cyan().bold());
}

/// Print a label/value status line.
pub fn print_status(label: &str, value: &str) {
    println!("{} {value}", style(format!("{label}:")).bold());
}

pub fn print_success(message: &str) {
    println!("{} {message}", style("[OK]").green());
}

pub fn print_warning(message: &str) {
    println!("{} {message}", style("[WARN]").yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{} {message}", style("Error:").red().bold());
}

/// Picks a collision-free output path by appending `_1`, `_2`, ... to the
/// stem. With `force` the base path is used as-is and ffmpeg overwrites.
#[must_use]
pub fn resolve_output_path(base: &Path, force: bool) -> PathBuf {
    if force || !base.exists() {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = base.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{stem}_{counter}{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Default output path for a compression: `<stem>_xten.mp4` next to the input.
#[must_use]
pub fn default_compress_output(input: &Path) -> PathBuf {
    sibling_with_suffix(input, "_xten")
}

/// Default output path for a trim: `<stem>_xten_trim.mp4` next to the input.
#[must_use]
pub fn default_trim_output(input: &Path) -> PathBuf {
    sibling_with_suffix(input, "_xten_trim")
}

fn sibling_with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{stem}{suffix}.mp4"))
}

/// Parses a human size spec: `8mb`, `1.5gb`, `500kb`, `8MiB`, or raw bytes.
/// Units are binary, matching how targets are budgeted.
#[must_use]
pub fn parse_size_spec(spec: &str) -> Option<u64> {
    let normalized = spec.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }

    let (number, multiplier) = if let Some(stripped) = normalized
        .strip_suffix("gib")
        .or_else(|| normalized.strip_suffix("gb"))
        .or_else(|| normalized.strip_suffix('g'))
    {
        (stripped, 1024u64 * 1024 * 1024)
    } else if let Some(stripped) = normalized
        .strip_suffix("mib")
        .or_else(|| normalized.strip_suffix("mb"))
        .or_else(|| normalized.strip_suffix('m'))
    {
        (stripped, 1024 * 1024)
    } else if let Some(stripped) = normalized
        .strip_suffix("kib")
        .or_else(|| normalized.strip_suffix("kb"))
        .or_else(|| normalized.strip_suffix('k'))
    {
        (stripped, 1024)
    } else if let Some(stripped) = normalized.strip_suffix('b') {
        (stripped, 1)
    } else {
        (normalized.as_str(), 1)
    };

    let value = number.trim().parse::<f64>().ok()?;
    if value <= 0.0 || !value.is_finite() {
        return None;
    }
    Some((value * multiplier as f64) as u64)
}

/// Prints the terminal outcome and maps it to the process exit code.
///
/// Every outcome variant has a distinct code so scripts can branch:
/// 0 success, 2 size mismatch, 3 process failure, 4 cancelled.
pub fn report_outcome(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Success {
            actual_bytes,
            actual_duration_secs,
        } => {
            println!();
            print_status("Final size", &format_bytes(*actual_bytes));
            print_status("Duration", &format_duration(*actual_duration_secs));
            print_success("Done.");
            0
        }
        Outcome::SizeMismatch {
            actual_bytes,
            target_bytes,
            delta_ratio,
        } => {
            println!();
            print_status("Final size", &format_bytes(*actual_bytes));
            print_status("Target size", &format_bytes(*target_bytes));
            print_warning(&format!(
                "Output missed the target by {:+.1}%. Consider adjusting the target or using --crf.",
                delta_ratio * 100.0
            ));
            2
        }
        Outcome::ProcessFailed {
            exit_code,
            diagnostic_tail,
        } => {
            print_error(&match exit_code {
                Some(code) => format!("ffmpeg failed with exit code {code}."),
                None => "ffmpeg was terminated by a signal.".to_string(),
            });
            if !diagnostic_tail.is_empty() {
                eprintln!("{}", style("--- engine diagnostics ---").dim());
                eprintln!("{diagnostic_tail}");
            }
            3
        }
        Outcome::Cancelled => {
            println!();
            print_warning("Cancelled. Any partial output file was left in place.");
            4
        }
    }
}
