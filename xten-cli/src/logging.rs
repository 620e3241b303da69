// xten-cli/src/logging.rs
//
// Logging setup for the CLI. The core library logs through the standard
// `log` facade; env_logger turns RUST_LOG into console output:
// - RUST_LOG unset: warnings and errors only, keeping the terminal clean
// - RUST_LOG=info: operation planning and pass lifecycle logs
// - RUST_LOG=debug: full command lines and engine chatter (ffmpeg_log target)

use env_logger::Env;

/// Initializes env_logger with a quiet default filter.
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}
