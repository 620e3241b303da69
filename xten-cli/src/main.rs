// xten-cli/src/main.rs
//
// Entry point for the xten CLI. Parses arguments, installs the Ctrl-C
// cancellation handler, dispatches to the subcommand implementations, and
// maps every terminal state to a distinct process exit code:
//
//   0  success
//   1  unexpected error (I/O, engine unavailable, ...)
//   2  encode finished but missed the size target
//   3  the engine process failed
//   4  cancelled by the user
//   5  validation error (bad range, infeasible target, invalid quality)

use clap::Parser;
use std::process;

use xten_core::CancellationToken;

mod cli;
mod commands;
mod logging;
mod output;
mod progress;

use cli::{Cli, Commands};

fn main() {
    logging::init();
    let parsed = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            eprintln!("\nCancelling - asking ffmpeg to stop gracefully...");
            cancel.cancel();
        }) {
            log::warn!("Could not install Ctrl-C handler: {e}");
        }
    }

    let result = match parsed.command {
        Commands::Compress(args) => commands::compress::run_compress(args, &cancel),
        Commands::Trim(args) => commands::trim::run_trim(args, &cancel),
        Commands::Info(args) => commands::info::run_info(args),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&e.to_string());
            if e.is_validation() { 5 } else { 1 }
        }
    };
    process::exit(code);
}
