//! `ewc2html`: convert an EWC source file to HTML4, per spec §6.
//!
//! `ewc2html [--heading-depth N] [--compact] INPUT.txt OUTPUT.html`. Exit 0
//! on success, non-zero on I/O error. Grounded on `wiki-rs`'s own `main.rs`
//! argument-parsing idiom (`pico_args` plus a hand-rolled `thiserror` error
//! enum and a `usage()` function), simplified since this binary has no
//! network/async surface.

use ewc::Parser;
use std::ffi::OsStr;
use std::fs;

/// Errors that may occur when parsing arguments or doing file I/O.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Extra unknown junk on the command line.
    #[error("unknown arguments: {}", _0.display())]
    Extra(std::ffi::OsString),
    /// Missing the input file argument.
    #[error("missing INPUT.txt argument")]
    Input,
    /// Failed to read the input file.
    #[error("reading {path}: {source}")]
    Read { path: String, source: std::io::Error },
    /// Missing the output file argument.
    #[error("missing OUTPUT.html argument")]
    Output,
    /// Some other argument parsing error.
    #[error(transparent)]
    Pico(#[from] pico_args::Error),
    /// The source failed to parse.
    #[error(transparent)]
    Source(#[from] ewc::Error),
    /// Failed to write the output file.
    #[error("writing {path}: {source}")]
    Write { path: String, source: std::io::Error },
}

/// Command-line arguments.
struct Args {
    compact: bool,
    heading_depth: i32,
    input_path: String,
    output_path: String,
}

impl Args {
    fn new() -> Result<Args, CliError> {
        let mut args = pico_args::Arguments::from_env();
        let compact = args.contains("--compact");
        let heading_depth = args.opt_value_from_str("--heading-depth")?.unwrap_or(0);

        let input_path = args.opt_free_from_str::<String>()?.ok_or(CliError::Input)?;
        let output_path = args.opt_free_from_str::<String>()?.ok_or(CliError::Output)?;

        let rest = args.finish();
        if !rest.is_empty() {
            return Err(CliError::Extra(rest.join(OsStr::new(" "))));
        }

        Ok(Args { compact, heading_depth, input_path, output_path })
    }
}

/// Command line usage instructions.
fn usage() {
    let exe = std::env::args().next().unwrap_or_default();
    eprintln!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    eprintln!("Usage: {exe} [--heading-depth N] [--compact] INPUT.txt OUTPUT.html");
}

fn run() -> Result<(), CliError> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args = match Args::new() {
        Ok(args) => args,
        Err(err) => {
            usage();
            return Err(err);
        }
    };

    log::info!("Reading {}", args.input_path);
    let source = fs::read_to_string(&args.input_path)
        .map_err(|source| CliError::Read { path: args.input_path.clone(), source })?;

    let document = Parser::new().parse(&source)?;
    let html = document.render(args.heading_depth, args.compact);

    log::info!("Writing {}", args.output_path);
    fs::write(&args.output_path, &html)
        .map_err(|source| CliError::Write { path: args.output_path.clone(), source })?;

    Ok(())
}

/// Uses the [`Display`](core::fmt::Display) formatter for an error even when
/// the [`Debug`](core::fmt::Debug) formatter is requested.
struct DisplayError(CliError);

impl core::fmt::Debug for DisplayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

fn main() -> Result<(), DisplayError> {
    run().map_err(DisplayError)
}
