mod cli;
mod commands;
mod model;
mod tools;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_EXTRACTION_FAILED: i32 = 2;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(usage_exit_code(&err));
        }
    };

    init_tracing();

    std::process::exit(extraction_exit_code(commands::extract::run(cli)));
}

// --help and --version render on stdout and are not failures.
fn usage_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() { EXIT_USAGE } else { EXIT_OK }
}

fn extraction_exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => EXIT_OK,
        Err(err) => {
            error!(error = %err, "extraction failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            EXIT_EXTRACTION_FAILED
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    fn parse_error(args: &[&str]) -> clap::Error {
        Cli::try_parse_from(args).expect_err("arguments should be rejected")
    }

    #[test]
    fn wrong_positional_count_exits_with_usage_code() {
        assert_eq!(usage_exit_code(&parse_error(&["pdfocr"])), EXIT_USAGE);
        assert_eq!(
            usage_exit_code(&parse_error(&["pdfocr", "in.pdf", "out.txt"])),
            EXIT_USAGE
        );
        assert_eq!(
            usage_exit_code(&parse_error(&["pdfocr", "in.pdf", "out.txt", "imgs", "extra"])),
            EXIT_USAGE
        );
    }

    #[test]
    fn help_and_version_exit_successfully() {
        assert_eq!(usage_exit_code(&parse_error(&["pdfocr", "--help"])), EXIT_OK);
        assert_eq!(usage_exit_code(&parse_error(&["pdfocr", "--version"])), EXIT_OK);
    }

    #[test]
    fn rejected_arguments_touch_no_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.txt");
        let image_dir = dir.path().join("imgs");
        let output_arg = output.to_string_lossy().into_owned();

        let err = parse_error(&["pdfocr", "in.pdf", output_arg.as_str()]);

        assert_eq!(usage_exit_code(&err), EXIT_USAGE);
        assert!(!output.exists());
        assert!(!image_dir.exists());
    }

    #[test]
    fn extraction_errors_map_to_distinct_exit_code() {
        assert_eq!(extraction_exit_code(Ok(())), EXIT_OK);

        let failed: Result<()> =
            Err(anyhow!("permission denied").context("failed to open output file: out.txt"));
        assert_eq!(extraction_exit_code(failed), EXIT_EXTRACTION_FAILED);
        assert_ne!(EXIT_EXTRACTION_FAILED, EXIT_USAGE);
    }
}
