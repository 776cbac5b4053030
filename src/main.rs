//! picgroup - group photos into date folders by their EXIF capture time

use anyhow::{Context, Result};
use clap::Parser;
use picgroup::{Cli, Config, Processor, RunReport, Verbosity};
use std::path::Path;
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colored summary output for the terminal

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    /// CLI theme colors
    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    pub fn print_title(title: &str) {
        let _ = stdout().execute(Print(style(title).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print one statistic; zero values are dimmed
    pub fn print_stat(key: &str, value: usize, color: Color) {
        let color = if value == 0 { CliTheme::HINT } else { color };
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(format!("{key:<16}")).with(CliTheme::HINT)));
        let _ = stdout().execute(Print(style(value.to_string()).with(color).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_key_value(key: &str, value: &str) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(format!("{key:<16}")).with(CliTheme::HINT)));
        let _ = stdout().execute(Print(style(value).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print a failed file and the reason
    pub fn print_failure(source: &str, reason: &str) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style("✗").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(source).italic()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(reason).with(CliTheme::HINT)));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let _guard = setup_logging(&cli, config.verbosity)?;

    info!(version = env!("CARGO_PKG_VERSION"), "picgroup starting");

    let verbosity = config.verbosity;
    let mut processor = Processor::new(config);

    match processor.run() {
        Ok(report) => {
            if verbosity != Verbosity::Off {
                print_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Processing failed");
            cli_output::print_error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let file_config = Config::load_from_file(config_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    if config.root.as_os_str().is_empty() {
        anyhow::bail!("No root directory given. Use -d <DIR> or set `root` in the config file");
    }

    Ok(config)
}

/// Setup logging to stderr and optionally to a file
///
/// The default level follows the verbosity; `RUST_LOG` overrides it.
fn setup_logging(cli: &Cli, verbosity: Verbosity) -> Result<Option<WorkerGuard>> {
    let level = match verbosity {
        Verbosity::Progress => Level::INFO,
        Verbosity::Off | Verbosity::Summary => Level::WARN,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    let Some(ref log_path) = cli.log_file else {
        subscriber.init();
        return Ok(None);
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(open_log_file(log_path)?);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
    }

    Ok(Some(guard))
}

fn open_log_file(log_path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))
}

fn print_report(report: &RunReport) {
    use cli_output::*;

    print_separator();
    print_title("Processing complete");
    print_separator();
    print_blank();
    print_stat("Scanned", report.scanned, CliTheme::ACCENT);
    print_stat("Classified", report.classified, CliTheme::ACCENT);
    print_stat("Relocated", report.relocated, CliTheme::SUCCESS);
    print_stat("Skipped", report.skipped, CliTheme::WARNING);
    print_stat("Failed", report.failed, CliTheme::ERROR);
    print_stat("Folders created", report.folders_created, CliTheme::SUCCESS);
    print_stat("Folder failures", report.folder_failures, CliTheme::ERROR);
    print_stat("Scan errors", report.scan_errors, CliTheme::WARNING);
    print_key_value("Elapsed", &format!("{:.2?}", report.elapsed));
    print_blank();

    if !report.failures.is_empty() {
        print_separator();
        print_error(&format!("{} files failed", report.failures.len()));
        print_blank();
        for failure in &report.failures {
            print_failure(
                &failure.source.display().to_string(),
                failure.error.as_deref().unwrap_or("unknown error"),
            );
        }
    }

    if report.skipped > 0 {
        print_hint("Skipped files already had a file with the same name at their destination");
    }
}
