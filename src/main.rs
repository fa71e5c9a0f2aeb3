//! Network Speed Tester - Main CLI Application
//!
//! Measures latency, jitter, download and upload bandwidth against a
//! speedtest backend and prints a shareable result link.

use clap::Parser;
use network_speed_tester::{
    cli::Cli,
    config::{load_config, validate_config, EnvManager, ValidationLevel},
    error::{AppError, ErrorReporter, Result},
    models::Config,
    orchestrator::{RunOutcome, TestOrchestrator},
    output::{LiveDisplay, OutputFormatter, OutputFormatterFactory},
    BUILD_TIME, GIT_COMMIT, PKG_NAME, TARGET_TRIPLE, VERSION,
};
use std::path::Path;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue at: https://github.com/MaurUppi/network-speed-tester/issues");
        process::exit(99);
    }));

    let cli = Cli::parse();
    let json = cli.json;
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if let Err(e) = run_application(cli).await {
        if json {
            let formatter = OutputFormatterFactory::create_formatter(false, false, true);
            if let Ok(line) = formatter.format_error(&e.to_string()) {
                println!("{}", line);
            }
        } else {
            reporter.report_error(&e);
            print_error_suggestions(&e);
        }

        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    cli.validate().map_err(AppError::config)?;

    if cli.init_env {
        return write_example_env();
    }

    if cli.debug {
        eprintln!("{} v{} ({} {}, built {})", PKG_NAME, VERSION, GIT_COMMIT, TARGET_TRIPLE, BUILD_TIME);
        eprintln!("{}", cli.get_config_summary());
    }

    let config = load_config(cli)?;
    let formatter: Arc<dyn OutputFormatter> = Arc::from(OutputFormatterFactory::create_formatter(
        config.enable_color,
        config.verbose,
        config.json_output,
    ));

    print_config_warnings(&config, formatter.as_ref())?;

    if config.debug {
        eprintln!("{}", network_speed_tester::config::display_config_summary(&config));
    }

    let orchestrator = TestOrchestrator::from_config(&config).await?;

    if !config.json_output {
        println!("{}", formatter.format_header("Network Speed Test")?);
    }

    let isp = orchestrator.lookup_isp().await;
    if !config.json_output {
        println!("{}", formatter.format_isp(&isp)?);
    }

    let live = (!config.json_output).then(|| LiveDisplay::start(orchestrator.board(), formatter.clone()));
    let outcome = orchestrator.run().await;
    if let Some(live) = live {
        live.finish();
    }

    match outcome? {
        RunOutcome::Completed(report) => {
            println!("{}", formatter.format_report(&report)?);
            if !config.json_output && config.share_results && report.share_url.is_none() {
                eprintln!("{}", formatter.format_warning("Results could not be shared")?);
            }
            Ok(())
        }
        RunOutcome::AlreadyRunning => Err(AppError::internal("A speed test is already running")),
    }
}

/// Write an example .env next to the binary's working directory
fn write_example_env() -> Result<()> {
    let path = Path::new(".env");
    if path.exists() {
        return Err(AppError::config("Refusing to overwrite existing .env file"));
    }

    EnvManager::save_example_env_file(path)?;
    println!("Wrote example configuration to {}", path.display());
    Ok(())
}

/// Warnings always print; informational advisories only when verbose
fn print_config_warnings(config: &Config, formatter: &dyn OutputFormatter) -> Result<()> {
    for warning in validate_config(config)? {
        let show = match warning.level {
            ValidationLevel::Info => config.verbose,
            ValidationLevel::Warning | ValidationLevel::Error => true,
        };
        if show && !config.json_output {
            eprintln!("{}", formatter.format_warning(&warning.message)?);
        }
    }
    Ok(())
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format (run with --init-env for an example)");
            eprintln!("  - The server URL must start with http:// or https://");
            eprintln!("  - Phase durations must be between 1 and 120 seconds");
        }
        AppError::Network(_) | AppError::HttpRequest(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify the speedtest server is reachable");
            eprintln!("  - Verify firewall and proxy settings");
        }
        AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Timeout troubleshooting:");
            eprintln!("  - Increase timeout with --timeout option");
            eprintln!("  - Try a server closer to you");
        }
        _ => {}
    }
}
