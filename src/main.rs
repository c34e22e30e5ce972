use clap::Parser;
use multicrawl::{CrawlOutcome, RunError, report};
use std::process::ExitCode;

mod args;
use args::{Args, build_config};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    ::log::info!(
        "Starting crawl from {} start URL(s) with max depth {}",
        config.start_urls().len(),
        config.max_depth()
    );

    let start_time = std::time::Instant::now();
    let outcome = match multicrawl::run(&config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            ::log::error!("Failed to start crawler: {}", e);
            eprintln!("Failed to start crawler: {}", e);
            return ExitCode::from(run_error_status(&e));
        }
    };

    let duration = start_time.elapsed();
    ::log::info!(
        "Crawling complete - {} pages ({} broken) in {:.2} seconds",
        outcome.pages.len(),
        outcome.broken_count(),
        duration.as_secs_f64()
    );
    for failure in &outcome.failures {
        ::log::warn!("Task for {} failed: {}", failure.url, failure.reason);
    }

    if args.json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                ::log::error!("Failed to serialize crawl outcome: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else if let Err(e) = report::write_report(&args.output, &outcome.pages, config.start_urls()) {
        ::log::error!("Error writing report: {}", e);
        eprintln!("Error writing report: {}", e);
        return ExitCode::FAILURE;
    } else {
        println!("Report written to {}", args.output.display());
    }

    ExitCode::from(outcome_status(&outcome, args.fail_on_broken))
}

/// Configuration problems exit with 2, anything else that stops the crawl with 1
fn run_error_status(error: &RunError) -> u8 {
    match error {
        RunError::Config(_) => 2,
        RunError::HttpClient(_) => 1,
    }
}

/// Broken pages are part of the report and only fail the run when asked to
fn outcome_status(outcome: &CrawlOutcome, fail_on_broken: bool) -> u8 {
    if fail_on_broken && outcome.broken_count() > 0 {
        1
    } else {
        0
    }
}
