use anyhow::{anyhow, Context, Result};
use clap::Parser;
use owo_colors::{OwoColorize, Stream, Style};
use std::time::Instant;
use tracing::{debug, info};

use apache_log_counter::utils::{setup_logging, validate_args, CountConfig};
use apache_log_counter::{build_report, count_log_file, print_report, Args, GeoIpClient};

fn run(config: &CountConfig) -> Result<()> {
    let total_start_time = Instant::now();
    let result = count_log_file(&config.logfile, &config.filter, config.dimension)?;

    let client = if config.dimension.is_enriched() {
        // Display only: the enrichment error already inlines its cause
        let client = GeoIpClient::new(config.geoip_url.clone(), config.timeout)
            .map_err(|e| anyhow!("failed to build lookup client: {e}"))?;
        Some(client)
    } else {
        None
    };
    let rows = build_report(result, config.dimension, client.as_ref(), config.workers);

    print_report(&rows, std::io::stdout().lock()).context("failed to write report")?;

    info!(
        action = "complete",
        component = "run",
        rows = rows.len(),
        duration_ms = total_start_time.elapsed().as_millis(),
        "Run completed"
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    setup_logging(args.debug);

    let outcome = validate_args(&args).and_then(|config| run(&config));
    if let Err(e) = outcome {
        debug!(error = ?e, "Run failed");
        eprintln!(
            "{} {:#}",
            "error:".if_supports_color(Stream::Stderr, |t| t.style(Style::new().red().bold())),
            e
        );
        std::process::exit(1);
    }
}
