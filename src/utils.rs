use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::args::Args;
use crate::dimension::Dimension;
use crate::filter::{Filter, FilterCriteria};
use crate::stats::TOP_ENTRIES;

/// Logs go to stderr; stdout carries only the report.
pub fn setup_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

/// Settings for one run, built once from the command line.
#[derive(Debug, Clone)]
pub struct CountConfig {
    pub logfile: PathBuf,
    pub filter: Filter,
    pub dimension: Dimension,
    pub geoip_url: Url,
    pub timeout: Duration,
    pub workers: usize,
}

/// Validates arguments in the order a run depends on them: filter payload,
/// count dimension, then the numeric and URL options.
pub fn validate_args(args: &Args) -> anyhow::Result<CountConfig> {
    let criteria = FilterCriteria::from_json(&args.filter)?;
    let dimension: Dimension = args.count.parse()?;

    if args.timeout == 0 {
        anyhow::bail!("--timeout must be greater than 0");
    }

    if let Some(workers) = args.workers {
        if workers == 0 {
            anyhow::bail!("--workers must be greater than 0");
        }
    }

    let geoip_url = Url::parse(&args.geoip_url)
        .map_err(|e| anyhow::anyhow!("invalid --geoip-url '{}': {}", args.geoip_url, e))?;
    if !matches!(geoip_url.scheme(), "http" | "https") {
        anyhow::bail!("--geoip-url must be an http or https URL");
    }

    let workers = args
        .workers
        .unwrap_or_else(|| std::cmp::min(num_cpus::get(), TOP_ENTRIES));

    Ok(CountConfig {
        logfile: args.logfile.clone(),
        filter: Filter::new(criteria),
        dimension,
        geoip_url,
        timeout: Duration::from_secs(args.timeout),
        workers,
    })
}
