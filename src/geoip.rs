use rayon::prelude::*;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

use crate::error::EnrichmentError;
use crate::stats::RankedEntry;

pub const DEFAULT_GEOIP_URL: &str = "https://geoipapi-216405.appspot.com/";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Country {
    pub iso_code: String,
    pub name: String,
}

/// Resolves the country an address belongs to.
pub trait CountryLookup: Sync {
    fn lookup(&self, ip: &str) -> Result<Country, EnrichmentError>;
}

#[derive(Debug, Deserialize)]
struct GeoIpResponse {
    #[serde(default)]
    iso_code: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    error: Option<String>,
}

impl GeoIpResponse {
    fn into_result(self) -> Result<Country, EnrichmentError> {
        match self.error {
            Some(message) if !message.is_empty() => Err(EnrichmentError::Service(message)),
            _ => Ok(Country {
                iso_code: self.iso_code,
                name: self.country,
            }),
        }
    }
}

/// HTTP client for a service answering `GET <base>/<ip>` with
/// `{"iso_code", "country", "error"}`.
#[derive(Debug, Clone)]
pub struct GeoIpClient {
    base_url: Url,
    client: reqwest::blocking::Client,
}

impl GeoIpClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, EnrichmentError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: Url, client: reqwest::blocking::Client) -> Self {
        Self { base_url, client }
    }

    pub fn lookup_url(&self, ip: &str) -> Result<Url, EnrichmentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EnrichmentError::Url(ip.to_string()))?
            .pop_if_empty()
            .push(ip);
        Ok(url)
    }
}

impl CountryLookup for GeoIpClient {
    fn lookup(&self, ip: &str) -> Result<Country, EnrichmentError> {
        let url = self.lookup_url(ip)?;
        debug!(action = "request", component = "geoip", url = %url, "Looking up country");

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status));
        }

        let body = response.bytes()?;
        let decoded: GeoIpResponse =
            serde_json::from_slice(&body).map_err(EnrichmentError::Decode)?;
        decoded.into_result()
    }
}

/// Looks up every entry on a pool of `workers` threads. Results line up
/// with `entries`.
pub fn enrich<L: CountryLookup>(
    lookup: &L,
    entries: &[RankedEntry],
    workers: usize,
) -> Vec<Result<Country, EnrichmentError>> {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "enrichment",
        entry_count = entries.len(),
        worker_count = workers,
        "Starting country lookups"
    );

    let run = || {
        entries
            .par_iter()
            .map(|entry| lookup.lookup(&entry.key))
            .collect::<Vec<_>>()
    };
    let results = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(run),
        Err(e) => {
            debug!(action = "fallback", component = "enrichment", error = %e, "Using global thread pool");
            run()
        }
    };

    info!(
        action = "complete",
        component = "enrichment",
        failures = results.iter().filter(|r| r.is_err()).count(),
        duration_ms = start_time.elapsed().as_millis(),
        "Country lookups completed"
    );
    results
}
