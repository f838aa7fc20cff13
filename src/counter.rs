use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dimension::{Aggregator, Dimension};
use crate::error::{CounterError, EnrichmentError};
use crate::filter::Filter;
use crate::geoip::{self, Country, CountryLookup};
use crate::record::parse_line;
use crate::stats::{top, AnalysisResult, LineStats, RankedEntry};

/// Opens `path` and counts its lines. See [`count_lines`].
pub fn count_log_file(
    path: &Path,
    filter: &Filter,
    dimension: Dimension,
) -> Result<AnalysisResult, CounterError> {
    info!(action = "open", component = "log_file", file_path = ?path, "Opening log file");
    let file = File::open(path).map_err(|source| CounterError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(count_lines(BufReader::new(file), filter, dimension))
}

/// Single pass over the input: parse, filter, then count by `dimension`.
///
/// Unparsable lines are skipped. A malformed time bound is reported once per
/// bound and excludes the record. A read error ends the pass early; whatever
/// was counted up to that point is still returned.
pub fn count_lines<R: BufRead>(mut reader: R, filter: &Filter, dimension: Dimension) -> AnalysisResult {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "aggregation",
        dimension = %dimension,
        "Starting log aggregation"
    );

    let mut aggregator = Aggregator::new(dimension);
    let mut stats = LineStats::default();
    let mut reported_bounds: Vec<&'static str> = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!(action = "read", component = "aggregation", line_number = stats.lines_read + 1, error = %e, "Error while reading log");
                break;
            }
        }
        stats.lines_read += 1;

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }

        let record = match parse_line(line) {
            Ok(record) => record,
            Err(e) => {
                stats.parse_failures += 1;
                debug!(action = "parse", component = "aggregation", line_number = stats.lines_read, error = %e, "Skipping unparsable line");
                continue;
            }
        };

        match filter.excludes(&record) {
            Ok(false) => {
                stats.accepted += 1;
                aggregator.add(&record);
            }
            Ok(true) => stats.filtered += 1,
            Err(errors) => {
                stats.time_errors += 1;
                for e in errors {
                    if !reported_bounds.contains(&e.field()) {
                        reported_bounds.push(e.field());
                        error!(action = "filter", component = "aggregation", field = e.field(), error = %e, "Time filter is invalid, excluding records");
                    }
                }
            }
        }
    }

    let table = aggregator.finish();
    info!(
        action = "complete",
        component = "aggregation",
        lines_read = stats.lines_read,
        parse_failures = stats.parse_failures,
        filtered = stats.filtered,
        time_errors = stats.time_errors,
        accepted = stats.accepted,
        unique_keys = table.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Log aggregation completed"
    );

    AnalysisResult { table, stats }
}

/// One rendered report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub entry: RankedEntry,
    /// `None` unless the dimension is enriched. Failed lookups render blank.
    pub country: Option<Country>,
}

impl ReportRow {
    pub fn render(&self) -> String {
        match &self.country {
            Some(country) => format!(
                "{} {} {} {}",
                self.entry.key, country.iso_code, country.name, self.entry.count
            ),
            None => format!("{} {}", self.entry.key, self.entry.count),
        }
    }
}

/// Ranks the table, keeps the top entries and, for enriched dimensions,
/// attaches country information. Lookup failures never abort the report.
pub fn build_report<L: CountryLookup>(
    result: AnalysisResult,
    dimension: Dimension,
    lookup: Option<&L>,
    workers: usize,
) -> Vec<ReportRow> {
    let ranked = result.table.rank();
    let shown = top(&ranked);

    let countries: Vec<Option<Country>> = match lookup {
        Some(lookup) if dimension.is_enriched() => geoip::enrich(lookup, shown, workers)
            .into_iter()
            .zip(shown)
            .map(|(found, entry)| Some(found.unwrap_or_else(|e| lookup_failed(&entry.key, e))))
            .collect(),
        _ => vec![None; shown.len()],
    };

    shown
        .iter()
        .cloned()
        .zip(countries)
        .map(|(entry, country)| ReportRow { entry, country })
        .collect()
}

fn lookup_failed(key: &str, e: EnrichmentError) -> Country {
    warn!(action = "lookup", component = "enrichment", key = key, error = %e, "Country lookup failed");
    Country::default()
}

pub fn print_report<W: Write>(rows: &[ReportRow], out: W) -> io::Result<()> {
    let mut out = io::BufWriter::new(out);
    for row in rows {
        writeln!(out, "{}", row.render())?;
    }
    out.flush()
}
