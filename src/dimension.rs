use std::fmt;
use std::str::FromStr;

use crate::error::CounterError;
use crate::record::LogRecord;
use crate::stats::FrequencyTable;

/// Field a run aggregates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Host,
    RemoteHost,
    Status,
    RequestUri,
    Request,
    Method,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Host,
        Dimension::RemoteHost,
        Dimension::Status,
        Dimension::RequestUri,
        Dimension::Request,
        Dimension::Method,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Host => "host",
            Dimension::RemoteHost => "remote_host",
            Dimension::Status => "status",
            Dimension::RequestUri => "request_uri",
            Dimension::Request => "request",
            Dimension::Method => "method",
        }
    }

    pub fn key(self, record: &LogRecord) -> String {
        match self {
            Dimension::Host => record.host.clone(),
            Dimension::RemoteHost => record.virtual_host.clone(),
            Dimension::Status => record.status.to_string(),
            Dimension::RequestUri => record.request_uri.clone(),
            Dimension::Request => record.request.clone(),
            Dimension::Method => record.method.clone(),
        }
    }

    /// Only remote host keys are looked up for country information.
    pub fn is_enriched(self) -> bool {
        self == Dimension::RemoteHost
    }
}

impl FromStr for Dimension {
    type Err = CounterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| CounterError::UnrecognizedDimension(s.to_string()))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counts accepted records by one dimension.
#[derive(Debug)]
pub struct Aggregator {
    dimension: Dimension,
    table: FrequencyTable,
}

impl Aggregator {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            table: FrequencyTable::new(),
        }
    }

    pub fn add(&mut self, record: &LogRecord) {
        self.table.increment(&self.dimension.key(record));
    }

    pub fn finish(self) -> FrequencyTable {
        self.table
    }
}
