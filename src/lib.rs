pub mod args;
pub mod counter;
pub mod dimension;
pub mod error;
pub mod filter;
pub mod geoip;
pub mod record;
pub mod stats;
pub mod utils;

pub use args::Args;
pub use counter::{build_report, count_log_file, print_report, ReportRow};
pub use dimension::{Aggregator, Dimension};
pub use error::{CounterError, EnrichmentError, RecordParseError, TimeParseError};
pub use filter::{Filter, FilterCriteria};
pub use geoip::{Country, CountryLookup, GeoIpClient};
pub use stats::{AnalysisResult, FrequencyTable, RankedEntry, TOP_ENTRIES};
