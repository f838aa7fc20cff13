use clap::Parser;
use std::path::PathBuf;

use crate::geoip::DEFAULT_GEOIP_URL;

#[derive(Parser, Debug)]
#[command(
    name = "apache-log-counter",
    about = "Count access log entries by a field and show the most frequent values",
    version,
    long_about = None
)]
pub struct Args {
    /// Filtering conditions as JSON, e.g.
    /// '{"host":"203.0.113.7","remote_host":"example.com","status":200,
    /// "method":"POST","request_uri":"/xmlrpc.php","request":"POST /xmlrpc.php HTTP/1.1",
    /// "start_time":"10/Oct/2023:00:00:00","end_time":"11/Oct/2023:00:00:00"}'
    #[arg(short, long, default_value = "")]
    pub filter: String,

    /// Path to the access log file
    #[arg(short, long)]
    pub logfile: PathBuf,

    /// Field to count by: host, remote_host, status, request_uri, request or method
    #[arg(short, long)]
    pub count: String,

    /// Report unparsable lines and lookup failures
    #[arg(short, long)]
    pub debug: bool,

    /// Base URL of the country lookup service
    #[arg(long, env = "APACHE_LOG_COUNTER_GEOIP_URL", default_value = DEFAULT_GEOIP_URL)]
    pub geoip_url: String,

    /// Timeout for a single country lookup, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Number of concurrent country lookups
    #[arg(short, long)]
    pub workers: Option<usize>,
}
