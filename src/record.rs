use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::RecordParseError;

pub const LOG_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One parsed access log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub host: String,
    pub virtual_host: String,
    pub time: DateTime<FixedOffset>,
    pub request: String,
    pub method: String,
    pub request_uri: String,
    pub status: u16,
}

fn apache_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"^(?:(?P<vhost>\S+)\s+)?(?P<host>\S+)\s+\S+\s+\S+\s+\[(?P<time>[^\]]+)\]\s+"(?P<request>(?:[^"\\]|\\.)*)"\s+(?P<status>\S+)\s+\S+"#,
        )
        .expect("access log pattern is valid")
    })
}

/// Parses a combined/common log line (optionally vhost-prefixed) or an LTSV line.
pub fn parse_line(line: &str) -> Result<LogRecord, RecordParseError> {
    if is_ltsv(line) {
        parse_ltsv(line)
    } else {
        parse_apache(line)
    }
}

fn is_ltsv(line: &str) -> bool {
    ["host:", "time:"]
        .iter()
        .any(|label| line.starts_with(label) || line.contains(&format!("\t{label}")))
}

fn parse_apache(line: &str) -> Result<LogRecord, RecordParseError> {
    let caps = apache_pattern()
        .captures(line)
        .ok_or(RecordParseError::Unrecognized)?;
    let field = |name: &str| caps.name(name).map_or("", |m| m.as_str());

    // `%v:%p` prefix keeps only the server name
    let vhost = field("vhost");
    let vhost = vhost.rsplit_once(':').map_or(vhost, |(name, _)| name);

    let request = field("request");
    let (method, request_uri) = split_request(request);

    Ok(LogRecord {
        host: field("host").to_string(),
        virtual_host: vhost.to_string(),
        time: parse_time(field("time"))?,
        request: request.to_string(),
        method,
        request_uri,
        status: parse_status(field("status"))?,
    })
}

fn parse_ltsv(line: &str) -> Result<LogRecord, RecordParseError> {
    let mut labels = HashMap::new();
    for pair in line.split('\t') {
        if let Some((label, value)) = pair.split_once(':') {
            labels.insert(label, value);
        }
    }
    let field = |label: &str| labels.get(label).copied().unwrap_or("");

    let host = field("host");
    if host.is_empty() {
        return Err(RecordParseError::MissingField("host"));
    }
    let time = labels
        .get("time")
        .ok_or(RecordParseError::MissingField("time"))?
        .trim_start_matches('[')
        .trim_end_matches(']');
    let status = labels
        .get("status")
        .ok_or(RecordParseError::MissingField("status"))?;

    let (mut method, mut request_uri) = (field("method").to_ascii_uppercase(), field("uri").to_string());
    let request = match field("req") {
        "" => [method.as_str(), request_uri.as_str(), field("protocol")]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        req => {
            if method.is_empty() && request_uri.is_empty() {
                (method, request_uri) = split_request(req);
            }
            req.to_string()
        }
    };

    Ok(LogRecord {
        host: host.to_string(),
        virtual_host: field("vhost").to_string(),
        time: parse_time(time)?,
        request,
        method,
        request_uri,
        status: parse_status(status)?,
    })
}

/// Method and URI of a request line. Anything other than two or more
/// whitespace-separated parts yields empty strings.
fn split_request(request: &str) -> (String, String) {
    let mut parts = request.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(uri)) => (method.to_ascii_uppercase(), uri.to_string()),
        _ => (String::new(), String::new()),
    }
}

fn parse_time(value: &str) -> Result<DateTime<FixedOffset>, RecordParseError> {
    DateTime::parse_from_str(value, LOG_TIME_FORMAT).map_err(|source| {
        RecordParseError::Timestamp {
            value: value.to_string(),
            source,
        }
    })
}

fn parse_status(value: &str) -> Result<u16, RecordParseError> {
    match value.parse::<u16>() {
        Ok(status) if (100..1000).contains(&status) => Ok(status),
        _ => Err(RecordParseError::Status(value.to_string())),
    }
}
