use std::path::PathBuf;

/// Fatal errors. Any of these aborts the run before a report is produced.
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("failed to parse filter parameter")]
    ConfigParse(#[from] serde_json::Error),

    #[error("can't load log file {path:?}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "count parameter is invalid: '{0}' (expected one of host, remote_host, status, request_uri, request, method)"
    )]
    UnrecognizedDimension(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TimeParseError {
    #[error("failed to parse {field} '{value}': {source}")]
    Format {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("{field} '{value}' does not exist in the local time zone")]
    NonexistentLocal { field: &'static str, value: String },
}

impl TimeParseError {
    /// Filter key the bad value came from.
    pub fn field(&self) -> &'static str {
        match self {
            TimeParseError::Format { field, .. } | TimeParseError::NonexistentLocal { field, .. } => {
                *field
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordParseError {
    #[error("line does not look like an access log entry")]
    Unrecognized,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid status '{0}'")]
    Status(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("cannot build lookup url for '{0}'")]
    Url(String),

    #[error("lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("lookup service answered {0}")]
    Status(reqwest::StatusCode),

    #[error("cannot decode lookup response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("lookup service error: {0}")]
    Service(String),
}
