use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{CounterError, TimeParseError};
use crate::record::LogRecord;

/// Layout of `start_time` / `end_time`, read in the local time zone.
pub const FILTER_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S";

/// Filter payload as given on the command line.
///
/// `None` means the criterion is unset and never excludes anything. Empty
/// strings and a zero status are folded into `None` on load.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub host: Option<String>,
    pub remote_host: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: Option<u16>,
    pub method: Option<String>,
    pub request_uri: Option<String>,
    pub request: Option<String>,
}

impl FilterCriteria {
    /// Parses a JSON filter payload. A blank or `null` payload means no
    /// filtering. Keys match case-insensitively, an exact-case key winning
    /// over a differently cased duplicate.
    pub fn from_json(payload: &str) -> Result<Self, CounterError> {
        if payload.trim().is_empty() {
            return Ok(Self::default());
        }
        let value = match serde_json::from_str(payload)? {
            Value::Null => return Ok(Self::default()),
            Value::Object(fields) => Value::Object(fold_keys(fields)),
            other => other,
        };
        let criteria: Self = serde_json::from_value(value)?;
        Ok(criteria.normalized())
    }

    fn normalized(self) -> Self {
        let set = |value: Option<String>| value.filter(|s| !s.is_empty());
        Self {
            host: set(self.host),
            remote_host: set(self.remote_host),
            start_time: set(self.start_time),
            end_time: set(self.end_time),
            status: self.status.filter(|&s| s != 0),
            method: set(self.method).map(|m| m.to_uppercase()),
            request_uri: set(self.request_uri),
            request: set(self.request),
        }
    }
}

type Bound = Option<Result<DateTime<Local>, TimeParseError>>;

/// Compiled filter. Time bounds are parsed once when the filter is built;
/// a malformed bound is kept as an error and reported on every evaluation.
#[derive(Debug, Clone)]
pub struct Filter {
    criteria: FilterCriteria,
    start: Bound,
    end: Bound,
}

impl Filter {
    pub fn new(criteria: FilterCriteria) -> Self {
        let criteria = criteria.normalized();
        let start = criteria
            .start_time
            .as_deref()
            .map(|value| parse_bound("start_time", value));
        let end = criteria
            .end_time
            .as_deref()
            .map(|value| parse_bound("end_time", value));
        Self {
            criteria,
            start,
            end,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn exclude_by_host(&self, host: &str) -> bool {
        excludes(&self.criteria.host, host)
    }

    pub fn exclude_by_remote_host(&self, remote_host: &str) -> bool {
        excludes(&self.criteria.remote_host, remote_host)
    }

    pub fn exclude_by_status(&self, status: u16) -> bool {
        self.criteria.status.is_some_and(|wanted| wanted != status)
    }

    /// The candidate is expected upper-cased already; the criterion is
    /// upper-cased when the filter is built.
    pub fn exclude_by_method(&self, method: &str) -> bool {
        excludes(&self.criteria.method, method)
    }

    pub fn exclude_by_request_uri(&self, request_uri: &str) -> bool {
        excludes(&self.criteria.request_uri, request_uri)
    }

    pub fn exclude_by_request(&self, request: &str) -> bool {
        excludes(&self.criteria.request, request)
    }

    /// Excludes records strictly before the start bound.
    pub fn exclude_by_start_time(
        &self,
        time: &DateTime<FixedOffset>,
    ) -> Result<bool, TimeParseError> {
        match &self.start {
            None => Ok(false),
            Some(Ok(bound)) => Ok(*time < *bound),
            Some(Err(e)) => Err(e.clone()),
        }
    }

    /// Excludes records strictly after the end bound.
    pub fn exclude_by_end_time(&self, time: &DateTime<FixedOffset>) -> Result<bool, TimeParseError> {
        match &self.end {
            None => Ok(false),
            Some(Ok(bound)) => Ok(*time > *bound),
            Some(Err(e)) => Err(e.clone()),
        }
    }

    /// Runs every predicate against a record. Both time bounds are checked
    /// once the field criteria pass, and every bound that failed to parse is
    /// returned; callers treat the record as excluded.
    pub fn excludes(&self, record: &LogRecord) -> Result<bool, Vec<TimeParseError>> {
        if self.exclude_by_host(&record.host)
            || self.exclude_by_remote_host(&record.virtual_host)
            || self.exclude_by_status(record.status)
            || self.exclude_by_method(&record.method)
            || self.exclude_by_request_uri(&record.request_uri)
            || self.exclude_by_request(&record.request)
        {
            return Ok(true);
        }

        let mut excluded = false;
        let mut errors = Vec::new();
        for check in [
            self.exclude_by_start_time(&record.time),
            self.exclude_by_end_time(&record.time),
        ] {
            match check {
                Ok(out_of_range) => excluded |= out_of_range,
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(excluded)
        } else {
            Err(errors)
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(FilterCriteria::default())
    }
}

fn fold_keys(fields: Map<String, Value>) -> Map<String, Value> {
    let (exact, other): (Vec<_>, Vec<_>) = fields
        .into_iter()
        .partition(|(key, _)| *key == key.to_lowercase());
    let mut folded = Map::new();
    for (key, value) in exact {
        folded.insert(key, value);
    }
    for (key, value) in other {
        folded.entry(key.to_lowercase()).or_insert(value);
    }
    folded
}

fn excludes(criterion: &Option<String>, candidate: &str) -> bool {
    criterion.as_deref().is_some_and(|wanted| wanted != candidate)
}

fn parse_bound(field: &'static str, value: &str) -> Result<DateTime<Local>, TimeParseError> {
    let naive = NaiveDateTime::parse_from_str(value, FILTER_TIME_FORMAT).map_err(|source| {
        TimeParseError::Format {
            field,
            value: value.to_string(),
            source,
        }
    })?;
    // Ambiguous wall-clock times (DST fold) resolve to the earlier instant
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| TimeParseError::NonexistentLocal {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_line;
    use pretty_assertions::assert_eq;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, s)
            .earliest()
            .unwrap()
            .fixed_offset()
    }

    fn filter(payload: &str) -> Filter {
        Filter::new(FilterCriteria::from_json(payload).unwrap())
    }

    #[test]
    fn unset_criteria_never_exclude() {
        for f in [filter(""), filter("{}"), Filter::default()] {
            assert!(!f.exclude_by_host(""));
            assert!(!f.exclude_by_host("example.com"));
            assert!(!f.exclude_by_remote_host("1.2.3.4"));
            assert!(!f.exclude_by_status(500));
            assert!(!f.exclude_by_method("GET"));
            assert!(!f.exclude_by_request_uri("/"));
            assert!(!f.exclude_by_request("GET / HTTP/1.1"));
            assert!(!f.exclude_by_start_time(&local(2000, 1, 1, 0, 0, 0)).unwrap());
            assert!(!f.exclude_by_end_time(&local(2100, 1, 1, 0, 0, 0)).unwrap());
        }
    }

    #[test]
    fn empty_and_zero_values_are_unset() {
        let criteria = FilterCriteria::from_json(
            r#"{"host":"","remote_host":"","status":0,"method":"","request_uri":"","request":"","start_time":"","end_time":""}"#,
        )
        .unwrap();
        assert_eq!(criteria, FilterCriteria::default());
    }

    #[test]
    fn null_payload_means_no_filter() {
        assert_eq!(FilterCriteria::from_json("null").unwrap(), FilterCriteria::default());
        assert_eq!(
            FilterCriteria::from_json(r#"{"host":null,"status":null}"#).unwrap(),
            FilterCriteria::default()
        );
    }

    #[test]
    fn keys_match_case_insensitively() {
        let criteria =
            FilterCriteria::from_json(r#"{"HOST":"10.0.0.1","Request_URI":"/x"}"#).unwrap();
        assert_eq!(criteria.host.as_deref(), Some("10.0.0.1"));
        assert_eq!(criteria.request_uri.as_deref(), Some("/x"));

        let criteria = FilterCriteria::from_json(r#"{"Host":"upper","host":"exact"}"#).unwrap();
        assert_eq!(criteria.host.as_deref(), Some("exact"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            FilterCriteria::from_json("[1, 2]"),
            Err(CounterError::ConfigParse(_))
        ));
    }

    #[test]
    fn host_is_exact_match() {
        let f = filter(r#"{"host":"a"}"#);
        assert!(!f.exclude_by_host("a"));
        assert!(f.exclude_by_host("b"));
        assert!(f.exclude_by_host("A"));
        assert!(f.exclude_by_host(""));
    }

    #[test]
    fn string_criteria_are_exact_matches() {
        let f = filter(
            r#"{"remote_host":"10.0.0.1","request_uri":"/x","request":"POST /x HTTP/1.1","status":404}"#,
        );
        assert!(!f.exclude_by_remote_host("10.0.0.1"));
        assert!(f.exclude_by_remote_host("10.0.0.10"));
        assert!(!f.exclude_by_request_uri("/x"));
        assert!(f.exclude_by_request_uri("/x/"));
        assert!(!f.exclude_by_request("POST /x HTTP/1.1"));
        assert!(f.exclude_by_request("POST /x HTTP/1.0"));
        assert!(!f.exclude_by_status(404));
        assert!(f.exclude_by_status(200));
    }

    #[test]
    fn method_criterion_is_upper_cased() {
        let f = filter(r#"{"method":"post"}"#);
        assert_eq!(f.criteria().method.as_deref(), Some("POST"));
        assert!(!f.exclude_by_method("POST"));
        assert!(f.exclude_by_method("GET"));
        // candidates are not normalized
        assert!(f.exclude_by_method("post"));
    }

    #[test]
    fn start_bound_is_inclusive() {
        let f = filter(r#"{"start_time":"10/Oct/2023:00:00:00"}"#);
        assert!(f.exclude_by_start_time(&local(2023, 10, 9, 23, 59, 59)).unwrap());
        assert!(!f.exclude_by_start_time(&local(2023, 10, 10, 0, 0, 0)).unwrap());
        assert!(!f.exclude_by_start_time(&local(2023, 10, 11, 8, 0, 0)).unwrap());
    }

    #[test]
    fn end_bound_is_inclusive() {
        let f = filter(r#"{"end_time":"10/Oct/2023:13:55:36"}"#);
        assert!(!f.exclude_by_end_time(&local(2023, 10, 10, 13, 55, 36)).unwrap());
        assert!(f.exclude_by_end_time(&local(2023, 10, 10, 13, 55, 37)).unwrap());
        assert!(!f.exclude_by_end_time(&local(2023, 1, 1, 0, 0, 0)).unwrap());
    }

    #[test]
    fn malformed_bound_is_an_error() {
        let f = filter(r#"{"start_time":"2023-10-10 00:00:00","end_time":"nope"}"#);
        let t = local(2023, 10, 10, 0, 0, 0);
        assert!(matches!(
            f.exclude_by_start_time(&t),
            Err(TimeParseError::Format { field: "start_time", .. })
        ));
        assert!(matches!(
            f.exclude_by_end_time(&t),
            Err(TimeParseError::Format { field: "end_time", .. })
        ));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(matches!(
            FilterCriteria::from_json(r#"{"host":"#),
            Err(CounterError::ConfigParse(_))
        ));
        assert!(matches!(
            FilterCriteria::from_json(r#"{"status":"200"}"#),
            Err(CounterError::ConfigParse(_))
        ));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let criteria = FilterCriteria::from_json(r#"{"host":"a","colour":"blue"}"#).unwrap();
        assert_eq!(criteria.host.as_deref(), Some("a"));
    }

    #[test]
    fn excludes_combines_all_predicates() {
        let line = r#"example.com 10.0.0.1 - - [10/Oct/2023:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 10"#;
        let record = parse_line(line).unwrap();

        assert!(!filter("").excludes(&record).unwrap());
        assert!(!filter(r#"{"host":"10.0.0.1","remote_host":"example.com","method":"get"}"#)
            .excludes(&record)
            .unwrap());
        assert!(filter(r#"{"status":404}"#).excludes(&record).unwrap());
        assert!(filter(r#"{"request_uri":"/other"}"#).excludes(&record).unwrap());
    }

    #[test]
    fn field_mismatch_short_circuits_time_errors() {
        let line = r#"10.0.0.1 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 10"#;
        let record = parse_line(line).unwrap();

        let f = filter(r#"{"host":"10.9.9.9","start_time":"bogus"}"#);
        assert!(f.excludes(&record).unwrap());

        let f = filter(r#"{"start_time":"bogus"}"#);
        assert!(f.excludes(&record).is_err());
    }

    #[test]
    fn both_bad_bounds_are_returned() {
        let line = r#"10.0.0.1 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 10"#;
        let record = parse_line(line).unwrap();

        let errors = filter(r#"{"start_time":"x","end_time":"y"}"#)
            .excludes(&record)
            .unwrap_err();
        let fields: Vec<_> = errors.iter().map(TimeParseError::field).collect();
        assert_eq!(fields, vec!["start_time", "end_time"]);

        let errors = filter(r#"{"start_time":"01/Jan/2000:00:00:00","end_time":"y"}"#)
            .excludes(&record)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field(), "end_time");
    }
}
