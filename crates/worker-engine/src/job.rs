use std::fmt;

use serde::Deserialize;
use uuid::Uuid;

/// A raw message handed to the consumer loop by the message bus.
#[derive(Debug, Clone)]
pub struct Message {
    pub value: Vec<u8>,
}

/// Reasons a raw message or URL failed to parse.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed job message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid job url: {0}")]
    Url(#[from] url::ParseError),

    #[error("url has no host component")]
    NoHost,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    url: String,
    uuid: Uuid,
}

/// One image-fetch job. Immutable once constructed; lives only for the
/// duration of one processing attempt. `origin` is derived once here so
/// every later stage (rate limiting, stats) shares the same key without
/// re-parsing the URL or having to handle a parse failure that has already
/// been ruled out.
#[derive(Debug, Clone)]
pub struct Job {
    pub url: String,
    pub identifier: Uuid,
    pub origin: Origin,
}

/// Parse a bus message's JSON body `{"url": ..., "uuid": ...}`.
///
/// Unknown fields are ignored (`#[derive(Deserialize)]`'s default
/// behavior). A malformed body, a `uuid` field that isn't a valid UUID, or
/// a `url` that isn't a valid absolute URL with a host is reported as a
/// [`ParseError`]; all three are "malformed message" from the caller's
/// perspective and are discarded the same way, before the job is ever
/// counted as dispatched.
pub fn parse_job(message: &Message) -> Result<Job, ParseError> {
    let raw: RawJob = serde_json::from_slice(&message.value)?;
    let origin = derive_origin(&raw.url)?;
    Ok(Job {
        url: raw.url,
        identifier: raw.uuid,
        origin,
    })
}

/// The registrable host portion of a URL, used as the rate-limit and stats
/// shard key. Port is intentionally excluded: two URLs on the same host but
/// different ports share a budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(String);

impl Origin {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn display_for_test(s: &str) -> Self {
        Origin(s.to_string())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the [`Origin`] from a fully-qualified HTTP(S) URL.
pub fn derive_origin(raw_url: &str) -> Result<Origin, ParseError> {
    let parsed = url::Url::parse(raw_url)?;
    let host = parsed.host_str().ok_or(ParseError::NoHost)?;
    Ok(Origin(host.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_message() {
        let msg = Message {
            value: br#"{"url":"https://example.gov/hello.jpg","uuid":"4bbfe191-1cca-4b9e-aff0-1d3044ef3f2d"}"#.to_vec(),
        };
        let job = parse_job(&msg).expect("should parse");
        assert_eq!(job.url, "https://example.gov/hello.jpg");
        assert_eq!(job.identifier.to_string(), "4bbfe191-1cca-4b9e-aff0-1d3044ef3f2d");
        assert_eq!(job.origin.as_str(), "example.gov");
    }

    #[test]
    fn ignores_unknown_fields() {
        let msg = Message {
            value: br#"{"url":"https://example.gov/a.jpg","uuid":"4bbfe191-1cca-4b9e-aff0-1d3044ef3f2d","extra":42}"#.to_vec(),
        };
        assert!(parse_job(&msg).is_ok());
    }

    #[test]
    fn rejects_malformed_message() {
        let msg = Message {
            value: b"not json".to_vec(),
        };
        assert!(parse_job(&msg).is_err());
    }

    #[test]
    fn rejects_well_formed_json_with_an_unparseable_url() {
        let msg = Message {
            value: br#"{"url":"not a url","uuid":"4bbfe191-1cca-4b9e-aff0-1d3044ef3f2d"}"#.to_vec(),
        };
        assert!(matches!(parse_job(&msg), Err(ParseError::Url(_))));
    }

    #[test]
    fn derives_origin_ignoring_port_and_case() {
        let a = derive_origin("https://Example.GOV:8443/hello.jpg").unwrap();
        let b = derive_origin("https://example.gov/other.jpg").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "example.gov");
    }
}
