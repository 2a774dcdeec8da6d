//! Conditional request and byte-range evaluation.
//!
//! Range semantics: an unrecognized unit degrades to the full representation;
//! an unparsable start position is a hard 416; the end position is clamped to
//! `length - 1`; a range request against a zero-length object yields a plain
//! 200 with an empty body rather than a malformed `Content-Range`.

use axum::http::{header, HeaderMap};
use silo_core::models::ObjectMetadata;
use silo_core::AppError;

/// Outcome of parsing a `Range` header against a known object length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the whole object with 200.
    Full,
    /// Serve an inclusive byte window with 206.
    Partial { start: u64, end: u64 },
    /// Zero-length object: 200 with an empty body.
    Empty,
}

pub fn parse_range(header_value: Option<&str>, length: u64) -> Result<RangeOutcome, AppError> {
    let raw = match header_value {
        Some(raw) => raw.trim(),
        None => return Ok(RangeOutcome::Full),
    };
    let spec = match raw.strip_prefix("bytes=") {
        Some(spec) => spec.trim(),
        // Unknown unit: ignore the header entirely.
        None => return Ok(RangeOutcome::Full),
    };
    if length == 0 {
        return Ok(RangeOutcome::Empty);
    }
    if spec.contains(',') {
        return Err(AppError::RangeNotSatisfiable(
            "Multiple ranges are not supported".to_string(),
        ));
    }
    let (start_raw, end_raw) = spec.split_once('-').ok_or_else(|| {
        AppError::RangeNotSatisfiable(format!("Malformed range: {}", raw))
    })?;
    let start: u64 = start_raw.trim().parse().map_err(|_| {
        AppError::RangeNotSatisfiable(format!("Unparsable range start: {}", raw))
    })?;
    if start >= length {
        return Err(AppError::RangeNotSatisfiable(format!(
            "Range start {} is beyond object length {}",
            start, length
        )));
    }
    let end = match end_raw.trim() {
        "" => length - 1,
        end_raw => {
            let end: u64 = end_raw.parse().map_err(|_| {
                AppError::RangeNotSatisfiable(format!("Unparsable range end: {}", raw))
            })?;
            end.min(length - 1)
        }
    };
    if end < start {
        return Err(AppError::RangeNotSatisfiable(format!(
            "Range end precedes start: {}",
            raw
        )));
    }
    Ok(RangeOutcome::Partial { start, end })
}

pub fn quote_etag(etag: &str) -> String {
    format!("\"{}\"", etag)
}

/// Strong/weak comparison for one candidate from a conditional header.
fn etag_candidate_matches(candidate: &str, etag: &str) -> bool {
    let candidate = candidate.trim();
    let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
    let candidate = candidate.trim_matches('"');
    candidate == "*" || candidate == etag
}

fn header_matches(headers: &HeaderMap, name: header::HeaderName, etag: &str) -> Option<bool> {
    let raw = headers.get(name)?.to_str().ok()?;
    Some(raw.split(',').any(|c| etag_candidate_matches(c, etag)))
}

/// What a conditional read should do after comparing ETags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Proceed,
    NotModified,
}

/// Evaluate `If-Match` / `If-None-Match` against the current ETag.
/// `If-Match` mismatch is a hard 412; a matching `If-None-Match` short-cuts
/// to 304.
pub fn check_preconditions(headers: &HeaderMap, etag: &str) -> Result<Precondition, AppError> {
    if let Some(matched) = header_matches(headers, header::IF_MATCH, etag) {
        if !matched {
            return Err(AppError::PreconditionFailed(format!(
                "ETag {} does not match If-Match",
                quote_etag(etag)
            )));
        }
    }
    if let Some(matched) = header_matches(headers, header::IF_NONE_MATCH, etag) {
        if matched {
            return Ok(Precondition::NotModified);
        }
    }
    Ok(Precondition::Proceed)
}

/// Standard object response headers shared by Get, Head, and 304 responses.
pub fn object_headers(metadata: &ObjectMetadata) -> Vec<(header::HeaderName, String)> {
    vec![
        (header::ETAG, quote_etag(&metadata.etag)),
        (header::LAST_MODIFIED, metadata.last_modified.to_rfc2822()),
        (header::ACCEPT_RANGES, "bytes".to_string()),
        (header::VARY, "Accept-Encoding".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::ErrorMetadata;

    #[test]
    fn test_range_contract() {
        // Spec table for a 100-byte object.
        assert_eq!(parse_range(None, 100).unwrap(), RangeOutcome::Full);
        assert_eq!(
            parse_range(Some("items=0-5"), 100).unwrap(),
            RangeOutcome::Full
        );
        assert_eq!(
            parse_range(Some("bytes=50-199"), 100).unwrap(),
            RangeOutcome::Partial { start: 50, end: 99 }
        );
        assert_eq!(
            parse_range(Some("bytes=50-"), 100).unwrap(),
            RangeOutcome::Partial { start: 50, end: 99 }
        );
        assert_eq!(
            parse_range(Some("bytes=0-0"), 100).unwrap(),
            RangeOutcome::Partial { start: 0, end: 0 }
        );
        assert_eq!(parse_range(Some("bytes=0-9"), 0).unwrap(), RangeOutcome::Empty);

        for bad in ["bytes=abc-5", "bytes=-", "bytes=200-300", "bytes=9-2", "bytes=0-1,5-6"] {
            let err = parse_range(Some(bad), 100).unwrap_err();
            assert_eq!(err.http_status_code(), 416, "{}", bad);
        }
    }

    #[test]
    fn test_if_none_match_weak_and_multi_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            "\"aaa\", W/\"bbb\"".parse().unwrap(),
        );
        assert_eq!(
            check_preconditions(&headers, "bbb").unwrap(),
            Precondition::NotModified
        );
        assert_eq!(
            check_preconditions(&headers, "ccc").unwrap(),
            Precondition::Proceed
        );

        let mut star = HeaderMap::new();
        star.insert(header::IF_NONE_MATCH, "*".parse().unwrap());
        assert_eq!(
            check_preconditions(&star, "anything").unwrap(),
            Precondition::NotModified
        );
    }

    #[test]
    fn test_if_match_mismatch_is_412() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, "\"expected\"".parse().unwrap());
        let err = check_preconditions(&headers, "actual").unwrap_err();
        assert_eq!(err.http_status_code(), 412);
        assert!(check_preconditions(&headers, "expected").is_ok());
    }
}
