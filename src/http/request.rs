//! Request line parsing.
//!
//! Only the first line of the client request is interpreted. It must carry
//! at least method, target and protocol version, separated by single
//! spaces. Header lines are drained by the connection handler but never
//! parsed.

use thiserror::Error;

/// Methods the proxy responds to. Anything else gets 405.
pub const SUPPORTED_METHODS: [&str; 4] = ["GET", "HEAD", "OPTIONS", "POST"];

/// Returns true for methods in [`SUPPORTED_METHODS`].
pub fn is_supported(method: &str) -> bool {
    SUPPORTED_METHODS.contains(&method)
}

/// Error type for request parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The request line was blank, too short, or had a blank field.
    #[error("malformed request line")]
    Malformed,
}

/// One parsed client request, scoped to a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    pub target: String,
}

/// Parse a raw request line into method and target.
///
/// Splitting is on single spaces, so `GET  http://x HTTP/1.1` (double
/// space) yields a blank target and is rejected.
pub fn parse_request_line(line: &str) -> Result<InboundRequest, RequestError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(RequestError::Malformed);
    }

    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() < 3 {
        return Err(RequestError::Malformed);
    }

    let method = tokens[0];
    let target = tokens[1];
    if method.is_empty() || target.is_empty() {
        return Err(RequestError::Malformed);
    }

    Ok(InboundRequest {
        method: method.to_string(),
        target: target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_line_parses() {
        let req = parse_request_line("GET http://example.com/ HTTP/1.1\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.target, "http://example.com/");
    }

    #[test]
    fn extra_tokens_are_tolerated() {
        let req = parse_request_line("GET http://example.com/ HTTP/1.1 junk").unwrap();
        assert_eq!(req.target, "http://example.com/");
    }

    #[test]
    fn blank_line_is_malformed() {
        assert_eq!(parse_request_line(""), Err(RequestError::Malformed));
        assert_eq!(parse_request_line("\r\n"), Err(RequestError::Malformed));
        assert_eq!(parse_request_line("   "), Err(RequestError::Malformed));
    }

    #[test]
    fn short_line_is_malformed() {
        assert_eq!(parse_request_line("GET"), Err(RequestError::Malformed));
        assert_eq!(
            parse_request_line("GET http://example.com/"),
            Err(RequestError::Malformed)
        );
    }

    #[test]
    fn blank_target_is_malformed() {
        // Double space: the second field is empty.
        assert_eq!(
            parse_request_line("GET  http://example.com/ HTTP/1.1"),
            Err(RequestError::Malformed)
        );
    }

    #[test]
    fn unknown_method_still_parses() {
        // Method support is checked later in the pipeline, after the filter.
        let req = parse_request_line("FOO http://example.com/ HTTP/1.1").unwrap();
        assert_eq!(req.method, "FOO");
        assert!(!is_supported(&req.method));
    }

    #[test]
    fn supported_method_set() {
        for method in ["GET", "HEAD", "OPTIONS", "POST"] {
            assert!(is_supported(method));
        }
        assert!(!is_supported("PUT"));
        assert!(!is_supported("get"));
    }
}
