//! Shared error type for extractors and the HTTP client.

use thiserror::Error;

/// Shared extractor error for site detection, HTTP, and layout mismatches.
#[derive(Debug, Error)]
pub enum ScraperError {
    // Site / URL
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error(
        "Could not detect site from URL host '{host}'. Use --site wattpad, chrysanthemum or foxaholic."
    )]
    UnrecognizedHost { host: String },

    /// URL does not match the selected site's story pattern. Raised before any network call.
    #[error("{site}: not a recognized story URL: {url}")]
    SourceUnrecognized { site: &'static str, url: String },

    // HTTP and network
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parsing
    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Expected structural anchor missing from fetched markup (layout mismatch).
    #[error("{site}: {what} not found at {url}")]
    ContentNotFound {
        site: &'static str,
        what: &'static str,
        url: String,
    },

    #[error("Unexpected API response from {url}: {reason}")]
    ApiResponse { url: String, reason: String },
}

impl ScraperError {
    /// True for errors caused by the network or the remote server rather than the markup.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ScraperError::Network { .. }
                | ScraperError::HttpStatus { .. }
                | ScraperError::BodyRead { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_site_and_url() {
        let e = ScraperError::ContentNotFound {
            site: "Foxaholic",
            what: "chapter content",
            url: "https://www.foxaholic.com/novel/x/1/".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Foxaholic: chapter content not found at https://www.foxaholic.com/novel/x/1/"
        );
        let e = ScraperError::SourceUnrecognized {
            site: "Wattpad",
            url: "https://www.wattpad.com/user/x".to_string(),
        };
        assert!(e.to_string().contains("Wattpad"));
        assert!(e.to_string().contains("/user/x"));
    }

    #[test]
    fn is_network_classification() {
        assert!(ScraperError::HttpStatus {
            status: 503,
            url: "u".to_string()
        }
        .is_network());
        assert!(!ScraperError::SourceUnrecognized {
            site: "Wattpad",
            url: "u".to_string()
        }
        .is_network());
    }
}
