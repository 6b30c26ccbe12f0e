//! Site extractors. Site detection, the extractor trait, the shared HTTP client, and one adapter per site.

mod client;
mod error;
pub mod html;

pub mod chrysanthemum;
pub mod foxaholic;
pub mod wattpad;

pub use client::{Fetcher, HttpClient, HttpClientBuilder};
pub use error::ScraperError;

use crate::model::ChapterReference;
use async_trait::async_trait;
use reqwest::Url;
use scraper::Html;

/// Supported story site. Used for dispatch and for --site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Wattpad,
    ChrysanthemumGarden,
    Foxaholic,
}

impl Site {
    /// Display name, also used as the package publisher.
    pub fn name(self) -> &'static str {
        match self {
            Site::Wattpad => "Wattpad",
            Site::ChrysanthemumGarden => "Chrysanthemum Garden",
            Site::Foxaholic => "Foxaholic",
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve which site to use from URL and optional override.
pub fn resolve_site(url_input: &str, override_site: Option<Site>) -> Result<Site, ScraperError> {
    if let Some(site) = override_site {
        return Ok(site);
    }
    let url = Url::parse(url_input).map_err(|e| ScraperError::InvalidUrl {
        input: url_input.to_string(),
        reason: e.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| ScraperError::InvalidUrl {
        input: url_input.to_string(),
        reason: "URL has no host".to_string(),
    })?;
    if host.contains("wattpad.com") {
        Ok(Site::Wattpad)
    } else if host.contains("chrysanthemumgarden.com") {
        Ok(Site::ChrysanthemumGarden)
    } else if host.contains("foxaholic.com") {
        Ok(Site::Foxaholic)
    } else {
        Err(ScraperError::UnrecognizedHost {
            host: host.to_string(),
        })
    }
}

/// Uniform capability set of a site adapter.
///
/// An extractor is fully initialised by its site's `open` function: every metadata query is an
/// in-memory read, and the instance is shared read-only across concurrent chapter fetches.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn site(&self) -> Site;

    /// Stable story identifier parsed from the URL.
    fn id(&self) -> &str;

    fn slug(&self) -> &str {
        self.id()
    }

    /// Story URL the extractor was opened with.
    fn source_url(&self) -> &str;

    fn title(&self) -> &str;

    fn author(&self) -> &str;

    fn description(&self) -> &str;

    fn language(&self) -> &str;

    fn publisher(&self) -> &str {
        self.site().name()
    }

    /// Absolute cover image URL found at initialisation.
    fn cover_url(&self) -> &str;

    /// Download the cover image.
    async fn book_cover_content(&self, http: &dyn Fetcher) -> Result<Vec<u8>, ScraperError> {
        http.get_bytes(self.cover_url()).await
    }

    /// Chapters in reading order (oldest first).
    fn chapters(&self) -> Vec<ChapterReference>;

    /// Extract the cleaned chapter body from a fetched chapter page.
    ///
    /// Returns a single rooted XHTML fragment, or `ContentNotFound` when the page lacks the
    /// site's content container.
    fn chapter_content(&self, page: &Html, url: &str) -> Result<String, ScraperError>;
}

/// Dispatch by site: validate the URL, then fetch story-level data and build the adapter.
///
/// The URL check runs before any request, so an unrecognized URL never touches the network.
pub async fn open_extractor(
    site: Site,
    url: &str,
    http: &dyn Fetcher,
) -> Result<Box<dyn Extractor>, ScraperError> {
    tracing::info!(%site, url, "Opening story");
    match site {
        Site::Wattpad => Ok(Box::new(wattpad::WattpadExtractor::open(url, http).await?)),
        Site::ChrysanthemumGarden => Ok(Box::new(
            chrysanthemum::ChrysanthemumExtractor::open(url, http).await?,
        )),
        Site::Foxaholic => Ok(Box::new(
            foxaholic::FoxaholicExtractor::open(url, http).await?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;

    #[test]
    fn site_detection_wattpad() -> Result<(), ScraperError> {
        let site = resolve_site("https://www.wattpad.com/story/123-some-story", None)?;
        assert_eq!(site, Site::Wattpad);
        Ok(())
    }

    #[test]
    fn site_detection_chrysanthemum() -> Result<(), ScraperError> {
        let site = resolve_site("https://chrysanthemumgarden.com/novel-tl/abc/", None)?;
        assert_eq!(site, Site::ChrysanthemumGarden);
        Ok(())
    }

    #[test]
    fn site_detection_foxaholic() -> Result<(), ScraperError> {
        let site = resolve_site("https://www.foxaholic.com/novel/a-novel/", None)?;
        assert_eq!(site, Site::Foxaholic);
        Ok(())
    }

    #[test]
    fn site_detection_unrecognized_host_errors() -> Result<(), String> {
        let result = resolve_site("https://example.com/foo", None);
        match &result {
            Err(ScraperError::UnrecognizedHost { host }) if host == "example.com" => Ok(()),
            _ => Err(format!("expected UnrecognizedHost, got {:?}", result)),
        }
    }

    #[test]
    fn site_detection_invalid_url_errors() -> Result<(), String> {
        let result = resolve_site("not-a-url", None);
        match &result {
            Err(ScraperError::InvalidUrl { input, .. }) if input == "not-a-url" => Ok(()),
            _ => Err(format!("expected InvalidUrl, got {:?}", result)),
        }
    }

    #[test]
    fn site_override_ignores_url_host() -> Result<(), ScraperError> {
        let site = resolve_site("https://example.com/foo", Some(Site::Foxaholic))?;
        assert_eq!(site, Site::Foxaholic);
        Ok(())
    }

    #[tokio::test]
    async fn unrecognized_url_fails_before_any_request() {
        let cases = [
            (Site::Wattpad, "https://www.wattpad.com/user/someone"),
            (Site::ChrysanthemumGarden, "https://chrysanthemumgarden.com/about/"),
            (Site::Foxaholic, "https://www.foxaholic.com/genre/romance/"),
            (Site::Wattpad, "https://www.foxaholic.com/novel/a-novel/"),
        ];
        for (site, url) in cases {
            let http = StubFetcher::new();
            let result = open_extractor(site, url, &http).await;
            assert!(
                matches!(result, Err(ScraperError::SourceUnrecognized { .. })),
                "{site} accepted {url}"
            );
            assert_eq!(http.requests(), 0, "{site} made a request for {url}");
        }
    }
}
