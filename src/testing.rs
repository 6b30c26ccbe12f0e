//! Test doubles for the network and for extractors.

use crate::extractor::html::{parse_selector, select_first, Rewrite};
use crate::extractor::{Extractor, Fetcher, ScraperError, Site};
use crate::model::ChapterReference;
use async_trait::async_trait;
use scraper::Html;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory [`Fetcher`] that counts requests and tracks how many are in flight at once.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, Vec<u8>>,
    delay: Option<fn(&str) -> Duration>,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    /// Sleep for `delay(url)` inside every request.
    pub fn with_delay(mut self, delay: fn(&str) -> Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay(url)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// Extractor with fixed metadata whose chapter body is `div.content`.
pub struct StubExtractor {
    pub id: String,
    pub title: String,
    pub author: String,
    pub language: String,
    pub publisher: String,
    pub chapters: Vec<ChapterReference>,
}

impl StubExtractor {
    /// Story `stub-1` with `n` chapters titled `C1..Cn` at `https://stub.test/c/{i}`.
    pub fn with_chapters(n: usize) -> Self {
        let chapters = ChapterReference::numbered(
            (1..=n).map(|i| (format!("C{}", i), chapter_url(i))),
        );
        Self {
            id: "stub-1".to_string(),
            title: "T".to_string(),
            author: "A".to_string(),
            language: "English".to_string(),
            publisher: "P".to_string(),
            chapters,
        }
    }
}

pub fn chapter_url(i: usize) -> String {
    format!("https://stub.test/c/{}", i)
}

pub const COVER_URL: &str = "https://stub.test/cover.png";

/// PNG magic followed by filler.
pub const COVER_PNG: &[u8] = b"\x89PNG\r\n\x1a\nstub-image";

pub fn chapter_page(text: &str) -> String {
    format!(
        r#"<html><body><nav>menu</nav><div class="content"><p>{}</p></div></body></html>"#,
        text
    )
}

#[async_trait]
impl Extractor for StubExtractor {
    fn site(&self) -> Site {
        Site::Wattpad
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn source_url(&self) -> &str {
        "https://stub.test/story"
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn description(&self) -> &str {
        "A stub story."
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn publisher(&self) -> &str {
        &self.publisher
    }

    fn cover_url(&self) -> &str {
        COVER_URL
    }

    fn chapters(&self) -> Vec<ChapterReference> {
        self.chapters.clone()
    }

    fn chapter_content(&self, page: &Html, url: &str) -> Result<String, ScraperError> {
        let sel = parse_selector("div.content")?;
        let content = select_first(page, &sel).ok_or_else(|| ScraperError::ContentNotFound {
            site: "Stub",
            what: "chapter content",
            url: url.to_string(),
        })?;
        Ok(Rewrite::new().render(content))
    }
}
