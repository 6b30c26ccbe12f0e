//! Book assembly: gather metadata and cover from an opened extractor, fetch every chapter, and
//! compose the [Document] (table of contents and reading order) handed to the EPUB writer.

use crate::extractor::{Extractor, Fetcher, ScraperError};
use crate::fetch::{fetch_chapters, FetchOptions, Progress, MAX_CONCURRENT_FETCHES};
use crate::model::{ChapterContent, Document, SpineItem, StoryMetadata, TocEntry, NAV_FILE_NAME};
use thiserror::Error;

/// Failure while turning an opened story into a [Document]. Any of these aborts the story.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("Could not download cover image from {url}: {source}")]
    Cover {
        url: String,
        #[source]
        source: ScraperError,
    },

    #[error("Story at {url} lists no chapters")]
    NoChapters { url: String },

    #[error("Chapter {number} ({title}) failed at {url}: {source}")]
    Chapter {
        /// 1-based chapter number.
        number: usize,
        title: String,
        url: String,
        #[source]
        source: ScraperError,
    },

    #[error("Chapter downloads were interrupted")]
    Interrupted,
}

impl BookError {
    /// Underlying scraper failure, if any.
    pub fn scraper_error(&self) -> Option<&ScraperError> {
        match self {
            BookError::Cover { source, .. } | BookError::Chapter { source, .. } => Some(source),
            BookError::NoChapters { .. } | BookError::Interrupted => None,
        }
    }
}

pub struct AssembleOptions<'a> {
    /// Stylesheet text shared by every page.
    pub stylesheet: &'a str,
    pub max_concurrent: usize,
    pub progress: Option<Progress<'a>>,
}

impl<'a> AssembleOptions<'a> {
    pub fn new(stylesheet: &'a str) -> Self {
        Self {
            stylesheet,
            max_concurrent: MAX_CONCURRENT_FETCHES,
            progress: None,
        }
    }
}

/// Build the whole book for an opened story. No partial document is ever returned.
pub async fn assemble_book(
    extractor: &dyn Extractor,
    http: &dyn Fetcher,
    options: &AssembleOptions<'_>,
) -> Result<Document, BookError> {
    tracing::info!(site = %extractor.site(), id = extractor.id(), title = extractor.title(), "Assembling story");

    let cover_image = extractor
        .book_cover_content(http)
        .await
        .map_err(|source| BookError::Cover {
            url: extractor.cover_url().to_string(),
            source,
        })?;
    let metadata = story_metadata(extractor, cover_image);

    let references = extractor.chapters();
    if references.is_empty() {
        return Err(BookError::NoChapters {
            url: extractor.source_url().to_string(),
        });
    }

    let fetch_options = FetchOptions {
        max_concurrent: options.max_concurrent,
        progress: options.progress,
    };
    let chapters = fetch_chapters(http, extractor, &references, &fetch_options).await?;
    tracing::info!(chapters = chapters.len(), "All chapters fetched");

    Ok(compose(metadata, options.stylesheet.to_string(), chapters))
}

fn story_metadata(extractor: &dyn Extractor, cover_image: Vec<u8>) -> StoryMetadata {
    StoryMetadata {
        identifier: extractor.id().to_string(),
        slug: extractor.slug().to_string(),
        title: extractor.title().to_string(),
        author: extractor.author().to_string(),
        description: extractor.description().to_string(),
        language: extractor.language().to_string(),
        publisher: extractor.publisher().to_string(),
        source_url: extractor.source_url().to_string(),
        cover_image,
    }
}

/// Lay out the book: "Introduction" (the navigation page) then a "Chapters" section;
/// reading order is the navigation page followed by every chapter.
pub fn compose(metadata: StoryMetadata, stylesheet: String, chapters: Vec<ChapterContent>) -> Document {
    let identifier = format!("fanfiction-{}", metadata.identifier);
    let toc = vec![
        TocEntry::Link {
            href: NAV_FILE_NAME.to_string(),
            title: "Introduction".to_string(),
        },
        TocEntry::Section {
            title: "Chapters".to_string(),
            children: chapters
                .iter()
                .map(|c| TocEntry::Link {
                    href: c.file_name.clone(),
                    title: c.title.clone(),
                })
                .collect(),
        },
    ];
    let spine = std::iter::once(SpineItem::Navigation)
        .chain((0..chapters.len()).map(SpineItem::Chapter))
        .collect();
    Document {
        identifier,
        metadata,
        stylesheet,
        chapters,
        toc,
        spine,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        chapter_page, chapter_url, StubExtractor, StubFetcher, COVER_PNG, COVER_URL,
    };
    use std::time::Duration;

    fn full_site(n: usize) -> StubFetcher {
        let mut http = StubFetcher::new().with_page(COVER_URL, COVER_PNG);
        for i in 1..=n {
            http = http.with_page(&chapter_url(i), chapter_page(&format!("Text of chapter {}", i)));
        }
        http
    }

    /// Deterministic per-URL jitter so completions arrive out of order.
    fn jitter(url: &str) -> Duration {
        let hash = url
            .bytes()
            .fold(17u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)));
        Duration::from_millis(hash % 23)
    }

    #[tokio::test]
    async fn three_chapter_story_becomes_document() -> Result<(), BookError> {
        let extractor = StubExtractor::with_chapters(3);
        let http = full_site(3);
        let doc = assemble_book(&extractor, &http, &AssembleOptions::new("p {}")).await?;

        assert_eq!(doc.identifier, "fanfiction-stub-1");
        assert_eq!(doc.metadata.title, "T");
        assert_eq!(doc.metadata.author, "A");
        assert_eq!(doc.metadata.language, "English");
        assert_eq!(doc.metadata.publisher, "P");
        assert_eq!(doc.metadata.cover_image, COVER_PNG);
        assert_eq!(doc.stylesheet, "p {}");

        assert_eq!(doc.spine.len(), 4);
        assert_eq!(
            doc.spine_files(),
            ["toc.xhtml", "chapter_1.xhtml", "chapter_2.xhtml", "chapter_3.xhtml"]
        );
        for (i, chapter) in doc.chapters.iter().enumerate() {
            let heading = format!("<h1>C{}</h1>", i + 1);
            assert!(chapter.xhtml.contains(&heading), "missing {heading}");
            assert!(chapter
                .body
                .contains(&format!("Text of chapter {}", i + 1)));
        }

        match &doc.toc[..] {
            [TocEntry::Link { href, title }, TocEntry::Section { title: section, children }] => {
                assert_eq!(href, "toc.xhtml");
                assert_eq!(title, "Introduction");
                assert_eq!(section, "Chapters");
                assert_eq!(
                    children[2],
                    TocEntry::Link {
                        href: "chapter_3.xhtml".to_string(),
                        title: "C3".to_string()
                    }
                );
                assert_eq!(children.len(), 3);
            }
            other => panic!("unexpected toc {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn spine_follows_chapter_list_despite_jittered_responses() -> Result<(), BookError> {
        let extractor = StubExtractor::with_chapters(40);
        let http = full_site(40).with_delay(jitter);
        let doc = assemble_book(&extractor, &http, &AssembleOptions::new("")).await?;

        let titles: Vec<&str> = doc.chapters.iter().map(|c| c.title.as_str()).collect();
        let expected: Vec<String> = (1..=40).map(|i| format!("C{}", i)).collect();
        assert_eq!(titles, expected);
        for (i, chapter) in doc.chapters.iter().enumerate() {
            assert_eq!(chapter.order, i);
            assert_eq!(doc.spine[i + 1], SpineItem::Chapter(i));
        }
        assert!(http.max_in_flight() <= MAX_CONCURRENT_FETCHES);
        Ok(())
    }

    #[tokio::test]
    async fn missing_content_anchor_aborts_the_book() {
        let extractor = StubExtractor::with_chapters(3);
        let http = full_site(3).with_page(
            &chapter_url(2),
            "<html><body><p>Chapter removed</p></body></html>",
        );
        let result = assemble_book(&extractor, &http, &AssembleOptions::new("")).await;
        match result {
            Err(BookError::Chapter {
                number,
                title,
                source: ScraperError::ContentNotFound { .. },
                ..
            }) => {
                assert_eq!(number, 2);
                assert_eq!(title, "C2");
            }
            other => panic!("expected chapter ContentNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_chapter_request_aborts_the_book() {
        let extractor = StubExtractor::with_chapters(4);
        let mut http = StubFetcher::new().with_page(COVER_URL, COVER_PNG);
        for i in [1, 2, 4] {
            http = http.with_page(&chapter_url(i), chapter_page("ok"));
        }
        let err = assemble_book(&extractor, &http, &AssembleOptions::new(""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookError::Chapter {
                number: 3,
                source: ScraperError::HttpStatus { status: 404, .. },
                ..
            }
        ));
        assert!(err.scraper_error().is_some());
    }

    #[tokio::test]
    async fn missing_cover_aborts_before_chapters() {
        let extractor = StubExtractor::with_chapters(2);
        let http = StubFetcher::new()
            .with_page(&chapter_url(1), chapter_page("a"))
            .with_page(&chapter_url(2), chapter_page("b"));
        let result = assemble_book(&extractor, &http, &AssembleOptions::new("")).await;
        assert!(matches!(result, Err(BookError::Cover { .. })));
        assert_eq!(http.requests(), 1);
    }

    #[tokio::test]
    async fn story_without_chapters_is_rejected() {
        let extractor = StubExtractor::with_chapters(0);
        let http = full_site(0);
        let result = assemble_book(&extractor, &http, &AssembleOptions::new("")).await;
        assert!(matches!(result, Err(BookError::NoChapters { .. })));
    }

    #[test]
    fn chapter_error_message_names_the_chapter() {
        let err = BookError::Chapter {
            number: 7,
            title: "The Gate".to_string(),
            url: "https://stub.test/c/7".to_string(),
            source: ScraperError::HttpStatus {
                status: 500,
                url: "https://stub.test/c/7".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Chapter 7 (The Gate) failed at https://stub.test/c/7"));
    }
}
