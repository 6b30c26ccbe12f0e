//! Chapter fetch stage: download every chapter concurrently (bounded), clean it with the story's
//! extractor, and wrap it in an XHTML page. Results come back in chapter-list order.

use crate::assembler::BookError;
use crate::extractor::html::escape_text;
use crate::extractor::{Extractor, Fetcher, ScraperError};
use crate::model::{ChapterContent, ChapterReference, STYLESHEET_HREF};
use futures::stream::{FuturesUnordered, TryStreamExt};
use scraper::Html;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Ceiling on simultaneous chapter requests for one story.
pub const MAX_CONCURRENT_FETCHES: usize = 20;

/// Progress callback: `(chapters done, total)`. Called from concurrent fetches.
pub type Progress<'a> = &'a (dyn Fn(usize, usize) + Sync);

pub struct FetchOptions<'a> {
    /// Requested parallelism, clamped to `1..=MAX_CONCURRENT_FETCHES`.
    pub max_concurrent: usize,
    pub progress: Option<Progress<'a>>,
}

impl Default for FetchOptions<'_> {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT_FETCHES,
            progress: None,
        }
    }
}

/// Fetch and clean all `references`, returning one [ChapterContent] per reference in input order.
///
/// The first failing chapter aborts the whole stage; fetches still in flight are dropped.
pub async fn fetch_chapters(
    http: &dyn Fetcher,
    extractor: &dyn Extractor,
    references: &[ChapterReference],
    options: &FetchOptions<'_>,
) -> Result<Vec<ChapterContent>, BookError> {
    let limit = options.max_concurrent.clamp(1, MAX_CONCURRENT_FETCHES);
    let total = references.len();
    let semaphore = Semaphore::new(limit);
    let done = AtomicUsize::new(0);
    tracing::info!(chapters = total, limit, "Fetching chapters");

    let mut pending: FuturesUnordered<_> = references
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let semaphore = &semaphore;
            let done = &done;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| BookError::Interrupted)?;
                let chapter = fetch_chapter(http, extractor, index, reference).await?;
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = options.progress {
                    progress(n, total);
                }
                Ok::<_, BookError>((index, chapter))
            }
        })
        .collect();

    // One slot per reference, filled as fetches complete in any order.
    let mut slots: Vec<Option<ChapterContent>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some((index, chapter)) = pending.try_next().await? {
        slots[index] = Some(chapter);
    }
    Ok(slots.into_iter().flatten().collect())
}

async fn fetch_chapter(
    http: &dyn Fetcher,
    extractor: &dyn Extractor,
    index: usize,
    reference: &ChapterReference,
) -> Result<ChapterContent, BookError> {
    tracing::info!(
        number = index + 1,
        title = %reference.title,
        url = %reference.url,
        "Downloading chapter"
    );
    let html = http
        .get_text(&reference.url)
        .await
        .map_err(|source| chapter_error(index, reference, source))?;
    build_chapter(extractor, index, reference, &html)
}

/// Parse a downloaded chapter page, clean it, and wrap it as a package page.
pub fn build_chapter(
    extractor: &dyn Extractor,
    index: usize,
    reference: &ChapterReference,
    html: &str,
) -> Result<ChapterContent, BookError> {
    let page = Html::parse_document(html);
    let body = extractor
        .chapter_content(&page, &reference.url)
        .map_err(|source| chapter_error(index, reference, source))?;
    let number = index + 1;
    Ok(ChapterContent {
        title: reference.title.clone(),
        order: index,
        file_name: format!("chapter_{}.xhtml", number),
        xhtml: chapter_page(number, &reference.title, &body),
        body,
    })
}

fn chapter_error(index: usize, reference: &ChapterReference, source: ScraperError) -> BookError {
    BookError::Chapter {
        number: index + 1,
        title: reference.title.clone(),
        url: reference.url.clone(),
        source,
    }
}

/// Minimal XHTML shell: synthesized heading, then the cleaned body.
pub fn chapter_page(number: usize, title: &str, body: &str) -> String {
    let title = escape_text(title);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <meta charset="UTF-8"/>
  <title>Chapter {number}: {title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        number = number,
        title = title,
        css = STYLESHEET_HREF,
        body = body
    )
}
