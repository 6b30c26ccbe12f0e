//! ficbind: CLI scraper for Wattpad, Chrysanthemum Garden and Foxaholic stories, outputting EPUB.

pub mod assembler;
pub mod cli;
pub mod config;
pub mod epub;
pub mod extractor;
pub mod fetch;
pub mod model;

#[cfg(test)]
mod testing;

// Re-exports for CLI and consumers.
pub use assembler::{assemble_book, AssembleOptions, BookError};
pub use epub::{write_epub, write_epub_to, EpubError};
pub use extractor::{
    open_extractor, resolve_site, Extractor, Fetcher, HttpClient, HttpClientBuilder, ScraperError,
    Site,
};
pub use fetch::{fetch_chapters, FetchOptions, MAX_CONCURRENT_FETCHES};
pub use model::{ChapterContent, ChapterReference, Document, SpineItem, StoryMetadata, TocEntry};
