//! Story data model shared by extractors, the fetch stage, the assembler and the EPUB writer.

use serde::Serialize;

/// Story-level metadata gathered from an extractor once per run.
#[derive(Debug, Clone, Serialize)]
pub struct StoryMetadata {
    pub identifier: String,
    pub slug: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Language name as reported by the site (e.g. "English").
    pub language: String,
    pub publisher: String,
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
    #[serde(skip)]
    pub cover_image: Vec<u8>,
}

/// One chapter as listed by the extractor, before its content is fetched.
///
/// `order` is the 0-based position in the extractor's chapter list and defines reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterReference {
    pub title: String,
    pub url: String,
    pub order: usize,
}

impl ChapterReference {
    /// Number the given `(title, url)` pairs in list order.
    pub fn numbered<I>(entries: I) -> Vec<ChapterReference>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        entries
            .into_iter()
            .enumerate()
            .map(|(order, (title, url))| ChapterReference { title, url, order })
            .collect()
    }
}

/// A fetched and cleaned chapter.
#[derive(Debug, Clone)]
pub struct ChapterContent {
    pub title: String,
    /// 0-based position, equal to the originating reference's position.
    pub order: usize,
    /// File name inside the package, e.g. `chapter_1.xhtml`.
    pub file_name: String,
    /// Cleaned chapter body: a single rooted fragment, no heading.
    pub body: String,
    /// Complete XHTML page: heading plus body, linked to the shared stylesheet.
    pub xhtml: String,
}

/// Table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocEntry {
    Link { href: String, title: String },
    Section { title: String, children: Vec<TocEntry> },
}

/// Item in the linear reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpineItem {
    Navigation,
    /// Index into [`Document::chapters`].
    Chapter(usize),
}

/// Fully composed e-book, ready for packaging.
#[derive(Debug, Clone)]
pub struct Document {
    /// Package unique identifier, `fanfiction-{id}`.
    pub identifier: String,
    pub metadata: StoryMetadata,
    pub stylesheet: String,
    pub chapters: Vec<ChapterContent>,
    pub toc: Vec<TocEntry>,
    pub spine: Vec<SpineItem>,
}

impl Document {
    /// Spine resolved to package file names.
    pub fn spine_files(&self) -> Vec<&str> {
        self.spine
            .iter()
            .filter_map(|item| match item {
                SpineItem::Navigation => Some(NAV_FILE_NAME),
                SpineItem::Chapter(i) => self.chapters.get(*i).map(|c| c.file_name.as_str()),
            })
            .collect()
    }
}

/// Navigation page file name, also the target of the "Introduction" TOC link.
pub const NAV_FILE_NAME: &str = "toc.xhtml";
/// Shared stylesheet path inside the package, relative to the content documents.
pub const STYLESHEET_HREF: &str = "style/main.css";
