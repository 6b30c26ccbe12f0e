//! Chrysanthemum Garden adapter. Metadata and TOC come from the novel landing page.
//!
//! Chapter bodies are partly obfuscated: letters inside `span.jum` are drawn from a scrambled
//! alphabet (rendered with a matching custom font on the site), and zero-size paragraphs of
//! decoy text are interleaved with the real ones.

use crate::extractor::error::ScraperError;
use crate::extractor::html::{element_text, parse_selector, select_first, Rewrite};
use crate::extractor::{Extractor, Fetcher, Site};
use crate::model::ChapterReference;
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html};

const SITE: &str = "Chrysanthemum Garden";
const CG_HOST: &str = "chrysanthemumgarden.com";

/// Selector for the obfuscated spans inside a chapter body.
const OBFUSCATED_SPAN: &str = "span.jum";

/// Scrambled alphabets: the letter at position `i` decodes to the `i`-th letter of the alphabet.
const OBFUSCATED_LOWER: &str = "tonquerzlawicvfjpsyhgdmkbx";
const OBFUSCATED_UPPER: &str = "JKABRUDQZCTHFVLIWNEYPSXGOM";

/// Punctuation that the obfuscated font renders as itself.
const PASSTHROUGH: &str = ".,'\"!?-:;()\u{2018}\u{2019}\u{201C}\u{201D}\u{2026}\u{2014}";

/// Rendered for any character outside the table.
pub const PLACEHOLDER: char = '*';

/// Decode one obfuscated character. Whitespace is kept as is.
pub fn decode_char(c: char) -> char {
    if c.is_whitespace() || PASSTHROUGH.contains(c) {
        return c;
    }
    if let Some(i) = OBFUSCATED_LOWER.chars().position(|o| o == c) {
        return char::from(b'a' + i as u8);
    }
    if let Some(i) = OBFUSCATED_UPPER.chars().position(|o| o == c) {
        return char::from(b'A' + i as u8);
    }
    PLACEHOLDER
}

/// Decode an obfuscated run of text.
pub fn decode(s: &str) -> String {
    s.chars().map(decode_char).collect()
}

/// Paragraphs the site sizes to nothing (or hides) to carry decoy text.
fn is_spacer_paragraph(el: &ElementRef<'_>) -> bool {
    if el.value().name() != "p" {
        return false;
    }
    let Some(style) = el.value().attr("style") else {
        return false;
    };
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .any(|(prop, value)| {
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.to_ascii_lowercase().replace(' ', "");
            let value = value.trim_end_matches("!important");
            match prop.as_str() {
                "display" => value == "none",
                "height" | "width" | "font-size" | "line-height" => {
                    matches!(value, "0" | "0px" | "1px" | "0em" | "0pt" | "0%")
                }
                _ => false,
            }
        })
}

/// Novel id from `https://chrysanthemumgarden.com/novel-tl/{id}/`.
pub fn locate(url: &str) -> Result<String, ScraperError> {
    let unrecognized = || ScraperError::SourceUnrecognized {
        site: SITE,
        url: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| unrecognized())?;
    if parsed.scheme() != "https" || parsed.host_str() != Some(CG_HOST) {
        return Err(unrecognized());
    }
    let rest = parsed
        .path()
        .strip_prefix("/novel-tl/")
        .ok_or_else(unrecognized)?;
    let id = rest.strip_suffix('/').unwrap_or(rest);
    if id.is_empty() || !id.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(unrecognized());
    }
    Ok(id.to_string())
}

/// Chrysanthemum Garden novel, populated from its landing page.
#[derive(Debug)]
pub struct ChrysanthemumExtractor {
    id: String,
    url: String,
    title: String,
    author: String,
    description: String,
    cover_url: String,
    chapters: Vec<ChapterReference>,
}

impl ChrysanthemumExtractor {
    pub async fn open(url: &str, http: &dyn Fetcher) -> Result<Self, ScraperError> {
        let id = locate(url)?;
        let html = http.get_text(url).await?;
        Self::from_landing_page(id, url, &html)
    }

    fn from_landing_page(id: String, url: &str, html: &str) -> Result<Self, ScraperError> {
        let doc = Html::parse_document(html);
        let missing = |what: &'static str| ScraperError::ContentNotFound {
            site: SITE,
            what,
            url: url.to_string(),
        };
        let base = Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;

        let title_sel = parse_selector("h1.novel-title")?;
        let title = select_first(&doc, &title_sel)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| missing("novel title"))?;

        let author = doc
            .root_element()
            .text()
            .filter_map(|t| t.trim().strip_prefix("Author:"))
            .map(|a| a.trim().to_string())
            .find(|a| !a.is_empty())
            .ok_or_else(|| missing("author"))?;

        let desc_sel = parse_selector("div.entry-content")?;
        let p_sel = parse_selector("p")?;
        let description = select_first(&doc, &desc_sel)
            .map(|content| {
                content
                    .select(&p_sel)
                    .map(element_text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let cover_sel = parse_selector("div.novel-cover img")?;
        let cover_url = select_first(&doc, &cover_sel)
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| base.join(src).ok())
            .map(|u| u.to_string())
            .ok_or_else(|| missing("cover image"))?;

        let list_sel = parse_selector("div.translated-chapters")?;
        let item_sel = parse_selector("div.chapter-item a[href]")?;
        let list = select_first(&doc, &list_sel).ok_or_else(|| missing("chapter list"))?;
        let mut entries = Vec::new();
        for a in list.select(&item_sel) {
            let href = a.value().attr("href").unwrap_or_default();
            let chapter_url = base.join(href).map_err(|e| ScraperError::InvalidUrl {
                input: href.to_string(),
                reason: e.to_string(),
            })?;
            entries.push((element_text(a), chapter_url.to_string()));
        }
        let chapters = ChapterReference::numbered(entries);
        tracing::debug!(%id, chapters = chapters.len(), "Parsed Chrysanthemum Garden landing page");

        Ok(Self {
            id,
            url: url.to_string(),
            title,
            author,
            description,
            cover_url,
            chapters,
        })
    }
}

#[async_trait]
impl Extractor for ChrysanthemumExtractor {
    fn site(&self) -> Site {
        Site::ChrysanthemumGarden
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn source_url(&self) -> &str {
        &self.url
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn language(&self) -> &str {
        "English"
    }

    fn cover_url(&self) -> &str {
        &self.cover_url
    }

    fn chapters(&self) -> Vec<ChapterReference> {
        self.chapters.clone()
    }

    fn chapter_content(&self, page: &Html, url: &str) -> Result<String, ScraperError> {
        let content_sel = parse_selector("div#novel-content")?;
        let content =
            select_first(page, &content_sel).ok_or_else(|| ScraperError::ContentNotFound {
                site: SITE,
                what: "chapter content",
                url: url.to_string(),
            })?;
        Ok(Rewrite::new()
            .drop_when(is_spacer_paragraph)
            .map_text_in(parse_selector(OBFUSCATED_SPAN)?, decode)
            .prune_empty_wrappers()
            .render(content))
    }
}
