//! Foxaholic adapter. The site blocks scripted clients, so every page (landing page and chapters)
//! is read through a public web cache proxy. The landing page lists chapters newest first.

use crate::extractor::error::ScraperError;
use crate::extractor::html::{element_text, parse_selector, select_first, Rewrite};
use crate::extractor::{Extractor, Fetcher, Site};
use crate::model::ChapterReference;
use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Node};

const SITE: &str = "Foxaholic";
const FOXAHOLIC_HOST: &str = "www.foxaholic.com";

/// Prefix turning any page URL into its cached copy.
pub const CACHE_PROXY: &str = "https://webcache.googleusercontent.com/search?q=cache:";

/// Novel slug from `https://www.foxaholic.com/novel/{slug}/`.
pub fn locate(url: &str) -> Result<String, ScraperError> {
    let unrecognized = || ScraperError::SourceUnrecognized {
        site: SITE,
        url: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| unrecognized())?;
    if parsed.scheme() != "https" || parsed.host_str() != Some(FOXAHOLIC_HOST) {
        return Err(unrecognized());
    }
    let id = parsed
        .path()
        .strip_prefix("/novel/")
        .and_then(|rest| rest.strip_suffix('/'))
        .ok_or_else(unrecognized)?;
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(unrecognized());
    }
    Ok(id.to_string())
}

fn proxied(url: &str) -> String {
    format!("{}{}", CACHE_PROXY, url)
}

/// Foxaholic novel, populated from the cached landing page.
#[derive(Debug)]
pub struct FoxaholicExtractor {
    id: String,
    url: String,
    title: String,
    author: String,
    description: String,
    cover_url: String,
    chapters: Vec<ChapterReference>,
}

impl FoxaholicExtractor {
    pub async fn open(url: &str, http: &dyn Fetcher) -> Result<Self, ScraperError> {
        let id = locate(url)?;
        let html = http.get_text(&proxied(url)).await?;
        Self::from_landing_page(id, url, &html)
    }

    fn from_landing_page(id: String, url: &str, html: &str) -> Result<Self, ScraperError> {
        let doc = Html::parse_document(html);
        let missing = |what: &'static str| ScraperError::ContentNotFound {
            site: SITE,
            what,
            url: proxied(url),
        };
        let base = Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;

        let title_sel = parse_selector("div.post-title h1")?;
        let title = select_first(&doc, &title_sel)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| missing("novel title"))?;

        let author_sel = parse_selector("div.author-content")?;
        let link_sel = parse_selector("a")?;
        let author = select_first(&doc, &author_sel)
            .map(|block| {
                block
                    .select(&link_sel)
                    .map(element_text)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .ok_or_else(|| missing("author"))?;

        // Summary paragraphs stop at the first rule; what follows is site boilerplate.
        let summary_sel = parse_selector("div.summary__content")?;
        let mut paragraphs = Vec::new();
        if let Some(summary) = select_first(&doc, &summary_sel) {
            for child in summary.children() {
                if let Node::Element(el) = child.value() {
                    match el.name() {
                        "hr" => break,
                        "p" => {
                            if let Some(p) = scraper::ElementRef::wrap(child) {
                                paragraphs.push(element_text(p));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        let description = paragraphs.join("\n");

        let cover_sel = parse_selector("div.summary_image img")?;
        let cover_url = select_first(&doc, &cover_sel)
            .and_then(|img| img.value().attr("data-src").or_else(|| img.value().attr("src")))
            .and_then(|src| base.join(src).ok())
            .map(|u| u.to_string())
            .ok_or_else(|| missing("cover image"))?;

        let chapter_sel = parse_selector("li.wp-manga-chapter a[href]")?;
        let mut entries = Vec::new();
        for a in doc.select(&chapter_sel) {
            let href = a.value().attr("href").unwrap_or_default();
            let chapter_url = base.join(href).map_err(|e| ScraperError::InvalidUrl {
                input: href.to_string(),
                reason: e.to_string(),
            })?;
            entries.push((element_text(a), proxied(chapter_url.as_str())));
        }
        entries.reverse();
        let chapters = ChapterReference::numbered(entries);
        tracing::debug!(%id, chapters = chapters.len(), "Parsed Foxaholic landing page");

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
impl Extractor for FoxaholicExtractor {
    fn site(&self) -> Site {
        Site::Foxaholic
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

    /// Oldest first, each URL routed through [CACHE_PROXY].
    fn chapters(&self) -> Vec<ChapterReference> {
        self.chapters.clone()
    }

    fn chapter_content(&self, page: &Html, url: &str) -> Result<String, ScraperError> {
        let content_sel = parse_selector("div.text-left")?;
        let content =
            select_first(page, &content_sel).ok_or_else(|| ScraperError::ContentNotFound {
                site: SITE,
                what: "chapter content",
                url: url.to_string(),
            })?;
        Ok(Rewrite::new().render(content))
    }
}
