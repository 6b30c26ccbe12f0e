//! Wattpad adapter. Story data comes from the v3 stories API; chapter text is the page's `<pre>` block.

use crate::extractor::error::ScraperError;
use crate::extractor::html::{parse_selector, select_first, Rewrite};
use crate::extractor::{Extractor, Fetcher, Site};
use crate::model::ChapterReference;
use async_trait::async_trait;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;

const SITE: &str = "Wattpad";
const WATTPAD_HOST: &str = "www.wattpad.com";
const STORY_API: &str = "https://www.wattpad.com/api/v3/stories";
const STORY_FIELDS: &str = "title,description,cover,language(name),user(name),parts(title,url)";

/// Response of `GET /api/v3/stories/{id}` restricted to [STORY_FIELDS].
#[derive(Debug, Deserialize)]
struct StoryInfo {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    language: Option<Named>,
    #[serde(default)]
    user: Option<Named>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Part {
    title: String,
    url: String,
}

/// Story id and slug from `https://www.wattpad.com/story/{id}-{slug}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryLocator {
    pub id: String,
    pub slug: String,
}

/// Validate a story URL without touching the network.
pub fn locate(url: &str) -> Result<StoryLocator, ScraperError> {
    let unrecognized = || ScraperError::SourceUnrecognized {
        site: SITE,
        url: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| unrecognized())?;
    if parsed.scheme() != "https" || parsed.host_str() != Some(WATTPAD_HOST) {
        return Err(unrecognized());
    }
    let rest = parsed.path().strip_prefix("/story/").ok_or_else(unrecognized)?;
    let (id, slug) = rest.split_once('-').ok_or_else(unrecognized)?;
    let slug = slug.trim_end_matches('/');
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) || slug.is_empty() {
        return Err(unrecognized());
    }
    Ok(StoryLocator {
        id: id.to_string(),
        slug: slug.to_string(),
    })
}

fn story_api_url(id: &str) -> String {
    format!("{}/{}?fields={}", STORY_API, id, STORY_FIELDS)
}

/// Wattpad story, populated from the stories API.
#[derive(Debug)]
pub struct WattpadExtractor {
    locator: StoryLocator,
    url: String,
    title: String,
    author: String,
    description: String,
    language: String,
    cover_url: String,
    chapters: Vec<ChapterReference>,
}

impl WattpadExtractor {
    pub async fn open(url: &str, http: &dyn Fetcher) -> Result<Self, ScraperError> {
        let locator = locate(url)?;
        let api_url = story_api_url(&locator.id);
        let body = http.get_text(&api_url).await?;
        Self::from_api_response(locator, url, &api_url, &body)
    }

    fn from_api_response(
        locator: StoryLocator,
        url: &str,
        api_url: &str,
        body: &str,
    ) -> Result<Self, ScraperError> {
        let info: StoryInfo =
            serde_json::from_str(body).map_err(|e| ScraperError::ApiResponse {
                url: api_url.to_string(),
                reason: e.to_string(),
            })?;
        let missing = |what: &'static str| ScraperError::ContentNotFound {
            site: SITE,
            what,
            url: api_url.to_string(),
        };
        let author = info.user.map(|u| u.name).ok_or_else(|| missing("author"))?;
        let cover_url = info
            .cover
            .filter(|c| !c.is_empty())
            .ok_or_else(|| missing("cover image"))?;
        let language = info
            .language
            .map(|l| l.name)
            .unwrap_or_else(|| "English".to_string());
        let chapters =
            ChapterReference::numbered(info.parts.into_iter().map(|p| (p.title, p.url)));
        tracing::debug!(id = %locator.id, chapters = chapters.len(), "Parsed Wattpad story");
        Ok(Self {
            locator,
            url: url.to_string(),
            title: info.title,
            author,
            description: info.description,
            language,
            cover_url,
            chapters,
        })
    }
}

#[async_trait]
impl Extractor for WattpadExtractor {
    fn site(&self) -> Site {
        Site::Wattpad
    }

    fn id(&self) -> &str {
        &self.locator.id
    }

    fn slug(&self) -> &str {
        &self.locator.slug
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
        &self.language
    }

    fn cover_url(&self) -> &str {
        &self.cover_url
    }

    fn chapters(&self) -> Vec<ChapterReference> {
        self.chapters.clone()
    }

    /// The first `<pre>` block holds the part's paragraphs; it is re-tagged as a `<div>`.
    fn chapter_content(&self, page: &Html, url: &str) -> Result<String, ScraperError> {
        let pre_sel = parse_selector("pre")?;
        let pre = select_first(page, &pre_sel).ok_or_else(|| ScraperError::ContentNotFound {
            site: SITE,
            what: "chapter text block",
            url: url.to_string(),
        })?;
        Ok(Rewrite::new().retag_root("div").render(pre))
    }
}
