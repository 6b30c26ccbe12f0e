//! EPUB 3 writer. Packages a composed [Document] (mimetype, container, OPF, nav page, NCX,
//! stylesheet, cover image, chapter pages) into a zip archive.

use crate::model::{Document, SpineItem, TocEntry, NAV_FILE_NAME, STYLESHEET_HREF};
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Stylesheet bundled into every book unless configuration supplies another.
pub const DEFAULT_STYLESHEET: &str = include_str!("../../assets/style.css");

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";

/// `dcterms:modified` format: UTC, seconds precision.
const MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Errors from the EPUB writer. Maps to CLI exit code 3.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book author is empty.")]
    EmptyAuthor,

    #[error("Cannot write EPUB: book has no chapters.")]
    NoChapters,

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move finished EPUB into place: {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Cover image format, recognised from the file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverFormat {
    pub ext: &'static str,
    pub media_type: &'static str,
}

impl CoverFormat {
    const JPEG: CoverFormat = CoverFormat {
        ext: "jpg",
        media_type: "image/jpeg",
    };

    /// Sniff PNG, JPEG, GIF or WebP. Returns `None` for empty input; unknown data is treated as JPEG.
    pub fn sniff(bytes: &[u8]) -> Option<CoverFormat> {
        if bytes.is_empty() {
            return None;
        }
        let format = if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            CoverFormat {
                ext: "png",
                media_type: "image/png",
            }
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            CoverFormat {
                ext: "gif",
                media_type: "image/gif",
            }
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            CoverFormat {
                ext: "webp",
                media_type: "image/webp",
            }
        } else {
            if !bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
                tracing::warn!("Unrecognized cover image format; packaging it as JPEG");
            }
            CoverFormat::JPEG
        };
        Some(format)
    }

    fn href(self) -> String {
        format!("images/cover.{}", self.ext)
    }
}

/// BCP 47 tag for a language name as reported by the sites ("English" -> "en").
///
/// Values that already look like a tag are passed through lowercased; unknown names map to `und`.
pub fn language_tag(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let tag = match lowered.as_str() {
        "english" => "en",
        "chinese" | "中文" => "zh",
        "japanese" | "日本語" => "ja",
        "korean" | "한국어" => "ko",
        "spanish" | "español" => "es",
        "french" | "français" => "fr",
        "german" | "deutsch" => "de",
        "italian" | "italiano" => "it",
        "portuguese" | "português" => "pt",
        "russian" | "русский" => "ru",
        "indonesian" | "bahasa indonesia" => "id",
        "vietnamese" | "tiếng việt" => "vi",
        "filipino" | "tagalog" => "fil",
        "turkish" | "türkçe" => "tr",
        "polish" | "polski" => "pl",
        "dutch" | "nederlands" => "nl",
        "arabic" => "ar",
        "thai" => "th",
        _ => {
            let looks_like_tag = !lowered.is_empty()
                && lowered.split('-').all(|part| {
                    (1..=8).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphanumeric())
                })
                && lowered.split('-').next().map_or(false, |p| p.len() <= 3);
            return if looks_like_tag {
                lowered
            } else {
                "und".to_string()
            };
        }
    };
    tag.to_string()
}

/// Write a [Document] to an EPUB file at `path`.
///
/// The document is validated before anything is created. The archive is streamed into
/// `<path>.part` and only renamed to `path` once complete, so a failed write leaves nothing behind.
pub fn write_epub(doc: &Document, path: &Path) -> Result<(), EpubError> {
    validate_document(doc)?;
    write_replacing(path, |file| write_epub_to(doc, file))?;
    tracing::info!(path = %path.display(), chapters = doc.chapters.len(), "EPUB written");
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Run `fill` against a fresh `<path>.part` file, then rename it over `path`.
/// On any error the partial file is removed and `path` is not touched.
fn write_replacing<F>(path: &Path, fill: F) -> Result<(), EpubError>
where
    F: FnOnce(&mut File) -> Result<(), EpubError>,
{
    let part = partial_path(path);
    let mut file = File::create(&part).map_err(|e| EpubError::CreateFile {
        path: part.clone(),
        source: e,
    })?;
    let written = fill(&mut file).and_then(|()| file.sync_all().map_err(EpubError::from));
    drop(file);
    let result = written.and_then(|()| {
        std::fs::rename(&part, path).map_err(|e| EpubError::Finalize {
            path: path.to_path_buf(),
            source: e,
        })
    });
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(&part) {
            tracing::warn!(path = %part.display(), error = %e, "Could not remove partial EPUB");
        }
    }
    result
}

/// Write a [Document] as EPUB into any seekable writer.
pub fn write_epub_to<W: Write + Seek>(doc: &Document, writer: W) -> Result<(), EpubError> {
    validate_document(doc)?;
    let mut zip = ZipWriter::new(writer);

    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    // Mimetype first, uncompressed
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    let cover = CoverFormat::sniff(&doc.metadata.cover_image);

    let modified = chrono::Utc::now().format(MODIFIED_FORMAT).to_string();
    write_entry(
        &mut zip,
        "content.opf",
        &package_document(doc, cover, &modified),
        options_deflate,
    )?;
    write_entry(&mut zip, NAV_FILE_NAME, &nav_page(doc), options_deflate)?;
    write_entry(&mut zip, "toc.ncx", &ncx(doc), options_deflate)?;
    write_entry(&mut zip, STYLESHEET_HREF, &doc.stylesheet, options_deflate)?;
    for chapter in &doc.chapters {
        write_entry(&mut zip, &chapter.file_name, &chapter.xhtml, options_deflate)?;
    }
    if let Some(format) = cover {
        zip.start_file(format!("{}{}", OEBPS_PREFIX, format.href()), options_deflate)?;
        zip.write_all(&doc.metadata.cover_image)?;
    }

    zip.finish()?;
    Ok(())
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    content: &str,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    zip.start_file(format!("{}{}", OEBPS_PREFIX, name), options)?;
    zip.write_all(content.as_bytes())?;
    Ok(())
}

fn validate_document(doc: &Document) -> Result<(), EpubError> {
    if doc.metadata.title.trim().is_empty() {
        return Err(EpubError::EmptyTitle);
    }
    if doc.metadata.author.trim().is_empty() {
        return Err(EpubError::EmptyAuthor);
    }
    if doc.chapters.is_empty() {
        return Err(EpubError::NoChapters);
    }
    Ok(())
}

fn chapter_id(index: usize) -> String {
    format!("chapter_{}", index + 1)
}

fn package_document(doc: &Document, cover: Option<CoverFormat>, modified: &str) -> String {
    let meta = &doc.metadata;
    let mut metadata = format!(
        r#"    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{creator}</dc:creator>
    <dc:language>{language}</dc:language>
    <dc:publisher>{publisher}</dc:publisher>
    <dc:source>{source}</dc:source>
    <meta property="dcterms:modified">{modified}</meta>
"#,
        id = xml_escape(&doc.identifier),
        title = xml_escape(&meta.title),
        creator = xml_escape(&meta.author),
        language = xml_escape(&language_tag(&meta.language)),
        publisher = xml_escape(&meta.publisher),
        source = xml_escape(&meta.source_url),
        modified = xml_escape(modified),
    );
    if !meta.description.trim().is_empty() {
        metadata.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            xml_escape(&meta.description)
        ));
    }
    if cover.is_some() {
        metadata.push_str("    <meta name=\"cover\" content=\"cover-img\"/>\n");
    }

    let mut manifest = format!(
        r#"    <item id="nav" href="{nav}" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="css" href="{css}" media-type="text/css"/>
"#,
        nav = NAV_FILE_NAME,
        css = STYLESHEET_HREF
    );
    if let Some(format) = cover {
        manifest.push_str(&format!(
            "    <item id=\"cover-img\" href=\"{}\" media-type=\"{}\" properties=\"cover-image\"/>\n",
            format.href(),
            format.media_type
        ));
    }
    for (i, chapter) in doc.chapters.iter().enumerate() {
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter_id(i),
            xml_escape(&chapter.file_name)
        ));
    }

    let mut spine = String::new();
    for item in &doc.spine {
        let idref = match item {
            SpineItem::Navigation => "nav".to_string(),
            SpineItem::Chapter(i) if *i < doc.chapters.len() => chapter_id(*i),
            SpineItem::Chapter(_) => continue,
        };
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", idref));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
{metadata}  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#
    )
}

/// Navigation document. Doubles as the "Introduction": story details above the contents list.
fn nav_page(doc: &Document) -> String {
    let meta = &doc.metadata;
    let description: String = meta
        .description
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("    <p>{}</p>\n", xml_escape(line)))
        .collect();
    let mut contents = String::new();
    nav_list(&doc.toc, 2, &mut contents);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body>
  <div class="story-info">
    <h1>{title}</h1>
    <p class="author">{author}</p>
  <div class="description">
{description}  </div>
  </div>
  <nav epub:type="toc" id="toc">
    <h2>Contents</h2>
{contents}  </nav>
</body>
</html>
"#,
        lang = xml_escape(&language_tag(&meta.language)),
        title = xml_escape(&meta.title),
        author = xml_escape(&meta.author),
        css = STYLESHEET_HREF,
        description = description,
        contents = contents,
    )
}

fn nav_list(entries: &[TocEntry], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{}<ol>\n", indent));
    for entry in entries {
        match entry {
            TocEntry::Link { href, title } => out.push_str(&format!(
                "{}  <li><a href=\"{}\">{}</a></li>\n",
                indent,
                xml_escape(href),
                xml_escape(title)
            )),
            TocEntry::Section { title, children } => {
                out.push_str(&format!("{}  <li><span>{}</span>\n", indent, xml_escape(title)));
                if !children.is_empty() {
                    nav_list(children, depth + 2, out);
                }
                out.push_str(&format!("{}  </li>\n", indent));
            }
        }
    }
    out.push_str(&format!("{}</ol>\n", indent));
}

fn ncx(doc: &Document) -> String {
    let mut points = String::new();
    let mut play_order = 0;
    ncx_points(&doc.toc, 2, &mut play_order, &mut points);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{uid}"/>
  </head>
  <docTitle>
    <text>{title}</text>
  </docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#,
        uid = xml_escape(&doc.identifier),
        title = xml_escape(&doc.metadata.title),
        points = points,
    )
}

const NO_CHILDREN: &[TocEntry] = &[];

fn ncx_points(entries: &[TocEntry], depth: usize, play_order: &mut usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for entry in entries {
        *play_order += 1;
        let (title, src, children): (&str, &str, &[TocEntry]) = match entry {
            TocEntry::Link { href, title } => (title.as_str(), href.as_str(), NO_CHILDREN),
            // Sections point at their first entry; NCX requires every point to have content.
            TocEntry::Section { title, children } => (
                title.as_str(),
                first_href(children).unwrap_or(NAV_FILE_NAME),
                children.as_slice(),
            ),
        };
        out.push_str(&format!(
            "{indent}<navPoint id=\"navpoint-{n}\" playOrder=\"{n}\">\n{indent}  <navLabel><text>{title}</text></navLabel>\n{indent}  <content src=\"{src}\"/>\n",
            indent = indent,
            n = *play_order,
            title = xml_escape(title),
            src = xml_escape(src),
        ));
        ncx_points(children, depth + 1, play_order, out);
        out.push_str(&format!("{}</navPoint>\n", indent));
    }
}

fn first_href(entries: &[TocEntry]) -> Option<&str> {
    entries.iter().find_map(|entry| match entry {
        TocEntry::Link { href, .. } => Some(href.as_str()),
        TocEntry::Section { children, .. } => first_href(children),
    })
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
