//! HTML helpers shared by the site extractors: selector parsing, text lookup, and a fragment
//! rewriter that serialises a cleaned subtree as XHTML.

use crate::extractor::error::ScraperError;
use scraper::{ElementRef, Html, Node, Selector};

/// Parse a CSS selector or return an error (avoids panics from Selector::parse).
pub fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::InvalidSelector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}

/// First element matching `sel`.
pub fn select_first<'a>(doc: &'a Html, sel: &Selector) -> Option<ElementRef<'a>> {
    doc.select(sel).next()
}

/// Concatenated, trimmed text of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Elements that never make it into a chapter body.
const ALWAYS_DROPPED: &[&str] = &["script", "style", "noscript", "iframe", "form", "button"];

/// Elements written as self-closing tags.
const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "source", "track", "wbr",
];

/// Wrappers removed by [`Rewrite::prune_empty_wrappers`] when they end up without text.
const PRUNABLE: &[&str] = &[
    "span", "div", "p", "font", "b", "i", "em", "strong", "u", "s", "small", "sup", "sub", "a",
    "section",
];

/// Text transform applied inside matching elements.
pub type TextMap = fn(&str) -> String;

/// Serialises an element subtree as an XHTML fragment, applying cleanup rules on the way.
///
/// The root element is always emitted, so the output is a single rooted fragment.
#[derive(Default)]
pub struct Rewrite {
    root_tag: Option<&'static str>,
    prune_empty: bool,
    drop_when: Option<fn(&ElementRef<'_>) -> bool>,
    text_map: Option<(Selector, TextMap)>,
}

impl Rewrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit the root element under a different tag name (e.g. `pre` -> `div`).
    pub fn retag_root(mut self, tag: &'static str) -> Self {
        self.root_tag = Some(tag);
        self
    }

    /// Remove non-root wrapper elements that contain no text or images after cleanup.
    pub fn prune_empty_wrappers(mut self) -> Self {
        self.prune_empty = true;
        self
    }

    /// Drop every non-root element for which `pred` holds, including its subtree.
    pub fn drop_when(mut self, pred: fn(&ElementRef<'_>) -> bool) -> Self {
        self.drop_when = Some(pred);
        self
    }

    /// Transform all text inside elements matching `selector`.
    pub fn map_text_in(mut self, selector: Selector, map: TextMap) -> Self {
        self.text_map = Some((selector, map));
        self
    }

    pub fn render(&self, root: ElementRef<'_>) -> String {
        let mut out = String::new();
        self.render_element(root, true, None, &mut out);
        out
    }

    /// Writes `el` into `out` unless it is dropped or pruned. Returns whether it carried content.
    fn render_element(
        &self,
        el: ElementRef<'_>,
        is_root: bool,
        inherited: Option<TextMap>,
        out: &mut String,
    ) -> bool {
        let name = el.value().name();
        if !is_root {
            if ALWAYS_DROPPED.contains(&name) {
                return false;
            }
            if let Some(pred) = self.drop_when {
                if pred(&el) {
                    return false;
                }
            }
        }

        let map = match &self.text_map {
            Some((sel, f)) if sel.matches(&el) => Some(*f),
            _ => inherited,
        };

        let mut inner = String::new();
        let mut has_content = name == "img";
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    let text: &str = text;
                    if !text.trim().is_empty() {
                        has_content = true;
                    }
                    match map {
                        Some(f) => escape_text_into(&f(text), &mut inner),
                        None => escape_text_into(text, &mut inner),
                    }
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        has_content |= self.render_element(child_el, false, map, &mut inner);
                    }
                }
                _ => {}
            }
        }

        if !is_root && self.prune_empty && !has_content && PRUNABLE.contains(&name) {
            return false;
        }

        let tag = if is_root {
            self.root_tag.unwrap_or(name)
        } else {
            name
        };
        out.push('<');
        out.push_str(tag);
        for (key, value) in el.value().attrs() {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        if VOID_ELEMENTS.contains(&name) {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&inner);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        has_content
    }
}

fn escape_text_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Escape text for element content.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_text_into(s, &mut out);
    out
}

/// Escape text for a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(doc: &'a Html, sel: &str) -> ElementRef<'a> {
        let sel = parse_selector(sel).unwrap();
        select_first(doc, &sel).unwrap()
    }

    #[test]
    fn invalid_selector_is_an_error() {
        assert!(matches!(
            parse_selector("div[["),
            Err(ScraperError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn render_keeps_structure_and_escapes() {
        let doc = Html::parse_document(
            r#"<div id="c"><p class="x">Fish &amp; chips &lt;3</p><br><img src="a.png"></div>"#,
        );
        let out = Rewrite::new().render(first(&doc, "#c"));
        assert_eq!(
            out,
            r#"<div id="c"><p class="x">Fish &amp; chips &lt;3</p><br/><img src="a.png"/></div>"#
        );
    }

    #[test]
    fn render_drops_scripts() {
        let doc = Html::parse_document(r#"<div id="c"><p>a</p><script>var x = 1;</script></div>"#);
        let out = Rewrite::new().render(first(&doc, "#c"));
        assert_eq!(out, r#"<div id="c"><p>a</p></div>"#);
    }

    #[test]
    fn retag_root_only_changes_root() {
        let doc = Html::parse_document(r#"<pre id="c"><p>line</p></pre>"#);
        let out = Rewrite::new().retag_root("div").render(first(&doc, "#c"));
        assert_eq!(out, r#"<div id="c"><p>line</p></div>"#);
    }

    #[test]
    fn prune_removes_nested_empty_wrappers_but_keeps_images() {
        let doc = Html::parse_document(
            r#"<div id="c"><p><span> </span></p><p>text</p><div><img src="i.png"></div></div>"#,
        );
        let out = Rewrite::new()
            .prune_empty_wrappers()
            .render(first(&doc, "#c"));
        assert_eq!(
            out,
            r#"<div id="c"><p>text</p><div><img src="i.png"/></div></div>"#
        );
    }

    #[test]
    fn drop_when_and_map_text() {
        fn is_hidden(el: &ElementRef<'_>) -> bool {
            el.value().attr("hidden").is_some()
        }
        fn upper(s: &str) -> String {
            s.to_uppercase()
        }
        let doc = Html::parse_document(
            r#"<div id="c"><p hidden>gone</p><p>keep <span class="m">loud</span> quiet</p></div>"#,
        );
        let out = Rewrite::new()
            .drop_when(is_hidden)
            .map_text_in(parse_selector("span.m").unwrap(), upper)
            .render(first(&doc, "#c"));
        assert_eq!(
            out,
            r#"<div id="c"><p>keep <span class="m">LOUD</span> quiet</p></div>"#
        );
    }

    #[test]
    fn escape_helpers() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attr("say \"hi\""), "say &quot;hi&quot;");
    }
}
