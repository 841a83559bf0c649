use markup5ever_rcdom::Handle;
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use url::Url;

use crate::html_parser::HtmlDocument;

/// Where a reference was found, which decides how it is fetched and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageContext {
    Stylesheet,
    Script,
    Image,
    SrcsetImage,
    Icon,
    MetaImage,
    CssUrl,
    CssImport,
}

/// A raw, unresolved reference as written in its source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub raw: String,
    pub source: Url,
    pub context: UsageContext,
    /// srcset descriptor (`2x`, `480w`) as written. Rewritten srcsets always
    /// use `1x`, so this never reaches the output.
    pub descriptor: Option<String>,
}

/// An HTML attribute holding one reference, or several for `srcset`.
#[derive(Debug, Clone)]
pub struct AttrSlot {
    pub node: Handle,
    pub attr: &'static str,
    pub context: UsageContext,
    pub value: String,
}

impl AttrSlot {
    pub fn references(&self, source: &Url) -> Vec<AssetReference> {
        match self.context {
            UsageContext::SrcsetImage => parse_srcset(&self.value)
                .into_iter()
                .map(|(raw, descriptor)| AssetReference {
                    raw: raw.to_string(),
                    source: source.clone(),
                    context: self.context,
                    descriptor: descriptor.map(str::to_string),
                })
                .collect(),
            _ => vec![AssetReference {
                raw: self.value.clone(),
                source: source.clone(),
                context: self.context,
                descriptor: None,
            }],
        }
    }
}

/// A reference found in CSS text, with the byte span of the raw text so it
/// can be replaced literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    pub raw: String,
    pub span: Range<usize>,
    pub context: UsageContext,
}

impl CssReference {
    /// Import-like targets are fetched as stylesheets; everything else goes
    /// through the image pipeline.
    pub fn is_import_like(&self) -> bool {
        let lower = self.raw.to_ascii_lowercase();
        lower.ends_with(".css") || lower.contains("text/css")
    }
}

// `shortcut icon` is matched through its `icon` token.
const ICON_RELS: &[&str] = &["icon", "apple-touch-icon", "mask-icon"];
const META_IMAGE_PROPERTIES: &[&str] = &["og:image", "og:image:url"];
const META_IMAGE_NAMES: &[&str] = &["twitter:image", "twitter:image:src"];

fn regex(pattern: &'static str, desc: &'static str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid {desc} regex: {err}"))
}

fn rel_tokens(node: &Handle) -> Vec<String> {
    HtmlDocument::attr(node, "rel")
        .unwrap_or_default()
        .split_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

fn is_icon_rel(tokens: &[String]) -> bool {
    tokens.iter().any(|t| ICON_RELS.contains(&t.as_str()))
}

fn push_slot(
    slots: &mut Vec<AttrSlot>,
    node: &Handle,
    attr: &'static str,
    context: UsageContext,
) {
    if let Some(value) = HtmlDocument::attr(node, attr) {
        if !value.is_empty() {
            slots.push(AttrSlot {
                node: node.clone(),
                attr,
                context,
                value,
            });
        }
    }
}

/// Every asset-bearing attribute in `doc`, grouped in processing order:
/// links, scripts, images (src then srcset per element), `<source srcset>`,
/// then meta images. Synthetic elements are skipped.
pub fn extract_html(doc: &HtmlDocument) -> Vec<AttrSlot> {
    let mut slots = Vec::new();

    for link in doc.elements("link") {
        if doc.is_synthetic(&link) {
            continue;
        }
        let rel = rel_tokens(&link);
        if rel.iter().any(|t| t == "stylesheet") {
            push_slot(&mut slots, &link, "href", UsageContext::Stylesheet);
        }
        if is_icon_rel(&rel) {
            push_slot(&mut slots, &link, "href", UsageContext::Icon);
        }
    }

    for script in doc.elements("script") {
        push_slot(&mut slots, &script, "src", UsageContext::Script);
    }

    for img in doc.elements("img") {
        push_slot(&mut slots, &img, "src", UsageContext::Image);
        push_slot(&mut slots, &img, "srcset", UsageContext::SrcsetImage);
    }

    for source in doc.elements("source") {
        push_slot(&mut slots, &source, "srcset", UsageContext::SrcsetImage);
    }

    for meta in doc.elements("meta") {
        let property = HtmlDocument::attr(&meta, "property")
            .unwrap_or_default()
            .to_ascii_lowercase();
        let name = HtmlDocument::attr(&meta, "name")
            .unwrap_or_default()
            .to_ascii_lowercase();
        if META_IMAGE_PROPERTIES.contains(&property.as_str())
            || META_IMAGE_NAMES.contains(&name.as_str())
        {
            push_slot(&mut slots, &meta, "content", UsageContext::MetaImage);
        }
    }

    slots
}

/// Bodies of all `<style>` elements, in document order, including blank ones.
pub fn inline_styles(doc: &HtmlDocument) -> Vec<(Handle, String)> {
    doc.elements("style")
        .into_iter()
        .map(|node| {
            let body = HtmlDocument::text_content(&node);
            (node, body)
        })
        .collect()
}

/// `"a.jpg 1x, b.jpg 2x"` -> `[("a.jpg", Some("1x")), ("b.jpg", Some("2x"))]`.
pub fn parse_srcset(srcset: &str) -> Vec<(&str, Option<&str>)> {
    let mut out = Vec::new();
    for candidate in srcset.split(',') {
        let mut parts = candidate.split_whitespace();
        let Some(url_part) = parts.next() else {
            continue;
        };
        let descriptor = parts.next();
        out.push((url_part, descriptor));
    }
    out
}

/// `url(...)` and `@import` references in CSS text, ordered by position.
/// An `@import url("x")` yields a single `CssImport` reference.
pub fn extract_css(css: &str) -> Vec<CssReference> {
    static CSS_URL: OnceLock<Regex> = OnceLock::new();
    static CSS_IMPORT: OnceLock<Regex> = OnceLock::new();

    let css_url = CSS_URL.get_or_init(|| {
        regex(
            r#"(?i)url\(\s*(?:"(.*?)"|'(.*?)'|(.*?))\s*\)"#,
            "css url",
        )
    });
    let css_import = CSS_IMPORT.get_or_init(|| {
        regex(r#"(?i)@import\s+(?:url\()?['"](.*?)['"]\)?"#, "css import")
    });

    let mut refs: Vec<CssReference> = Vec::new();

    for caps in css_import.captures_iter(css) {
        if let Some(m) = caps.get(1) {
            if let Some(reference) = trimmed_reference(css, m.range(), UsageContext::CssImport) {
                refs.push(reference);
            }
        }
    }

    for caps in css_url.captures_iter(css) {
        let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        let Some(reference) = trimmed_reference(css, m.range(), UsageContext::CssUrl) else {
            continue;
        };
        if refs.iter().any(|r| overlaps(&r.span, &reference.span)) {
            continue;
        }
        refs.push(reference);
    }

    refs.sort_by_key(|r| r.span.start);
    refs
}

fn trimmed_reference(css: &str, span: Range<usize>, context: UsageContext) -> Option<CssReference> {
    let text = &css[span.clone()];
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }
    let start = span.start + (text.len() - text.trim_start().len());
    Some(CssReference {
        raw: raw.to_string(),
        span: start..start + raw.len(),
        context,
    })
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
