use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::asset_store::AssetKind;
use crate::extractor::inline_styles;
use crate::file_manager::{relative_web_path, FileManager};
use crate::html_parser::HtmlDocument;

pub const INLINE_STYLES_FILE: &str = "inline_styles.css";
pub const INLINE_STYLE_SEPARATOR: &str = "\n\n/* ---- inline style separator ---- */\n\n";

/// Moves every `<style>` body into `css/inline_styles.css` and links it from
/// `<head>`. All `<style>` elements are removed; the file and link are only
/// created when some body is non-blank. Returns the written path.
pub fn relocate_inline_styles(
    doc: &mut HtmlDocument,
    files: &FileManager,
) -> std::io::Result<Option<PathBuf>> {
    let mut bodies = Vec::new();
    for (node, body) in inline_styles(doc) {
        if !body.trim().is_empty() {
            bodies.push(body);
        }
        doc.remove(&node);
    }

    if bodies.is_empty() {
        return Ok(None);
    }

    let path = files
        .base_dir()
        .join(AssetKind::Css.dir_name())
        .join(INLINE_STYLES_FILE);
    files.write_text(&path, &bodies.join(INLINE_STYLE_SEPARATOR))?;

    let href = relative_web_path(files.base_dir(), &path);
    doc.append_stylesheet_link(&href);
    Ok(Some(path))
}

/// Every candidate re-emitted at `1x`, joined by `, `.
pub fn format_srcset(local_paths: &[String]) -> String {
    local_paths
        .iter()
        .map(|p| format!("{} 1x", p))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replace each span of `text` with its substitute, leaving every other byte
/// as it was. Spans must be in ascending order; overlapping ones are dropped.
pub fn rewrite_css(text: &str, replacements: &[(Range<usize>, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, substitute) in replacements {
        if span.start < cursor || span.end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(substitute);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Substitute path for a reference from a document living in `from_dir`.
pub fn local_reference(from_dir: &Path, local_path: &Path) -> String {
    relative_web_path(from_dir, local_path)
}
