use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Content-type to file extension, used only when the URL carries none.
pub const CONTENT_TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("text/css", ".css"),
    ("text/javascript", ".js"),
    ("application/javascript", ".js"),
    ("application/x-javascript", ".js"),
    ("image/png", ".png"),
    ("image/jpeg", ".jpg"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
    ("image/x-icon", ".ico"),
    ("image/vnd.microsoft.icon", ".ico"),
    ("image/avif", ".avif"),
];

/// Length of the URL digest embedded in every stored filename.
const DIGEST_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Css,
    Js,
    Img,
    Other,
}

impl AssetKind {
    /// Bucket directory under the destination root.
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetKind::Css => "css",
            AssetKind::Js => "js",
            AssetKind::Img => "img",
            AssetKind::Other => "assets",
        }
    }

    /// Base name used when the URL path has no last segment.
    fn default_name(self) -> &'static str {
        match self {
            AssetKind::Css => "css",
            AssetKind::Js => "js",
            AssetKind::Img => "img",
            AssetKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Final URL after redirects.
    pub remote_url: Url,
    pub local_path: PathBuf,
    pub kind: AssetKind,
}

/// Maps each pre-redirect URL to exactly one local file, on first sight only.
///
/// Records are never removed or replaced for the lifetime of the store. A
/// secondary index maps local paths back to the URL they were stored under so
/// saved stylesheets can resolve their own nested references.
#[derive(Debug)]
pub struct AssetStore {
    root: PathBuf,
    records: HashMap<Url, AssetRecord>,
    sources: HashMap<PathBuf, Url>,
}

impl AssetStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            records: HashMap::new(),
            sources: HashMap::new(),
        }
    }

    pub fn lookup(&self, url: &Url) -> Option<&Path> {
        self.records.get(url).map(|r| r.local_path.as_path())
    }

    pub fn record(&self, url: &Url) -> Option<&AssetRecord> {
        self.records.get(url)
    }

    /// The pre-redirect URL a local file was stored under.
    pub fn source_url(&self, local_path: &Path) -> Option<&Url> {
        self.sources.get(local_path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Where an asset fetched from `final_url` would be stored. Pure: the same
    /// inputs always give the same path.
    pub fn local_path_for(&self, kind: AssetKind, final_url: &Url, content_type: &str) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(stored_file_name(kind, final_url, content_type))
    }

    /// Memoized path for `key`. The first call decides the path from
    /// `final_url`; later calls for the same key return it unchanged.
    pub fn get_or_create_local_path(
        &mut self,
        key: &Url,
        final_url: &Url,
        kind: AssetKind,
        content_type: &str,
    ) -> PathBuf {
        if let Some(existing) = self.records.get(key) {
            return existing.local_path.clone();
        }

        let local_path = self.local_path_for(kind, final_url, content_type);
        self.sources
            .entry(local_path.clone())
            .or_insert_with(|| key.clone());
        self.records.insert(
            key.clone(),
            AssetRecord {
                remote_url: final_url.clone(),
                local_path: local_path.clone(),
                kind,
            },
        );
        local_path
    }
}

/// `<sanitized-stem>_<digest><ext>` for an asset fetched from `final_url`.
pub fn stored_file_name(kind: AssetKind, final_url: &Url, content_type: &str) -> String {
    let base_name = file_name_from_url(final_url).unwrap_or_else(|| kind.default_name().to_string());
    let (stem, ext) = split_extension(&base_name);
    let ext = if ext.is_empty() {
        extension_for_content_type(content_type).unwrap_or("")
    } else {
        ext
    };
    format!("{}_{}{}", safe_filename(stem), short_hash(final_url.as_str()), ext)
}

/// Sanitized last path segment, or `None` when the path ends in `/`.
fn file_name_from_url(url: &Url) -> Option<String> {
    let last = url.path().rsplit('/').next().unwrap_or("");
    if last.is_empty() {
        return None;
    }
    Some(safe_filename(last))
}

/// Percent-decode, collapse runs outside `[A-Za-z0-9._-]` to `_`, trim dots
/// and underscores from both ends. Never returns an empty string.
pub fn safe_filename(name: &str) -> String {
    let decoded = percent_decode_str(name).decode_utf8_lossy();
    let mut out = String::with_capacity(decoded.len());
    let mut in_run = false;
    for c in decoded.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split at the last dot that is not the first character; the extension keeps
/// its dot.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    CONTENT_TYPE_EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == content_type)
        .map(|(_, ext)| *ext)
}

pub fn short_hash(input: &str) -> String {
    let digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest[..DIGEST_LEN].to_string()
}
