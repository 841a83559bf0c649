use indicatif::ProgressBar;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::asset_store::{AssetKind, AssetStore};
use crate::error::{AssetError, RipError};
use crate::extractor::{extract_css, extract_html, AttrSlot, UsageContext};
use crate::fetcher::Fetcher;
use crate::file_manager::FileManager;
use crate::html_parser::HtmlDocument;
use crate::rewriter::{format_srcset, local_reference, relocate_inline_styles, rewrite_css};
use crate::url_resolver::resolve;

pub const INDEX_FILE: &str = "index.html";

/// What a finished rip produced. Each entry is `(final remote URL, local path)`.
#[derive(Debug, Default, Clone)]
pub struct RipSummary {
    pub index_path: PathBuf,
    pub inline_styles: Option<PathBuf>,
    pub css: Vec<(Url, PathBuf)>,
    pub js: Vec<(Url, PathBuf)>,
    pub images: Vec<(Url, PathBuf)>,
}

/// Rips one page and the assets it references into a destination root.
///
/// Runs strictly sequentially: each fetch completes before the next starts,
/// and the HTML tree is only ever touched from here.
pub struct PageRipper<F: Fetcher> {
    fetcher: F,
    files: FileManager,
    store: AssetStore,
    progress: ProgressBar,
}

impl<F: Fetcher> PageRipper<F> {
    pub fn new(fetcher: F, files: FileManager) -> Self {
        let store = AssetStore::new(files.base_dir());
        Self {
            fetcher,
            files,
            store,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Only a failure to fetch the seed page, or to write `index.html`,
    /// is an error. Every asset is best effort.
    pub async fn rip(&mut self, seed: &Url) -> Result<RipSummary, RipError> {
        self.progress.set_message(format!("Fetching {}", seed));
        let page = self
            .fetcher
            .fetch_text(seed)
            .await
            .map_err(RipError::RootFetch)?;
        let page_url = page.final_url;
        info!(url = %page_url, "fetched root document");

        let mut doc = HtmlDocument::parse(&page.text);
        let mut summary = RipSummary {
            inline_styles: relocate_inline_styles(&mut doc, &self.files)?,
            ..Default::default()
        };

        let root = self.files.base_dir().to_path_buf();
        for slot in extract_html(&doc) {
            let rewritten = match slot.context {
                UsageContext::Stylesheet => {
                    self.stylesheet(&page_url, &slot.value, &root, &mut summary).await
                }
                UsageContext::Script => self.script(&page_url, &slot.value, &root, &mut summary).await,
                UsageContext::SrcsetImage => self.srcset(&page_url, &slot, &root, &mut summary).await,
                _ => self.image(&page_url, &slot.value, &root, &mut summary).await,
            };
            match rewritten {
                Ok(value) => doc.set_attr(&slot.node, slot.attr, &value),
                Err(err) => debug!(reference = %slot.value, error = %err, "left reference untouched"),
            }
        }

        self.rewrite_stylesheets(&mut summary).await;

        summary.index_path = root.join(INDEX_FILE);
        let html = doc.serialize().map_err(RipError::Serialize)?;
        self.files.write_text(&summary.index_path, &html)?;
        self.progress.finish_and_clear();

        info!(
            css = summary.css.len(),
            js = summary.js.len(),
            images = summary.images.len(),
            "rip complete"
        );
        Ok(summary)
    }

    /// Fetch a stylesheet as text, returning the reference that replaces `raw`.
    async fn stylesheet(
        &mut self,
        base: &Url,
        raw: &str,
        from_dir: &Path,
        summary: &mut RipSummary,
    ) -> Result<String, AssetError> {
        let url = resolve(base, raw).ok_or_else(|| AssetError::Unresolvable(raw.to_string()))?;
        let local = self.fetch_stylesheet(&url, summary).await?;
        Ok(local_reference(from_dir, &local))
    }

    async fn fetch_stylesheet(
        &mut self,
        url: &Url,
        summary: &mut RipSummary,
    ) -> Result<PathBuf, AssetError> {
        if let Some(existing) = self.store.lookup(url) {
            debug!(url = %url, "reusing stored asset");
            return Ok(existing.to_path_buf());
        }

        self.progress.set_message(format!("Fetching {}", url));
        let fetched = self.fetcher.fetch_text(url).await?;
        let local = self
            .store
            .local_path_for(AssetKind::Css, &fetched.final_url, "text/css");
        if self.store.source_url(&local).is_some() {
            // Stored under another URL; that copy may already be rewritten.
            debug!(url = %url, path = ?local, "stylesheet already stored");
            self.store
                .get_or_create_local_path(url, &fetched.final_url, AssetKind::Css, "text/css");
            return Ok(local);
        }
        self.files.write_text(&local, &fetched.text)?;
        self.store
            .get_or_create_local_path(url, &fetched.final_url, AssetKind::Css, "text/css");
        summary.css.push((fetched.final_url, local.clone()));
        Ok(local)
    }

    async fn script(
        &mut self,
        base: &Url,
        raw: &str,
        from_dir: &Path,
        summary: &mut RipSummary,
    ) -> Result<String, AssetError> {
        let url = resolve(base, raw).ok_or_else(|| AssetError::Unresolvable(raw.to_string()))?;
        if let Some(existing) = self.store.lookup(&url) {
            return Ok(local_reference(from_dir, existing));
        }

        self.progress.set_message(format!("Fetching {}", url));
        let fetched = self.fetcher.fetch_bytes(&url).await?;
        let content_type = if fetched.content_type.is_empty() {
            "application/javascript"
        } else {
            fetched.content_type.as_str()
        };
        let local = self
            .store
            .local_path_for(AssetKind::Js, &fetched.final_url, content_type);
        self.files.write_bytes(&local, &fetched.bytes)?;
        self.store
            .get_or_create_local_path(&url, &fetched.final_url, AssetKind::Js, content_type);
        summary.js.push((fetched.final_url, local.clone()));
        Ok(local_reference(from_dir, &local))
    }

    async fn image(
        &mut self,
        base: &Url,
        raw: &str,
        from_dir: &Path,
        summary: &mut RipSummary,
    ) -> Result<String, AssetError> {
        let url = resolve(base, raw).ok_or_else(|| AssetError::Unresolvable(raw.to_string()))?;
        let local = self.fetch_image(&url, summary).await?;
        Ok(local_reference(from_dir, &local))
    }

    /// Fetch `url` and keep it only if it is served as `image/*`.
    async fn fetch_image(
        &mut self,
        url: &Url,
        summary: &mut RipSummary,
    ) -> Result<PathBuf, AssetError> {
        if let Some(existing) = self.store.lookup(url) {
            debug!(url = %url, "reusing stored asset");
            return Ok(existing.to_path_buf());
        }

        self.progress.set_message(format!("Fetching {}", url));
        let fetched = self.fetcher.fetch_bytes(url).await?;
        if !fetched.content_type.starts_with("image/") {
            return Err(AssetError::UnsupportedContent {
                url: url.to_string(),
                content_type: fetched.content_type,
            });
        }

        let local = self
            .store
            .local_path_for(AssetKind::Img, &fetched.final_url, &fetched.content_type);
        let fresh = self.store.source_url(&local).is_none();
        if fresh {
            self.files.write_bytes(&local, &fetched.bytes)?;
        }
        self.store.get_or_create_local_path(
            url,
            &fetched.final_url,
            AssetKind::Img,
            &fetched.content_type,
        );
        if fresh {
            summary.images.push((fetched.final_url, local.clone()));
        }
        Ok(local)
    }

    /// Rebuilds a srcset from the candidates that ripped; fails only when none did.
    async fn srcset(
        &mut self,
        base: &Url,
        slot: &AttrSlot,
        from_dir: &Path,
        summary: &mut RipSummary,
    ) -> Result<String, AssetError> {
        let mut local_paths = Vec::new();
        let mut last_error = None;
        for reference in slot.references(base) {
            match self.image(base, &reference.raw, from_dir, summary).await {
                Ok(local) => local_paths.push(local),
                Err(err) => {
                    debug!(reference = %reference.raw, error = %err, "dropped srcset candidate");
                    last_error = Some(err);
                }
            }
        }

        if local_paths.is_empty() {
            return Err(last_error.unwrap_or_else(|| AssetError::Unresolvable(slot.value.clone())));
        }
        Ok(format_srcset(&local_paths))
    }

    /// Second pass over every saved stylesheet, including ones appended while
    /// this pass runs. Each local file appears in `summary.css` once.
    async fn rewrite_stylesheets(&mut self, summary: &mut RipSummary) {
        let mut next = 0;
        while next < summary.css.len() {
            let local = summary.css[next].1.clone();
            next += 1;
            if let Err(err) = self.rewrite_stylesheet(&local, summary).await {
                debug!(path = ?local, error = %err, "stylesheet left as fetched");
            }
        }
    }

    async fn rewrite_stylesheet(
        &mut self,
        local: &Path,
        summary: &mut RipSummary,
    ) -> Result<(), AssetError> {
        let text = self.files.read_text(local)?;
        let base = self
            .store
            .source_url(local)
            .cloned()
            .ok_or_else(|| AssetError::Unresolvable(local.display().to_string()))?;
        let css_dir = local.parent().unwrap_or(local).to_path_buf();

        let mut replacements: Vec<(Range<usize>, String)> = Vec::new();
        for reference in extract_css(&text) {
            let Some(url) = resolve(&base, &reference.raw) else {
                continue;
            };

            let stored = if reference.is_import_like() {
                self.fetch_stylesheet(&url, summary).await
            } else {
                self.fetch_image(&url, summary).await
            };

            match stored {
                Ok(path) => replacements.push((reference.span, local_reference(&css_dir, &path))),
                Err(err) => debug!(reference = %reference.raw, error = %err, "left css reference untouched"),
            }
        }

        if !replacements.is_empty() {
            self.files.write_text(local, &rewrite_css(&text, &replacements))?;
        }
        Ok(())
    }
}
