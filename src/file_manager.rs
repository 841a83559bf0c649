use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::asset_store::AssetKind;

/// Owns the destination root and every write beneath it.
#[derive(Clone, Debug)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    /// Creates the root and the `css/`, `js/` and `img/` buckets.
    pub fn new(base_dir: &Path) -> Result<Self> {
        let base_dir = base_dir.to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create base directory: {:?}", base_dir))?;

        for kind in [AssetKind::Css, AssetKind::Js, AssetKind::Img] {
            let dir = base_dir.join(kind.dir_name());
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn write_bytes(&self, path: &Path, content: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(content)
    }

    pub fn write_text(&self, path: &Path, text: &str) -> std::io::Result<()> {
        self.write_bytes(path, text.as_bytes())
    }

    /// Reads a saved text file, replacing invalid UTF-8.
    pub fn read_text(&self, path: &Path) -> std::io::Result<String> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn get_relative_path(&self, file_path: &Path) -> Result<PathBuf> {
        file_path
            .strip_prefix(&self.base_dir)
            .map(|p| p.to_path_buf())
            .with_context(|| format!("Failed to get relative path from {:?}", file_path))
    }
}

/// Path from `from_dir` to `to`, always with `/` separators.
pub fn relative_web_path(from_dir: &Path, to: &Path) -> String {
    let relative = pathdiff::diff_paths(to, from_dir).unwrap_or_else(|| to.to_path_buf());
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir => None,
            Component::RootDir | Component::Prefix(_) => Some(String::new()),
        })
        .collect::<Vec<_>>()
        .join("/")
}
