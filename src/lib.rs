pub mod asset_store;
pub mod cli;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod file_manager;
pub mod html_parser;
pub mod rewriter;
pub mod url_resolver;

// Re-export main types for convenience
pub use asset_store::{AssetKind, AssetRecord, AssetStore};
pub use cli::RipCommand;
pub use downloader::{PageRipper, RipSummary};
pub use error::{AssetError, FetchError, RipError};
pub use extractor::{AssetReference, AttrSlot, CssReference, UsageContext};
pub use fetcher::{FetchConfig, FetchedBytes, FetchedText, Fetcher, HttpFetcher};
pub use file_manager::FileManager;
pub use html_parser::HtmlDocument;
pub use url_resolver::resolve;
