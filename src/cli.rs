use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetcher::{FetchConfig, DEFAULT_MAX_SIZE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

#[derive(Parser, Debug)]
#[command(
    name = "page-ripper",
    about = "Rip a single web page for offline viewing",
    version,
    long_about = "Downloads one HTML page together with the stylesheets, scripts, icons and images it references, rewrites every reference to the local copy and writes a self-contained directory. Hyperlinks to other pages are never followed."
)]
pub struct RipCommand {
    /// The URL of the page to rip (prompted for when omitted)
    pub url: Option<String>,

    /// Destination folder (prompted for when omitted)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Timeout for each request in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Largest asset to download, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_size: u64,

    /// User agent string to use for requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl RipCommand {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.timeout),
            max_size: self.max_size,
            user_agent: self.user_agent.clone(),
        }
    }
}
