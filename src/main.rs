use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

use page_ripper::url_resolver::normalize_seed;
use page_ripper::{FileManager, HttpFetcher, PageRipper, RipCommand, RipSummary};

/// Saved entries listed per kind in the final report.
const REPORT_LIMIT: usize = 15;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = RipCommand::parse();
    let term = Term::stdout();

    println!("{}", "=== Page Ripper (HTML + CSS + JS + images) ===".bold());
    let seed = match &args.url {
        Some(url) => normalize_seed(url),
        None => normalize_seed(&prompt_nonempty(&term, "Enter website URL (e.g. https://example.com): ")?),
    };
    let seed = Url::parse(&seed).with_context(|| format!("Invalid URL: {}", seed))?;

    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => PathBuf::from(prompt_nonempty(&term, "Enter destination folder: ")?),
    };
    let output_dir = if output_dir.is_absolute() {
        output_dir
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(output_dir)
    };

    let fetcher = HttpFetcher::new(args.fetch_config()).context("Failed to build HTTP client")?;
    let files = FileManager::new(&output_dir)?;

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let mut ripper = PageRipper::new(fetcher, files.clone()).with_progress(progress_bar.clone());
    let summary = match ripper.rip(&seed).await {
        Ok(summary) => summary,
        Err(e) => {
            progress_bar.abandon();
            return Err(anyhow::Error::new(e).context(format!("Could not rip {}", seed)));
        }
    };

    print_report(&files, &summary);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn prompt_nonempty(term: &Term, prompt: &str) -> Result<String> {
    loop {
        term.write_str(prompt)?;
        let line = term.read_line()?;
        let value = line.trim().trim_matches(|c| c == '"' || c == '\'');
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }
}

fn print_report(files: &FileManager, summary: &RipSummary) {
    println!("\n{}", "✅ Done.".green().bold());
    println!("Saved HTML: {}", summary.index_path.display());
    println!("CSS files:  {}", summary.css.len());
    println!("JS files:   {}", summary.js.len());
    println!("Images:     {}", summary.images.len());

    print_saved(files, "Saved CSS (local paths):", &summary.css);
    print_saved(files, "Saved JS (local paths):", &summary.js);
}

fn print_saved(files: &FileManager, title: &str, entries: &[(Url, PathBuf)]) {
    if entries.is_empty() {
        return;
    }
    println!("\n{}", title.bold());
    for (remote, local) in entries.iter().take(REPORT_LIMIT) {
        println!("  - {}  (from {})", display_local(files, local), remote.as_str().blue());
    }
    if entries.len() > REPORT_LIMIT {
        println!("  ... and {} more", entries.len() - REPORT_LIMIT);
    }
}

fn display_local(files: &FileManager, local: &Path) -> String {
    files
        .get_relative_path(local)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| local.display().to_string())
}
