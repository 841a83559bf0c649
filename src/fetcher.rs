use futures::StreamExt;
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use url::Url;

use crate::error::FetchError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; SiteRipper/1.0)";
pub const DEFAULT_TIMEOUT_SECS: u64 = 25;
pub const DEFAULT_MAX_SIZE: u64 = 50 * 1024 * 1024;

/// Upper bound on the buffer reserved from a declared `Content-Length`.
const INITIAL_BODY_CAPACITY: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    /// Largest body `fetch_bytes` accepts, in bytes.
    pub max_size: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_size: DEFAULT_MAX_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedText {
    pub text: String,
    pub final_url: Url,
}

#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    pub final_url: Url,
    /// Lowercase MIME essence, empty when the header is missing.
    pub content_type: String,
}

/// Network access used by the ripper. Both operations follow redirects and
/// fail on non-2xx responses.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch_text(&self, url: &Url) -> Result<FetchedText, FetchError>;
    async fn fetch_bytes(&self, url: &Url) -> Result<FetchedBytes, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    max_size: u64,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Self::build_http_client(&config)?;
        Ok(Self {
            client,
            max_size: config.max_size,
        })
    }

    fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
        ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
    }

    async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<FetchedText, FetchError> {
        let response = self.get(url).await?;
        let final_url = response.url().clone();
        let text = response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        Ok(FetchedText { text, final_url })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<FetchedBytes, FetchError> {
        let response = self.get(url).await?;
        let final_url = response.url().clone();
        let limit = self.max_size;

        // Reject on the declared size before reading any of the body
        let declared = response.content_length().unwrap_or(0);
        if declared > limit {
            return Err(FetchError::Oversize {
                url: url.to_string(),
                size: declared,
                limit,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(content_type_essence)
            .unwrap_or_default();

        let mut bytes = Vec::with_capacity(initial_capacity(declared));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            let total = (bytes.len() + chunk.len()) as u64;
            if total > limit {
                return Err(FetchError::Oversize {
                    url: url.to_string(),
                    size: total,
                    limit,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedBytes {
            bytes,
            final_url,
            content_type,
        })
    }
}

/// Buffer to reserve for a body of `declared` bytes. The header is not trusted
/// beyond `INITIAL_BODY_CAPACITY`.
fn initial_capacity(declared: u64) -> usize {
    declared.min(INITIAL_BODY_CAPACITY) as usize
}

/// `"Image/PNG; charset=x"` -> `"image/png"`.
pub fn content_type_essence(header: &str) -> String {
    match header.parse::<mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_ascii_lowercase(),
        Err(_) => header
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase(),
    }
}
