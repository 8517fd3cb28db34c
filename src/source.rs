//! Where post and bibliography text comes from.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

#[cfg(feature = "http")]
use crate::config::SiteConfig;
use crate::error::FetchError;

/// A store that returns text for a site-relative path such as `/posts/vae.md`.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the text at `path`.
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError>;
}

/// In-memory content, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.insert(path.into(), text.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }
}

/// Files under a local directory, as served by a static host.
///
/// Reads block the calling thread; the returned future never yields.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentSource for DirSource {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(FetchError::NotFound(path.to_string()));
        }

        std::fs::read_to_string(self.root.join(relative)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(path.to_string()),
            _ => FetchError::Transport {
                path: path.to_string(),
                message: e.to_string(),
            },
        })
    }
}

/// Plain HTTP GET against a base URL.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    /// Create a source that fetches `{base_url}{path}`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a source for the site's `base_url`.
    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(config.base_url.as_str())
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let url = self.url_for(path);
        let transport = |e: reqwest::Error| FetchError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(&url).send().await.map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }
}
