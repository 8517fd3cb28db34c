//! Site configuration: where posts and bibliographies live, and how to render them.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::post::RenderOptions;

/// Site configuration, usually read from `site.toml`.
///
/// ```toml
/// base_url = "https://example.github.io"
///
/// [posts]
/// vae = "/posts/vae.md"
///
/// [bibliographies]
/// vae = "/posts/vae.bib"
///
/// [render]
/// math_delimiters = "latex"
/// strict_citations = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Origin the site-relative paths are served from, used by `HttpSource::from_config`
    pub base_url: String,
    /// Slug to Markdown path
    pub posts: BTreeMap<String, String>,
    /// Slug to bibliography path
    pub bibliographies: BTreeMap<String, String>,
    pub render: RenderOptions,
}

impl SiteConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&text)
    }

    /// Add a post mapping.
    pub fn with_post(mut self, slug: impl Into<String>, path: impl Into<String>) -> Self {
        self.posts.insert(slug.into(), path.into());
        self
    }

    /// Add a bibliography mapping.
    pub fn with_bibliography(mut self, slug: impl Into<String>, path: impl Into<String>) -> Self {
        self.bibliographies.insert(slug.into(), path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MathDelimiters;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config() {
        let config = SiteConfig::from_toml_str(
            r#"
base_url = "https://example.github.io"

[posts]
vae = "/posts/vae.md"

[bibliographies]
vae = "/posts/vae.bib"

[render]
math_delimiters = "dollars"
strict_citations = true

[render.parse.gfm]
tables = false
"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://example.github.io");
        assert_eq!(config.posts.get("vae").map(String::as_str), Some("/posts/vae.md"));
        assert_eq!(
            config.bibliographies.get("vae").map(String::as_str),
            Some("/posts/vae.bib")
        );
        assert_eq!(config.render.math_delimiters, MathDelimiters::Dollars);
        assert!(config.render.strict_citations);
        assert!(!config.render.parse.gfm.tables);
        assert!(config.render.parse.gfm.strikethrough);
        assert!(config.render.parse.math);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SiteConfig::from_toml_str("").unwrap();
        assert_eq!(config, SiteConfig::default());
        assert!(config.render.parse.math);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            SiteConfig::from_toml_str("posts = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = SiteConfig::load("/definitely/not/here/site.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
