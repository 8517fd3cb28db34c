//! Post assembly: fetch, split, cite, render, and append references.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::FrontMatter;
use crate::bibliography::{build_references, render_references, Bibliography, Reference};
use crate::catalog::{sort_newest_first, ImageIndex, PostSummary};
use crate::citations::rewrite_citations;
use crate::config::SiteConfig;
use crate::error::{Error, ResolutionError};
use crate::parser::{parse_blocks, split_front_matter, ParseOptions};
use crate::render::{render_html, HtmlConfig, MathDelimiters};
use crate::source::ContentSource;

/// Options for turning a post into HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Delimiters written around math for the client-side typesetter.
    pub math_delimiters: MathDelimiters,
    /// Fail the render when a citation has no entry in a loaded bibliography.
    pub strict_citations: bool,
    /// Markdown extensions.
    pub parse: ParseOptions,
}

/// A successfully rendered post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPost {
    /// Body HTML, followed by the reference section when there is one
    pub html: String,
    pub metadata: FrontMatter,
    /// Cited keys in first-appearance order
    pub citations: Vec<String>,
    pub references: Vec<Reference>,
    /// Problems that did not stop the render
    pub warnings: Vec<String>,
}

/// What a post view shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderState {
    #[default]
    Idle,
    Loading,
    Success(RenderedPost),
    NotFound,
    Error {
        message: String,
        /// Metadata, when the front matter was read before the failure
        metadata: Option<FrontMatter>,
    },
}

impl RenderState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Text to show in place of the post, if it did not render.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::NotFound => Some("Post not found."),
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Render a post from its Markdown and bibliography text.
///
/// A bibliography that cannot be parsed is left out and reported in
/// [`RenderedPost::warnings`].
pub fn assemble(markdown: &str, bibliography: Option<&str>, options: &RenderOptions) -> RenderState {
    let mut warnings = Vec::new();

    let bibliography = bibliography.and_then(|text| match Bibliography::parse(text) {
        Ok(bib) => Some(bib),
        Err(e) => {
            warn!(error = %e, "bibliography could not be parsed, rendering without it");
            warnings.push(format!("Bibliography could not be parsed: {}", e));
            None
        }
    });

    match process(markdown, bibliography.as_ref(), options) {
        Ok(mut post) => {
            post.warnings.extend(warnings);
            RenderState::Success(post)
        }
        Err((error, metadata)) => {
            warn!(error = %error, "failed to process post");
            RenderState::Error {
                message: format!("Failed to process post content: {}", error),
                metadata,
            }
        }
    }
}

fn process(
    markdown: &str,
    bibliography: Option<&Bibliography>,
    options: &RenderOptions,
) -> Result<RenderedPost, (Error, Option<FrontMatter>)> {
    let (metadata, body) = split_front_matter(markdown).map_err(|e| (e, None))?;

    let cited = rewrite_citations(body, |key| bibliography.is_some_and(|b| b.contains(key)));

    if let Some(bib) = bibliography {
        for key in cited.keys.iter().filter(|k| !bib.contains(k)) {
            if options.strict_citations {
                let error = ResolutionError::UnknownCitation(key.clone()).into();
                return Err((error, Some(metadata)));
            }
            debug!(key = %key, "citation has no bibliography entry");
        }
    }

    let blocks = parse_blocks(&cited.text, &options.parse);
    let config = HtmlConfig {
        math_delimiters: options.math_delimiters,
    };
    let mut html = render_html(&blocks, &config);

    let references = bibliography
        .map(|bib| build_references(&cited.keys, bib))
        .unwrap_or_default();
    if !references.is_empty() {
        if !html.is_empty() {
            html.push('\n');
        }
        html.push_str(&render_references(&references));
    }

    Ok(RenderedPost {
        html,
        metadata,
        citations: cited.keys,
        references,
        warnings: Vec::new(),
    })
}

/// Loads posts by slug from a content source.
pub struct PostAssembler<S> {
    source: S,
    config: SiteConfig,
}

impl<S: ContentSource> PostAssembler<S> {
    pub fn new(source: S, config: SiteConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Fetch and render the post mapped to `slug`.
    ///
    /// An unmapped slug is not fetched at all. A post that cannot be
    /// fetched is reported as not found; a missing bibliography is not an
    /// error.
    pub async fn load(&self, slug: &str) -> RenderState {
        let Some(path) = self.config.posts.get(slug) else {
            debug!(slug, "no post mapped to slug");
            return RenderState::NotFound;
        };

        let markdown = match self.source.fetch_text(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(slug, path = %path, error = %e, "failed to fetch post");
                return RenderState::NotFound;
            }
        };

        let bibliography = self.fetch_bibliography(slug).await;
        assemble(&markdown, bibliography.as_deref(), &self.config.render)
    }

    /// Fetch every mapped post and summarize it for the listing page,
    /// newest first. Images are looked up by the post's path.
    pub async fn load_summaries(&self, images: &ImageIndex) -> crate::error::Result<Vec<PostSummary>> {
        let mut summaries = Vec::with_capacity(self.config.posts.len());
        for path in self.config.posts.values() {
            let markdown = self.source.fetch_text(path).await?;
            summaries.push(PostSummary::from_markdown(path, &markdown, images)?);
        }
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn fetch_bibliography(&self, slug: &str) -> Option<String> {
        let path = self.config.bibliographies.get(slug)?;
        match self.source.fetch_text(path).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(slug, path = %path, error = %e, "failed to fetch bibliography, rendering without it");
                None
            }
        }
    }
}

/// Identifies one navigation; only the latest one may update the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    generation: u64,
    slug: String,
}

impl RenderTicket {
    pub fn slug(&self) -> &str {
        &self.slug
    }
}

/// The state of a post page across navigations.
///
/// Each [`navigate`](PostView::navigate) supersedes the previous one, and
/// a result completed with an outdated ticket is dropped.
#[derive(Debug, Default)]
pub struct PostView {
    generation: u64,
    slug: Option<String>,
    state: RenderState,
}

impl PostView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start rendering `slug`.
    pub fn navigate(&mut self, slug: impl Into<String>) -> RenderTicket {
        let slug = slug.into();
        self.generation += 1;
        self.slug = Some(slug.clone());
        self.state = RenderState::Loading;

        RenderTicket {
            generation: self.generation,
            slug,
        }
    }

    /// Apply a finished render. Returns false if the ticket is stale.
    pub fn complete(&mut self, ticket: &RenderTicket, state: RenderState) -> bool {
        if ticket.generation != self.generation {
            debug!(
                slug = %ticket.slug,
                generation = ticket.generation,
                current = self.generation,
                "dropping stale render"
            );
            return false;
        }
        self.state = state;
        true
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn current_slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::source::MemorySource;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BIB: &str = r#"
@article{jones1999,
    author = {Jones, Alice and Bob Smith},
    title = {A Study of Things},
    journal = {Journal of Studies},
    year = {1999},
    url = {https://example.org/jones1999}
}
"#;

    const SCENARIO_A: &str =
        "---\ntitle: Cited\ndate: 2024-01-02\n---\nSee [@smith2020] and [@smith2020] again, also [@jones1999].\n";

    fn success(state: RenderState) -> RenderedPost {
        match state {
            RenderState::Success(post) => post,
            other => panic!("Expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_scenario_a_numbering_and_references() {
        let post = success(assemble(SCENARIO_A, Some(BIB), &RenderOptions::default()));

        assert_eq!(post.metadata.title.as_deref(), Some("Cited"));
        assert_eq!(post.citations, vec!["smith2020", "jones1999"]);
        assert_eq!(post.references.len(), 1);
        assert_eq!(post.references[0].number, 2);
        assert_eq!(post.references[0].key, "jones1999");

        let smith = r#"<span class="citation" data-cite-key="smith2020" data-cite-number="1">[1]</span>"#;
        assert_eq!(post.html.matches(smith).count(), 2);
        assert!(post.html.contains(
            r##"<a class="citation" href="#ref-jones1999" data-cite-key="jones1999" data-cite-number="2">[2]</a>"##
        ));
        assert!(post.html.contains(r#"<li id="ref-jones1999" value="2">Alice Jones, Bob Smith (1999)."#));
        assert!(post.warnings.is_empty());
    }

    #[test]
    fn test_scenario_b_math_passthrough() {
        let markdown = "Inline $x^2$ here.\n\n$$\\int f$$\n";
        let post = success(assemble(markdown, None, &RenderOptions::default()));
        assert!(post.html.contains(r"\(x^2\)"));
        assert!(post.html.contains(r"\[\int f\]"));
    }

    #[test]
    fn test_scenario_c_empty_key_is_literal() {
        let post = success(assemble("An empty [@] token.", None, &RenderOptions::default()));
        assert_eq!(post.html, "<p>An empty [@] token.</p>");
        assert!(post.citations.is_empty());
    }

    #[test]
    fn test_scenario_e_placeholder_survives_unescaped() {
        let post = success(assemble("Cited [@key] here.", None, &RenderOptions::default()));
        assert_eq!(
            post.html,
            r#"<p>Cited <span class="citation" data-cite-key="key" data-cite-number="1">[1]</span> here.</p>"#
        );
        assert!(post.references.is_empty());
    }

    #[test]
    fn test_placeholder_with_line_break_in_key() {
        let post = success(assemble("A [@a\n\n# b] c", None, &RenderOptions::default()));
        assert_eq!(
            post.html,
            r#"<p>A <span class="citation" data-cite-key="a&#10;&#10;# b" data-cite-number="1">[1]</span> c</p>"#
        );
    }

    #[test]
    fn test_placeholder_with_pipe_in_table_cell() {
        let markdown = "| a | b |\n| --- | --- |\n| [@x|y] | 2 |";
        let post = success(assemble(markdown, None, &RenderOptions::default()));
        assert!(post.html.contains(
            r#"<td><span class="citation" data-cite-key="x&#124;y" data-cite-number="1">[1]</span></td>"#
        ));
        assert!(post.html.contains("<td>2</td>"));
    }

    #[test]
    fn test_citation_in_code_shows_number() {
        let post = success(assemble(
            "Syntax: `[@key]`\n\n```\ncite [@key] or [@other]\n```",
            Some(BIB),
            &RenderOptions::default(),
        ));
        assert_eq!(
            post.html,
            "<p>Syntax: <code>[1]</code></p>\n<pre><code>cite [1] or [2]\n</code></pre>"
        );
        assert_eq!(post.citations, vec!["key", "other"]);
    }

    #[test]
    fn test_escaped_citation_is_numbered() {
        let post = success(assemble(r"Cite \[@k] here.", Some("@misc{k, title={T}}"), &RenderOptions::default()));
        assert_eq!(post.citations, vec!["k"]);
        assert_eq!(post.references.len(), 1);
        assert!(post.html.starts_with(
            r##"<p>Cite <a class="citation" href="#ref-k" data-cite-key="k" data-cite-number="1">[1]</a> here.</p>"##
        ));
    }

    #[test]
    fn test_without_bibliography_no_reference_section() {
        let post = success(assemble(SCENARIO_A, None, &RenderOptions::default()));
        assert!(!post.html.contains("references"));
        assert_eq!(post.citations.len(), 2);
    }

    #[test]
    fn test_bibliography_parse_failure_is_a_warning() {
        let post = success(assemble(SCENARIO_A, Some("not a bibliography"), &RenderOptions::default()));
        assert!(post.references.is_empty());
        assert_eq!(post.warnings.len(), 1);
        assert!(post.warnings[0].starts_with("Bibliography could not be parsed"));
    }

    #[test]
    fn test_strict_citations() {
        let options = RenderOptions {
            strict_citations: true,
            ..Default::default()
        };
        match assemble(SCENARIO_A, Some(BIB), &options) {
            RenderState::Error { message, metadata } => {
                assert_eq!(
                    message,
                    "Failed to process post content: Resolution error: Unknown citation key: smith2020"
                );
                assert_eq!(metadata.and_then(|m| m.title).as_deref(), Some("Cited"));
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_front_matter_failure_is_an_error() {
        let state = assemble("---\n- a\n- b\n---\nbody", None, &RenderOptions::default());
        assert!(matches!(state, RenderState::Error { metadata: None, .. }));
        assert!(state
            .user_message()
            .is_some_and(|m| m.starts_with("Failed to process post content:")));
    }

    /// Counts fetches, serving from memory.
    struct CountingSource {
        inner: MemorySource,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ContentSource for CountingSource {
        async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_text(path).await
        }
    }

    fn site() -> SiteConfig {
        SiteConfig::default()
            .with_post("cited", "/posts/cited.md")
            .with_bibliography("cited", "/posts/cited.bib")
            .with_post("plain", "/posts/plain.md")
            .with_bibliography("plain", "/posts/missing.bib")
            .with_post("gone", "/posts/gone.md")
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_file("/posts/cited.md", SCENARIO_A)
            .with_file("/posts/cited.bib", BIB)
            .with_file("/posts/plain.md", "---\ntitle: Plain\n---\nJust text.")
    }

    #[tokio::test]
    async fn test_scenario_d_unmapped_slug_does_not_fetch() {
        let counting = CountingSource {
            inner: source(),
            fetches: AtomicUsize::new(0),
        };
        let assembler = PostAssembler::new(counting, site());

        let state = assembler.load("no-such-post").await;
        assert_eq!(state, RenderState::NotFound);
        assert_eq!(state.user_message(), Some("Post not found."));
        assert_eq!(assembler.source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_with_bibliography() {
        let assembler = PostAssembler::new(source(), site());
        let post = success(assembler.load("cited").await);
        assert_eq!(post.references.len(), 1);
        assert!(post.html.ends_with("</section>"));
    }

    #[tokio::test]
    async fn test_missing_bibliography_file_is_not_an_error() {
        let assembler = PostAssembler::new(source(), site());
        let post = success(assembler.load("plain").await);
        assert_eq!(post.html, "<p>Just text.</p>");
        assert!(post.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failed_post_fetch_is_not_found() {
        let assembler = PostAssembler::new(source(), site());
        assert_eq!(assembler.load("gone").await, RenderState::NotFound);
    }

    #[tokio::test]
    async fn test_load_summaries_newest_first() {
        let config = SiteConfig::default()
            .with_post("plain", "/posts/plain.md")
            .with_post("cited", "/posts/cited.md");
        let assembler = PostAssembler::new(source(), config);
        let images = ImageIndex::from_json(r#"{"/posts/cited.md": ["/img/cited.png"]}"#).unwrap();

        let summaries = assembler.load_summaries(&images).await.unwrap();
        let titles: Vec<_> = summaries.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Cited", "Plain"]);
        assert_eq!(summaries[0].slug, "cited");
        assert_eq!(summaries[0].cover_image.as_deref(), Some("/img/cited.png"));
    }

    #[tokio::test]
    async fn test_load_summaries_reports_fetch_errors() {
        let assembler = PostAssembler::new(source(), site());
        let err = assembler.load_summaries(&ImageIndex::default()).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::NotFound(path)) if path == "/posts/gone.md"));
    }

    #[tokio::test]
    async fn test_superseded_render_is_dropped() {
        let assembler = PostAssembler::new(source(), site());
        let mut view = PostView::new();

        let first = view.navigate("cited");
        let second = view.navigate("plain");
        assert!(view.state().is_loading());

        // The later navigation finishes first
        let plain = assembler.load(second.slug()).await;
        assert!(view.complete(&second, plain));

        let cited = assembler.load(first.slug()).await;
        assert!(!view.complete(&first, cited));

        let post = match view.state() {
            RenderState::Success(post) => post,
            other => panic!("Expected success, got {:?}", other),
        };
        assert_eq!(post.metadata.title.as_deref(), Some("Plain"));
        assert_eq!(view.current_slug(), Some("plain"));
    }

    #[test]
    fn test_render_state_serializes_with_status() {
        let json = serde_json::to_value(RenderState::NotFound).unwrap();
        assert_eq!(json, serde_json::json!({"status": "not_found"}));
    }
}
