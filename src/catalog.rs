//! Listing data: post cards, cover images, and the video feed.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::ast::{parse_date, parse_timestamp};
use crate::error::{ParseError, Result};
use crate::parser::split_front_matter;

/// Turn a title into a URL slug.
///
/// Lowercases, joins words with `-`, and drops everything except ASCII
/// letters, digits, `_`, and `-`.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// The list of post files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostIndex {
    pub files: Vec<String>,
}

impl PostIndex {
    /// Parse `["a.md", ...]` or `{"posts": ["a.md", ...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            List(Vec<String>),
            Wrapped { posts: Vec<String> },
        }

        let files = match serde_json::from_str(json).map_err(index_error)? {
            Shape::List(files) | Shape::Wrapped { posts: files } => files,
        };
        Ok(Self { files })
    }
}

/// Images belonging to each post file, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageIndex {
    images: HashMap<String, Vec<String>>,
}

impl ImageIndex {
    /// Parse `{"a.md": ["/img/a1.png", ...], ...}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let images = serde_json::from_str(json).map_err(index_error)?;
        Ok(Self { images })
    }

    pub fn images(&self, file: &str) -> &[String] {
        self.images.get(file).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first image listed for a post.
    pub fn cover_image(&self, file: &str) -> Option<&str> {
        self.images(file).first().map(String::as_str)
    }
}

/// What a post card shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub file: String,
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

impl PostSummary {
    /// Summarize a post from its front matter.
    pub fn from_markdown(file: &str, markdown: &str, images: &ImageIndex) -> Result<Self> {
        let (metadata, _) = split_front_matter(markdown)?;
        let title = metadata.title.unwrap_or_else(|| "untitled".to_string());

        Ok(Self {
            file: file.to_string(),
            slug: slugify(&title),
            title,
            date: metadata.date,
            excerpt: metadata.excerpt,
            cover_image: images.cover_image(file).map(String::from),
        })
    }

    pub fn published(&self) -> Option<NaiveDate> {
        parse_date(self.date.as_deref()?)
    }
}

/// Order posts newest first; undated posts go last.
pub fn sort_newest_first(posts: &mut [PostSummary]) {
    posts.sort_by(|a, b| b.published().cmp(&a.published()));
}

/// One video in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl Video {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }

    /// Thumbnail URLs to try in order, best quality first.
    pub fn thumbnail_candidates(&self) -> Vec<String> {
        let mut candidates: Vec<String> = self.thumbnail.iter().cloned().collect();
        candidates.extend(
            ["maxresdefault", "sddefault", "hqdefault", "mqdefault", "default"]
                .iter()
                .map(|size| format!("https://i.ytimg.com/vi/{}/{}.jpg", self.id, size)),
        );
        candidates
    }

    pub fn published(&self) -> Option<NaiveDate> {
        parse_date(self.published_at.as_deref()?)
    }

    /// Publication time in UTC, for ordering uploads made on the same day.
    pub fn published_time(&self) -> Option<NaiveDateTime> {
        parse_timestamp(self.published_at.as_deref()?)
    }
}

/// The video feed, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoIndex {
    pub videos: Vec<Video>,
}

impl VideoIndex {
    /// Parse `{"videos": [...]}` or a bare array, normalizing each entry.
    ///
    /// Entries without an `id` are dropped.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(json).map_err(index_error)?;

        let items = match &data {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => map
                .get("videos")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _ => &[],
        };

        let mut videos: Vec<Video> = items.iter().filter_map(normalize_video).collect();
        videos.sort_by(|a, b| b.published_time().cmp(&a.published_time()));

        Ok(Self { videos })
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

fn normalize_video(item: &Value) -> Option<Video> {
    let text = |key: &str| -> Option<String> {
        match item.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    Some(Video {
        id: text("id")?,
        title: text("title").unwrap_or_else(|| "Untitled".to_string()),
        thumbnail: text("thumbnail"),
        published_at: text("publishedAt")
            .or_else(|| text("published_at"))
            .or_else(|| text("date")),
    })
}

fn index_error(e: serde_json::Error) -> ParseError {
    ParseError::Index(e.to_string())
}
