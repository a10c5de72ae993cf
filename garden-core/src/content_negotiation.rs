//! Content negotiation for responses.
//!
//! A response is rendered as one of a handful of [`ContentType`]s. The choice
//! is made, in order, from:
//!
//! 1. the `X-Asset` request header, which forces a type (`internal`, `json`, ...);
//! 2. the request's file extension (`/users.json`);
//! 3. the `Accept` header, highest quality first;
//! 4. `text/html`.
//!
//! # Examples
//!
//! ```
//! use garden_core::content_negotiation::{negotiate, ContentType};
//! use garden_core::{HttpMethod, Request};
//!
//! let request = Request::new(HttpMethod::GET, "/users")
//!     .with_header("Accept", "text/plain;q=0.5, application/json");
//! assert_eq!(negotiate(&request), ContentType::Json);
//!
//! let request = Request::new(HttpMethod::GET, "/users.txt");
//! assert_eq!(negotiate(&request), ContentType::Text);
//! ```

use crate::Request;
use std::cmp::Ordering;
use std::fmt;

/// Header that forces the response type regardless of `Accept`
pub const ASSET_HEADER: &str = "x-asset";

/// Response representations the application can finalize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Html,
    Json,
    Rss,
    Text,
    /// Return the response to the caller instead of writing it out
    Internal,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Html => "text/html",
            ContentType::Json => "application/json",
            ContentType::Rss => "application/rss+xml",
            ContentType::Text => "text/plain",
            ContentType::Internal => "application/internal",
        }
    }

    /// Map a MIME type (parameters ignored) to a content type
    pub fn from_mime(mime: &str) -> Option<Self> {
        let media = MediaType::parse(mime)?;
        match (media.type_.as_str(), media.subtype.as_str()) {
            ("text", "html") => Some(ContentType::Html),
            ("application", "json") => Some(ContentType::Json),
            ("application", "rss+xml") => Some(ContentType::Rss),
            ("text", "plain") => Some(ContentType::Text),
            ("application", "internal") => Some(ContentType::Internal),
            _ => None,
        }
    }

    /// Map a request extension (with or without the dot) to a content type
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "htm" | "html" => Some(ContentType::Html),
            "json" => Some(ContentType::Json),
            "rss" => Some(ContentType::Rss),
            "txt" => Some(ContentType::Text),
            _ => None,
        }
    }

    /// Map an `X-Asset` value, either a short name or a MIME type
    pub fn from_asset(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("internal") {
            return Some(ContentType::Internal);
        }
        Self::from_extension(value).or_else(|| Self::from_mime(value))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A media type (`type/subtype`), parameters dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub type_: String,
    pub subtype: String,
}

impl MediaType {
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            subtype: subtype.into(),
        }
    }

    /// Parse a media type from a string (without quality value).
    pub fn parse(s: &str) -> Option<Self> {
        let type_subtype = s.split(';').next()?.trim();
        let (type_, subtype) = type_subtype.split_once('/')?;
        let (type_, subtype) = (type_.trim(), subtype.trim());
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }
        Some(Self::new(type_.to_lowercase(), subtype.to_lowercase()))
    }

    /// `*/*` or `text/*` style wildcards match anything in their range
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    fn specificity(&self) -> u8 {
        u8::from(self.type_ != "*") * 2 + u8::from(self.subtype != "*")
    }
}

/// A parsed `Accept` header, sorted by preference
#[derive(Debug, Clone, Default)]
pub struct Accept {
    pub media_types: Vec<(MediaType, f32)>,
}

impl Accept {
    /// Parse an Accept header string.
    ///
    /// Entries are ordered by quality (highest first), then by specificity; ties
    /// keep header order.
    pub fn parse(header: &str) -> Self {
        let mut media_types: Vec<(MediaType, f32)> = header
            .split(',')
            .filter_map(|part| {
                let (media, quality) = Self::extract_quality(part.trim());
                MediaType::parse(media).map(|mt| (mt, quality))
            })
            .collect();

        media_types.sort_by(|a, b| match b.1.partial_cmp(&a.1) {
            Some(Ordering::Equal) | None => b.0.specificity().cmp(&a.0.specificity()),
            Some(ord) => ord,
        });

        Self { media_types }
    }

    fn extract_quality(s: &str) -> (&str, f32) {
        let mut params = s.split(';');
        let media = params.next().unwrap_or_default().trim();
        let quality = params
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
            .and_then(|(_, q)| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        (media, quality)
    }

    /// The first acceptable entry that maps to a supported content type.
    ///
    /// A wildcard entry selects HTML; entries with quality 0 are skipped.
    pub fn preferred_content_type(&self) -> Option<ContentType> {
        self.media_types
            .iter()
            .filter(|(_, quality)| *quality > 0.0)
            .find_map(|(media, _)| {
                if media.type_ == "*" || (media.type_ == "text" && media.subtype == "*") {
                    return Some(ContentType::Html);
                }
                ContentType::from_mime(&format!("{}/{}", media.type_, media.subtype))
                    .filter(|ct| *ct != ContentType::Internal)
            })
    }
}

/// Pick the response type for a request
pub fn negotiate(request: &Request) -> ContentType {
    if let Some(forced) = request.header(ASSET_HEADER).and_then(ContentType::from_asset) {
        return forced;
    }

    if let Some(by_ext) = ContentType::from_extension(request.ext()) {
        return by_ext;
    }

    request
        .header("accept")
        .map(Accept::parse)
        .and_then(|accept| accept.preferred_content_type())
        .unwrap_or(ContentType::Html)
}
