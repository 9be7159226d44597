// src/extract/mod.rs
// =============================================================================
// Resource discovery: turn one HTML document into the deduplicated set of
// resource URLs it depends on.
//
// Submodules:
// - html: walks the parsed document, one pass per discovery channel
// - css: url()/@import token scanning and absolutization of stylesheet text
//
// Extraction is purely functional: no I/O, no shared state. It runs exactly
// once per job, over the root document the fetcher already downloaded.
// =============================================================================

mod css;
mod html;

pub use css::{absolutize_css, extract_css_urls};
pub use html::extract_resources;

use std::collections::HashMap;

use serde::Serialize;
use url::Url;

/// The markup/CSS construct through which a resource URL was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryChannel {
    StylesheetLink,
    InlineStyle,
    ScriptSrc,
    ImageSrc,
    SrcSet,
    LinkRelation,
    MediaSrc,
    ObjectData,
    MetaContent,
    RawBlock,
}

/// One discovered resource: an absolute URL tagged with its channel.
#[derive(Debug, Clone)]
pub struct ResourceRef {
    pub url: Url,
    pub channel: DiscoveryChannel,
}

/// Output of extraction.
///
/// `refs` is deduplicated by absolute URL in first-discovery order — no two
/// entries share a URL. `aliases` keeps every raw spelling (the attribute
/// text as it appeared in the document) per absolute URL, so the rewriter
/// can update a reference even when the same resource was spelled two
/// different ways in two different places.
#[derive(Debug, Default)]
pub struct ExtractedResources {
    pub refs: Vec<ResourceRef>,
    pub aliases: HashMap<String, Vec<String>>,
}

impl ExtractedResources {
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Schemes (and fragment-only references) that are never fetchable resources.
pub(crate) fn is_fetchable(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    const REJECTED: [&str; 6] = ["data:", "blob:", "javascript:", "mailto:", "tel:", "about:"];
    let lower = trimmed.to_ascii_lowercase();
    !REJECTED.iter().any(|scheme| lower.starts_with(scheme))
}
