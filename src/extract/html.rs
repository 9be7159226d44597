// src/extract/html.rs
// =============================================================================
// Walks one parsed HTML document and collects every resource reference the
// page depends on, tagged by discovery channel.
//
// Discovery is deliberately correctness-over-precision: besides the typed
// tag/attribute channels there is a raw rescan of inline <style> and
// <script> text for quoted strings that end in a known resource extension,
// which catches resources referenced only from script logic.
//
// Every reference is resolved against the base URL before it enters the
// set, and the set holds at most one entry per absolute URL — the first
// discovery wins.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{extract_css_urls, is_fetchable, DiscoveryChannel, ExtractedResources, ResourceRef};
use crate::config::ScanToggles;

/// Deduplicated resource set under construction.
struct ResourceSet {
    base: Url,
    seen: HashSet<String>,
    refs: Vec<ResourceRef>,
    aliases: HashMap<String, Vec<String>>,
}

impl ResourceSet {
    fn new(base: Url) -> Self {
        Self {
            base,
            seen: HashSet::new(),
            refs: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    /// Resolves `raw` against the base and records it. Rejected schemes and
    /// unresolvable references are dropped; a URL already in the set only
    /// gains the new raw spelling as an alias.
    fn add(&mut self, raw: &str, channel: DiscoveryChannel) {
        let raw = raw.trim();
        if !is_fetchable(raw) {
            return;
        }
        let Ok(url) = self.base.join(raw) else {
            return;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return;
        }
        let key = url.to_string();
        let spellings = self.aliases.entry(key.clone()).or_default();
        if !spellings.iter().any(|s| s == raw) {
            spellings.push(raw.to_string());
        }
        if self.seen.insert(key) {
            self.refs.push(ResourceRef { url, channel });
        }
    }

    fn finish(self) -> ExtractedResources {
        ExtractedResources {
            refs: self.refs,
            aliases: self.aliases,
        }
    }
}

/// Extracts the deduplicated resource set from `html`, resolved against
/// `base`. Which channels are scanned is controlled by `scan`; scan order is
/// fixed, so the set's insertion order is reproducible for a given document.
pub fn extract_resources(html: &str, base: &Url, scan: &ScanToggles) -> ExtractedResources {
    let document = Html::parse_document(html);
    let mut set = ResourceSet::new(base.clone());

    // All selectors below are constants and known to be valid, so .unwrap()
    // cannot fire (same convention the scraper docs use).
    let link_sel = Selector::parse("link[href]").unwrap();
    for element in document.select(&link_sel) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let rel = element.value().attr("rel").unwrap_or("").to_ascii_lowercase();
        let type_attr = element.value().attr("type").unwrap_or("").to_ascii_lowercase();
        let is_stylesheet =
            rel.split_whitespace().any(|r| r == "stylesheet") || type_attr == "text/css";
        if is_stylesheet {
            if scan.stylesheets {
                set.add(href, DiscoveryChannel::StylesheetLink);
            }
        } else if scan.link_relations && rel.split_whitespace().any(is_resource_relation) {
            set.add(href, DiscoveryChannel::LinkRelation);
        }
    }

    if scan.inline_css {
        let style_sel = Selector::parse("style").unwrap();
        for element in document.select(&style_sel) {
            let text: String = element.text().collect();
            for token in extract_css_urls(&text) {
                set.add(&token, DiscoveryChannel::InlineStyle);
            }
        }
    }

    if scan.scripts {
        let script_sel = Selector::parse("script[src]").unwrap();
        for element in document.select(&script_sel) {
            if let Some(src) = element.value().attr("src") {
                set.add(src, DiscoveryChannel::ScriptSrc);
            }
        }
    }

    if scan.images {
        let img_sel = Selector::parse("img").unwrap();
        for element in document.select(&img_sel) {
            for attr in ["src", "data-src"] {
                if let Some(value) = element.value().attr(attr) {
                    set.add(value, DiscoveryChannel::ImageSrc);
                }
            }
            if let Some(srcset) = element.value().attr("srcset") {
                for candidate in srcset_candidates(srcset) {
                    set.add(candidate, DiscoveryChannel::SrcSet);
                }
            }
        }
        let source_sel = Selector::parse("source").unwrap();
        for element in document.select(&source_sel) {
            if let Some(src) = element.value().attr("src") {
                set.add(src, DiscoveryChannel::ImageSrc);
            }
            if let Some(srcset) = element.value().attr("srcset") {
                for candidate in srcset_candidates(srcset) {
                    set.add(candidate, DiscoveryChannel::SrcSet);
                }
            }
        }
    }

    if scan.media {
        let media_sel = Selector::parse("audio[src], video[src], embed[src]").unwrap();
        for element in document.select(&media_sel) {
            if let Some(src) = element.value().attr("src") {
                set.add(src, DiscoveryChannel::MediaSrc);
            }
        }
        let object_sel = Selector::parse("object[data]").unwrap();
        for element in document.select(&object_sel) {
            if let Some(data) = element.value().attr("data") {
                set.add(data, DiscoveryChannel::ObjectData);
            }
        }
    }

    if scan.meta {
        let meta_sel = Selector::parse("meta[content]").unwrap();
        for element in document.select(&meta_sel) {
            if let Some(content) = element.value().attr("content") {
                if looks_like_url(content) {
                    set.add(content, DiscoveryChannel::MetaContent);
                }
            }
        }
    }

    if scan.raw_blocks {
        let block_sel = Selector::parse("style, script").unwrap();
        for element in document.select(&block_sel) {
            let text: String = element.text().collect();
            if text.is_empty() {
                continue;
            }
            for caps in raw_reference_re().captures_iter(&text) {
                set.add(&caps[1], DiscoveryChannel::RawBlock);
            }
        }
    }

    debug!(count = set.refs.len(), base = %base, "extracted resource set");
    set.finish()
}

/// `<link rel=...>` relations that point at page resources.
fn is_resource_relation(rel: &str) -> bool {
    matches!(
        rel,
        "icon"
            | "shortcut"
            | "apple-touch-icon"
            | "mask-icon"
            | "manifest"
            | "canonical"
            | "preload"
            | "prefetch"
            | "alternate"
    )
}

/// Splits a srcset value into URL candidates: entries separated by commas,
/// first whitespace-delimited token of each entry.
fn srcset_candidates(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
}

/// Meta content values only count when they already look like a URL:
/// absolute http(s) or root-relative.
fn looks_like_url(content: &str) -> bool {
    let trimmed = content.trim();
    let lower = trimmed.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || trimmed.starts_with('/')
}

/// Quoted strings inside inline style/script text that end in a known
/// resource extension (optionally followed by a query string).
fn raw_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)["']([^"'\s]+\.(?:css|js|mjs|png|jpe?g|gif|svg|webp|avif|ico|bmp|woff2?|ttf|otf|eot|json|xml|mp3|mp4|webm|ogg|wav|pdf)(?:\?[^"'\s]*)?)["']"#,
        )
        .expect("valid raw-reference pattern")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanToggles;

    fn base() -> Url {
        Url::parse("https://example.com/page/").unwrap()
    }

    fn extract(html: &str) -> ExtractedResources {
        extract_resources(html, &base(), &ScanToggles::default())
    }

    fn urls(extracted: &ExtractedResources) -> Vec<String> {
        extracted.refs.iter().map(|r| r.url.to_string()).collect()
    }

    #[test]
    fn finds_stylesheet_links() {
        let html = r#"
            <link rel="stylesheet" href="/main.css">
            <link type="text/css" href="extra.css">
        "#;
        let extracted = extract(html);
        assert_eq!(
            urls(&extracted),
            vec![
                "https://example.com/main.css",
                "https://example.com/page/extra.css"
            ]
        );
        assert!(extracted
            .refs
            .iter()
            .all(|r| r.channel == DiscoveryChannel::StylesheetLink));
    }

    #[test]
    fn finds_icon_manifest_and_preload_relations() {
        let html = r#"
            <link rel="icon" href="/favicon.ico">
            <link rel="manifest" href="/site.webmanifest">
            <link rel="preload" href="/hero.jpg">
            <link rel="author" href="/humans.txt">
        "#;
        let extracted = extract(html);
        assert_eq!(extracted.len(), 3);
    }

    #[test]
    fn inline_style_urls_resolve_against_base() {
        let html = r#"<style>body { background: url(bg.png); }</style>"#;
        let extracted = extract(html);
        assert_eq!(urls(&extracted), vec!["https://example.com/page/bg.png"]);
        assert_eq!(extracted.refs[0].channel, DiscoveryChannel::InlineStyle);
    }

    #[test]
    fn same_url_through_two_channels_yields_one_ref() {
        // <img src> and a srcset entry spelling the same absolute URL two
        // different ways: one fetch, both spellings kept as aliases.
        let html = r#"<img src="/pic.png" srcset="../pic.png 1x, /pic-2x.png 2x">"#;
        let extracted = extract(html);
        assert_eq!(
            urls(&extracted),
            vec![
                "https://example.com/pic.png",
                "https://example.com/pic-2x.png"
            ]
        );
        let spellings = &extracted.aliases["https://example.com/pic.png"];
        assert_eq!(spellings.len(), 2);
        assert!(spellings.contains(&"/pic.png".to_string()));
        assert!(spellings.contains(&"../pic.png".to_string()));
        // First discovery wins the channel tag.
        assert_eq!(extracted.refs[0].channel, DiscoveryChannel::ImageSrc);
    }

    #[test]
    fn srcset_entries_take_first_whitespace_token() {
        let html = r#"<img srcset="small.jpg 480w,  large.jpg 1080w">"#;
        let extracted = extract(html);
        assert_eq!(
            urls(&extracted),
            vec![
                "https://example.com/page/small.jpg",
                "https://example.com/page/large.jpg"
            ]
        );
    }

    #[test]
    fn media_and_object_sources_are_collected() {
        let html = r#"
            <video src="/clip.mp4"></video>
            <audio src="/track.mp3"></audio>
            <object data="/doc.pdf"></object>
        "#;
        let extracted = extract(html);
        assert_eq!(extracted.len(), 3);
        assert_eq!(extracted.refs[2].channel, DiscoveryChannel::ObjectData);
    }

    #[test]
    fn meta_content_only_when_it_looks_like_a_url() {
        let html = r#"
            <meta property="og:image" content="https://cdn.example.com/og.png">
            <meta name="viewport" content="width=device-width, initial-scale=1">
        "#;
        let extracted = extract(html);
        assert_eq!(urls(&extracted), vec!["https://cdn.example.com/og.png"]);
        assert_eq!(extracted.refs[0].channel, DiscoveryChannel::MetaContent);
    }

    #[test]
    fn raw_script_rescan_catches_quoted_resource_strings() {
        let html = r#"<script>const icon = "/assets/spinner.gif?v=2";</script>"#;
        let extracted = extract(html);
        assert_eq!(
            urls(&extracted),
            vec!["https://example.com/assets/spinner.gif?v=2"]
        );
        assert_eq!(extracted.refs[0].channel, DiscoveryChannel::RawBlock);
    }

    #[test]
    fn data_and_javascript_references_never_enter_the_set() {
        let html = r##"
            <img src="data:image/png;base64,AAAA">
            <script src="javascript:void(0)"></script>
            <link rel="icon" href="#frag">
        "##;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn channel_toggles_disable_their_source() {
        let html = r#"
            <img src="/pic.png">
            <script src="/app.js"></script>
        "#;
        let scan = ScanToggles {
            images: false,
            raw_blocks: false,
            ..ScanToggles::default()
        };
        let extracted = extract_resources(html, &base(), &scan);
        assert_eq!(urls(&extracted), vec!["https://example.com/app.js"]);
    }
}
