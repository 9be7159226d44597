// src/extract/css.rs
// =============================================================================
// CSS reference handling: find url(...) and @import tokens inside stylesheet
// text, and rewrite them to absolute URLs.
//
// Absolutization matters because downloaded stylesheets are saved under a
// local bucket directory: a relative reference inside them would resolve
// against the wrong base once the file moves. Nested stylesheet assets are
// not fetched themselves (discovery is one level deep), but after rewriting
// they remain resolvable from the saved copy.
// =============================================================================

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use super::is_fetchable;

// Both patterns are constants; a parse failure is a programmer error.
fn url_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("valid url() pattern")
    })
}

fn import_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // @import "x" / @import 'x'  (@import url(...) is caught by url_token_re)
        Regex::new(r#"@import\s+['"]([^'"]+)['"]"#).expect("valid @import pattern")
    })
}

/// Extracts every fetchable url()/@import token from stylesheet text, in
/// document order. Tokens are returned raw (possibly relative); the caller
/// resolves them against the stylesheet's base URL.
pub fn extract_css_urls(css: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for caps in url_token_re().captures_iter(css) {
        let token = &caps[1];
        if is_fetchable(token) {
            tokens.push(token.to_string());
        }
    }
    for caps in import_token_re().captures_iter(css) {
        let token = &caps[1];
        if is_fetchable(token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Rewrites every url()/@import reference in `css` to an absolute URL
/// resolved against `base`. Non-fetchable tokens (data:, fragments, ...) and
/// tokens that fail to resolve are left untouched.
pub fn absolutize_css(css: &str, base: &Url) -> String {
    let pass_one = url_token_re().replace_all(css, |caps: &regex::Captures| {
        let token = &caps[1];
        match resolve(base, token) {
            Some(absolute) => format!("url('{absolute}')"),
            None => caps[0].to_string(),
        }
    });
    import_token_re()
        .replace_all(&pass_one, |caps: &regex::Captures| {
            let token = &caps[1];
            match resolve(base, token) {
                Some(absolute) => format!("@import '{absolute}'"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn resolve(base: &Url, token: &str) -> Option<String> {
    if !is_fetchable(token) {
        return None;
    }
    base.join(token).ok().map(|url| url.to_string())
}
