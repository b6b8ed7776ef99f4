//! Best-effort metadata extraction from fetched HTML.
//!
//! ### Tag scan
//! - First `<title>` element text (entities decoded by the parser)
//! - Every `<meta>` tag with a recognized `name`/`property`: first
//!   non-empty tag wins per target field, later tags never overwrite
//! - First `<link>` tag whose `rel` contains "icon", `href` resolved
//!   against the page base URL
//!
//! ### Tolerance
//! - html5ever recovers from arbitrarily malformed markup, so extraction
//!   degrades to partial or empty results and never panics.

use scraper::{Html, Selector};
use url::Url;

use linkcard_core::PartialMeta;

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn fill(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Scan HTML for card metadata, resolving icon and image URLs against
/// `base_url`.
///
/// Always returns a (possibly empty) `PartialMeta`; malformed markup is
/// tolerated, never an error.
pub fn extract_meta(html: &str, base_url: &Url) -> PartialMeta {
    let document = Html::parse_document(html);
    let mut meta = PartialMeta::default();

    let title_sel = Selector::parse("title").expect("invalid selector");
    if let Some(element) = document.select(&title_sel).next() {
        meta.title = non_empty(&element.text().collect::<String>());
    }

    let meta_sel = Selector::parse("meta").expect("invalid selector");
    for element in document.select(&meta_sel) {
        let name = match element.value().attr("name").or_else(|| element.value().attr("property")) {
            Some(n) => n.to_ascii_lowercase(),
            None => continue,
        };
        let content = match element.value().attr("content").and_then(non_empty) {
            Some(c) => c,
            None => continue,
        };

        match name.as_str() {
            "og:title" | "twitter:title" => fill(&mut meta.title, content),
            "description" | "og:description" | "twitter:description" => fill(&mut meta.description, content),
            "og:site_name" => fill(&mut meta.site_name, content),
            "og:image" => {
                if meta.og_image.is_none()
                    && let Ok(resolved) = base_url.join(&content)
                {
                    meta.og_image = Some(resolved.to_string());
                }
            }
            _ => {}
        }
    }

    let link_sel = Selector::parse("link").expect("invalid selector");
    for element in document.select(&link_sel) {
        let rel = match element.value().attr("rel") {
            Some(r) => r.to_ascii_lowercase(),
            None => continue,
        };
        if !rel.contains("icon") {
            continue;
        }
        if let Some(href) = element.value().attr("href").and_then(non_empty)
            && let Ok(resolved) = base_url.join(&href)
        {
            meta.icon = Some(resolved.to_string());
            break;
        }
    }

    meta
}
