//! Field-by-field merge and deterministic default enrichment.
//!
//! Merging takes the value from the first source, in priority order, that
//! holds one. Enrichment then applies a total default chain so a returned
//! record always has a non-empty title, description, and icon:
//!
//! - `title` ← `site_name` ← bare domain (leading `www.` stripped)
//! - `description` ← templated "`<domain> 网站`" string
//! - `site_name` ← domain
//! - `icon` ← explicit icon ← probed favicon ← `og_image` ← fallback glyph

use chrono::{SecondsFormat, Utc};

use crate::fetch::url::NormalizedUrl;
use linkcard_core::{MetadataRecord, PartialMeta};

/// Merge partial records, earlier sources taking priority per field.
pub fn coalesce(sources: &[&PartialMeta]) -> PartialMeta {
    fn first<F>(sources: &[&PartialMeta], pick: F) -> Option<String>
    where
        F: Fn(&PartialMeta) -> Option<&String>,
    {
        sources.iter().find_map(|source| pick(source).cloned())
    }

    PartialMeta {
        title: first(sources, |s| s.title.as_ref()),
        description: first(sources, |s| s.description.as_ref()),
        icon: first(sources, |s| s.icon.as_ref()),
        favicon: first(sources, |s| s.favicon.as_ref()),
        site_name: first(sources, |s| s.site_name.as_ref()),
        og_image: first(sources, |s| s.og_image.as_ref()),
    }
}

/// Fill remaining gaps from the curated registry entry, then apply the
/// default chain and produce the final record.
pub fn enrich(
    norm: &NormalizedUrl, merged: PartialMeta, curated: Option<&PartialMeta>, fallback_icon: &str,
) -> MetadataRecord {
    let merged = match curated {
        Some(entry) => coalesce(&[&merged, entry]),
        None => merged,
    };

    let domain = norm.domain();
    let PartialMeta { title, description, icon, favicon, site_name, og_image } = merged;

    let title = title
        .or_else(|| site_name.clone())
        .unwrap_or_else(|| domain.clone());
    let description = description.unwrap_or_else(|| format!("{domain} 网站"));
    let site_name = site_name.unwrap_or_else(|| domain.clone());
    let icon = icon
        .or_else(|| favicon.clone())
        .or_else(|| og_image.clone())
        .unwrap_or_else(|| fallback_icon.to_string());

    MetadataRecord {
        url: norm.key.clone(),
        title: Some(title),
        description: Some(description),
        icon: Some(icon),
        favicon,
        site_name: Some(site_name),
        og_image,
        error: None,
        fetched_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}
