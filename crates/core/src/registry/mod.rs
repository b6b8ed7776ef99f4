//! Curated known-site registry.
//!
//! A static hostname → partial-record table for high-traffic domains the
//! operator has vetted. It serves two purposes: a zero-I/O shortcut that
//! substitutes for the network strategies entirely, and a per-field
//! fallback source during merge/enrichment. Entries are never refreshed
//! from the network; staleness is an accepted tradeoff.

use std::collections::HashMap;

use crate::types::PartialMeta;

/// Hostname-keyed table of curated partial records.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, PartialMeta>,
}

fn entry(title: &str, description: &str, icon: &str, site_name: &str) -> PartialMeta {
    PartialMeta {
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        icon: Some(icon.to_string()),
        site_name: Some(site_name.to_string()),
        ..Default::default()
    }
}

impl Registry {
    /// Empty registry with no curated entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in curated table.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();

        entries.insert(
            "github.com".to_string(),
            entry("GitHub", "全球最大的代码托管平台", "https://github.com/favicon.ico", "GitHub"),
        );
        entries.insert(
            "google.com".to_string(),
            entry("Google", "全球最大的搜索引擎", "https://www.google.com/favicon.ico", "Google"),
        );
        entries.insert(
            "stackoverflow.com".to_string(),
            entry(
                "Stack Overflow",
                "程序员问答社区",
                "https://cdn.sstatic.net/Sites/stackoverflow/Img/favicon.ico",
                "Stack Overflow",
            ),
        );
        entries.insert(
            "zhihu.com".to_string(),
            entry("知乎", "中文互联网高质量问答社区", "https://static.zhihu.com/heifetz/favicon.ico", "知乎"),
        );
        entries.insert(
            "bilibili.com".to_string(),
            entry("哔哩哔哩", "国内知名的视频弹幕网站", "https://www.bilibili.com/favicon.ico", "哔哩哔哩"),
        );
        entries.insert(
            "juejin.cn".to_string(),
            entry("稀土掘金", "面向开发者的技术社区", "https://lf3-cdn-tos.bytescm.com/obj/static/xitu_juejin_web/static/favicons/favicon-32x32.png", "稀土掘金"),
        );
        entries.insert(
            "baidu.com".to_string(),
            entry("百度", "全球领先的中文搜索引擎", "https://www.baidu.com/favicon.ico", "百度"),
        );
        entries.insert(
            "youtube.com".to_string(),
            entry("YouTube", "全球最大的视频分享平台", "https://www.youtube.com/favicon.ico", "YouTube"),
        );
        entries.insert(
            "developer.mozilla.org".to_string(),
            entry("MDN Web Docs", "Web 开发技术权威文档", "https://developer.mozilla.org/favicon.ico", "MDN"),
        );

        Self { entries }
    }

    /// Add or replace a curated entry at construction time.
    pub fn with_entry(mut self, host: impl Into<String>, meta: PartialMeta) -> Self {
        self.entries.insert(host.into(), meta);
        self
    }

    /// Look up the curated entry for a hostname.
    ///
    /// A leading `www.` on the queried host is ignored, so
    /// `www.github.com` matches the `github.com` entry.
    pub fn get(&self, host: &str) -> Option<&PartialMeta> {
        if let Some(meta) = self.entries.get(host) {
            return Some(meta);
        }
        host.strip_prefix("www.").and_then(|bare| self.entries.get(bare))
    }

    /// Number of curated entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
