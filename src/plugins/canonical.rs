//! Resolve relative URLs in canonical and social tags against a site URL.

use crate::hooks::{HeadPlugin, Hooks, TagsResolveContext};
use crate::tag::{HeadTag, TagKind};

/// Meta tags whose `content` is a URL.
const URL_META: &[(&str, &str)] = &[
    ("property", "og:url"),
    ("property", "og:image"),
    ("property", "og:image:url"),
    ("property", "og:image:secure_url"),
    ("property", "og:video"),
    ("property", "og:audio"),
    ("name", "twitter:image"),
];

#[derive(Debug, Clone)]
pub struct CanonicalPlugin {
    pub base_url: String,
}

impl CanonicalPlugin {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// `href` against the base URL; absolute URLs pass through.
    pub fn absolute(&self, href: &str) -> String {
        if is_absolute(href) {
            return href.to_owned();
        }
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/{}", href.trim_start_matches("./").trim_start_matches('/'))
    }

    fn rewrite(&self, tag: &mut HeadTag) {
        let attr = match tag.kind {
            TagKind::Link
                if tag
                    .attr("rel")
                    .is_some_and(|rel| rel.eq_ignore_ascii_case("canonical")) =>
            {
                "href"
            }
            TagKind::Meta
                if URL_META
                    .iter()
                    .any(|&(attr, name)| tag.attr(attr) == Some(name)) =>
            {
                "content"
            }
            _ => return,
        };
        if let Some(value) = tag.attr(attr)
            && !is_absolute(value)
        {
            let value = self.absolute(value);
            tag.set_attr(attr, value);
        }
    }
}

fn is_absolute(href: &str) -> bool {
    href.starts_with("//") || href.starts_with("data:") || href.contains("://")
}

impl HeadPlugin for CanonicalPlugin {
    fn name(&self) -> &str {
        "canonical"
    }

    fn install(&self, hooks: &mut Hooks) {
        let plugin = self.clone();
        hooks.on::<TagsResolveContext, _>(self.name(), move |ctx| {
            for tag in &mut ctx.tags {
                plugin.rewrite(tag);
            }
            Ok(())
        });
    }
}
