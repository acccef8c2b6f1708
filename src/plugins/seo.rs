//! Fill in social meta from what the page already declares.
//!
//! | Added                 | From                          |
//! |-----------------------|-------------------------------|
//! | `og:title`            | final `<title>`               |
//! | `og:description`      | `meta[name=description]`      |
//! | `twitter:card`        | presence of `og:image`        |
//!
//! Nothing is added when the page sets the tag itself.

use super::{append_to_head, plugin_meta};
use crate::hooks::{HeadPlugin, Hooks, TagsResolveContext};
use crate::tag::{HeadTag, TagKind};

#[derive(Debug, Clone)]
pub struct InferSeoMetaPlugin {
    /// `twitter:card` value used when an `og:image` exists.
    pub twitter_card: String,
}

impl Default for InferSeoMetaPlugin {
    fn default() -> Self {
        Self {
            twitter_card: "summary_large_image".into(),
        }
    }
}

fn find_meta<'a>(tags: &'a [HeadTag], attr: &str, name: &str) -> Option<&'a HeadTag> {
    tags.iter()
        .find(|t| t.kind == TagKind::Meta && t.attr(attr) == Some(name))
}

impl InferSeoMetaPlugin {
    fn infer(&self, tags: &mut Vec<HeadTag>) {
        let mut added = Vec::new();

        if find_meta(tags, "property", "og:title").is_none()
            && let Some(title) = tags.iter().find(|t| t.kind == TagKind::Title)
            && let Some(text) = title.text_content.as_deref()
        {
            added.push(plugin_meta("property", "og:title", text, title.sequence));
        }

        if find_meta(tags, "property", "og:description").is_none()
            && let Some(desc) = find_meta(tags, "name", "description")
            && let Some(content) = desc.attr("content")
        {
            added.push(plugin_meta("property", "og:description", content, desc.sequence));
        }

        if find_meta(tags, "name", "twitter:card").is_none()
            && let Some(image) = find_meta(tags, "property", "og:image")
        {
            added.push(plugin_meta("name", "twitter:card", &self.twitter_card, image.sequence));
        }

        for tag in added {
            append_to_head(tags, tag);
        }
    }
}

impl HeadPlugin for InferSeoMetaPlugin {
    fn name(&self) -> &str {
        "infer-seo-meta"
    }

    fn install(&self, hooks: &mut Hooks) {
        let plugin = self.clone();
        hooks.on::<TagsResolveContext, _>(self.name(), move |ctx| {
            plugin.infer(&mut ctx.tags);
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryOptions, HeadInput};
    use crate::head::Head;
    use serde_json::json;

    async fn resolve(input: serde_json::Value) -> Vec<HeadTag> {
        let head = Head::server();
        head.use_plugin(InferSeoMetaPlugin::default());
        head.push(HeadInput::from_json(input), EntryOptions::default());
        head.resolve_tags().await
    }

    fn content<'a>(tags: &'a [HeadTag], attr: &str, name: &str) -> Option<&'a str> {
        find_meta(tags, attr, name).and_then(|t| t.attr("content"))
    }

    #[tokio::test]
    async fn test_infers_from_title_and_description() {
        let tags = resolve(json!({
            "title": "Home",
            "titleTemplate": "%s - Site",
            "description": "About us",
            "ogImage": "/cover.png",
        }))
        .await;
        assert_eq!(content(&tags, "property", "og:title"), Some("Home - Site"));
        assert_eq!(content(&tags, "property", "og:description"), Some("About us"));
        assert_eq!(content(&tags, "name", "twitter:card"), Some("summary_large_image"));
    }

    #[tokio::test]
    async fn test_explicit_tags_win() {
        let tags = resolve(json!({
            "title": "Home",
            "ogTitle": "Custom",
        }))
        .await;
        assert_eq!(content(&tags, "property", "og:title"), Some("Custom"));
        assert_eq!(tags.iter().filter(|t| t.attr("property") == Some("og:title")).count(), 1);
        assert!(find_meta(&tags, "name", "twitter:card").is_none());
    }
}
