//! Collapse tags that denote the same logical tag.
//!
//! Tags are folded in registration order. The first tag on a key opens a
//! group; a later tag from *another* entry either replaces the group or is
//! merged into it, following its own `tagDuplicateStrategy`. A later tag
//! from the *same* entry joins the group instead, so array-expanded values
//! (`og:image` × N) survive side by side and keep distinct keys
//! (`meta:og:image`, `meta:og:image:1`, ...).

use crate::tag::normalise::{format_style, parse_style};
use crate::log;
use crate::tag::{AttrValue, HeadTag, MergeStrategy, TagKind};
use compact_str::{CompactString, format_compact};
use rustc_hash::FxHashMap;

/// Tags sharing one dedupe key (or a single key-less tag).
struct Group {
    entry: u64,
    tags: Vec<HeadTag>,
}

/// Return one tag per dedupe key, in registration order.
pub fn dedupe_tags(mut tags: Vec<HeadTag>) -> Vec<HeadTag> {
    tags.sort_by_key(|tag| tag.sequence);

    let mut groups: Vec<Group> = Vec::with_capacity(tags.len());
    let mut by_key: FxHashMap<CompactString, usize> = FxHashMap::default();

    for tag in tags {
        let Some(key) = tag.dedupe_key.clone() else {
            groups.push(Group {
                entry: tag.sequence.entry,
                tags: vec![tag],
            });
            continue;
        };

        let Some(&idx) = by_key.get(&key) else {
            by_key.insert(key, groups.len());
            groups.push(Group {
                entry: tag.sequence.entry,
                tags: vec![tag],
            });
            continue;
        };

        let group = &mut groups[idx];
        let same_entry = group.entry == tag.sequence.entry;
        group.entry = tag.sequence.entry;

        if same_entry && !tag.kind.is_singleton() && tag.merge_strategy == MergeStrategy::Replace {
            group.tags.push(tag);
        } else if tag.merge_strategy == MergeStrategy::Merge && !tag.tombstone {
            let merged = match group.tags.pop() {
                Some(prev) if !prev.tombstone => merge_tags(&prev, tag),
                _ => tag,
            };
            group.tags = vec![merged];
        } else {
            group.tags = vec![tag];
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        for (n, mut tag) in group.tags.into_iter().enumerate() {
            if tag.tombstone {
                continue;
            }
            if n > 0
                && let Some(key) = &tag.dedupe_key
            {
                tag.dedupe_key = Some(format_compact!("{key}:{n}"));
            }
            if !is_meaningful(&tag) {
                log!("dedupe"; "dropped meaningless {} tag {}", tag.kind, tag.render_key());
                continue;
            }
            out.push(tag);
        }
    }
    out
}

/// Merge `incoming` over `prev`: attributes union key by key, `class` as a
/// token set, `style` per property. Later values win.
pub fn merge_tags(prev: &HeadTag, incoming: HeadTag) -> HeadTag {
    let mut merged = incoming;
    let mut props = prev.props.clone();
    for name in &merged.removed {
        props.remove(name);
    }

    for (name, value) in std::mem::take(&mut merged.props) {
        let value = match (name.as_str(), props.get(&name), &value) {
            ("class", Some(AttrValue::Text(old)), AttrValue::Text(new)) => {
                AttrValue::Text(union_class(old, new))
            }
            ("style", Some(AttrValue::Text(old)), AttrValue::Text(new)) => {
                AttrValue::Text(union_style(old, new))
            }
            _ => value,
        };
        props.insert(name, value);
    }

    merged.props = props;
    if merged.text_content.is_none() {
        merged.text_content = prev.text_content.clone();
    }
    if merged.inner_html.is_none() {
        merged.inner_html = prev.inner_html.clone();
    }
    if merged.priority.is_none() {
        merged.priority = prev.priority.clone();
    }
    merged.removed.clear();
    merged.rehash();
    merged
}

fn union_class(old: &str, new: &str) -> String {
    let mut tokens: Vec<&str> = old.split_whitespace().collect();
    for token in new.split_whitespace() {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens.join(" ")
}

fn union_style(old: &str, new: &str) -> String {
    let mut pairs = parse_style(old);
    for (prop, value) in parse_style(new) {
        match pairs.iter_mut().find(|(p, _)| *p == prop) {
            Some(slot) => slot.1 = value,
            None => pairs.push((prop, value)),
        }
    }
    format_style(&pairs)
}

/// Whether a tag still carries enough to be worth rendering.
///
/// Titles are judged after templating, not here.
pub fn is_meaningful(tag: &HeadTag) -> bool {
    let has_content = tag.content().is_some_and(|c| !c.is_empty());
    match tag.kind {
        TagKind::Title => true,
        TagKind::Meta => tag.has_attr("charset") || tag.has_attr("content"),
        TagKind::Link => tag.has_attr("rel") && tag.has_attr("href"),
        TagKind::Script => tag.has_attr("src") || has_content,
        TagKind::Style | TagKind::Noscript => has_content,
        TagKind::Base => tag.has_attr("href") || tag.has_attr("target"),
        TagKind::HtmlAttrs | TagKind::BodyAttrs => !tag.props.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{TagSequence, normalise::dedupe_key};

    fn tag(kind: TagKind, entry: u64, index: u32, attrs: &[(&str, &str)]) -> HeadTag {
        let mut tag = HeadTag::new(kind);
        for (k, v) in attrs {
            tag.set_attr(k, *v);
        }
        tag.sequence = TagSequence { entry, index };
        tag.dedupe_key = dedupe_key(&tag, None);
        tag.rehash();
        tag
    }

    #[test]
    fn test_later_entry_replaces() {
        let tags = vec![
            tag(TagKind::Meta, 0, 0, &[("name", "description"), ("content", "old")]),
            tag(TagKind::Meta, 1, 0, &[("name", "description"), ("content", "new")]),
        ];
        let out = dedupe_tags(tags);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].attr("content"), Some("new"));
    }

    #[test]
    fn test_registration_order_not_input_order() {
        let tags = vec![
            tag(TagKind::Meta, 1, 0, &[("name", "description"), ("content", "new")]),
            tag(TagKind::Meta, 0, 0, &[("name", "description"), ("content", "old")]),
        ];
        let out = dedupe_tags(tags);
        assert_eq!(out[0].attr("content"), Some("new"));
    }

    #[test]
    fn test_same_entry_duplicates_survive() {
        let tags = vec![
            tag(TagKind::Meta, 0, 0, &[("property", "og:image"), ("content", "x")]),
            tag(TagKind::Meta, 0, 1, &[("property", "og:image"), ("content", "y")]),
        ];
        let out = dedupe_tags(tags);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].dedupe_key.as_deref(), Some("meta:og:image"));
        assert_eq!(out[1].dedupe_key.as_deref(), Some("meta:og:image:1"));
    }

    #[test]
    fn test_other_entry_replaces_whole_run() {
        let tags = vec![
            tag(TagKind::Meta, 0, 0, &[("property", "og:image"), ("content", "x")]),
            tag(TagKind::Meta, 0, 1, &[("property", "og:image"), ("content", "y")]),
            tag(TagKind::Meta, 1, 0, &[("property", "og:image"), ("content", "z")]),
        ];
        let out = dedupe_tags(tags);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].attr("content"), Some("z"));
    }

    #[test]
    fn test_merge_class_union() {
        let a = tag(TagKind::HtmlAttrs, 0, 0, &[("class", "a"), ("lang", "en")]);
        let mut b = tag(TagKind::HtmlAttrs, 1, 0, &[("class", "b a")]);
        b.merge_strategy = MergeStrategy::Merge;
        let out = dedupe_tags(vec![a, b]);
        assert_eq!(out[0].attr("class"), Some("a b"));
        assert_eq!(out[0].attr("lang"), Some("en"));
    }

    #[test]
    fn test_replace_class_default() {
        let a = tag(TagKind::HtmlAttrs, 0, 0, &[("class", "a")]);
        let b = tag(TagKind::HtmlAttrs, 1, 0, &[("class", "b")]);
        let out = dedupe_tags(vec![a, b]);
        assert_eq!(out[0].attr("class"), Some("b"));
    }

    #[test]
    fn test_merge_style_per_property() {
        let a = tag(TagKind::BodyAttrs, 0, 0, &[("style", "color: red; margin: 0")]);
        let mut b = tag(TagKind::BodyAttrs, 1, 0, &[("style", "color: blue")]);
        b.merge_strategy = MergeStrategy::Merge;
        let out = dedupe_tags(vec![a, b]);
        assert_eq!(out[0].attr("style"), Some("color: blue; margin: 0"));
    }

    #[test]
    fn test_merge_honours_removed_attrs() {
        let a = tag(TagKind::HtmlAttrs, 0, 0, &[("lang", "en"), ("dir", "ltr")]);
        let mut b = tag(TagKind::HtmlAttrs, 1, 0, &[("class", "x")]);
        b.merge_strategy = MergeStrategy::Merge;
        b.removed.push("lang".into());
        let out = dedupe_tags(vec![a, b]);
        assert!(!out[0].has_attr("lang"));
        assert_eq!(out[0].attr("dir"), Some("ltr"));
    }

    #[test]
    fn test_tombstone_removes_earlier() {
        let a = tag(TagKind::Meta, 0, 0, &[("name", "description"), ("content", "x")]);
        let mut b = tag(TagKind::Meta, 1, 0, &[("name", "description")]);
        b.tombstone = true;
        assert!(dedupe_tags(vec![a, b]).is_empty());
    }

    #[test]
    fn test_merge_leaving_link_meaningless_is_dropped() {
        let a = tag(TagKind::Link, 0, 0, &[("id", "x"), ("rel", "icon")]);
        let mut b = tag(TagKind::Link, 1, 0, &[("id", "x"), ("type", "image/png")]);
        b.merge_strategy = MergeStrategy::Merge;
        assert!(dedupe_tags(vec![a, b]).is_empty());
    }

    #[test]
    fn test_keyless_tags_never_collapse() {
        let a = tag(TagKind::Script, 0, 0, &[("src", "/a.js")]);
        let b = tag(TagKind::Script, 1, 0, &[("src", "/a.js")]);
        assert_eq!(dedupe_tags(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_union_helpers() {
        assert_eq!(union_class("a b", "b c"), "a b c");
        assert_eq!(union_style("a: 1", "b: 2; a: 3"), "a: 3; b: 2");
    }
}
