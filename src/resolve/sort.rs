//! Total ordering of deduplicated tags.
//!
//! # Sort key
//!
//! Every tag sorts by `(position, band, weight, sequence)`:
//!
//! | Band | Source                          | Weight                         |
//! |------|---------------------------------|--------------------------------|
//! | 0    | numeric `tagPriority`           | the number itself              |
//! | 1    | `critical` / `high` / `low`     | `[priority]` tier value        |
//! | 2    | no priority                     | implicit ladder rung           |
//!
//! `before:<key>` / `after:<key>` tags are placed in a second pass, one
//! step before or after the referenced tag's final rank. A reference to a
//! missing key, to another bucket, or to a tag that is itself relative
//! falls back to the implicit ladder.

use crate::config::PriorityLadder;
use crate::log;
use crate::tag::{HeadTag, TagKind, TagPosition, TagPriority, TagSequence};
use rustc_hash::FxHashMap;

/// Absolute sort key of a tag, ignoring relative priorities.
fn absolute_key(tag: &HeadTag, ladder: &PriorityLadder) -> (u8, i64) {
    match &tag.priority {
        Some(TagPriority::Number(n)) => (0, *n),
        Some(TagPriority::Critical) => (1, ladder.critical),
        Some(TagPriority::High) => (1, ladder.high),
        Some(TagPriority::Low) => (1, ladder.low),
        Some(TagPriority::Before(_) | TagPriority::After(_)) | None => {
            (2, implicit_weight(tag, ladder))
        }
    }
}

/// Rung of the implicit ladder a tag falls on.
pub fn implicit_weight(tag: &HeadTag, ladder: &PriorityLadder) -> i64 {
    match tag.kind {
        TagKind::Base => ladder.base,
        TagKind::Title => ladder.title,
        TagKind::Style => ladder.stylesheet,
        TagKind::Meta => {
            if tag.has_attr("charset") {
                ladder.charset
            } else if tag
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("content-security-policy"))
            {
                ladder.csp
            } else if tag.attr("name") == Some("viewport") {
                ladder.viewport
            } else {
                ladder.default
            }
        }
        TagKind::Link => {
            let rel = tag.attr("rel").unwrap_or_default();
            let has = |name: &str| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case(name));
            if has("preconnect") || has("dns-prefetch") {
                ladder.preconnect
            } else if has("stylesheet") {
                ladder.stylesheet
            } else if has("preload") || has("modulepreload") {
                ladder.preload
            } else if has("prefetch") || has("prerender") {
                ladder.prefetch
            } else {
                ladder.default
            }
        }
        TagKind::Script => {
            if tag.is_json_script() {
                ladder.default
            } else if tag.has_attr("async") {
                ladder.async_script
            } else if tag.has_attr("defer") || tag.attr("type") == Some("module") {
                ladder.defer_script
            } else {
                ladder.sync_script
            }
        }
        TagKind::Noscript | TagKind::HtmlAttrs | TagKind::BodyAttrs => ladder.default,
    }
}

/// Sort tags into their final order: by position bucket, then priority.
pub fn sort_tags(tags: Vec<HeadTag>, ladder: &PriorityLadder) -> Vec<HeadTag> {
    let index: FxHashMap<&str, (TagPosition, bool)> = tags
        .iter()
        .filter_map(|tag| {
            let relative = tag.priority.as_ref().is_some_and(|p| p.reference().is_some());
            tag.dedupe_key
                .as_deref()
                .map(|key| (key, (tag.position, relative)))
        })
        .collect();

    // A relative tag is placed in pass two only if its anchor is absolute.
    let anchored: Vec<bool> = tags
        .iter()
        .map(|tag| {
            let Some(reference) = tag.priority.as_ref().and_then(TagPriority::reference) else {
                return false;
            };
            match index.get(reference) {
                Some((position, false)) if *position == tag.position => true,
                _ => {
                    log!("sort"; "`{reference}` unresolved for {}, using implicit order", tag.render_key());
                    false
                }
            }
        })
        .collect();

    // Pass one: absolute tags get spaced ranks.
    let mut first: Vec<(usize, (TagPosition, u8, i64, TagSequence))> = tags
        .iter()
        .enumerate()
        .filter(|(i, _)| !anchored[*i])
        .map(|(i, tag)| {
            let (band, weight) = absolute_key(tag, ladder);
            (i, (tag.position, band, weight, tag.sequence))
        })
        .collect();
    first.sort_by(|a, b| a.1.cmp(&b.1));

    let mut rank = vec![0i64; tags.len()];
    for (n, (i, _)) in first.iter().enumerate() {
        rank[*i] = n as i64 * 10;
    }
    let rank_of: FxHashMap<&str, i64> = tags
        .iter()
        .enumerate()
        .filter(|(i, _)| !anchored[*i])
        .filter_map(|(i, tag)| tag.dedupe_key.as_deref().map(|key| (key, rank[i])))
        .collect();

    // Pass two: relative tags sit next to their anchor.
    for (i, tag) in tags.iter().enumerate() {
        if !anchored[i] {
            continue;
        }
        let anchor = match &tag.priority {
            Some(TagPriority::Before(key)) => rank_of.get(key.as_str()).map(|r| r - 1),
            Some(TagPriority::After(key)) => rank_of.get(key.as_str()).map(|r| r + 1),
            _ => None,
        };
        if let Some(r) = anchor {
            rank[i] = r;
        }
    }

    let mut ordered: Vec<(i64, HeadTag)> = rank.into_iter().zip(tags).collect();
    ordered.sort_by(|(ra, a), (rb, b)| (ra, a.sequence).cmp(&(rb, b.sequence)));
    ordered.into_iter().map(|(_, tag)| tag).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(kind: TagKind, seq: u32, attrs: &[(&str, &str)]) -> HeadTag {
        let mut tag = HeadTag::new(kind);
        for (k, v) in attrs {
            tag.set_attr(k, *v);
        }
        tag.sequence = TagSequence {
            entry: 0,
            index: seq,
        };
        tag.dedupe_key = crate::tag::normalise::dedupe_key(&tag, None);
        tag
    }

    fn with_priority(mut tag: HeadTag, priority: TagPriority) -> HeadTag {
        tag.priority = Some(priority);
        tag
    }

    fn keys(tags: &[HeadTag]) -> Vec<String> {
        tags.iter().map(|t| t.render_key().to_string()).collect()
    }

    #[test]
    fn test_numeric_priority_ascending() {
        let ladder = PriorityLadder::default();
        let a = with_priority(tag(TagKind::Meta, 0, &[("name", "a"), ("content", "x")]), TagPriority::Number(10));
        let b = with_priority(tag(TagKind::Meta, 1, &[("name", "b"), ("content", "x")]), TagPriority::Number(1));
        assert_eq!(keys(&sort_tags(vec![a, b], &ladder)), vec!["meta:b", "meta:a"]);
    }

    #[test]
    fn test_charset_before_plain_meta() {
        let ladder = PriorityLadder::default();
        let meta = tag(TagKind::Meta, 0, &[("name", "description"), ("content", "d")]);
        let charset = tag(TagKind::Meta, 1, &[("charset", "utf-8")]);
        assert_eq!(
            keys(&sort_tags(vec![meta, charset], &ladder)),
            vec!["charset", "meta:description"]
        );
    }

    #[test]
    fn test_implicit_ladder() {
        let ladder = PriorityLadder::default();
        let tags = vec![
            tag(TagKind::Link, 0, &[("rel", "prefetch"), ("href", "/n"), ("id", "pf")]),
            tag(TagKind::Script, 1, &[("src", "/d.js"), ("defer", ""), ("id", "d")]),
            tag(TagKind::Title, 2, &[]),
            tag(TagKind::Meta, 3, &[("name", "viewport"), ("content", "w")]),
            tag(TagKind::Link, 4, &[("rel", "stylesheet"), ("href", "/s.css"), ("id", "css")]),
            tag(TagKind::Base, 5, &[("href", "/")]),
        ];
        assert_eq!(
            keys(&sort_tags(tags, &ladder)),
            vec!["base", "meta:viewport", "title", "link:id:css", "script:id:d", "link:id:pf"]
        );
    }

    #[test]
    fn test_bands() {
        let ladder = PriorityLadder::default();
        let implicit = tag(TagKind::Meta, 0, &[("charset", "utf-8")]);
        let tier = with_priority(tag(TagKind::Meta, 1, &[("name", "t"), ("content", "x")]), TagPriority::Low);
        let explicit = with_priority(
            tag(TagKind::Meta, 2, &[("name", "e"), ("content", "x")]),
            TagPriority::Number(500),
        );
        assert_eq!(
            keys(&sort_tags(vec![implicit, tier, explicit], &ladder)),
            vec!["meta:e", "meta:t", "charset"]
        );
    }

    #[test]
    fn test_ties_break_by_sequence() {
        let ladder = PriorityLadder::default();
        let a = tag(TagKind::Meta, 3, &[("name", "a"), ("content", "x")]);
        let b = tag(TagKind::Meta, 1, &[("name", "b"), ("content", "x")]);
        assert_eq!(keys(&sort_tags(vec![a, b], &ladder)), vec!["meta:b", "meta:a"]);
    }

    #[test]
    fn test_relative_before_and_after() {
        let ladder = PriorityLadder::default();
        let title = tag(TagKind::Title, 0, &[]);
        let desc = tag(TagKind::Meta, 1, &[("name", "description"), ("content", "d")]);
        let after = with_priority(
            tag(TagKind::Meta, 2, &[("name", "after"), ("content", "x")]),
            TagPriority::After("title".into()),
        );
        let before = with_priority(
            tag(TagKind::Meta, 3, &[("name", "before"), ("content", "x")]),
            TagPriority::Before("title".into()),
        );
        assert_eq!(
            keys(&sort_tags(vec![desc, after, title, before], &ladder)),
            vec!["meta:before", "title", "meta:after", "meta:description"]
        );
    }

    #[test]
    fn test_relative_cycle_falls_back() {
        let ladder = PriorityLadder::default();
        let a = with_priority(
            tag(TagKind::Meta, 0, &[("name", "a"), ("content", "x")]),
            TagPriority::After("meta:b".into()),
        );
        let b = with_priority(
            tag(TagKind::Meta, 1, &[("name", "b"), ("content", "x")]),
            TagPriority::Before("meta:a".into()),
        );
        let charset = tag(TagKind::Meta, 2, &[("charset", "utf-8")]);
        assert_eq!(
            keys(&sort_tags(vec![a, b, charset], &ladder)),
            vec!["charset", "meta:a", "meta:b"]
        );
    }

    #[test]
    fn test_missing_reference_falls_back() {
        let ladder = PriorityLadder::default();
        let a = with_priority(
            tag(TagKind::Meta, 0, &[("name", "a"), ("content", "x")]),
            TagPriority::Before("meta:nope".into()),
        );
        let charset = tag(TagKind::Meta, 1, &[("charset", "utf-8")]);
        assert_eq!(keys(&sort_tags(vec![a, charset], &ladder)), vec!["charset", "meta:a"]);
    }

    #[test]
    fn test_position_buckets() {
        let ladder = PriorityLadder::default();
        let mut body = tag(TagKind::Script, 0, &[("src", "/b.js"), ("id", "b")]);
        body.position = TagPosition::BodyClose;
        let mut open = tag(TagKind::Noscript, 1, &[("id", "n")]);
        open.position = TagPosition::BodyOpen;
        let head = tag(TagKind::Meta, 2, &[("name", "a"), ("content", "x")]);
        assert_eq!(
            keys(&sort_tags(vec![body, open, head], &ladder)),
            vec!["meta:a", "noscript:id:n", "script:id:b"]
        );
    }

    #[test]
    fn test_configured_ladder() {
        let mut ladder = PriorityLadder::default();
        ladder.async_script = 5;
        let title = tag(TagKind::Title, 0, &[]);
        let script = tag(TagKind::Script, 1, &[("src", "/a.js"), ("async", ""), ("id", "a")]);
        assert_eq!(keys(&sort_tags(vec![title, script], &ladder)), vec!["script:id:a", "title"]);
    }
}
