//! Entry input → flat list of [`HeadTag`]s.
//!
//! Runs once per entry per resolution pass on the already-resolved input
//! (see [`crate::entry::input`]). No dedupe or ordering happens here; tags
//! only get their identity, attributes, and content hash.
//!
//! Keys are visited in a fixed order so the output does not depend on how
//! the input object happened to be built:
//!
//! `title` → `base` → `meta` → flat meta keys → `link` → `style` → `script`
//! → `noscript` → `htmlAttrs` → `bodyAttrs`

use super::{
    AttrValue, HeadTag, MergeStrategy, TagKind, TagPosition, TagPriority, TagSequence, flat,
};
use crate::entry::{EntryMode, EntrySnapshot, Resolved, ResolvedInput, TitleFn};
use crate::log;
use compact_str::{CompactString, format_compact};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;

/// Tag keys in normalisation order. Flat meta keys go right after `meta`.
const TAG_KEYS: &[TagKind] = &[
    TagKind::Title,
    TagKind::Base,
    TagKind::Meta,
    TagKind::Link,
    TagKind::Style,
    TagKind::Script,
    TagKind::Noscript,
    TagKind::HtmlAttrs,
    TagKind::BodyAttrs,
];

/// HTML attributes that are present-or-absent rather than valued.
const BOOLEAN_ATTRS: &[&str] = &[
    "async",
    "defer",
    "nomodule",
    "disabled",
    "hidden",
    "inert",
    "itemscope",
    "blocking",
];

/// The `titleTemplate` an entry asked for.
#[derive(Clone)]
pub enum TitleTemplate {
    /// `titleTemplate: null` - render the raw title.
    Disabled,
    /// A string with a `%s` placeholder.
    Format(String),
    Function(TitleFn),
}

impl fmt::Debug for TitleTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Format(s) => f.debug_tuple("Format").field(s).finish(),
            Self::Function(_) => f.write_str("Function(<fn>)"),
        }
    }
}

/// Everything one entry contributes to a resolution pass.
#[derive(Debug, Clone, Default)]
pub struct NormalisedEntry {
    pub entry: u64,
    pub tags: Vec<HeadTag>,
    pub title_template: Option<TitleTemplate>,
    pub template_params: Option<Map<String, Value>>,
}

/// Normalise one entry's resolved input.
pub fn normalise_entry(entry: &EntrySnapshot, input: &ResolvedInput) -> NormalisedEntry {
    let mut out = NormalisedEntry {
        entry: entry.id,
        ..NormalisedEntry::default()
    };
    let ctx = TagContext {
        entry: entry.id,
        server_only: entry.options.mode == EntryMode::Server,
        priority: entry.options.tag_priority.clone(),
    };
    let mut index = 0u32;

    for (key, value) in input {
        match key.as_str() {
            "titleTemplate" => {
                out.title_template = match value {
                    Resolved::Function(f) => Some(TitleTemplate::Function(f.clone())),
                    Resolved::Value(Value::Null) => Some(TitleTemplate::Disabled),
                    Resolved::Value(Value::String(s)) => Some(TitleTemplate::Format(s.clone())),
                    Resolved::Value(other) => {
                        log!("normalise"; "entry {}: titleTemplate {other} ignored", entry.id);
                        None
                    }
                }
            }
            "templateParams" => match value.as_value() {
                Value::Object(params) => out.template_params = Some(params.clone()),
                other => {
                    log!("normalise"; "entry {}: templateParams {other} ignored", entry.id);
                }
            },
            _ => {}
        }
    }

    for kind in TAG_KEYS {
        if let Some((_, value)) = input.iter().find(|(k, _)| k == kind.as_str()) {
            for tag in normalise_key(*kind, value.as_value(), &ctx) {
                push_tag(&mut out.tags, tag, &mut index);
            }
        }
        if *kind == TagKind::Meta {
            for (key, value) in input {
                if is_reserved_key(key) {
                    continue;
                }
                let packed = flat::expand(key, value.as_value());
                if packed.is_empty() {
                    log!("normalise"; "entry {}: unknown key `{key}` dropped", entry.id);
                }
                for meta in packed {
                    push_tag(&mut out.tags, flat_meta_tag(meta, &ctx), &mut index);
                }
            }
        }
    }

    out
}

fn is_reserved_key(key: &str) -> bool {
    matches!(key, "titleTemplate" | "templateParams") || TagKind::from_key(key).is_some()
}

fn push_tag(tags: &mut Vec<HeadTag>, mut tag: HeadTag, index: &mut u32) {
    tag.sequence.index = *index;
    *index += 1;
    tag.rehash();
    tags.push(tag);
}

/// Per-entry defaults copied onto every tag.
struct TagContext {
    entry: u64,
    server_only: bool,
    priority: Option<TagPriority>,
}

impl TagContext {
    fn new_tag(&self, kind: TagKind) -> HeadTag {
        let mut tag = HeadTag::new(kind);
        tag.sequence = TagSequence {
            entry: self.entry,
            index: 0,
        };
        tag.server_only = self.server_only;
        tag.priority = self.priority.clone();
        tag
    }
}

fn normalise_key(kind: TagKind, value: &Value, ctx: &TagContext) -> SmallVec<[HeadTag; 1]> {
    match (kind, value) {
        (TagKind::Title, Value::Object(fields)) => normalise_object(kind, fields, ctx),
        (TagKind::Title, other) => {
            let mut tag = ctx.new_tag(kind);
            tag.text_content = scalar_text(other);
            tag.dedupe_key = Some("title".into());
            SmallVec::from_buf([tag])
        }
        (_, Value::Array(items)) if !kind.is_singleton() => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(normalise_object(kind, fields, ctx)),
                _ => None,
            })
            .flatten()
            .collect(),
        (_, Value::Object(fields)) => normalise_object(kind, fields, ctx),
        (_, Value::Null) if kind.is_singleton() => {
            let mut tag = ctx.new_tag(kind);
            tag.tombstone = true;
            tag.dedupe_key = dedupe_key(&tag, None);
            SmallVec::from_buf([tag])
        }
        _ => SmallVec::new(),
    }
}

/// Normalise one tag object, expanding an array-valued attribute into
/// one tag per value.
fn normalise_object(
    kind: TagKind,
    fields: &Map<String, Value>,
    ctx: &TagContext,
) -> SmallVec<[HeadTag; 1]> {
    let mut tag = ctx.new_tag(kind);
    let mut explicit_key: Option<CompactString> = None;
    let mut expansion: Option<(CompactString, Vec<Value>)> = None;

    for (name, value) in fields {
        match name.as_str() {
            "key" => explicit_key = scalar_text(value).map(Into::into),
            "tagPriority" => {
                if let Some(priority) = TagPriority::from_json(value) {
                    tag.priority = Some(priority);
                }
            }
            "tagPosition" => {
                if let Some(position) = value.as_str().and_then(TagPosition::parse) {
                    tag.position = position;
                }
            }
            "body" => {
                if value.as_bool() == Some(true) {
                    tag.position = TagPosition::BodyClose;
                }
            }
            "tagDuplicateStrategy" => {
                if let Some(strategy) = value.as_str().and_then(MergeStrategy::parse) {
                    tag.merge_strategy = strategy;
                }
            }
            "processTemplateParams" => tag.process_template_params = value.as_bool() == Some(true),
            "textContent" | "innerHTML" | "children" => {
                let content = match value {
                    Value::Null => {
                        tag.tombstone = true;
                        None
                    }
                    Value::Object(_) | Value::Array(_) => Some(value.to_string()),
                    other => scalar_text(other),
                };
                if name == "textContent" || kind == TagKind::Title {
                    tag.text_content = content;
                } else {
                    tag.inner_html = content;
                }
            }
            _ => normalise_attr(&mut tag, name, value, &mut expansion),
        }
    }

    tag.dedupe_key = dedupe_key(&tag, explicit_key.as_deref());

    match expansion {
        None => SmallVec::from_buf([tag]),
        Some((name, values)) => values
            .into_iter()
            .filter_map(|value| {
                let mut expanded = tag.clone();
                match value {
                    Value::Null => expanded.tombstone = true,
                    other => {
                        let text = scalar_text(&other)?;
                        expanded.props.insert(name.clone(), AttrValue::Text(text));
                    }
                }
                Some(expanded)
            })
            .collect(),
    }
}

fn normalise_attr(
    tag: &mut HeadTag,
    name: &str,
    value: &Value,
    expansion: &mut Option<(CompactString, Vec<Value>)>,
) {
    let attrs = tag.kind.is_attrs();
    let normalised = match (name, value) {
        ("class", _) => class_value(value).map(AttrValue::Text),
        ("style", _) => style_value(value).map(AttrValue::Text),
        (_, Value::Null) => {
            if attrs {
                tag.removed.push(name.into());
            } else {
                tag.tombstone = true;
            }
            None
        }
        (_, Value::Bool(false)) => None,
        (_, Value::Bool(true)) if BOOLEAN_ATTRS.contains(&name) || attrs => Some(AttrValue::Flag),
        (_, Value::Array(items)) if !attrs && expansion.is_none() => {
            *expansion = Some((name.into(), items.clone()));
            None
        }
        (_, Value::Array(items)) => {
            let joined: Vec<_> = items.iter().filter_map(scalar_text).collect();
            (!joined.is_empty()).then(|| AttrValue::Text(joined.join(", ")))
        }
        (_, Value::Object(_)) => None,
        (_, other) => scalar_text(other).map(AttrValue::Text),
    };
    if let Some(value) = normalised {
        tag.props.insert(name.into(), value);
    }
}

fn flat_meta_tag(meta: flat::FlatMeta, ctx: &TagContext) -> HeadTag {
    let mut tag = ctx.new_tag(TagKind::Meta);
    if meta.attr == flat::MetaAttr::Charset {
        match meta.content {
            Some(charset) => tag.set_attr("charset", charset),
            None => tag.tombstone = true,
        }
    } else {
        tag.set_attr(meta.attr.as_str(), meta.name);
        match meta.content {
            Some(content) => tag.set_attr("content", content),
            None => tag.tombstone = true,
        }
    }
    tag.dedupe_key = dedupe_key(&tag, None);
    tag
}

/// Identity a tag collapses under, if any.
pub fn dedupe_key(tag: &HeadTag, explicit: Option<&str>) -> Option<CompactString> {
    if let Some(key) = explicit {
        return Some(format_compact!("{}:key:{key}", tag.kind));
    }
    match tag.kind {
        TagKind::Title | TagKind::Base | TagKind::HtmlAttrs | TagKind::BodyAttrs => {
            return Some(tag.kind.as_str().into());
        }
        TagKind::Meta => {
            if tag.has_attr("charset") {
                return Some("charset".into());
            }
            for attr in ["name", "property", "http-equiv"] {
                if let Some(value) = tag.attr(attr) {
                    let value = if attr == "http-equiv" {
                        value.to_ascii_lowercase()
                    } else {
                        value.to_owned()
                    };
                    return Some(format_compact!("meta:{value}"));
                }
            }
        }
        TagKind::Link if tag.attr("rel") == Some("canonical") => {
            return Some("canonical".into());
        }
        _ => {}
    }
    tag.attr("id").map(|id| format_compact!("{}:id:{id}", tag.kind))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `"a b"`, `["a", "b"]` or `{ a: true, b: false }` → `"a b"` (deduplicated).
pub(crate) fn class_value(value: &Value) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut add = |token: &str| {
        for part in token.split_whitespace() {
            if !tokens.iter().any(|t| t == part) {
                tokens.push(part.to_owned());
            }
        }
    };
    match value {
        Value::String(s) => add(s),
        Value::Array(items) => items.iter().filter_map(Value::as_str).for_each(&mut add),
        Value::Object(map) => map
            .iter()
            .filter(|(_, on)| on.as_bool() == Some(true))
            .for_each(|(name, _)| add(name)),
        _ => return None,
    }
    (!tokens.is_empty()).then(|| tokens.join(" "))
}

/// `"color: red;margin:0"` or `{ color: "red" }` → `"color: red; margin: 0"`.
pub(crate) fn style_value(value: &Value) -> Option<String> {
    let pairs: Vec<(String, String)> = match value {
        Value::String(s) => parse_style(s),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| scalar_text(v).map(|v| (k.clone(), v)))
            .collect(),
        _ => return None,
    };
    (!pairs.is_empty()).then(|| format_style(&pairs))
}

pub(crate) fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let (prop, value) = (prop.trim(), value.trim());
            (!prop.is_empty() && !value.is_empty()).then(|| (prop.to_owned(), value.to_owned()))
        })
        .collect()
}

pub(crate) fn format_style(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(prop, value)| format!("{prop}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
