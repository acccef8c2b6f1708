//! Elemental head tags.
//!
//! A [`HeadTag`] is the unit every later stage works on. Tags are produced
//! fresh by [`normalise`] on every resolution pass and thrown away after it;
//! nothing keeps a tag alive between passes except the client
//! [`RenderRecord`](crate::dom::RenderRecord), which stores only hashes.

pub mod flat;
pub mod hash;
pub mod normalise;

use compact_str::{CompactString, format_compact};
use smallvec::SmallVec;
use std::{collections::BTreeMap, fmt};

pub use hash::ContentHash;
pub use normalise::{NormalisedEntry, TitleTemplate, normalise_entry};

// ============================================================================
// Tag Kind
// ============================================================================

/// What kind of element (or root attribute set) a tag becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Title,
    Base,
    Meta,
    Link,
    Script,
    Style,
    Noscript,
    HtmlAttrs,
    BodyAttrs,
}

impl TagKind {
    /// Input key / identity name (`htmlAttrs`, `meta`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Base => "base",
            Self::Meta => "meta",
            Self::Link => "link",
            Self::Script => "script",
            Self::Style => "style",
            Self::Noscript => "noscript",
            Self::HtmlAttrs => "htmlAttrs",
            Self::BodyAttrs => "bodyAttrs",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "title" => Self::Title,
            "base" => Self::Base,
            "meta" => Self::Meta,
            "link" => Self::Link,
            "script" => Self::Script,
            "style" => Self::Style,
            "noscript" => Self::Noscript,
            "htmlAttrs" => Self::HtmlAttrs,
            "bodyAttrs" => Self::BodyAttrs,
            _ => return None,
        })
    }

    /// Attribute sets applied to `<html>` / `<body>` instead of a new element.
    pub const fn is_attrs(self) -> bool {
        matches!(self, Self::HtmlAttrs | Self::BodyAttrs)
    }

    /// Elements without a closing tag.
    pub const fn is_void(self) -> bool {
        matches!(self, Self::Meta | Self::Link | Self::Base)
    }

    /// Kinds that may only exist once per document.
    pub const fn is_singleton(self) -> bool {
        matches!(
            self,
            Self::Title | Self::Base | Self::HtmlAttrs | Self::BodyAttrs
        )
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Position / Strategy / Priority
// ============================================================================

/// Where in the document a tag is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagPosition {
    #[default]
    Head,
    BodyOpen,
    BodyClose,
}

impl TagPosition {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "head" => Some(Self::Head),
            "bodyOpen" => Some(Self::BodyOpen),
            "bodyClose" => Some(Self::BodyClose),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::BodyOpen => "bodyOpen",
            Self::BodyClose => "bodyClose",
        }
    }
}

/// What happens when a later tag lands on an occupied dedupe key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    #[default]
    Replace,
    Merge,
}

impl MergeStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "replace" => Some(Self::Replace),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

/// Requested ordering for a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPriority {
    /// Explicit number, ascending.
    Number(i64),
    Critical,
    High,
    Low,
    /// Immediately before the tag with this dedupe key.
    Before(CompactString),
    /// Immediately after the tag with this dedupe key.
    After(CompactString),
}

impl TagPriority {
    /// Parse `tagPriority` input. Unknown strings yield `None`.
    pub fn parse_str(value: &str) -> Option<Self> {
        let value = value.trim();
        match value {
            "critical" => return Some(Self::Critical),
            "high" => return Some(Self::High),
            "low" => return Some(Self::Low),
            _ => {}
        }
        if let Some(key) = value.strip_prefix("before:") {
            return (!key.is_empty()).then(|| Self::Before(key.into()));
        }
        if let Some(key) = value.strip_prefix("after:") {
            return (!key.is_empty()).then(|| Self::After(key.into()));
        }
        value.parse().ok().map(Self::Number)
    }

    pub(crate) fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map(Self::Number),
            serde_json::Value::String(s) => Self::parse_str(s),
            _ => None,
        }
    }

    /// Dedupe key referenced by a relative priority.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Before(key) | Self::After(key) => Some(key),
            _ => None,
        }
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// A normalised attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Text(String),
    /// Boolean attribute that is present (`<script async>`).
    Flag,
}

impl AttrValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Flag => "",
        }
    }
}

/// Attribute map, sorted by name so hashing and rendering are stable.
pub type Props = BTreeMap<CompactString, AttrValue>;

/// Registration order of a tag: owning entry id, then position within the
/// entry's normalised output. The final tie-break of every ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagSequence {
    pub entry: u64,
    pub index: u32,
}

// ============================================================================
// Head Tag
// ============================================================================

/// One elemental output unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadTag {
    pub kind: TagKind,
    pub props: Props,
    pub text_content: Option<String>,
    pub inner_html: Option<String>,
    pub priority: Option<TagPriority>,
    pub position: TagPosition,
    /// Identity under which tags collapse; `None` for tags that never collapse.
    pub dedupe_key: Option<CompactString>,
    pub merge_strategy: MergeStrategy,
    pub sequence: TagSequence,
    pub hash: ContentHash,
    /// Run template params over JSON script bodies.
    pub process_template_params: bool,
    /// Tag came from an entry restricted to server rendering.
    pub server_only: bool,
    /// A `null` leaf asked for this tag to be removed.
    pub(crate) tombstone: bool,
    /// Attributes a `null` value cleared on `htmlAttrs` / `bodyAttrs`.
    pub(crate) removed: SmallVec<[CompactString; 2]>,
}

impl HeadTag {
    pub fn new(kind: TagKind) -> Self {
        Self {
            kind,
            props: Props::new(),
            text_content: None,
            inner_html: None,
            priority: None,
            position: TagPosition::Head,
            dedupe_key: None,
            merge_strategy: MergeStrategy::Replace,
            sequence: TagSequence { entry: 0, index: 0 },
            hash: ContentHash::default(),
            process_template_params: false,
            server_only: false,
            tombstone: false,
            removed: SmallVec::new(),
        }
    }

    /// Text value of an attribute (`""` for boolean attributes).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(AttrValue::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.props.insert(name.into(), AttrValue::Text(value.into()));
    }

    /// Body text, whichever of `textContent` / `innerHTML` is set.
    pub fn content(&self) -> Option<&str> {
        self.text_content
            .as_deref()
            .or(self.inner_html.as_deref())
    }

    /// Identity used for client render bookkeeping.
    pub fn render_key(&self) -> CompactString {
        match &self.dedupe_key {
            Some(key) => key.clone(),
            None => format_compact!("{}:{}", self.kind, self.hash),
        }
    }

    /// Recompute [`Self::hash`] after a stage changed the tag's content.
    pub fn rehash(&mut self) {
        self.hash = ContentHash::of_tag(self);
    }

    /// Whether a JSON script body (`application/json`, `application/ld+json`).
    pub fn is_json_script(&self) -> bool {
        self.kind == TagKind::Script
            && self
                .attr("type")
                .is_some_and(|t| t == "application/json" || t == "application/ld+json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse() {
        assert_eq!(TagPriority::parse_str("critical"), Some(TagPriority::Critical));
        assert_eq!(TagPriority::parse_str("12"), Some(TagPriority::Number(12)));
        assert_eq!(TagPriority::parse_str("-3"), Some(TagPriority::Number(-3)));
        assert_eq!(
            TagPriority::parse_str("before:meta:description"),
            Some(TagPriority::Before("meta:description".into()))
        );
        assert_eq!(
            TagPriority::parse_str("after:title"),
            Some(TagPriority::After("title".into()))
        );
        assert_eq!(TagPriority::parse_str("before:"), None);
        assert_eq!(TagPriority::parse_str("soon"), None);
    }

    #[test]
    fn test_priority_from_json_float() {
        let value = serde_json::json!(2.6);
        assert_eq!(TagPriority::from_json(&value), Some(TagPriority::Number(3)));
        assert_eq!(TagPriority::from_json(&serde_json::json!(true)), None);
    }

    #[test]
    fn test_kind_roundtrip_keys() {
        for kind in [
            TagKind::Title,
            TagKind::Base,
            TagKind::Meta,
            TagKind::Link,
            TagKind::Script,
            TagKind::Style,
            TagKind::Noscript,
            TagKind::HtmlAttrs,
            TagKind::BodyAttrs,
        ] {
            assert_eq!(TagKind::from_key(kind.as_str()), Some(kind));
        }
        assert_eq!(TagKind::from_key("templateParams"), None);
    }

    #[test]
    fn test_render_key_falls_back_to_hash() {
        let mut tag = HeadTag::new(TagKind::Script);
        tag.set_attr("src", "/a.js");
        tag.rehash();
        assert_eq!(tag.render_key(), format!("script:{}", tag.hash));

        tag.dedupe_key = Some("script:key:analytics".into());
        assert_eq!(tag.render_key(), "script:key:analytics");
    }

    #[test]
    fn test_json_script_detection() {
        let mut tag = HeadTag::new(TagKind::Script);
        assert!(!tag.is_json_script());
        tag.set_attr("type", "application/ld+json");
        assert!(tag.is_json_script());
    }
}
