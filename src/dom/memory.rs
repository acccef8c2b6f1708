//! An in-memory document.

use super::{DomBackend, ElementId, Root};
use crate::config::HeadConfig;
use crate::resolve::ResolvedHead;
use crate::ssr::HeadPayload;
use crate::tag::{AttrValue, HeadTag, Props, TagKind, TagPosition};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

const HTML: ElementId = 0;
const BODY: ElementId = 1;

/// One element of a [`MemoryDom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryElement {
    pub kind: TagKind,
    pub position: TagPosition,
    pub props: Props,
    pub text_content: Option<String>,
    pub inner_html: Option<String>,
    /// Rendered by the server and not yet claimed by the client.
    pub unclaimed: bool,
    /// Came from a server-only entry; never discarded by the client.
    pub server_only: bool,
}

impl MemoryElement {
    fn from_tag(tag: &HeadTag) -> Self {
        Self {
            kind: tag.kind,
            position: tag.position,
            props: tag.props.clone(),
            text_content: tag.text_content.clone(),
            inner_html: tag.inner_html.clone(),
            unclaimed: false,
            server_only: tag.server_only,
        }
    }

    fn matches(&self, tag: &HeadTag) -> bool {
        self.kind == tag.kind
            && self.position == tag.position
            && self.props == tag.props
            && self.text_content == tag.text_content
            && self.inner_html == tag.inner_html
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(AttrValue::as_str)
    }
}

/// A [`DomBackend`] over plain maps that counts every write.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    elements: BTreeMap<ElementId, MemoryElement>,
    html: Props,
    body: Props,
    payloads: FxHashMap<String, String>,
    next_id: ElementId,
    writes: usize,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            html: Props::new(),
            body: Props::new(),
            payloads: FxHashMap::default(),
            next_id: BODY + 1,
            writes: 0,
        }
    }

    /// The document a server render of `resolved` would produce, payload
    /// script and hydration hash included.
    pub fn from_server(resolved: &ResolvedHead, config: &HeadConfig) -> Self {
        let mut dom = Self::new();
        for tag in &resolved.tags {
            match Root::of(tag.kind) {
                Some(Root::Html) => dom.html.extend(tag.props.clone()),
                Some(Root::Body) => dom.body.extend(tag.props.clone()),
                None => {
                    let id = dom.next();
                    let mut element = MemoryElement::from_tag(tag);
                    element.unclaimed = true;
                    dom.elements.insert(id, element);
                }
            }
        }
        if let Some(json) = HeadPayload::from_resolved(resolved).and_then(|p| p.to_json().ok()) {
            dom.set_payload(&config.ssr.payload_id, json);
        }
        dom.html.insert(
            config.ssr.hash_attribute.as_str().into(),
            AttrValue::Text(resolved.hydration_hash().as_str().to_owned()),
        );
        dom
    }

    pub fn set_payload(&mut self, id: &str, json: impl Into<String>) {
        self.payloads.insert(id.to_owned(), json.into());
    }

    /// Writes performed since creation or the last [`Self::reset_writes`].
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn reset_writes(&mut self) {
        self.writes = 0;
    }

    pub fn elements(&self) -> impl Iterator<Item = &MemoryElement> {
        self.elements.values()
    }

    /// Elements of `kind` carrying `name="value"`.
    pub fn find<'a>(
        &'a self,
        kind: TagKind,
        name: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a MemoryElement> + 'a {
        self.elements
            .values()
            .filter(move |e| e.kind == kind && e.attr(name) == Some(value))
    }

    pub fn count(&self, kind: TagKind) -> usize {
        self.elements.values().filter(|e| e.kind == kind).count()
    }

    pub fn title(&self) -> Option<&str> {
        self.elements
            .values()
            .find(|e| e.kind == TagKind::Title)
            .and_then(|e| e.text_content.as_deref())
    }

    pub fn html_attrs(&self) -> &Props {
        &self.html
    }

    pub fn body_attrs(&self) -> &Props {
        &self.body
    }

    fn next(&mut self) -> ElementId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn props_mut(&mut self, element: ElementId) -> Option<&mut Props> {
        match element {
            HTML => Some(&mut self.html),
            BODY => Some(&mut self.body),
            id => self.elements.get_mut(&id).map(|e| &mut e.props),
        }
    }
}

impl DomBackend for MemoryDom {
    fn create(&mut self, tag: &HeadTag) -> ElementId {
        self.writes += 1;
        let id = self.next();
        self.elements.insert(id, MemoryElement::from_tag(tag));
        id
    }

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &AttrValue) {
        self.writes += 1;
        if let Some(props) = self.props_mut(element) {
            props.insert(name.into(), value.clone());
        }
    }

    fn remove_attribute(&mut self, element: ElementId, name: &str) {
        self.writes += 1;
        if let Some(props) = self.props_mut(element) {
            props.remove(name);
        }
    }

    fn set_content(&mut self, element: ElementId, text_content: Option<&str>, inner_html: Option<&str>) {
        self.writes += 1;
        if let Some(e) = self.elements.get_mut(&element) {
            e.text_content = text_content.map(str::to_owned);
            e.inner_html = inner_html.map(str::to_owned);
        }
    }

    fn remove(&mut self, element: ElementId) {
        self.writes += 1;
        self.elements.remove(&element);
    }

    fn root(&self, root: Root) -> ElementId {
        match root {
            Root::Html => HTML,
            Root::Body => BODY,
        }
    }

    fn adopt(&mut self, tag: &HeadTag) -> Option<ElementId> {
        let (id, element) = self
            .elements
            .iter_mut()
            .find(|(_, e)| e.unclaimed && e.matches(tag))?;
        element.unclaimed = false;
        Some(*id)
    }

    fn discard_unclaimed(&mut self) -> usize {
        let before = self.elements.len();
        self.elements.retain(|_, e| !e.unclaimed || e.server_only);
        let removed = before - self.elements.len();
        self.writes += removed;
        removed
    }

    fn read_payload(&self, id: &str) -> Option<String> {
        self.payloads.get(id).cloned()
    }

    fn server_hash(&self, attribute: &str) -> Option<String> {
        self.html.get(attribute).map(|v| v.as_str().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, content: &str) -> HeadTag {
        let mut tag = HeadTag::new(TagKind::Meta);
        tag.set_attr("name", name);
        tag.set_attr("content", content);
        tag.rehash();
        tag
    }

    #[test]
    fn test_writes_are_counted() {
        let mut dom = MemoryDom::new();
        let id = dom.create(&meta("a", "b"));
        dom.set_attribute(id, "content", &AttrValue::Text("c".into()));
        assert_eq!(dom.writes(), 2);
        assert_eq!(dom.find(TagKind::Meta, "name", "a").next().unwrap().attr("content"), Some("c"));
        dom.remove(id);
        assert_eq!(dom.count(TagKind::Meta), 0);
        assert_eq!(dom.writes(), 3);
    }

    #[test]
    fn test_adopt_claims_matching_shape_once() {
        let resolved = ResolvedHead {
            tags: vec![meta("a", "b")],
            ..ResolvedHead::default()
        };
        let mut dom = MemoryDom::from_server(&resolved, &HeadConfig::default());
        assert!(dom.adopt(&meta("a", "other")).is_none());
        assert!(dom.adopt(&meta("a", "b")).is_some());
        assert!(dom.adopt(&meta("a", "b")).is_none());
        assert_eq!(dom.discard_unclaimed(), 0);
        assert_eq!(dom.writes(), 0);
    }

    #[test]
    fn test_discard_keeps_server_only() {
        let mut server = meta("s", "x");
        server.server_only = true;
        let resolved = ResolvedHead {
            tags: vec![meta("a", "b"), server],
            ..ResolvedHead::default()
        };
        let mut dom = MemoryDom::from_server(&resolved, &HeadConfig::default());
        assert_eq!(dom.discard_unclaimed(), 1);
        assert_eq!(dom.count(TagKind::Meta), 1);
    }

    #[test]
    fn test_server_document_carries_hash() {
        let resolved = ResolvedHead {
            tags: vec![meta("a", "b")],
            ..ResolvedHead::default()
        };
        let config = HeadConfig::default();
        let dom = MemoryDom::from_server(&resolved, &config);
        assert_eq!(
            dom.server_hash(&config.ssr.hash_attribute).as_deref(),
            Some(resolved.hydration_hash().as_str())
        );
        assert!(dom.read_payload(&config.ssr.payload_id).is_none());
    }
}
