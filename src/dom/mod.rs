//! Client rendering.
//!
//! The engine never touches a real document. Everything that does goes
//! through [`DomBackend`]; the [`Reconciler`] decides which calls to make,
//! and [`ClientHead`] decides when.
//!
//! ```text
//! Head ──resolve──► tags ──dom:beforeRender──► Reconciler ──► DomBackend
//!                                                  │
//!                                           RenderRecord per key
//! ```

mod client;
mod memory;
mod reconcile;

pub use client::{AutoRender, ClientHead};
pub use memory::{MemoryDom, MemoryElement};
pub use reconcile::{Reconciler, RenderSummary};

use crate::entry::SideEffect;
use crate::tag::{AttrValue, ContentHash, HeadTag, Props, TagKind, TagPosition};

/// Opaque handle to a live element, issued by the backend.
pub type ElementId = u64;

/// Root elements that attribute tags apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    Html,
    Body,
}

impl Root {
    pub const fn of(kind: TagKind) -> Option<Self> {
        match kind {
            TagKind::HtmlAttrs => Some(Self::Html),
            TagKind::BodyAttrs => Some(Self::Body),
            _ => None,
        }
    }
}

/// The DOM mutation layer.
///
/// Implementations own real nodes; the reconciler only holds
/// [`ElementId`]s. Every method except the lookups is a document write.
pub trait DomBackend {
    /// Insert a new element for `tag` (attributes and body included) in
    /// its position bucket.
    fn create(&mut self, tag: &HeadTag) -> ElementId;

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &AttrValue);

    fn remove_attribute(&mut self, element: ElementId, name: &str);

    fn set_content(&mut self, element: ElementId, text_content: Option<&str>, inner_html: Option<&str>);

    fn remove(&mut self, element: ElementId);

    fn root(&self, root: Root) -> ElementId;

    /// Claim a server-rendered element with exactly `tag`'s shape.
    fn adopt(&mut self, tag: &HeadTag) -> Option<ElementId>;

    /// Remove server-rendered elements nobody adopted. Returns how many.
    fn discard_unclaimed(&mut self) -> usize;

    /// Text of the payload script with this `id`.
    fn read_payload(&self, id: &str) -> Option<String>;

    /// Tag-set hash the server left on `<html>` under `attribute`.
    fn server_hash(&self, attribute: &str) -> Option<String>;
}

/// What the reconciler remembers about one rendered tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRecord {
    pub element: ElementId,
    pub kind: TagKind,
    pub position: TagPosition,
    pub hash: ContentHash,
    pub props: Props,
    pub text_content: Option<String>,
    pub inner_html: Option<String>,
    /// Entry that owns the side effect.
    pub entry: u64,
    pub effect: SideEffect,
}

impl RenderRecord {
    pub fn new(element: ElementId, tag: &HeadTag) -> Self {
        Self {
            element,
            kind: tag.kind,
            position: tag.position,
            hash: tag.hash.clone(),
            props: tag.props.clone(),
            text_content: tag.text_content.clone(),
            inner_html: tag.inner_html.clone(),
            entry: tag.sequence.entry,
            effect: if tag.kind.is_attrs() {
                SideEffect::Attributes
            } else {
                SideEffect::Element
            },
        }
    }

    /// Undo this record's effect in the document.
    pub fn release(&self, dom: &mut impl DomBackend) {
        match self.effect {
            SideEffect::Element => dom.remove(self.element),
            SideEffect::Attributes => {
                for name in self.props.keys() {
                    dom.remove_attribute(self.element, name);
                }
            }
        }
    }
}
