//! Hook pipeline.
//!
//! A fixed set of extension points, each with its own context type. Handlers
//! run in registration order and may rewrite the context in place; a handler
//! that fails is logged and its partial mutation is rolled back, so the next
//! handler (and the next stage) sees the pre-hook context.
//!
//! | Point                | Context                     | Runs                          |
//! |----------------------|-----------------------------|-------------------------------|
//! | `entries:resolve`    | [`EntriesResolveContext`]   | before any entry is resolved  |
//! | `tag:normalise`      | [`TagNormaliseContext`]     | once per entry, after normalise |
//! | `tags:beforeResolve` | [`TagsBeforeResolveContext`]| before dedupe                 |
//! | `tags:resolve`       | [`TagsResolveContext`]      | after templating              |
//! | `dom:beforeRender`   | [`DomRenderContext`]        | before a client render pass   |
//! | `ssr:render`         | [`SsrRenderContext`]        | after server HTML is built    |

use crate::entry::EntrySnapshot;
use crate::error::HeadError;
use crate::log;
use crate::ssr::SsrHead;
use crate::tag::HeadTag;
use compact_str::CompactString;
use std::{fmt, sync::Arc};

// ============================================================================
// Extension Points
// ============================================================================

/// A named extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    EntriesResolve,
    TagNormalise,
    TagsBeforeResolve,
    TagsResolve,
    DomBeforeRender,
    SsrRender,
}

impl HookPoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntriesResolve => "entries:resolve",
            Self::TagNormalise => "tag:normalise",
            Self::TagsBeforeResolve => "tags:beforeResolve",
            Self::TagsResolve => "tags:resolve",
            Self::DomBeforeRender => "dom:beforeRender",
            Self::SsrRender => "ssr:render",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Contexts
// ============================================================================

/// Entries about to be resolved; handlers may drop or rewrite them.
#[derive(Debug, Clone)]
pub struct EntriesResolveContext {
    pub entries: Vec<EntrySnapshot>,
}

/// Tags one entry normalised to.
#[derive(Debug, Clone)]
pub struct TagNormaliseContext {
    pub entry: u64,
    pub tags: Vec<HeadTag>,
}

/// All normalised tags, before dedupe.
#[derive(Debug, Clone)]
pub struct TagsBeforeResolveContext {
    pub tags: Vec<HeadTag>,
}

/// Final ordered tags.
#[derive(Debug, Clone)]
pub struct TagsResolveContext {
    pub tags: Vec<HeadTag>,
}

/// Tags a client render pass is about to apply. Setting `skip` vetoes
/// the pass.
#[derive(Debug, Clone)]
pub struct DomRenderContext {
    pub tags: Vec<HeadTag>,
    pub skip: bool,
}

/// Rendered server fragments.
#[derive(Debug, Clone)]
pub struct SsrRenderContext {
    pub head: SsrHead,
}

/// A context type bound to its extension point.
pub trait HookContext: Clone + Sized {
    const POINT: HookPoint;

    fn handlers(hooks: &Hooks) -> &[NamedHandler<Self>];
    fn handlers_mut(hooks: &mut Hooks) -> &mut Vec<NamedHandler<Self>>;
}

macro_rules! hook_context {
    ($($ctx:ty => $point:ident, $field:ident;)*) => {
        $(
            impl HookContext for $ctx {
                const POINT: HookPoint = HookPoint::$point;

                fn handlers(hooks: &Hooks) -> &[NamedHandler<Self>] {
                    &hooks.$field
                }

                fn handlers_mut(hooks: &mut Hooks) -> &mut Vec<NamedHandler<Self>> {
                    &mut hooks.$field
                }
            }
        )*
    };
}

hook_context! {
    EntriesResolveContext => EntriesResolve, entries_resolve;
    TagNormaliseContext => TagNormalise, tag_normalise;
    TagsBeforeResolveContext => TagsBeforeResolve, tags_before_resolve;
    TagsResolveContext => TagsResolve, tags_resolve;
    DomRenderContext => DomBeforeRender, dom_before_render;
    SsrRenderContext => SsrRender, ssr_render;
}

// ============================================================================
// Registry
// ============================================================================

pub type Handler<C> = Arc<dyn Fn(&mut C) -> anyhow::Result<()> + Send + Sync>;

/// A handler plus the name it is reported under.
pub struct NamedHandler<C> {
    pub name: CompactString,
    handler: Handler<C>,
}

impl<C> Clone for NamedHandler<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Ordered handler lists, one per extension point.
#[derive(Clone, Default)]
pub struct Hooks {
    entries_resolve: Vec<NamedHandler<EntriesResolveContext>>,
    tag_normalise: Vec<NamedHandler<TagNormaliseContext>>,
    tags_before_resolve: Vec<NamedHandler<TagsBeforeResolveContext>>,
    tags_resolve: Vec<NamedHandler<TagsResolveContext>>,
    dom_before_render: Vec<NamedHandler<DomRenderContext>>,
    ssr_render: Vec<NamedHandler<SsrRenderContext>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for the extension point of context `C`.
    pub fn on<C, F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        C: HookContext,
        F: Fn(&mut C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        C::handlers_mut(self).push(NamedHandler {
            name: name.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Number of handlers registered for `C`.
    pub fn count<C: HookContext>(&self) -> usize {
        C::handlers(self).len()
    }

    /// Run every handler for `C` in order.
    ///
    /// A failing handler leaves the context as it was before that handler
    /// ran. The failures are returned after being logged.
    pub fn call<C: HookContext>(&self, ctx: &mut C) -> Vec<HeadError> {
        let mut failures = Vec::new();
        for hook in C::handlers(self) {
            let before = ctx.clone();
            if let Err(source) = (hook.handler)(ctx) {
                log!("hook"; "`{}` failed at `{}`: {source:#}", hook.name, C::POINT);
                *ctx = before;
                failures.push(HeadError::Hook {
                    point: C::POINT,
                    handler: hook.name.to_string(),
                    source,
                });
            }
        }
        failures
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("entries_resolve", &self.entries_resolve.len())
            .field("tag_normalise", &self.tag_normalise.len())
            .field("tags_before_resolve", &self.tags_before_resolve.len())
            .field("tags_resolve", &self.tags_resolve.len())
            .field("dom_before_render", &self.dom_before_render.len())
            .field("ssr_render", &self.ssr_render.len())
            .finish()
    }
}

/// A bundle of hook handlers installed together.
pub trait HeadPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn install(&self, hooks: &mut Hooks);
}
