//! The resolution pipeline.
//!
//! ```text
//! entries ─► resolve deferred ─► transform ─► normalise ─► dedupe ─► sort ─► template
//!    │                                            │           │                 │
//!  entries:resolve                        tag:normalise  tags:beforeResolve  tags:resolve
//! ```
//!
//! A pass is a pure function of an entry snapshot plus config and hooks;
//! nothing carries over from one pass to the next.

pub mod dedupe;
pub mod sort;
pub mod template;

pub use dedupe::{dedupe_tags, is_meaningful, merge_tags};
pub use sort::{implicit_weight, sort_tags};
pub use template::{Substitutor, apply_templates, merge_params};

use crate::config::HeadConfig;
use crate::entry::{EntrySnapshot, RenderTarget};
use crate::error::HeadError;
use crate::hooks::{
    EntriesResolveContext, Hooks, TagNormaliseContext, TagsBeforeResolveContext,
    TagsResolveContext,
};
use crate::log;
use crate::tag::{ContentHash, HeadTag, TagKind, TitleTemplate, normalise_entry};
use serde_json::{Map, Value};
use std::{
    pin::pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

/// Output of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct ResolvedHead {
    /// Final tags, ordered by position bucket then priority.
    pub tags: Vec<HeadTag>,
    /// Title before templating, as the winning title tag carried it.
    pub title: Option<String>,
    /// Most recently registered `titleTemplate`.
    pub title_template: Option<TitleTemplate>,
    /// All entries' `templateParams`, merged in registration order.
    pub template_params: Map<String, Value>,
    /// Hook handlers that failed during the pass, already logged and
    /// rolled back.
    pub hook_errors: Vec<Arc<HeadError>>,
}

impl ResolvedHead {
    /// Fingerprint of every tag a client would also render.
    pub fn hydration_hash(&self) -> ContentHash {
        tag_set_hash(&self.tags)
    }
}

/// Ordered hash of the non-server tags of a resolved list.
pub fn tag_set_hash(tags: &[HeadTag]) -> ContentHash {
    ContentHash::of_set(tags.iter().filter(|t| !t.server_only).map(|t| &t.hash))
}

/// What a pass does with an entry whose deferred fields have not settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    /// Suspend until every field settles.
    Await,
    /// Leave the entry out of this pass.
    Skip,
}

/// Poll a future once with a no-op waker.
pub(crate) fn poll_once<F: Future>(fut: F) -> Option<F::Output> {
    let mut fut = pin!(fut);
    match fut.as_mut().poll(&mut Context::from_waker(Waker::noop())) {
        Poll::Ready(output) => Some(output),
        Poll::Pending => None,
    }
}

/// Run one full resolution pass for `target`.
///
/// Only awaiting deferred fields can suspend, and only with
/// [`Pending::Await`]. A rejected field drops that entry's contribution and
/// nothing else.
pub async fn resolve_entries(
    entries: Vec<EntrySnapshot>,
    hooks: &Hooks,
    config: &HeadConfig,
    target: RenderTarget,
    pending: Pending,
) -> ResolvedHead {
    let entries = entries
        .into_iter()
        .filter(|entry| entry.options.mode.includes(target))
        .collect();
    let mut hook_errors = Vec::new();
    let mut ctx = EntriesResolveContext { entries };
    hook_errors.extend(hooks.call(&mut ctx));

    let mut tags = Vec::new();
    let mut title_template = None;
    let mut template_params = Map::new();

    for entry in &ctx.entries {
        let resolved = match pending {
            Pending::Await => entry.input.resolve().await,
            Pending::Skip => match poll_once(entry.input.resolve()) {
                Some(resolved) => resolved,
                None => {
                    log!("resolve"; "entry {} still pending, skipped", entry.id);
                    continue;
                }
            },
        };
        let input = match resolved {
            Ok(input) => input,
            Err(reason) => {
                let err = HeadError::DeferredRejected {
                    entry: entry.id,
                    reason,
                };
                log!("resolve"; "{err}");
                continue;
            }
        };
        let input = match &entry.options.transform {
            Some(transform) => transform(input),
            None => input,
        };

        let normalised = normalise_entry(entry, &input);
        if normalised.title_template.is_some() {
            title_template = normalised.title_template;
        }
        if let Some(params) = &normalised.template_params {
            merge_params(&mut template_params, params);
        }

        let mut ctx = TagNormaliseContext {
            entry: entry.id,
            tags: normalised.tags,
        };
        hook_errors.extend(hooks.call(&mut ctx));
        tags.extend(ctx.tags);
    }

    let mut ctx = TagsBeforeResolveContext { tags };
    hook_errors.extend(hooks.call(&mut ctx));

    let tags = sort_tags(dedupe_tags(ctx.tags), &config.priority);
    let title = tags
        .iter()
        .find(|tag| tag.kind == TagKind::Title)
        .and_then(|tag| tag.text_content.clone());

    let subst = Substitutor::new(&template_params, &config.template.separator);
    let tags = apply_templates(tags, title_template.as_ref(), &subst);

    let mut ctx = TagsResolveContext { tags };
    hook_errors.extend(hooks.call(&mut ctx));
    let mut tags = ctx.tags;
    for tag in &mut tags {
        tag.rehash();
    }

    ResolvedHead {
        tags,
        title,
        title_template,
        template_params,
        hook_errors: hook_errors.into_iter().map(Arc::new).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryOptions, EntryStore, HeadInput, InputValue};
    use serde_json::json;

    fn store(inputs: Vec<(Value, EntryOptions)>) -> EntryStore {
        let mut store = EntryStore::new();
        for (input, options) in inputs {
            store.push(HeadInput::from_json(input), options);
        }
        store
    }

    async fn resolve(store: &EntryStore, hooks: &Hooks, target: RenderTarget) -> ResolvedHead {
        resolve_entries(
            store.snapshot(),
            hooks,
            &HeadConfig::default(),
            target,
            Pending::Await,
        )
        .await
    }

    #[tokio::test]
    async fn test_full_pass() {
        let store = store(vec![
            (
                json!({
                    "title": "Home",
                    "titleTemplate": "%s %separator %siteName",
                    "templateParams": {"siteName": "Tola"},
                    "meta": [{"name": "description", "content": "About %siteName"}],
                }),
                EntryOptions::default(),
            ),
            (json!({"meta": [{"charset": "utf-8"}]}), EntryOptions::default()),
        ]);
        let head = resolve(&store, &Hooks::new(), RenderTarget::Server).await;
        let keys: Vec<_> = head.tags.iter().map(|t| t.render_key().to_string()).collect();
        assert_eq!(keys, vec!["charset", "title", "meta:description"]);
        assert_eq!(head.tags[1].text_content.as_deref(), Some("Home | Tola"));
        assert_eq!(head.tags[2].attr("content"), Some("About Tola"));
        assert_eq!(head.title.as_deref(), Some("Home"));
    }

    #[tokio::test]
    async fn test_mode_filter() {
        let store = store(vec![
            (json!({"meta": [{"name": "a", "content": "s"}]}), EntryOptions::server()),
            (json!({"meta": [{"name": "b", "content": "c"}]}), EntryOptions::client()),
        ]);
        let server = resolve(&store, &Hooks::new(), RenderTarget::Server).await;
        assert_eq!(server.tags.len(), 1);
        assert!(server.tags[0].server_only);
        let client = resolve(&store, &Hooks::new(), RenderTarget::Client).await;
        assert_eq!(client.tags[0].attr("name"), Some("b"));
    }

    #[tokio::test]
    async fn test_rejected_entry_is_scoped() {
        let mut store = EntryStore::new();
        store.push(
            HeadInput::new().title(InputValue::future(async {
                Err::<InputValue, _>("offline".to_string())
            })),
            EntryOptions::default(),
        );
        store.push(HeadInput::new().title("Fallback"), EntryOptions::default());
        let head = resolve(&store, &Hooks::new(), RenderTarget::Server).await;
        assert_eq!(head.tags.len(), 1);
        assert_eq!(head.tags[0].text_content.as_deref(), Some("Fallback"));
    }

    #[tokio::test]
    async fn test_transform_applies_to_own_entry() {
        let store = store(vec![
            (
                json!({"title": "A"}),
                EntryOptions::default().with_transform(|input| {
                    input.into_iter().filter(|(k, _)| k != "title").collect()
                }),
            ),
            (json!({"meta": [{"name": "x", "content": "y"}]}), EntryOptions::default()),
        ]);
        let head = resolve(&store, &Hooks::new(), RenderTarget::Server).await;
        assert_eq!(head.tags.len(), 1);
        assert_eq!(head.tags[0].kind, TagKind::Meta);
    }

    #[tokio::test]
    async fn test_hooks_see_each_stage() {
        let mut hooks = Hooks::new();
        hooks
            .on::<EntriesResolveContext, _>("drop-last", |ctx| {
                ctx.entries.pop();
                Ok(())
            })
            .on::<TagsResolveContext, _>("upper", |ctx| {
                for tag in &mut ctx.tags {
                    if let Some(text) = &mut tag.text_content {
                        *text = text.to_uppercase();
                    }
                }
                Ok(())
            });
        let store = store(vec![
            (json!({"title": "first"}), EntryOptions::default()),
            (json!({"title": "second"}), EntryOptions::default()),
        ]);
        let head = resolve(&store, &hooks, RenderTarget::Server).await;
        assert_eq!(head.tags[0].text_content.as_deref(), Some("FIRST"));
        let mut expected = head.tags[0].clone();
        expected.rehash();
        assert_eq!(head.tags[0].hash, expected.hash);
    }

    #[tokio::test]
    async fn test_hook_errors_reported() {
        let mut hooks = Hooks::new();
        hooks.on::<TagsResolveContext, _>("broken", |ctx| {
            ctx.tags.clear();
            anyhow::bail!("nope")
        });
        let store = store(vec![(json!({"title": "kept"}), EntryOptions::default())]);
        let head = resolve(&store, &hooks, RenderTarget::Server).await;
        assert_eq!(head.tags.len(), 1);
        assert_eq!(head.hook_errors.len(), 1);
        assert!(head.hook_errors[0].to_string().contains("broken"));
    }

    #[test]
    fn test_skip_pending_entries() {
        let (_tx, deferred) = crate::entry::Deferred::channel();
        let mut store = EntryStore::new();
        store.push(HeadInput::new().title(deferred), EntryOptions::default());
        store.push(
            HeadInput::from_json(json!({"meta": [{"name": "a", "content": "b"}]})),
            EntryOptions::default(),
        );
        let head = poll_once(resolve_entries(
            store.snapshot(),
            &Hooks::new(),
            &HeadConfig::default(),
            RenderTarget::Server,
            Pending::Skip,
        ))
        .unwrap();
        assert_eq!(head.tags.len(), 1);
        assert_eq!(head.tags[0].kind, TagKind::Meta);
    }

    #[tokio::test]
    async fn test_hydration_hash_skips_server_tags() {
        let shared = json!({"meta": [{"name": "a", "content": "b"}]});
        let with_server = store(vec![
            (shared.clone(), EntryOptions::default()),
            (json!({"meta": [{"name": "s", "content": "x"}]}), EntryOptions::server()),
        ]);
        let without = store(vec![(shared, EntryOptions::default())]);
        let a = resolve(&with_server, &Hooks::new(), RenderTarget::Server).await;
        let b = resolve(&without, &Hooks::new(), RenderTarget::Client).await;
        assert_eq!(a.hydration_hash(), b.hydration_hash());
    }
}
