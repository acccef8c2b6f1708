//! The engine handle.
//!
//! A [`Head`] is a cheap, cloneable handle that adapters pass around
//! explicitly. It owns the entry store, the hook registry, and the
//! configuration; every resolution pass takes a snapshot of the store and
//! runs the pipeline in [`crate::resolve`] without holding any lock.
//!
//! # Locking
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Head (Arc)                                           │
//! │   store:  Mutex<EntryStore>   push / patch / dispose │
//! │   hooks:  RwLock<Hooks>       use_plugin / on        │
//! │   config: ArcSwap<HeadConfig> set_config (lock-free) │
//! │   changed: Notify             wakes the auto-render  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Locks are only held for the snapshot, never across an `.await`.

use crate::config::HeadConfig;
use crate::entry::{EntryOptions, EntryStore, HeadInput, RenderTarget};
use crate::hooks::{HeadPlugin, HookContext, Hooks};
use crate::resolve::{Pending, ResolvedHead, poll_once, resolve_entries};
use crate::tag::HeadTag;
use crate::{log, logger};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::{cell::RefCell, fmt, sync::Arc};
use tokio::sync::Notify;

// ============================================================================
// Engine Handle
// ============================================================================

/// Shared handle to one document head.
#[derive(Clone)]
pub struct Head {
    inner: Arc<HeadInner>,
}

struct HeadInner {
    store: Mutex<EntryStore>,
    hooks: RwLock<Hooks>,
    config: ArcSwap<HeadConfig>,
    changed: Notify,
    target: RenderTarget,
}

impl Head {
    pub fn new(target: RenderTarget) -> Self {
        Self::with_config(target, HeadConfig::default())
    }

    /// A head for server rendering.
    pub fn server() -> Self {
        Self::new(RenderTarget::Server)
    }

    /// A head for client rendering.
    pub fn client() -> Self {
        Self::new(RenderTarget::Client)
    }

    pub fn with_config(target: RenderTarget, config: HeadConfig) -> Self {
        if config.log {
            logger::set_enabled(true);
        }
        Self {
            inner: Arc::new(HeadInner {
                store: Mutex::new(EntryStore::new()),
                hooks: RwLock::new(Hooks::new()),
                config: ArcSwap::from_pointee(config),
                changed: Notify::new(),
                target,
            }),
        }
    }

    pub fn target(&self) -> RenderTarget {
        self.inner.target
    }

    // ------------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------------

    /// Register an entry.
    pub fn push(&self, input: HeadInput, options: EntryOptions) -> EntryHandle {
        let id = self.inner.store.lock().push(input, options);
        self.notify();
        EntryHandle {
            head: self.clone(),
            id,
        }
    }

    /// Force the next pass to re-normalise even though no entry changed.
    pub fn invalidate(&self) {
        self.inner.store.lock().invalidate();
        self.notify();
    }

    pub fn entry_count(&self) -> usize {
        self.inner.store.lock().len()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.store.lock().is_dirty()
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, EntryStore> {
        self.inner.store.lock()
    }

    /// Wait until the store is mutated. Mutations made while nobody waits
    /// are remembered, so one wake-up covers a whole burst.
    pub(crate) async fn changed(&self) {
        self.inner.changed.notified().await;
    }

    fn notify(&self) {
        self.inner.changed.notify_one();
    }

    // ------------------------------------------------------------------------
    // Config & Hooks
    // ------------------------------------------------------------------------

    /// Current configuration.
    pub fn config(&self) -> Arc<HeadConfig> {
        self.inner.config.load_full()
    }

    /// Replace the configuration atomically and invalidate.
    pub fn set_config(&self, config: HeadConfig) {
        if config.log {
            logger::set_enabled(true);
        }
        self.inner.config.store(Arc::new(config));
        self.invalidate();
    }

    /// Register a single hook handler.
    pub fn hook<C, F>(&self, name: &str, handler: F)
    where
        C: HookContext,
        F: Fn(&mut C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.hooks.write().on::<C, F>(name, handler);
        self.invalidate();
    }

    /// Install a plugin's handlers.
    pub fn use_plugin(&self, plugin: impl HeadPlugin) {
        log!("head"; "plugin `{}` installed", plugin.name());
        plugin.install(&mut self.inner.hooks.write());
        self.invalidate();
    }

    /// Copy of the hook registry (handlers are shared, not cloned).
    pub fn hooks(&self) -> Hooks {
        self.inner.hooks.read().clone()
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Resolve the current entries, awaiting every deferred field.
    pub async fn resolve(&self) -> ResolvedHead {
        let entries = self.store().snapshot();
        let hooks = self.hooks();
        let config = self.config();
        resolve_entries(entries, &hooks, &config, self.target(), Pending::Await).await
    }

    /// Final ordered tag list.
    pub async fn resolve_tags(&self) -> Vec<HeadTag> {
        self.resolve().await.tags
    }

    /// Resolve without waiting: entries with unsettled deferred fields are
    /// left out of this pass.
    pub fn resolve_now(&self) -> ResolvedHead {
        let entries = self.store().snapshot();
        let hooks = self.hooks();
        let config = self.config();
        poll_once(resolve_entries(
            entries,
            &hooks,
            &config,
            self.target(),
            Pending::Skip,
        ))
        .unwrap_or_default()
    }
}

impl fmt::Debug for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Head")
            .field("target", &self.inner.target)
            .field("entries", &self.entry_count())
            .finish()
    }
}

// ============================================================================
// Entry Handle
// ============================================================================

/// Returned by [`Head::push`]; the only way to update or remove an entry.
#[derive(Debug, Clone)]
pub struct EntryHandle {
    head: Head,
    id: u64,
}

impl EntryHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Replace the entry's input wholesale. Returns `false` once disposed.
    pub fn patch(&self, input: HeadInput) -> bool {
        let patched = self.head.store().patch(self.id, input);
        if patched {
            self.head.notify();
        }
        patched
    }

    /// Remove the entry. Disposing twice is a no-op.
    pub fn dispose(&self) -> bool {
        let disposed = self.head.store().dispose(self.id);
        if disposed {
            self.head.notify();
        }
        disposed
    }
}

// ============================================================================
// Active Head
// ============================================================================

thread_local! {
    static ACTIVE: RefCell<Option<Head>> = const { RefCell::new(None) };
}

/// Make `head` the active head of this thread, returning the previous one.
///
/// For framework glue only; the engine never reads it.
pub fn set_active(head: Head) -> Option<Head> {
    ACTIVE.with(|slot| slot.borrow_mut().replace(head))
}

pub fn active() -> Option<Head> {
    ACTIVE.with(|slot| slot.borrow().clone())
}

pub fn clear_active() -> Option<Head> {
    ACTIVE.with(|slot| slot.borrow_mut().take())
}
