//! Registered head entries and their lifecycle.
//!
//! The store is plain data behind the engine's lock: it never validates or
//! normalises input. Every mutation marks it dirty; resolution is pulled by
//! a renderer, never triggered from here.
//!
//! ```text
//! push ──► [entry id=n] ──patch──► [entry id=n, new input]
//!                 │
//!              dispose ──► side effects ──► pending releases ──► reconciler
//! ```

use super::input::{HeadInput, ResolvedInput};
use crate::tag::TagPriority;
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use std::{fmt, sync::Arc};

/// Which render target consumes an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EntryMode {
    #[default]
    All,
    Server,
    Client,
}

impl EntryMode {
    /// Whether an entry with this mode contributes to `target`.
    pub const fn includes(self, target: RenderTarget) -> bool {
        match (self, target) {
            (Self::All, _) => true,
            (Self::Server, RenderTarget::Server) | (Self::Client, RenderTarget::Client) => true,
            _ => false,
        }
    }
}

/// The renderer a head instance resolves for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Server,
    Client,
}

/// Rewrites one entry's resolved input before normalisation.
pub type InputTransform = Arc<dyn Fn(ResolvedInput) -> ResolvedInput + Send + Sync>;

/// Options given to `push`.
#[derive(Clone, Default)]
pub struct EntryOptions {
    pub mode: EntryMode,
    pub transform: Option<InputTransform>,
    /// Default `tagPriority` for every tag of the entry.
    pub tag_priority: Option<TagPriority>,
}

impl EntryOptions {
    pub fn server() -> Self {
        Self {
            mode: EntryMode::Server,
            ..Self::default()
        }
    }

    pub fn client() -> Self {
        Self {
            mode: EntryMode::Client,
            ..Self::default()
        }
    }

    /// Only whitelisted, non-executable input survives.
    pub fn safe() -> Self {
        Self::default().with_transform(crate::plugins::safe::whitelist_safe_input)
    }

    pub fn with_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(ResolvedInput) -> ResolvedInput + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    pub fn with_priority(mut self, priority: TagPriority) -> Self {
        self.tag_priority = Some(priority);
        self
    }
}

impl fmt::Debug for EntryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryOptions")
            .field("mode", &self.mode)
            .field("transform", &self.transform.is_some())
            .field("tag_priority", &self.tag_priority)
            .finish()
    }
}

/// What has to be undone in the live document for one rendered tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// A created element must be removed.
    Element,
    /// Attributes were set on `<html>` / `<body>` and must be cleared.
    Attributes,
}

/// One contributor's input plus bookkeeping.
#[derive(Debug, Clone)]
pub struct HeadEntry {
    pub id: u64,
    pub input: HeadInput,
    pub options: EntryOptions,
    /// Render key → effect, filled once the entry's tags reach the document.
    pub side_effects: FxHashMap<CompactString, SideEffect>,
}

/// A side effect waiting to be released by the next reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelease {
    pub entry: u64,
    pub key: CompactString,
    pub effect: SideEffect,
}

/// Immutable view of an entry taken at the start of a resolution pass.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub id: u64,
    pub input: HeadInput,
    pub options: EntryOptions,
}

/// Holds the live entries in registration order.
///
/// Ids only grow, so `entries` stays sorted by id.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: Vec<HeadEntry>,
    next_id: u64,
    dirty: bool,
    pending_releases: Vec<PendingRelease>,
    /// Render key → id of the entry whose side effects hold it.
    owners: FxHashMap<CompactString, u64>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry and return its id.
    pub fn push(&mut self, input: HeadInput, options: EntryOptions) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(HeadEntry {
            id,
            input,
            options,
            side_effects: FxHashMap::default(),
        });
        self.dirty = true;
        id
    }

    /// Replace an entry's input. Returns `false` for unknown ids.
    pub fn patch(&mut self, id: u64, input: HeadInput) -> bool {
        match self.get_mut(id) {
            Some(entry) => {
                entry.input = input;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Remove an entry, queueing its recorded side effects.
    ///
    /// Disposing an unknown or already-disposed id is a no-op.
    pub fn dispose(&mut self, id: u64) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let entry = self.entries.remove(pos);
        for key in entry.side_effects.keys() {
            self.owners.remove(key);
        }
        let mut released: Vec<_> = entry
            .side_effects
            .into_iter()
            .map(|(key, effect)| PendingRelease {
                entry: id,
                key,
                effect,
            })
            .collect();
        released.sort_by(|a, b| a.key.cmp(&b.key));
        self.pending_releases.extend(released);
        self.dirty = true;
        true
    }

    /// Force the next pass to re-normalise everything.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&HeadEntry> {
        self.position(id).map(|pos| &self.entries[pos])
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut HeadEntry> {
        self.position(id).map(|pos| &mut self.entries[pos])
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.entries.binary_search_by_key(&id, |e| e.id).ok()
    }

    /// Copy of the current entries, in registration order.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries
            .iter()
            .map(|e| EntrySnapshot {
                id: e.id,
                input: e.input.clone(),
                options: e.options.clone(),
            })
            .collect()
    }

    /// Attach a side effect to the entry that owns a rendered tag.
    ///
    /// Ownership moves: any other entry holding the same key drops it.
    /// Returns `false` if the entry is gone (disposed mid-pass).
    pub fn record_side_effect(&mut self, id: u64, key: &str, effect: SideEffect) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        if let Some(previous) = self.owners.insert(key.into(), id)
            && previous != id
            && let Some(entry) = self.get_mut(previous)
        {
            entry.side_effects.remove(key);
        }
        self.entries[pos].side_effects.insert(key.into(), effect);
        true
    }

    /// Forget a side effect after the reconciler released it.
    pub fn forget_side_effect(&mut self, key: &str) {
        if let Some(owner) = self.owners.remove(key)
            && let Some(entry) = self.get_mut(owner)
        {
            entry.side_effects.remove(key);
        }
    }

    /// The entry currently holding `key`.
    pub fn owner(&self, key: &str) -> Option<u64> {
        self.owners.get(key).copied()
    }

    pub fn take_pending_releases(&mut self) -> Vec<PendingRelease> {
        std::mem::take(&mut self.pending_releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_monotonic_ids() {
        let mut store = EntryStore::new();
        let a = store.push(HeadInput::new(), EntryOptions::default());
        let b = store.push(HeadInput::new(), EntryOptions::default());
        assert!(b > a);
        assert_eq!(store.len(), 2);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_ids_not_reused_after_dispose() {
        let mut store = EntryStore::new();
        let a = store.push(HeadInput::new(), EntryOptions::default());
        store.dispose(a);
        let b = store.push(HeadInput::new(), EntryOptions::default());
        assert_ne!(a, b);
    }

    #[test]
    fn test_patch_replaces_input() {
        let mut store = EntryStore::new();
        let id = store.push(HeadInput::new().title("A"), EntryOptions::default());
        store.take_dirty();

        assert!(store.patch(id, HeadInput::new()));
        assert!(store.get(id).unwrap().input.is_empty());
        assert!(store.is_dirty());
        assert!(!store.patch(id + 100, HeadInput::new()));
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let mut store = EntryStore::new();
        let id = store.push(HeadInput::new(), EntryOptions::default());
        assert!(store.dispose(id));
        store.take_dirty();
        assert!(!store.dispose(id));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_dispose_without_side_effects_queues_nothing() {
        let mut store = EntryStore::new();
        let id = store.push(HeadInput::new(), EntryOptions::default());
        store.dispose(id);
        assert!(store.take_pending_releases().is_empty());
    }

    #[test]
    fn test_dispose_queues_side_effects() {
        let mut store = EntryStore::new();
        let id = store.push(HeadInput::new(), EntryOptions::default());
        store.record_side_effect(id, "title", SideEffect::Element);
        store.record_side_effect(id, "htmlAttrs", SideEffect::Attributes);
        store.dispose(id);

        let released = store.take_pending_releases();
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].key, "htmlAttrs");
        assert_eq!(released[1].effect, SideEffect::Element);
        assert!(store.take_pending_releases().is_empty());
    }

    #[test]
    fn test_side_effect_ownership_moves() {
        let mut store = EntryStore::new();
        let a = store.push(HeadInput::new(), EntryOptions::default());
        let b = store.push(HeadInput::new(), EntryOptions::default());
        store.record_side_effect(a, "title", SideEffect::Element);
        store.record_side_effect(b, "title", SideEffect::Element);

        assert!(store.get(a).unwrap().side_effects.is_empty());
        store.dispose(a);
        assert!(store.take_pending_releases().is_empty());
    }

    #[test]
    fn test_owner_follows_record_forget_and_dispose() {
        let mut store = EntryStore::new();
        let a = store.push(HeadInput::new(), EntryOptions::default());
        let b = store.push(HeadInput::new(), EntryOptions::default());
        store.record_side_effect(a, "title", SideEffect::Element);
        store.record_side_effect(a, "meta:description", SideEffect::Element);
        store.record_side_effect(b, "title", SideEffect::Element);
        assert_eq!(store.owner("title"), Some(b));

        store.forget_side_effect("title");
        assert_eq!(store.owner("title"), None);
        assert!(store.get(b).unwrap().side_effects.is_empty());

        store.dispose(a);
        assert_eq!(store.owner("meta:description"), None);
        assert!(!store.record_side_effect(a, "title", SideEffect::Element));
        assert_eq!(store.owner("title"), None);
    }

    #[test]
    fn test_invalidate_marks_dirty() {
        let mut store = EntryStore::new();
        assert!(!store.take_dirty());
        store.invalidate();
        assert!(store.take_dirty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_mode_includes() {
        assert!(EntryMode::All.includes(RenderTarget::Client));
        assert!(EntryMode::Server.includes(RenderTarget::Server));
        assert!(!EntryMode::Server.includes(RenderTarget::Client));
        assert!(!EntryMode::Client.includes(RenderTarget::Server));
    }
}
