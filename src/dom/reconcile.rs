//! Diff a resolved tag list against what is already in the document.
//!
//! Per render key:
//!
//! ```text
//! absent ──create/adopt──► rendered ──hash changed──► patched (attributes diffed)
//!                              │
//!                   key gone / entry disposed
//!                              ▼
//!                           removed (side effect released once)
//! ```

use super::{DomBackend, RenderRecord, Root};
use crate::entry::EntryStore;
use crate::log;
use crate::resolve::tag_set_hash;
use crate::tag::HeadTag;
use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub created: usize,
    pub adopted: usize,
    pub patched: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// The server's tag-set hash matched and the diff was skipped.
    pub hydrated: bool,
    /// Hook handlers that failed while resolving or rendering this pass.
    pub hook_failures: usize,
}

/// Owns the render records.
#[derive(Debug, Default)]
pub struct Reconciler {
    records: FxHashMap<CompactString, RenderRecord>,
    first_pass_done: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &str) -> Option<&RenderRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Release side effects of entries disposed since the last pass.
    ///
    /// A record is only released if the disposed entry still owns it.
    pub fn release_disposed(&mut self, dom: &mut impl DomBackend, store: &mut EntryStore) -> usize {
        self.release_pending(dom, store, &FxHashSet::default())
    }

    /// Pending releases for keys in `live` are dropped: another entry
    /// still renders that key, so the diff patches the element instead.
    fn release_pending(
        &mut self,
        dom: &mut impl DomBackend,
        store: &mut EntryStore,
        live: &FxHashSet<CompactString>,
    ) -> usize {
        let mut released = 0;
        for pending in store.take_pending_releases() {
            if live.contains(&pending.key) {
                continue;
            }
            let owned = self
                .records
                .get(&pending.key)
                .is_some_and(|record| record.entry == pending.entry);
            if owned && let Some(record) = self.records.remove(&pending.key) {
                record.release(dom);
                released += 1;
            }
        }
        released
    }

    /// Bring the document in line with `tags`.
    pub fn reconcile(
        &mut self,
        dom: &mut impl DomBackend,
        store: &mut EntryStore,
        tags: &[HeadTag],
        hash_attribute: &str,
    ) -> RenderSummary {
        let keys: Vec<CompactString> = tags.iter().map(HeadTag::render_key).collect();
        let seen: FxHashSet<CompactString> = keys.iter().cloned().collect();
        let mut summary = RenderSummary {
            removed: self.release_pending(dom, store, &seen),
            ..RenderSummary::default()
        };

        let first_pass = !std::mem::replace(&mut self.first_pass_done, true);
        // Server and client agree on the whole tag set: every element is
        // already in place and root attributes are already set.
        let hydrated = first_pass
            && dom
                .server_hash(hash_attribute)
                .is_some_and(|server| server == tag_set_hash(tags).as_str());
        if hydrated {
            summary.hydrated = true;
            log!("dom"; "hydration hash matched, adopting {} tags", tags.len());
        }

        for (tag, key) in tags.iter().zip(keys) {
            let previous = self.records.get(&key);
            match previous {
                Some(record) if record.position == tag.position && record.kind == tag.kind => {
                    if record.hash == tag.hash {
                        summary.unchanged += 1;
                    } else {
                        let mut record = record.clone();
                        patch(dom, &mut record, tag);
                        self.records.insert(key.clone(), record);
                        summary.patched += 1;
                    }
                }
                _ => {
                    if let Some(stale) = self.records.remove(&key) {
                        stale.release(dom);
                    }
                    let element = match Root::of(tag.kind) {
                        Some(root) => {
                            let element = dom.root(root);
                            if hydrated {
                                summary.adopted += 1;
                            } else {
                                for (name, value) in &tag.props {
                                    dom.set_attribute(element, name, value);
                                }
                                summary.created += 1;
                            }
                            element
                        }
                        None if first_pass => match dom.adopt(tag) {
                            Some(element) => {
                                summary.adopted += 1;
                                element
                            }
                            None => {
                                summary.created += 1;
                                dom.create(tag)
                            }
                        },
                        None => {
                            summary.created += 1;
                            dom.create(tag)
                        }
                    };
                    self.records.insert(key.clone(), RenderRecord::new(element, tag));
                }
            }

            if let Some(record) = self.records.get_mut(&key) {
                record.entry = tag.sequence.entry;
                store.record_side_effect(record.entry, &key, record.effect);
            }
        }

        let gone: Vec<CompactString> = self
            .records
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in gone {
            if let Some(record) = self.records.remove(&key) {
                record.release(dom);
                store.forget_side_effect(&key);
                summary.removed += 1;
            }
        }

        if first_pass {
            summary.removed += dom.discard_unclaimed();
        }

        log!(
            "dom";
            "created {}, adopted {}, patched {}, removed {}",
            summary.created,
            summary.adopted,
            summary.patched,
            summary.removed
        );
        summary
    }
}

/// Patch a rendered element in place: attribute by attribute, then body.
fn patch(dom: &mut impl DomBackend, record: &mut RenderRecord, tag: &HeadTag) {
    for name in record.props.keys() {
        if !tag.props.contains_key(name) {
            dom.remove_attribute(record.element, name);
        }
    }
    for (name, value) in &tag.props {
        if record.props.get(name) != Some(value) {
            dom.set_attribute(record.element, name, value);
        }
    }
    if record.text_content != tag.text_content || record.inner_html != tag.inner_html {
        dom.set_content(
            record.element,
            tag.text_content.as_deref(),
            tag.inner_html.as_deref(),
        );
    }
    let element = record.element;
    *record = RenderRecord::new(element, tag);
}
