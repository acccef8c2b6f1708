//! Head entries: raw input fragments and the store that holds them.

pub mod input;
mod store;

pub use input::{Accessor, Deferred, HeadInput, InputValue, Resolved, ResolvedInput, TitleFn};
pub use store::{
    EntryMode, EntryOptions, EntrySnapshot, EntryStore, HeadEntry, InputTransform,
    PendingRelease, RenderTarget, SideEffect,
};
