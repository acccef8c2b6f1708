//! Tola Head - deduplicated, ordered document head tags.
//!
//! Many independent contributors push partial head descriptions into a
//! [`Head`]; every resolution pass turns the current set into one canonical
//! tag list. The server writes that list out as HTML ([`ssr`]); the client
//! reconciles it against the live document ([`dom`]).
//!
//! ```text
//! push/patch/dispose ──► EntryStore ──► resolve ──► Vec<HeadTag>
//!                                                     │        │
//!                                                   ssr       dom
//! ```

pub mod config;
pub mod dom;
pub mod entry;
pub mod error;
pub mod head;
pub mod hooks;
pub mod logger;
pub mod plugins;
pub mod resolve;
pub mod ssr;
pub mod tag;

pub use config::HeadConfig;
pub use dom::{ClientHead, DomBackend, MemoryDom};
pub use entry::{EntryMode, EntryOptions, HeadInput, InputValue, RenderTarget};
pub use error::HeadError;
pub use head::{EntryHandle, Head};
pub use hooks::{HeadPlugin, HookPoint, Hooks};
pub use resolve::ResolvedHead;
pub use ssr::{SsrHead, render_ssr_head};
pub use tag::{HeadTag, TagKind, TagPosition, TagPriority};
