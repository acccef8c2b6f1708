//! Built-in hook consumers.

pub mod canonical;
pub mod safe;
pub mod seo;

pub use canonical::CanonicalPlugin;
pub use safe::whitelist_safe_input;
pub use seo::InferSeoMetaPlugin;

use crate::tag::{HeadTag, TagKind, TagPosition, TagSequence, normalise::dedupe_key};

/// A meta tag added by a plugin, owned by `owner`'s entry and ordered
/// after that entry's own tags.
pub(crate) fn plugin_meta(attr: &str, name: &str, content: &str, owner: TagSequence) -> HeadTag {
    let mut tag = HeadTag::new(TagKind::Meta);
    tag.set_attr(attr, name);
    tag.set_attr("content", content);
    tag.dedupe_key = dedupe_key(&tag, None);
    tag.sequence = TagSequence {
        entry: owner.entry,
        index: u32::MAX,
    };
    tag.rehash();
    tag
}

/// Insert `tag` at the end of the head bucket.
pub(crate) fn append_to_head(tags: &mut Vec<HeadTag>, tag: HeadTag) {
    let at = tags
        .iter()
        .position(|t| t.position != TagPosition::Head)
        .unwrap_or(tags.len());
    tags.insert(at, tag);
}
