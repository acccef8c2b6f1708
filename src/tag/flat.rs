//! Flat meta shorthand.
//!
//! Packs `{ description: "...", ogImage: [...], twitterCard: "..." }` style
//! keys into canonical `meta` descriptors. A small static table covers the
//! keys whose tag shape cannot be derived from the name; every other key
//! takes the typed fallback path:
//!
//! | Key prefix                                | Attribute  | Name                   |
//! |-------------------------------------------|------------|------------------------|
//! | `og` `article` `book` `profile` `fb`      | `property` | `og:image:width`       |
//! | `twitter`                                 | `name`     | `twitter:image:alt`    |
//! | anything else                             | `name`     | `theme-color` (kebab)  |
//!
//! Image / video / audio groups accept an array of URLs or objects and expand
//! into an ordered run of sibling tags sharing the group prefix.

use serde_json::Value;

/// Which attribute identifies a meta tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaAttr {
    Name,
    Property,
    HttpEquiv,
    Charset,
}

impl MetaAttr {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Property => "property",
            Self::HttpEquiv => "http-equiv",
            Self::Charset => "charset",
        }
    }
}

/// How a flat key maps onto a meta tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatKey {
    /// Found in the static table.
    Known { attr: MetaAttr, name: &'static str },
    /// Derived from the key's shape.
    Unknown { attr: MetaAttr, name: String },
}

impl FlatKey {
    pub fn attr(&self) -> MetaAttr {
        match self {
            Self::Known { attr, .. } | Self::Unknown { attr, .. } => *attr,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Known { name, .. } => name,
            Self::Unknown { name, .. } => name,
        }
    }
}

/// One packed meta descriptor. `content: None` asks for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatMeta {
    pub attr: MetaAttr,
    pub name: String,
    pub content: Option<String>,
}

/// Keys whose tag shape cannot be derived from the key itself.
static KNOWN: &[(&str, MetaAttr, &str)] = &[
    ("charset", MetaAttr::Charset, "charset"),
    ("contentSecurityPolicy", MetaAttr::HttpEquiv, "content-security-policy"),
    ("contentType", MetaAttr::HttpEquiv, "content-type"),
    ("defaultStyle", MetaAttr::HttpEquiv, "default-style"),
    ("xUaCompatible", MetaAttr::HttpEquiv, "x-ua-compatible"),
    ("refresh", MetaAttr::HttpEquiv, "refresh"),
    ("msapplicationConfig", MetaAttr::Name, "msapplication-Config"),
    ("msapplicationTileColor", MetaAttr::Name, "msapplication-TileColor"),
    ("msapplicationTileImage", MetaAttr::Name, "msapplication-TileImage"),
];

/// Groups whose object form expands into `<group>` + `<group>:<field>` tags.
static GROUPS: &[&str] = &["ogImage", "ogVideo", "ogAudio", "twitterImage"];

/// Order of the object fields of a group; `url` is the group tag itself.
static GROUP_FIELDS: &[(&str, &str)] = &[
    ("secureUrl", "secure_url"),
    ("type", "type"),
    ("width", "width"),
    ("height", "height"),
    ("alt", "alt"),
];

/// Open Graph style prefixes rendered with `property`.
static PROPERTY_PREFIXES: &[&str] = &["og", "article", "book", "profile", "fb"];

/// Word pairs that stay joined with `_` after a property prefix.
static COMPOUNDS: &[(&str, &str)] = &[
    ("site", "name"),
    ("secure", "url"),
    ("app", "id"),
    ("published", "time"),
    ("modified", "time"),
    ("expiration", "time"),
    ("first", "name"),
    ("last", "name"),
    ("release", "date"),
];

/// Look a flat key up, falling back to the derived shape.
pub fn lookup(key: &str) -> FlatKey {
    if let Some((_, attr, name)) = KNOWN.iter().find(|(k, ..)| *k == key) {
        return FlatKey::Known { attr: *attr, name };
    }

    let words = split_camel(key);
    let Some(first) = words.first() else {
        return FlatKey::Unknown {
            attr: MetaAttr::Name,
            name: String::new(),
        };
    };

    if words.len() > 1 && PROPERTY_PREFIXES.contains(&first.as_str()) {
        FlatKey::Unknown {
            attr: MetaAttr::Property,
            name: join_words(&words, true),
        }
    } else if words.len() > 1 && first == "twitter" {
        FlatKey::Unknown {
            attr: MetaAttr::Name,
            name: join_words(&words, false),
        }
    } else {
        FlatKey::Unknown {
            attr: MetaAttr::Name,
            name: words.join("-"),
        }
    }
}

/// Expand one flat key/value into meta descriptors, in output order.
///
/// Returns an empty list for values that cannot be packed (nested objects
/// outside a known group).
pub fn expand(key: &str, value: &Value) -> Vec<FlatMeta> {
    let flat = lookup(key);
    if flat.name().is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();

    if key == "robots"
        && let Value::Object(directives) = value
    {
        out.push(meta(&flat, Some(robots_content(directives))));
        return out;
    }

    let is_group = GROUPS.contains(&key);
    match value {
        Value::Array(items) => {
            for item in items {
                expand_one(&flat, item, is_group, &mut out);
            }
        }
        other => expand_one(&flat, other, is_group, &mut out),
    }
    out
}

fn expand_one(flat: &FlatKey, value: &Value, is_group: bool, out: &mut Vec<FlatMeta>) {
    match value {
        Value::Object(fields) if is_group => {
            if let Some(url) = fields.get("url").and_then(scalar) {
                out.push(meta(flat, Some(url)));
            }
            for (field, suffix) in GROUP_FIELDS {
                if let Some(content) = fields.get(*field).and_then(scalar) {
                    out.push(FlatMeta {
                        attr: flat.attr(),
                        name: format!("{}:{suffix}", flat.name()),
                        content: Some(content),
                    });
                }
            }
        }
        Value::Object(_) | Value::Array(_) => {}
        Value::Null => out.push(meta(flat, None)),
        other => {
            if let Some(content) = scalar(other) {
                out.push(meta(flat, Some(content)));
            }
        }
    }
}

fn meta(flat: &FlatKey, content: Option<String>) -> FlatMeta {
    FlatMeta {
        attr: flat.attr(),
        name: flat.name().to_owned(),
        content,
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `{ index: true, follow: false, maxImagePreview: "large" }`
/// → `index, max-image-preview:large`
fn robots_content(directives: &serde_json::Map<String, Value>) -> String {
    directives
        .iter()
        .filter_map(|(key, value)| {
            let name = split_camel(key).join("-");
            match value {
                Value::Bool(true) => Some(name),
                Value::String(s) => Some(format!("{name}:{s}")),
                Value::Number(n) => Some(format!("{name}:{n}")),
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split `ogImageSecureUrl` into `["og", "image", "secure", "url"]`.
fn split_camel(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == ':' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_ascii_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Join words with `:`, keeping known compounds joined by `_`.
fn join_words(words: &[String], compounds: bool) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let pair = words.get(i + 1).map(|next| (words[i].as_str(), next.as_str()));
        if compounds && pair.is_some_and(|pair| COMPOUNDS.contains(&pair)) {
            parts.push(format!("{}_{}", words[i], words[i + 1]));
            i += 2;
        } else {
            parts.push(words[i].clone());
            i += 1;
        }
    }
    parts.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(metas: &[FlatMeta]) -> Vec<(&str, &str)> {
        metas
            .iter()
            .map(|m| (m.name.as_str(), m.content.as_deref().unwrap_or("<none>")))
            .collect()
    }

    #[test]
    fn test_lookup_known() {
        assert_eq!(
            lookup("contentSecurityPolicy"),
            FlatKey::Known {
                attr: MetaAttr::HttpEquiv,
                name: "content-security-policy"
            }
        );
        assert_eq!(lookup("charset").attr(), MetaAttr::Charset);
    }

    #[test]
    fn test_lookup_derived() {
        assert_eq!(lookup("description").name(), "description");
        assert_eq!(lookup("themeColor").name(), "theme-color");
        assert_eq!(lookup("ogSiteName").name(), "og:site_name");
        assert_eq!(lookup("ogSiteName").attr(), MetaAttr::Property);
        assert_eq!(lookup("ogImageSecureUrl").name(), "og:image:secure_url");
        assert_eq!(lookup("fbAppId").name(), "fb:app_id");
        assert_eq!(lookup("articlePublishedTime").name(), "article:published_time");
        assert_eq!(lookup("twitterCard").name(), "twitter:card");
        assert_eq!(lookup("twitterCard").attr(), MetaAttr::Name);
        assert_eq!(lookup("twitterAppIdIphone").name(), "twitter:app:id:iphone");
    }

    #[test]
    fn test_expand_scalar_and_null() {
        let metas = expand("description", &json!("hello"));
        assert_eq!(names(&metas), vec![("description", "hello")]);

        let metas = expand("description", &Value::Null);
        assert_eq!(metas[0].content, None);
    }

    #[test]
    fn test_expand_image_group() {
        let metas = expand(
            "ogImage",
            &json!(["/a.png", {"url": "/b.png", "width": 1200, "height": 630, "alt": "B"}]),
        );
        assert_eq!(
            names(&metas),
            vec![
                ("og:image", "/a.png"),
                ("og:image", "/b.png"),
                ("og:image:width", "1200"),
                ("og:image:height", "630"),
                ("og:image:alt", "B"),
            ]
        );
        assert!(metas.iter().all(|m| m.attr == MetaAttr::Property));
    }

    #[test]
    fn test_expand_plain_array() {
        let metas = expand("ogLocaleAlternate", &json!(["fr_FR", "de_DE"]));
        assert_eq!(
            names(&metas),
            vec![("og:locale:alternate", "fr_FR"), ("og:locale:alternate", "de_DE")]
        );
    }

    #[test]
    fn test_expand_robots_object() {
        let metas = expand(
            "robots",
            &json!({"index": true, "follow": false, "maxImagePreview": "large"}),
        );
        assert_eq!(metas[0].content.as_deref(), Some("index, max-image-preview:large"));
    }

    #[test]
    fn test_object_outside_group_is_dropped() {
        assert!(expand("description", &json!({"text": "x"})).is_empty());
    }

    #[test]
    fn test_split_camel() {
        assert_eq!(split_camel("xUaCompatible"), vec!["x", "ua", "compatible"]);
        assert_eq!(split_camel("og_title"), vec!["og", "title"]);
        assert!(split_camel("").is_empty());
    }
}
