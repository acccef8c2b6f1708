//! Whitelist transform for untrusted input.
//!
//! Keeps only tags that cannot execute anything and, on those, only the
//! attributes listed below. Scripts survive only as JSON data blocks.

use crate::entry::{Resolved, ResolvedInput};
use crate::log;
use serde_json::{Map, Value};

const HTML_ATTRS: &[&str] = &["id", "class", "lang", "dir", "translate"];
const BODY_ATTRS: &[&str] = &["id", "class"];
const META_ATTRS: &[&str] = &["id", "name", "property", "charset", "content", "key"];
const NOSCRIPT_ATTRS: &[&str] = &["id", "textContent", "key"];
const SCRIPT_ATTRS: &[&str] = &["id", "type", "textContent", "key"];
const LINK_ATTRS: &[&str] = &[
    "id",
    "color",
    "crossorigin",
    "fetchpriority",
    "href",
    "hreflang",
    "imagesrcset",
    "imagesizes",
    "integrity",
    "media",
    "referrerpolicy",
    "rel",
    "sizes",
    "type",
    "key",
];

/// `rel` values that load or run something.
const BLOCKED_RELS: &[&str] = &[
    "stylesheet",
    "canonical",
    "modulepreload",
    "prerender",
    "preload",
    "prefetch",
];

const JSON_TYPES: &[&str] = &["application/json", "application/ld+json"];

/// Strip everything executable from one entry's input.
pub fn whitelist_safe_input(input: ResolvedInput) -> ResolvedInput {
    input
        .into_iter()
        .filter_map(|(key, value)| {
            let kept = match key.as_str() {
                "title" | "templateParams" => Some(value),
                "titleTemplate" => match value {
                    Resolved::Value(v @ (Value::String(_) | Value::Null)) => Some(Resolved::Value(v)),
                    _ => None,
                },
                "htmlAttrs" => filter_object(value.as_value(), HTML_ATTRS).map(Resolved::Value),
                "bodyAttrs" => filter_object(value.as_value(), BODY_ATTRS).map(Resolved::Value),
                "meta" => filter_tags(value.as_value(), META_ATTRS, |_| true),
                "noscript" => filter_tags(value.as_value(), NOSCRIPT_ATTRS, |_| true),
                "script" => filter_tags(value.as_value(), SCRIPT_ATTRS, |tag| {
                    tag.get("type")
                        .and_then(Value::as_str)
                        .is_some_and(|t| JSON_TYPES.contains(&t))
                }),
                "link" => filter_tags(value.as_value(), LINK_ATTRS, safe_link),
                "base" | "style" => None,
                // Flat meta shorthand only ever becomes `content`.
                _ if is_safe_value(value.as_value()) => Some(value),
                _ => None,
            };
            if kept.is_none() {
                log!("safe"; "`{key}` removed from safe input");
            }
            kept.map(|value| (key, value))
        })
        .collect()
}

fn filter_object(value: &Value, allowed: &[&str]) -> Option<Value> {
    let Value::Object(fields) = value else {
        return None;
    };
    let kept: Map<String, Value> = fields
        .iter()
        .filter(|(name, value)| allowed.contains(&name.as_str()) && is_safe_value(value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    (!kept.is_empty()).then_some(Value::Object(kept))
}

fn filter_tags(
    value: &Value,
    allowed: &[&str],
    keep: impl Fn(&Map<String, Value>) -> bool,
) -> Option<Resolved> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => return None,
    };
    let kept: Vec<Value> = items
        .into_iter()
        .filter(|item| item.as_object().is_some_and(&keep))
        .filter_map(|item| filter_object(item, allowed))
        .collect();
    (!kept.is_empty()).then(|| Resolved::Value(Value::Array(kept)))
}

fn safe_link(tag: &Map<String, Value>) -> bool {
    let rel = tag.get("rel").and_then(Value::as_str).unwrap_or_default();
    !rel.split_whitespace()
        .any(|r| BLOCKED_RELS.iter().any(|b| r.eq_ignore_ascii_case(b)))
}

/// Reject script-bearing URLs anywhere in an attribute value.
fn is_safe_value(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            let s = s.trim_start().to_ascii_lowercase();
            !(s.starts_with("javascript:")
                || s.starts_with("vbscript:")
                || (s.starts_with("data:") && !s.starts_with("data:image/")))
        }
        Value::Array(items) => items.iter().all(is_safe_value),
        Value::Object(fields) => fields.values().all(is_safe_value),
        _ => true,
    }
}
