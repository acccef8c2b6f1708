//! Template parameter substitution and title composition.
//!
//! Tokens are `%key` or `%nested.key`. A token whose longest path does not
//! resolve is retried with shorter prefixes (`%site.name.` in prose keeps
//! the trailing text); a token that resolves at no depth stays literal.
//!
//! `%separator` reads `templateParams.separator`, falling back to the
//! configured default. A `%separator` bordering only empty substitutions
//! collapses, so no dangling or doubled separator is left behind.

use crate::tag::{HeadTag, TagKind, TitleTemplate};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static RE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(\w+(?:\.\w+)*)").unwrap());

/// Deep-merge `incoming` into `base`: objects merge key by key, anything
/// else replaces.
pub fn merge_params(base: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(next)) => merge_params(existing, next),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Substitutes tokens against one merged parameter dictionary.
#[derive(Debug)]
pub struct Substitutor<'a> {
    params: &'a Map<String, Value>,
    separator: &'a str,
}

impl<'a> Substitutor<'a> {
    pub fn new(params: &'a Map<String, Value>, default_separator: &'a str) -> Self {
        let separator = params
            .get("separator")
            .and_then(Value::as_str)
            .unwrap_or(default_separator);
        Self { params, separator }
    }

    pub fn separator(&self) -> &str {
        self.separator
    }

    /// Replace every resolvable token in `text`.
    pub fn apply(&self, text: &str) -> String {
        self.render(text, None, false)
    }

    /// Like [`Self::apply`] but values are escaped for a JSON string body.
    pub fn apply_json(&self, text: &str) -> String {
        self.render(text, None, true)
    }

    /// Substitute `text` token by token. `%s` takes `title` when a title
    /// slot is given. Each `%separator` splits the output into segments;
    /// blank segments are dropped before rejoining, so only separators
    /// next to empty substitutions collapse. Separator characters inside
    /// values or literal text are never touched.
    fn render(&self, text: &str, title: Option<&str>, json: bool) -> String {
        if !text.contains('%') {
            return text.to_owned();
        }
        let mut segments = Vec::new();
        let mut current = String::with_capacity(text.len());
        let mut last = 0;
        for caps in RE_TOKEN.captures_iter(text) {
            let Some(token) = caps.get(0) else { continue };
            current.push_str(&text[last..token.start()]);
            last = token.end();
            match (&caps[1], title) {
                ("separator", _) => segments.push(std::mem::take(&mut current)),
                ("s", Some(title)) => current.push_str(title),
                (path, _) => match self.lookup(path) {
                    Some((value, rest)) => {
                        current.push_str(&if json { escape_json(&value) } else { value });
                        current.push_str(rest);
                    }
                    None => current.push_str(token.as_str()),
                },
            }
        }
        current.push_str(&text[last..]);
        if segments.is_empty() {
            return current;
        }
        segments.push(current);
        join_segments(&segments, self.separator)
    }

    /// Resolve the longest prefix of `path` that names a scalar.
    /// Returns the value and the unmatched `.rest` of the path.
    fn lookup<'p>(&self, path: &'p str) -> Option<(String, &'p str)> {
        let mut end = path.len();
        loop {
            let prefix = &path[..end];
            if let Some(value) = self.lookup_exact(prefix) {
                return Some((value, &path[end..]));
            }
            end = prefix.rfind('.')?;
        }
    }

    fn lookup_exact(&self, path: &str) -> Option<String> {
        if path == "separator" {
            return Some(self.separator.to_owned());
        }
        let mut segments = path.split('.');
        let mut current = self.params.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        match current {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some(String::new()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Compose the final title.
    ///
    /// The raw title is substituted first, then placed into the template.
    /// `None` or an empty result means no title tag is rendered.
    pub fn title(&self, raw: Option<&str>, template: Option<&TitleTemplate>) -> Option<String> {
        let title = raw.map(|t| self.apply(t));
        let composed = match template {
            None | Some(TitleTemplate::Disabled) => title,
            Some(TitleTemplate::Format(template)) => {
                let slot = title.as_deref().unwrap_or_default();
                Some(self.render(template, Some(slot), false).trim().to_owned())
            }
            Some(TitleTemplate::Function(f)) => f(title.as_deref()).map(|t| self.apply(&t)),
        };
        composed.filter(|t| !t.trim().is_empty())
    }
}

/// Rejoin the segments around each `%separator`, skipping blank ones.
///
/// `["Home ", " ", " Site"]` → `"Home | Site"`, `["", " Site"]` → `"Site"`.
fn join_segments(segments: &[String], separator: &str) -> String {
    segments
        .iter()
        .filter(|segment| !segment.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator)
        .trim()
        .to_owned()
}

fn escape_json(value: &str) -> String {
    let quoted = Value::String(value.to_owned()).to_string();
    quoted[1..quoted.len() - 1].to_owned()
}

/// Run substitution over every text-bearing field of the resolved tags.
///
/// Title tags whose composed text is empty are dropped.
pub fn apply_templates(
    tags: Vec<HeadTag>,
    template: Option<&TitleTemplate>,
    subst: &Substitutor<'_>,
) -> Vec<HeadTag> {
    tags.into_iter()
        .filter_map(|mut tag| {
            match tag.kind {
                TagKind::Title => {
                    tag.text_content = Some(subst.title(tag.text_content.as_deref(), template)?);
                }
                TagKind::Meta => substitute_attr(&mut tag, "content", subst),
                TagKind::Link => substitute_attr(&mut tag, "href", subst),
                TagKind::Script if tag.process_template_params && tag.is_json_script() => {
                    tag.text_content = tag.text_content.as_deref().map(|t| subst.apply_json(t));
                    tag.inner_html = tag.inner_html.as_deref().map(|t| subst.apply_json(t));
                }
                _ => return Some(tag),
            }
            tag.rehash();
            Some(tag)
        })
        .collect()
}

fn substitute_attr(tag: &mut HeadTag, name: &str, subst: &Substitutor<'_>) {
    if let Some(value) = tag.attr(name)
        && value.contains('%')
    {
        let value = subst.apply(value);
        tag.set_attr(name, value);
    }
}
