//! HTML fragment writing for resolved tags.
//!
//! Element output goes through `quick-xml`, so attribute values and title
//! text are escaped by the writer. Script and style bodies are raw text
//! elements: they are written as-is with only their closing sequence
//! neutralised.

use crate::tag::{AttrValue, HeadTag, Props, TagKind};
use quick_xml::{
    Writer,
    escape::escape,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use regex::{Captures, Regex};
use std::io::{self, Cursor, Write};
use std::sync::LazyLock;

pub type HtmlWriter = Writer<Cursor<Vec<u8>>>;

static RE_CLOSING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(script|style|noscript)").unwrap());

pub fn new_writer() -> HtmlWriter {
    Writer::new(Cursor::new(Vec::new()))
}

pub fn into_string(writer: HtmlWriter) -> String {
    String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned()
}

/// `</script` → `<\/script` inside a raw text body.
pub fn escape_raw_body(body: &str) -> String {
    RE_CLOSING_TAG
        .replace_all(body, |caps: &Captures| format!("<\\/{}", &caps[1]))
        .into_owned()
}

fn start_elem<'a>(name: &'a str, props: &'a Props) -> BytesStart<'a> {
    let mut elem = BytesStart::new(name);
    for (key, value) in props {
        elem.push_attribute((key.as_str(), value.as_str()));
    }
    elem
}

/// Write one element tag. Attribute tags are not elements and are skipped.
pub fn write_tag(writer: &mut HtmlWriter, tag: &HeadTag) -> io::Result<()> {
    if tag.kind.is_attrs() {
        return Ok(());
    }
    let name = tag.kind.as_str();
    let elem = start_elem(name, &tag.props);

    if tag.kind.is_void() {
        return writer.write_event(Event::Empty(elem));
    }

    writer.write_event(Event::Start(elem))?;
    match tag.kind {
        TagKind::Script | TagKind::Style => {
            if let Some(body) = tag.content() {
                writer.get_mut().write_all(escape_raw_body(body).as_bytes())?;
            }
        }
        _ => {
            if let Some(text) = &tag.text_content {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            } else if let Some(html) = &tag.inner_html {
                writer.get_mut().write_all(escape_raw_body(html).as_bytes())?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(name)))
}

/// Write a raw-text `<script>` with the given attributes.
pub fn write_raw_script(
    writer: &mut HtmlWriter,
    attrs: &[(&str, &str)],
    body: &str,
) -> io::Result<()> {
    let mut elem = BytesStart::new("script");
    for (k, v) in attrs {
        elem.push_attribute((*k, *v));
    }
    writer.write_event(Event::Start(elem))?;
    writer.get_mut().write_all(escape_raw_body(body).as_bytes())?;
    writer.write_event(Event::End(BytesEnd::new("script")))
}

/// `lang="en" class="dark"` for `<html>` / `<body>`.
pub fn render_attrs(props: &Props) -> String {
    props
        .iter()
        .map(|(name, value)| match value {
            AttrValue::Flag => name.to_string(),
            AttrValue::Text(text) => format!("{name}=\"{}\"", escape(text.as_str())),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
