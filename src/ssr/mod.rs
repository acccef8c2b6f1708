//! Server rendering.
//!
//! Resolves a [`Head`] once and writes the result as HTML fragments for the
//! host page template:
//!
//! ```text
//! <html {html_attrs}>
//!   <head> {head_tags} </head>
//!   <body {body_attrs}> {body_tags_open} ... {body_tags} </body>
//! </html>
//! ```
//!
//! `head_tags` ends with the payload script when there is title state to
//! transfer, and `html_attrs` carries the hydration hash so the client can
//! tell whether its first pass would change anything.

mod payload;
pub mod writer;

pub use payload::HeadPayload;

use crate::config::HeadConfig;
use crate::error::HeadError;
use crate::head::Head;
use crate::hooks::{Hooks, SsrRenderContext};
use crate::log;
use crate::resolve::ResolvedHead;
use crate::tag::{TagKind, TagPosition};
use serde::Serialize;
use writer::{HtmlWriter, into_string, new_writer, render_attrs, write_raw_script, write_tag};

/// Rendered head fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsrHead {
    pub head_tags: String,
    pub body_tags_open: String,
    pub body_tags: String,
    pub html_attrs: String,
    pub body_attrs: String,
}

/// Resolve `head` and render it.
pub async fn render_ssr_head(head: &Head) -> Result<SsrHead, HeadError> {
    let resolved = head.resolve().await;
    render_resolved(&resolved, &head.config(), &head.hooks())
}

/// Render an already resolved head.
pub fn render_resolved(
    resolved: &ResolvedHead,
    config: &HeadConfig,
    hooks: &Hooks,
) -> Result<SsrHead, HeadError> {
    let mut head = new_writer();
    let mut body_open = new_writer();
    let mut body_close = new_writer();
    let mut out = SsrHead::default();

    for tag in &resolved.tags {
        match tag.kind {
            TagKind::HtmlAttrs => out.html_attrs = render_attrs(&tag.props),
            TagKind::BodyAttrs => out.body_attrs = render_attrs(&tag.props),
            _ => {
                let writer = match tag.position {
                    TagPosition::Head => &mut head,
                    TagPosition::BodyOpen => &mut body_open,
                    TagPosition::BodyClose => &mut body_close,
                };
                write_line(writer, |w| write_tag(w, tag))?;
            }
        }
    }

    if let Some(payload) = HeadPayload::from_resolved(resolved) {
        let json = payload.to_json()?;
        write_line(&mut head, |w| {
            write_raw_script(
                w,
                &[("id", config.ssr.payload_id.as_str()), ("type", "application/json")],
                &json,
            )
        })?;
    }

    let hash = resolved.hydration_hash();
    let hash_attr = format!("{}=\"{hash}\"", config.ssr.hash_attribute);
    out.html_attrs = if out.html_attrs.is_empty() {
        hash_attr
    } else {
        format!("{} {hash_attr}", out.html_attrs)
    };

    out.head_tags = into_string(head);
    out.body_tags_open = into_string(body_open);
    out.body_tags = into_string(body_close);
    log!("ssr"; "rendered {} tags, hash {hash}", resolved.tags.len());

    let mut ctx = SsrRenderContext { head: out };
    hooks.call(&mut ctx);
    Ok(ctx.head)
}

/// Write one element, newline-separated from the previous one.
fn write_line(
    writer: &mut HtmlWriter,
    write: impl FnOnce(&mut HtmlWriter) -> std::io::Result<()>,
) -> Result<(), HeadError> {
    if !writer.get_ref().get_ref().is_empty() {
        std::io::Write::write_all(writer.get_mut(), b"\n")?;
    }
    write(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryOptions, HeadInput};
    use serde_json::json;

    async fn render(input: serde_json::Value) -> SsrHead {
        let head = Head::server();
        head.push(HeadInput::from_json(input), EntryOptions::default());
        render_ssr_head(&head).await.unwrap()
    }

    #[tokio::test]
    async fn test_fragments_by_position() {
        let out = render(json!({
            "htmlAttrs": {"lang": "en"},
            "bodyAttrs": {"class": "dark"},
            "meta": [{"charset": "utf-8"}],
            "script": [
                {"src": "/top.js", "tagPosition": "bodyOpen"},
                {"src": "/end.js", "body": true},
            ],
        }))
        .await;
        assert_eq!(out.head_tags, r#"<meta charset="utf-8"/>"#);
        assert_eq!(out.body_tags_open, r#"<script src="/top.js"></script>"#);
        assert_eq!(out.body_tags, r#"<script src="/end.js"></script>"#);
        assert!(out.html_attrs.starts_with(r#"lang="en" data-head-hash=""#));
        assert_eq!(out.body_attrs, r#"class="dark""#);
    }

    #[tokio::test]
    async fn test_payload_script() {
        let out = render(json!({
            "title": "Home",
            "titleTemplate": "%s %separator %site",
            "templateParams": {"site": "</script>"},
        }))
        .await;
        let lines: Vec<_> = out.head_tags.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("<title>Home | &lt;/script&gt;</title>"));
        assert!(lines[1].starts_with(r#"<script id="head:payload" type="application/json">"#));
        assert!(lines[1].contains(r#""title":"Home""#));
        assert!(lines[1].contains(r#"<\/script>"#));
        assert_eq!(lines[1].matches("</script>").count(), 1);
    }

    #[tokio::test]
    async fn test_no_payload_without_title_state() {
        let out = render(json!({"meta": [{"name": "a", "content": "b"}]})).await;
        assert!(!out.head_tags.contains("head:payload"));
    }

    #[tokio::test]
    async fn test_ssr_hook_rewrites_output() {
        let head = Head::server();
        head.push(HeadInput::new().title("T"), EntryOptions::default());
        head.hook::<SsrRenderContext, _>("wrap", |ctx| {
            ctx.head.body_attrs.push_str("data-ready");
            Ok(())
        });
        let out = render_ssr_head(&head).await.unwrap();
        assert_eq!(out.body_attrs, "data-ready");
    }
}
