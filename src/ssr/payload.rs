//! The serialized state handed from the server render to the client.
//!
//! ```json
//! {"templateParams": {...}, "title": "Home", "titleTemplate": "%s | Site"}
//! ```
//!
//! `titleTemplate: null` is meaningful (templating disabled) and survives a
//! round trip; an absent key means "no template". Function templates cannot
//! be serialized and are left out.

use crate::entry::{EntryOptions, HeadInput};
use crate::error::HeadError;
use crate::log;
use crate::resolve::ResolvedHead;
use crate::tag::TitleTemplate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadPayload {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub template_params: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// `Some(Null)` disables templating, `Some(String)` is a format.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub title_template: Option<Value>,
}

/// Keep an explicit `null` as `Some(Null)` instead of collapsing it to `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl HeadPayload {
    /// Capture what the client needs to recompose the title.
    ///
    /// Returns `None` when there is nothing to transfer.
    pub fn from_resolved(resolved: &ResolvedHead) -> Option<Self> {
        let title_template = match &resolved.title_template {
            None => None,
            Some(TitleTemplate::Disabled) => Some(Value::Null),
            Some(TitleTemplate::Format(format)) => Some(Value::String(format.clone())),
            Some(TitleTemplate::Function(_)) => {
                log!("ssr"; "function titleTemplate is not transferable, left out of payload");
                None
            }
        };
        let payload = Self {
            template_params: resolved.template_params.clone(),
            title: resolved.title.clone(),
            title_template,
        };
        (!payload.is_empty()).then_some(payload)
    }

    pub fn is_empty(&self) -> bool {
        self.template_params.is_empty() && self.title.is_none() && self.title_template.is_none()
    }

    pub fn from_json(json: &str) -> Result<Self, HeadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, HeadError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The payload as an entry input.
    pub fn into_input(self) -> HeadInput {
        let mut input = HeadInput::new();
        if !self.template_params.is_empty() {
            input = input.template_params(Value::Object(self.template_params));
        }
        if let Some(title) = self.title {
            input = input.title(title);
        }
        if let Some(template) = self.title_template {
            input = input.title_template(template);
        }
        input
    }

    /// Options the payload entry is pushed with: client only, so a server
    /// head never renders its own payload back.
    pub fn entry_options() -> EntryOptions {
        EntryOptions::client()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{InputValue, Resolved};
    use serde_json::json;

    #[test]
    fn test_null_template_survives() {
        let payload = HeadPayload::from_json(r#"{"titleTemplate": null}"#).unwrap();
        assert_eq!(payload.title_template, Some(Value::Null));
        assert_eq!(payload.to_json().unwrap(), r#"{"titleTemplate":null}"#);

        let payload = HeadPayload::from_json("{}").unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_from_resolved() {
        let resolved = ResolvedHead {
            title: Some("Home".into()),
            title_template: Some(TitleTemplate::Format("%s | S".into())),
            template_params: json!({"a": 1}).as_object().cloned().unwrap_or_default(),
            ..ResolvedHead::default()
        };
        let payload = HeadPayload::from_resolved(&resolved).unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"templateParams": {"a": 1}, "title": "Home", "titleTemplate": "%s | S"})
        );
        assert!(HeadPayload::from_resolved(&ResolvedHead::default()).is_none());
    }

    #[tokio::test]
    async fn test_into_input() {
        let payload =
            HeadPayload::from_json(r#"{"title": "T", "titleTemplate": null, "templateParams": {"x": "y"}}"#)
                .unwrap();
        let input = payload.into_input();
        assert!(matches!(
            input.get("titleTemplate"),
            Some(InputValue::Literal(Value::Null))
        ));
        let resolved = input.resolve().await.unwrap();
        let keys: Vec<_> = resolved.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["templateParams", "title", "titleTemplate"]);
        assert!(matches!(&resolved[1].1, Resolved::Value(Value::String(s)) if s == "T"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            HeadPayload::from_json("{nope"),
            Err(HeadError::Payload(_))
        ));
    }
}
