//! Raw head input and the deferred-value walker.
//!
//! Any field of an entry may be a plain value, a zero-argument accessor, or a
//! future. [`InputValue`] is the closed set of those shapes plus the two
//! containers that may hold them; [`InputValue::resolve`] is the single
//! recursive walker that turns the tree into concrete JSON.
//!
//! ```text
//! InputValue ── resolve() ──► Resolved
//!   Literal(json)                Value(json)
//!   Array / Object  (recurse)    Value(json array / object)
//!   Accessor(fn)    (call, recurse)
//!   Future(shared)  (await once, cache, recurse)
//!   Function(title fn)           Function(title fn)   (top level only)
//! ```

use serde_json::{Map, Value};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, OnceLock},
};
use tokio::sync::{Mutex, oneshot};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Zero-argument accessor evaluated on every resolution pass.
pub type Accessor = Arc<dyn Fn() -> InputValue + Send + Sync>;

/// Title template function: raw title in, final title out.
pub type TitleFn = Arc<dyn Fn(Option<&str>) -> Option<String> + Send + Sync>;

// ============================================================================
// Input Value
// ============================================================================

/// One node of an entry's input tree.
#[derive(Clone)]
pub enum InputValue {
    Literal(Value),
    Array(Vec<InputValue>),
    Object(Vec<(String, InputValue)>),
    Accessor(Accessor),
    Future(Deferred),
    /// Only meaningful as the value of `titleTemplate`.
    Function(TitleFn),
}

/// A fully resolved input node.
#[derive(Clone)]
pub enum Resolved {
    Value(Value),
    Function(TitleFn),
}

impl Resolved {
    /// JSON view; a function reads as `null`.
    pub fn as_value(&self) -> &Value {
        match self {
            Self::Value(value) => value,
            Self::Function(_) => &Value::Null,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Function(_) => Value::Null,
        }
    }
}

impl InputValue {
    pub fn accessor<F>(f: F) -> Self
    where
        F: Fn() -> InputValue + Send + Sync + 'static,
    {
        Self::Accessor(Arc::new(f))
    }

    pub fn future<F, T>(fut: F) -> Self
    where
        F: Future<Output = Result<T, String>> + Send + 'static,
        T: Into<InputValue>,
    {
        Self::Future(Deferred::new(fut))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Option<&str>) -> Option<String> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, InputValue)>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Resolve every deferred node below this one.
    ///
    /// Fails only when a future rejects; the caller scopes that failure to
    /// the owning entry.
    pub fn resolve(&self) -> BoxFuture<'_, Result<Resolved, String>> {
        Box::pin(async move {
            match self {
                Self::Literal(value) => Ok(Resolved::Value(value.clone())),
                Self::Function(f) => Ok(Resolved::Function(f.clone())),
                Self::Accessor(f) => f().resolve().await,
                Self::Future(deferred) => deferred.wait().await?.resolve().await,
                Self::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(item.resolve().await?.into_value());
                    }
                    Ok(Resolved::Value(Value::Array(out)))
                }
                Self::Object(fields) => {
                    let mut out = Map::new();
                    for (key, value) in fields {
                        out.insert(key.clone(), value.resolve().await?.into_value());
                    }
                    Ok(Resolved::Value(Value::Object(out)))
                }
            }
        })
    }
}

impl fmt::Debug for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Object(fields) => f
                .debug_map()
                .entries(fields.iter().map(|(k, v)| (k, v)))
                .finish(),
            Self::Accessor(_) => f.write_str("<accessor>"),
            Self::Future(_) => f.write_str("<future>"),
            Self::Function(_) => f.write_str("<function>"),
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Function(_) => f.write_str("<function>"),
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_owned()))
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        Self::Literal(Value::Bool(value))
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl<T: Into<InputValue>> From<Option<T>> for InputValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Literal(Value::Null), Into::into)
    }
}

impl From<Vec<InputValue>> for InputValue {
    fn from(value: Vec<InputValue>) -> Self {
        Self::Array(value)
    }
}

impl From<Deferred> for InputValue {
    fn from(value: Deferred) -> Self {
        Self::Future(value)
    }
}

// ============================================================================
// Deferred
// ============================================================================

/// A shareable future whose result is computed once and then cached.
///
/// The first waiter drives the wrapped future while holding the slot lock;
/// if that waiter is dropped mid-way the future stays in the slot and the
/// next waiter picks it up where it stopped.
#[derive(Clone)]
pub struct Deferred {
    inner: Arc<DeferredInner>,
}

struct DeferredInner {
    pending: Mutex<Option<BoxFuture<'static, Result<InputValue, String>>>>,
    settled: OnceLock<Result<InputValue, String>>,
}

impl Deferred {
    pub fn new<F, T>(fut: F) -> Self
    where
        F: Future<Output = Result<T, String>> + Send + 'static,
        T: Into<InputValue>,
    {
        let fut: BoxFuture<'static, Result<InputValue, String>> =
            Box::pin(async move { fut.await.map(Into::into) });
        Self {
            inner: Arc::new(DeferredInner {
                pending: Mutex::new(Some(fut)),
                settled: OnceLock::new(),
            }),
        }
    }

    /// A deferred value completed through the returned sender.
    ///
    /// Dropping the sender rejects the value.
    pub fn channel() -> (oneshot::Sender<Result<InputValue, String>>, Self) {
        let (tx, rx) = oneshot::channel();
        let deferred = Self::new(async move {
            rx.await
                .map_err(|_| "deferred sender dropped".to_string())?
        });
        (tx, deferred)
    }

    pub fn is_settled(&self) -> bool {
        self.inner.settled.get().is_some()
    }

    /// Wait for the value, driving the future if nobody else is.
    pub async fn wait(&self) -> Result<InputValue, String> {
        if let Some(result) = self.inner.settled.get() {
            return result.clone();
        }

        let mut slot = self.inner.pending.lock().await;
        if let Some(result) = self.inner.settled.get() {
            return result.clone();
        }
        let Some(fut) = slot.as_mut() else {
            return Err("deferred value lost".into());
        };

        let result = fut.await;
        let _ = self.inner.settled.set(result.clone());
        *slot = None;
        result
    }
}

// ============================================================================
// Head Input
// ============================================================================

/// One contributor's raw head fragment: ordered top-level keys.
#[derive(Clone, Debug, Default)]
pub struct HeadInput {
    fields: Vec<(String, InputValue)>,
}

/// A head input with every deferred node resolved.
pub type ResolvedInput = Vec<(String, Resolved)>;

impl HeadInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; anything else yields an empty input.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, InputValue::Literal(v)))
                    .collect(),
            },
            _ => Self::default(),
        }
    }

    /// Set a top-level key, replacing an earlier value for it.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<InputValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn title(self, value: impl Into<InputValue>) -> Self {
        self.set("title", value)
    }

    pub fn title_template(self, value: impl Into<InputValue>) -> Self {
        self.set("titleTemplate", value)
    }

    pub fn title_template_fn<F>(self, f: F) -> Self
    where
        F: Fn(Option<&str>) -> Option<String> + Send + Sync + 'static,
    {
        self.set("titleTemplate", InputValue::function(f))
    }

    pub fn template_params(self, value: impl Into<InputValue>) -> Self {
        self.set("templateParams", value)
    }

    pub fn html_attrs(self, value: impl Into<InputValue>) -> Self {
        self.set("htmlAttrs", value)
    }

    pub fn body_attrs(self, value: impl Into<InputValue>) -> Self {
        self.set("bodyAttrs", value)
    }

    pub fn base(self, value: impl Into<InputValue>) -> Self {
        self.set("base", value)
    }

    /// Append a tag to the `meta` / `link` / `script` / ... list.
    pub fn push_tag(mut self, kind: &str, value: impl Into<InputValue>) -> Self {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == kind) {
            Some((_, InputValue::Array(items))) => items.push(value),
            Some(slot) => {
                let prev = std::mem::replace(&mut slot.1, InputValue::Array(Vec::new()));
                slot.1 = InputValue::Array(vec![prev, value]);
            }
            None => self.fields.push((kind.to_owned(), InputValue::Array(vec![value]))),
        }
        self
    }

    pub fn meta(self, value: impl Into<InputValue>) -> Self {
        self.push_tag("meta", value)
    }

    pub fn link(self, value: impl Into<InputValue>) -> Self {
        self.push_tag("link", value)
    }

    pub fn script(self, value: impl Into<InputValue>) -> Self {
        self.push_tag("script", value)
    }

    pub fn style(self, value: impl Into<InputValue>) -> Self {
        self.push_tag("style", value)
    }

    pub fn noscript(self, value: impl Into<InputValue>) -> Self {
        self.push_tag("noscript", value)
    }

    pub fn get(&self, key: &str) -> Option<&InputValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve all fields in order.
    pub async fn resolve(&self) -> Result<ResolvedInput, String> {
        let mut out = Vec::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            out.push((key.clone(), value.resolve().await?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_resolve_literal_tree() {
        let value = InputValue::object([
            ("name", InputValue::from("description")),
            ("content", InputValue::accessor(|| "computed".into())),
        ]);
        let resolved = value.resolve().await.unwrap();
        assert_eq!(
            resolved.as_value(),
            &json!({"name": "description", "content": "computed"})
        );
    }

    #[tokio::test]
    async fn test_accessor_runs_every_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = InputValue::accessor(move || {
            InputValue::from(counter.fetch_add(1, Ordering::SeqCst) as i64)
        });
        assert_eq!(value.resolve().await.unwrap().as_value(), &json!(0));
        assert_eq!(value.resolve().await.unwrap().as_value(), &json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_future_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = InputValue::future(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("late")
        });
        assert_eq!(value.resolve().await.unwrap().as_value(), &json!("late"));
        assert_eq!(value.resolve().await.unwrap().as_value(), &json!("late"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_future_yielding_accessor() {
        let value = InputValue::future(async {
            Ok::<_, String>(InputValue::accessor(|| "nested".into()))
        });
        assert_eq!(value.resolve().await.unwrap().as_value(), &json!("nested"));
    }

    #[tokio::test]
    async fn test_rejected_future() {
        let value = InputValue::Array(vec![
            "ok".into(),
            InputValue::future(async { Err::<InputValue, _>("offline".to_string()) }),
        ]);
        assert_eq!(value.resolve().await.unwrap_err(), "offline");
    }

    #[tokio::test]
    async fn test_channel_deferred() {
        let (tx, deferred) = Deferred::channel();
        assert!(!deferred.is_settled());
        tx.send(Ok("sent".into())).unwrap();
        let value = InputValue::from(deferred.clone());
        assert_eq!(value.resolve().await.unwrap().as_value(), &json!("sent"));
        assert!(deferred.is_settled());
    }

    #[tokio::test]
    async fn test_dropped_channel_rejects() {
        let (tx, deferred) = Deferred::channel();
        drop(tx);
        assert!(deferred.wait().await.is_err());
    }

    #[tokio::test]
    async fn test_function_inside_container_reads_null() {
        let value = InputValue::Array(vec![InputValue::function(|t| t.map(str::to_owned))]);
        assert_eq!(value.resolve().await.unwrap().as_value(), &json!([null]));
    }

    #[test]
    fn test_head_input_set_replaces() {
        let input = HeadInput::new().title("A").title("B");
        assert!(matches!(
            input.get("title"),
            Some(InputValue::Literal(Value::String(s))) if s == "B"
        ));
    }

    #[test]
    fn test_push_tag_appends() {
        let input = HeadInput::new()
            .meta(json!({"name": "a", "content": "1"}))
            .meta(json!({"name": "b", "content": "2"}));
        match input.get("meta") {
            Some(InputValue::Array(items)) => assert_eq!(items.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_push_tag_onto_json_field() {
        let input = HeadInput::from_json(json!({"meta": {"name": "a", "content": "1"}}))
            .meta(json!({"name": "b", "content": "2"}));
        match input.get("meta") {
            Some(InputValue::Array(items)) => assert_eq!(items.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
