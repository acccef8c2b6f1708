//! Client render scheduling.
//!
//! Mutations never render inline. They mark the store dirty and wake the
//! auto-render task, which runs one pass for however many mutations
//! happened before it got to run.

use super::{DomBackend, Reconciler, RenderSummary};
use crate::error::HeadError;
use crate::head::Head;
use crate::hooks::DomRenderContext;
use crate::log;
use crate::ssr::HeadPayload;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};

/// A [`Head`] bound to a document.
#[derive(Debug)]
pub struct ClientHead<D: DomBackend> {
    head: Head,
    dom: D,
    reconciler: Reconciler,
    renders: usize,
}

impl<D: DomBackend> ClientHead<D> {
    /// Bind `head` to `dom`, pushing the server's payload (if the document
    /// has one) as a client entry.
    ///
    /// Construct this before application entries are pushed so their
    /// titles and params take precedence over the transferred ones.
    pub fn new(head: Head, dom: D) -> Result<Self, HeadError> {
        let config = head.config();
        if let Some(json) = dom.read_payload(&config.ssr.payload_id) {
            let payload = HeadPayload::from_json(&json)?;
            log!("dom"; "payload `{}` restored", config.ssr.payload_id);
            head.push(payload.into_input(), HeadPayload::entry_options());
        }
        Ok(Self {
            head,
            dom,
            reconciler: Reconciler::new(),
            renders: 0,
        })
    }

    pub fn head(&self) -> &Head {
        &self.head
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Number of passes run so far.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// Resolve and reconcile once.
    ///
    /// A `dom:beforeRender` handler that sets `skip` vetoes the diff, but
    /// side effects of disposed entries are still released.
    pub async fn render(&mut self) -> RenderSummary {
        self.head.store().take_dirty();
        let resolved = self.head.resolve().await;

        let mut ctx = DomRenderContext {
            tags: resolved.tags,
            skip: false,
        };
        let hook_failures = resolved.hook_errors.len() + self.head.hooks().call(&mut ctx).len();
        let config = self.head.config();
        self.renders += 1;

        let mut store = self.head.store();
        if ctx.skip {
            log!("dom"; "render skipped by hook");
            return RenderSummary {
                removed: self.reconciler.release_disposed(&mut self.dom, &mut store),
                hook_failures,
                ..RenderSummary::default()
            };
        }
        RenderSummary {
            hook_failures,
            ..self.reconciler.reconcile(
                &mut self.dom,
                &mut store,
                &ctx.tags,
                &config.ssr.hash_attribute,
            )
        }
    }

    /// Render only if something changed since the last pass.
    pub async fn flush(&mut self) -> Option<RenderSummary> {
        if !self.head.is_dirty() {
            return None;
        }
        Some(self.render().await)
    }
}

impl<D: DomBackend + Send + 'static> ClientHead<D> {
    /// Move the client into a background task that re-renders after every
    /// burst of mutations, waiting `[client] debounce_ms` first.
    pub fn spawn_auto_render(self) -> AutoRender<D> {
        let head = self.head.clone();
        let client = Arc::new(Mutex::new(self));
        let task = tokio::spawn({
            let client = client.clone();
            async move {
                loop {
                    head.changed().await;
                    let debounce = head.config().client.debounce();
                    if !debounce.is_zero() {
                        tokio::time::sleep(debounce).await;
                    }
                    client.lock().await.flush().await;
                }
            }
        });
        AutoRender { client, task }
    }
}

/// Handle to a running auto-render task. Dropping it stops the task.
#[derive(Debug)]
pub struct AutoRender<D: DomBackend> {
    client: Arc<Mutex<ClientHead<D>>>,
    task: JoinHandle<()>,
}

impl<D: DomBackend> AutoRender<D> {
    pub fn client(&self) -> Arc<Mutex<ClientHead<D>>> {
        self.client.clone()
    }
}

impl<D: DomBackend> Drop for AutoRender<D> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
