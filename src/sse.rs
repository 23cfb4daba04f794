//! Server-Sent Events
//!
//! A `Multiplexer` fans published events out to every connected client. Each
//! subscriber owns a single-slot channel; the publisher awaits one send per live
//! subscriber and drops the ones whose receiver is gone. The last event is kept
//! and replayed to new subscribers so a fresh page shows current state.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, MethodRouter};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::attributes::Attributes;
use crate::component::Component;
use crate::element::Element;
use crate::error::{Error, Validate};
use crate::interaction::SwapMethod;
use crate::page::Page;

/// Event name used when none is set.
pub const DEFAULT_EVENT: &str = "message";

// ─── EVENT ───

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self { event: None, data: data.into() }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self { event: Some(event.into()), data: data.into() }
    }

    /// An event whose data is the rendered `component`.
    pub fn component(event: impl Into<String>, component: &dyn Component) -> Result<Self, Error> {
        Ok(Self::named(event, Page::render_static(component)?))
    }

    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or(DEFAULT_EVENT)
    }
}

/// The wire format: one `event:` line, one `data:` line per line of data, and a
/// blank line.
impl fmt::Display for SseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "event: {}", self.name())?;
        for line in self.data.split('\n') {
            writeln!(f, "data: {line}")?;
        }
        writeln!(f)
    }
}

impl From<SseEvent> for Event {
    fn from(event: SseEvent) -> Self {
        Event::default().event(event.name()).data(event.data)
    }
}

// ─── MULTIPLEXER ───

#[derive(Default)]
struct Inner {
    subscribers: Vec<mpsc::Sender<SseEvent>>,
    last: Option<SseEvent>,
}

#[derive(Default)]
pub struct Multiplexer {
    inner: Mutex<Inner>,
}

/// Receiving side of one subscriber. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<SseEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<SseEvent> {
        self.rx.recv().await
    }

    pub fn cancel(mut self) {
        self.rx.close();
    }

    pub fn into_stream(self) -> ReceiverStream<SseEvent> {
        ReceiverStream::new(self.rx)
    }
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(1);
        let mut inner = self.inner.lock().await;
        if let Some(last) = &inner.last {
            let _ = tx.try_send(last.clone());
        }
        inner.subscribers.push(tx);
        debug!(subscribers = inner.subscribers.len(), "sse client subscribed");
        Subscription { rx }
    }

    /// Sends `event` to every live subscriber. Closed subscribers are skipped
    /// and pruned.
    pub async fn publish(&self, event: SseEvent) {
        let mut inner = self.inner.lock().await;
        inner.last = Some(event.clone());
        let mut dead = false;
        for tx in &inner.subscribers {
            if tx.is_closed() || tx.send(event.clone()).await.is_err() {
                dead = true;
            }
        }
        if dead {
            let before = inner.subscribers.len();
            inner.subscribers.retain(|tx| !tx.is_closed());
            debug!(
                pruned = before - inner.subscribers.len(),
                remaining = inner.subscribers.len(),
                "pruned closed sse subscribers"
            );
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// Returns a sender whose events are published from a background task.
    /// Must be called inside a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> mpsc::Sender<SseEvent> {
        let (tx, mut rx) = mpsc::channel::<SseEvent>(16);
        let multiplexer = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                multiplexer.publish(event).await;
            }
            debug!("sse publisher closed");
        });
        tx
    }

    /// An SSE endpoint streaming this multiplexer's events to each client.
    pub fn handler(self: &Arc<Self>) -> MethodRouter {
        let multiplexer = self.clone();
        get(move || {
            let multiplexer = multiplexer.clone();
            async move {
                let subscription = multiplexer.subscribe().await;
                let stream = subscription.into_stream().map(|event| Ok::<Event, Infallible>(event.into()));
                Sse::new(stream).keep_alive(KeepAlive::default())
            }
        })
    }
}

// ─── COMPONENTS ───

/// Opens an SSE connection to `/sse/<id>` and mounts the endpoint there.
pub struct Stream {
    id: String,
    content: Option<Box<dyn Component>>,
    multiplexer: Arc<Multiplexer>,
}

impl Stream {
    pub fn new(id: impl Into<String>, multiplexer: Arc<Multiplexer>) -> Self {
        Self { id: id.into(), content: None, multiplexer }
    }

    pub fn content(mut self, content: impl Component + 'static) -> Self {
        self.content = Some(Box::new(content));
        self
    }
}

impl Component for Stream {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let mut v = Validate::new();
        v.require_id(&self.id);
        v.finish().map_err(|e| e.enclose_path(&["stream"]))?;

        let route = page.at_path(&["sse", self.id.as_str()]);
        route
            .add_handler(self.multiplexer.handler())
            .map_err(|e| e.enclose_path(&[format!("stream({})", self.id)]))?;

        let mut attrs = Attributes::new();
        attrs
            .set("id", &self.id)
            .set("hx-ext", "sse")
            .set("sse-connect", route.path(&[]));
        let content = match &self.content {
            Some(content) => page.init(content.as_ref()),
            None => Element::empty(),
        };
        Ok(Element::tag("div", attrs, Some(content)))
    }
}

/// Region replaced whenever one of `events` arrives on the enclosing stream.
pub struct StreamTarget {
    events: Vec<String>,
    swap: SwapMethod,
    content: Option<Box<dyn Component>>,
}

impl Default for StreamTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTarget {
    pub fn new() -> Self {
        Self { events: Vec::new(), swap: SwapMethod::InnerHtml, content: None }
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn swap(mut self, swap: SwapMethod) -> Self {
        self.swap = swap;
        self
    }

    pub fn content(mut self, content: impl Component + 'static) -> Self {
        self.content = Some(Box::new(content));
        self
    }
}

impl Component for StreamTarget {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let events = if self.events.is_empty() { DEFAULT_EVENT.to_string() } else { self.events.join(",") };
        let mut attrs = Attributes::new();
        attrs.set("sse-swap", events).set("hx-swap", self.swap.as_str());
        let content = match &self.content {
            Some(content) => page.init(content.as_ref()),
            None => Element::empty(),
        };
        Ok(Element::tag("div", attrs, Some(content)))
    }
}
