//! Interactions
//!
//! An `Interaction` ties triggers (elements whose client event fires a request)
//! to swaps (a target element and the content that replaces it). Triggers and
//! targets can sit anywhere in the tree, in any order, so wiring is deferred:
//! every target carries a validation callback, and the first one to run during
//! the validation pass resolves the whole interaction. A trigger resolves it too
//! once every placed target has been compiled; before that it queues the attempt
//! behind the rest of the pass, so targets compiled inside another interaction's
//! content are picked up first.
//!
//! Resolution opens a route named after the interaction below the in-band
//! target's page, registers the in-band content there, mirrors every other swap
//! into the same response as an out-of-band element, and rewrites each trigger's
//! `hx-*` attributes to point at the route.
//!
//! Out-of-band mirrors are appended to the interaction's route rather than to the
//! path their target was compiled at. htmx only applies `hx-swap-oob` elements
//! found in the response to the request that fired, so that is where they go.
//!
//! Only the last swap of an interaction can be in-band: a response replaces a
//! single target, so adding a swap forces every earlier one out-of-band.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::component::{Component, Fragment, Resolved};
use crate::element::Element;
use crate::error::Error;
use crate::page::Page;
use crate::reference::{Reference, WeakReference};
use crate::template::{Loader, RequestData};

/// How the response is placed relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapMethod {
    #[default]
    InnerHtml,
    OuterHtml,
    BeforeBegin,
    AfterBegin,
    BeforeEnd,
    AfterEnd,
    Delete,
    None,
}

impl SwapMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapMethod::InnerHtml => "innerHTML",
            SwapMethod::OuterHtml => "outerHTML",
            SwapMethod::BeforeBegin => "beforebegin",
            SwapMethod::AfterBegin => "afterbegin",
            SwapMethod::BeforeEnd => "beforeend",
            SwapMethod::AfterEnd => "afterend",
            SwapMethod::Delete => "delete",
            SwapMethod::None => "none",
        }
    }
}

impl fmt::Display for SwapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Post,
    Get,
}

impl Verb {
    fn attribute(self) -> &'static str {
        match self {
            Verb::Post => "hx-post",
            Verb::Get => "hx-get",
        }
    }
}

// ─── STATE ───

#[derive(Default)]
struct TriggerParams {
    values: BTreeMap<String, Value>,
    event: Option<String>,
    include: Option<String>,
}

#[derive(Clone)]
struct TriggerEntry {
    reference: Reference,
    params: Rc<RefCell<TriggerParams>>,
}

struct SwapState {
    method: Cell<SwapMethod>,
    forced_out_of_band: Cell<bool>,
    out_of_band: Cell<bool>,
    target: RefCell<Option<WeakReference>>,
    content: RefCell<Option<Reference>>,
    action: Option<Loader>,
}

impl SwapState {
    fn new(action: Option<Loader>) -> Self {
        Self {
            method: Cell::new(SwapMethod::default()),
            forced_out_of_band: Cell::new(false),
            out_of_band: Cell::new(false),
            target: RefCell::new(None),
            content: RefCell::new(None),
            action,
        }
    }

    fn is_out_of_band(&self) -> bool {
        self.forced_out_of_band.get() || self.out_of_band.get()
    }

    /// The compiled target. A target that was dropped or never placed is an error.
    fn target(&self) -> Result<Reference, Error> {
        let target = self.target.borrow().clone().ok_or_else(|| Error::missing("swap target"))?;
        match target.upgrade() {
            Some(reference) if reference.is_compiled() => Ok(reference),
            _ => Err(Error::NotCompiled.prepend_path(&["target"])),
        }
    }

    fn content(&self) -> Result<Reference, Error> {
        self.content.borrow().clone().ok_or_else(|| Error::missing("swap content"))
    }
}

struct InteractionState {
    name: String,
    verb: Cell<Verb>,
    triggers: RefCell<Vec<TriggerEntry>>,
    swaps: RefCell<Vec<Rc<SwapState>>>,
    resolved: Cell<bool>,
}

impl InteractionState {
    /// Whether every swap target still alive has been compiled.
    fn targets_ready(&self) -> bool {
        self.swaps.borrow().iter().all(|swap| {
            match swap.target.borrow().as_ref().and_then(WeakReference::upgrade) {
                Some(target) => target.is_compiled(),
                None => true,
            }
        })
    }

    /// Wires the interaction once. Later calls are no-ops, so errors are reported
    /// by whichever callback ran first.
    fn resolve(&self) -> Result<(), Error> {
        if self.resolved.replace(true) {
            return Ok(());
        }
        self.wire().map_err(|e| Error::interaction(&self.name, e))
    }

    fn wire(&self) -> Result<(), Error> {
        let swaps: Vec<Rc<SwapState>> = self.swaps.borrow().clone();
        let triggers: Vec<TriggerEntry> = self.triggers.borrow().clone();
        let in_band = swaps.last().filter(|s| !s.is_out_of_band()).cloned();

        let anchor = match &in_band {
            Some(swap) => swap.target()?.page(),
            None => swaps
                .first()
                .map(|s| s.target())
                .transpose()?
                .and_then(|t| t.page())
                .or_else(|| triggers.first().and_then(|t| t.reference.page())),
        };
        let route = anchor.ok_or(Error::NotCompiled)?.at_path(&[self.name.as_str()]);

        for action in swaps.iter().filter_map(|s| s.action.clone()) {
            route.load(action);
        }

        let mut errors = Vec::new();
        let in_band_id = match &in_band {
            Some(swap) => {
                let id = swap.target()?.id()?;
                route.add_interaction(&swap.content()?)?;
                Some((id, swap.method.get()))
            }
            None => {
                route.add_interaction(&Fragment::new())?;
                None
            }
        };

        for swap in swaps.iter().filter(|s| s.is_out_of_band()) {
            if let Err(err) = mirror_out_of_band(swap, &route) {
                errors.push(err.prepend_path(&["out-of-band"]));
            }
        }

        let path = route.path(&[]);
        for trigger in &triggers {
            if let Err(err) = self.wire_trigger(trigger, &path, in_band_id.as_ref()) {
                errors.push(err.prepend_path(&["trigger"]));
            }
        }
        Error::collect(errors)
    }

    fn wire_trigger(
        &self,
        trigger: &TriggerEntry,
        path: &str,
        target: Option<&(String, SwapMethod)>,
    ) -> Result<(), Error> {
        if !trigger.reference.is_compiled() {
            return Err(Error::NotCompiled);
        }
        let tag = trigger.reference.find_tag()?;
        let params = trigger.params.borrow();
        let mut attrs = tag.attrs_mut();
        attrs.delete(self.verb.get().attribute()).set(self.verb.get().attribute(), path);
        match target {
            Some((id, method)) => {
                attrs.delete("hx-target").set("hx-target", format!("#{id}"));
                attrs.delete("hx-swap").set("hx-swap", method.as_str());
            }
            None => {
                attrs.delete("hx-swap").set("hx-swap", SwapMethod::None.as_str());
            }
        }
        if !params.values.is_empty() {
            let json = serde_json::to_string(&params.values).map_err(|e| Error::Template {
                path: path.to_string(),
                message: e.to_string(),
            })?;
            attrs
                .delete("hx-vals")
                .set("hx-vals", html_escape::encode_double_quoted_attribute(&json));
        }
        if let Some(event) = &params.event {
            attrs.delete("hx-trigger").set("hx-trigger", event);
        }
        if let Some(include) = &params.include {
            attrs.delete("hx-include").set("hx-include", include);
        }
        Ok(())
    }
}

/// Appends a copy of the swap's content to `route`, marked to replace the target
/// out-of-band.
fn mirror_out_of_band(swap: &SwapState, route: &Page) -> Result<(), Error> {
    let target = swap.target()?;
    let id = target.id()?;
    let content = swap.content()?;
    let tag = content.compile(route)?.find_tag()?;
    let method = swap.method.get();
    let mirror = tag.mirror(|attrs| {
        attrs.delete("hx-swap-oob").set("hx-swap-oob", format!("{method}:#{id}"));
        // An outer swap must keep the target addressable for the next request.
        if method == SwapMethod::OuterHtml && !attrs.contains("id") {
            attrs.set("id", &id);
        }
    });
    route.add_out_of_band_element(Element::Tag(Rc::new(mirror)));
    Ok(())
}

// ─── INTERACTION ───

/// A named dynamic behaviour. Cloning shares the same interaction.
#[derive(Clone)]
pub struct Interaction(Rc<InteractionState>);

impl Interaction {
    pub fn new(name: impl Into<String>) -> Self {
        Interaction(Rc::new(InteractionState {
            name: name.into(),
            verb: Cell::new(Verb::Post),
            triggers: RefCell::new(Vec::new()),
            swaps: RefCell::new(Vec::new()),
            resolved: Cell::new(false),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Triggers issue `hx-get` instead of `hx-post`.
    pub fn get(self) -> Self {
        self.0.verb.set(Verb::Get);
        self
    }

    /// Adds a swap. Every swap added before it becomes out-of-band.
    pub fn swap(&self) -> Swap {
        self.push_swap(None)
    }

    /// Adds a swap whose route runs `action` before rendering.
    pub fn action(&self, action: impl Fn(&mut RequestData) + Send + Sync + 'static) -> Swap {
        self.push_swap(Some(Arc::new(action)))
    }

    fn push_swap(&self, action: Option<Loader>) -> Swap {
        let state = Rc::new(SwapState::new(action));
        let mut swaps = self.0.swaps.borrow_mut();
        for earlier in swaps.iter() {
            earlier.forced_out_of_band.set(true);
        }
        swaps.push(state.clone());
        Swap { interaction: self.0.clone(), state }
    }

    /// Wraps `component` so that firing it runs this interaction.
    pub fn trigger(&self, component: impl Component + 'static) -> Trigger {
        let reference = Reference::new(component);
        let interaction = self.0.clone();
        reference.on_validate(move |trigger| {
            if interaction.targets_ready() {
                return interaction.resolve();
            }
            match trigger.page() {
                Some(page) => {
                    page.defer(move || interaction.resolve());
                    Ok(())
                }
                None => interaction.resolve(),
            }
        });
        let params = Rc::new(RefCell::new(TriggerParams::default()));
        self.0
            .triggers
            .borrow_mut()
            .push(TriggerEntry { reference: reference.clone(), params: params.clone() });
        Trigger { reference, params }
    }
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interaction")
            .field("name", &self.0.name)
            .field("triggers", &self.0.triggers.borrow().len())
            .field("swaps", &self.0.swaps.borrow().len())
            .finish()
    }
}

// ─── SWAP ───

/// One target/content pairing of an interaction.
#[derive(Clone)]
pub struct Swap {
    interaction: Rc<InteractionState>,
    state: Rc<SwapState>,
}

impl Swap {
    pub fn method(self, method: SwapMethod) -> Self {
        self.state.method.set(method);
        self
    }

    /// Marks this swap out-of-band even when it is the last one.
    pub fn out_of_band(self) -> Self {
        self.state.out_of_band.set(true);
        self
    }

    pub fn is_out_of_band(&self) -> bool {
        self.state.is_out_of_band()
    }

    /// The element replaced by the response. Setting it twice yields an error
    /// component in place of the second target.
    pub fn target(&self, component: impl Component + 'static) -> Reference {
        if self.state.target.borrow().is_some() {
            return rejected("target");
        }
        let reference = Reference::new(component);
        self.attach_target(&reference);
        reference
    }

    /// What the route renders for this swap.
    pub fn content(&self, component: impl Component + 'static) -> Reference {
        if self.state.content.borrow().is_some() {
            return rejected("content");
        }
        let reference = Reference::new(component);
        *self.state.content.borrow_mut() = Some(reference.clone());
        reference
    }

    /// Replaces the component with a fresh rendering of itself.
    pub fn update(&self, component: impl Component + 'static) -> Reference {
        if self.state.target.borrow().is_some() {
            return rejected("target");
        }
        if self.state.content.borrow().is_some() {
            return rejected("content");
        }
        self.state.method.set(SwapMethod::OuterHtml);
        let reference = Reference::new(component);
        *self.state.content.borrow_mut() = Some(reference.clone());
        self.attach_target(&reference);
        reference
    }

    fn attach_target(&self, reference: &Reference) {
        let interaction = self.interaction.clone();
        reference.on_validate(move |_| interaction.resolve());
        *self.state.target.borrow_mut() = Some(reference.downgrade());
    }
}

fn rejected(what: &str) -> Reference {
    Reference::new(Resolved(Element::Error(Error::already_set(what))))
}

// ─── TRIGGER ───

/// A component that fires its interaction. Place it anywhere in the tree.
#[derive(Clone)]
pub struct Trigger {
    reference: Reference,
    params: Rc<RefCell<TriggerParams>>,
}

impl Trigger {
    /// Adds a value sent with the request (`hx-vals`).
    pub fn value(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.borrow_mut().values.insert(key.into(), value.into());
        self
    }

    /// Client event that fires the request (`hx-trigger`).
    pub fn on(self, event: impl Into<String>) -> Self {
        self.params.borrow_mut().event = Some(event.into());
        self
    }

    /// Extra inputs to submit, as a CSS selector (`hx-include`).
    pub fn include(self, selector: impl Into<String>) -> Self {
        self.params.borrow_mut().include = Some(selector.into());
        self
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }
}

impl Component for Trigger {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        self.reference.compile(page)
    }
}
