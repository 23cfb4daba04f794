//! Components
//!
//! The declarative tree users author. `compile` turns a component into an
//! `Element`, and may register routes, helpers or middleware on the page while
//! doing so.

use std::rc::Rc;
use std::sync::Arc;

use crate::attributes::Attributes;
use crate::element::Element;
use crate::error::Error;
use crate::page::Page;
use crate::template::{Predicate, RequestData};

mod control;
mod form;
mod html;
mod meta;
mod paths;

pub use control::{Condition, Conditions, Data, Dynamic, Range, Text, With};
pub use form::{Form, FormAction};
pub use html::{
    Button, Footer, Header, Img, Input, Label, Li, Main, Nav, Ol, Section, Span, Textarea, Ul, A, Div, H, P,
};
pub use meta::{AtData, AtPath, Mono};
pub use paths::Paths;

pub trait Component {
    fn compile(&self, page: &Page) -> Result<Element, Error>;
}

impl<C: Component + ?Sized> Component for Box<C> {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        (**self).compile(page)
    }
}

impl<C: Component + ?Sized> Component for Rc<C> {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        (**self).compile(page)
    }
}

impl<C: Component> Component for Option<C> {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        match self {
            Some(component) => component.compile(page),
            None => Ok(Element::empty()),
        }
    }
}

impl Component for &'static str {
    fn compile(&self, _: &Page) -> Result<Element, Error> {
        Ok(Element::raw(*self))
    }
}

impl Component for String {
    fn compile(&self, _: &Page) -> Result<Element, Error> {
        Ok(Element::raw(self.clone()))
    }
}

/// Template text emitted as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Raw(pub String);

pub fn raw(text: impl Into<String>) -> Raw {
    Raw(text.into())
}

impl Component for Raw {
    fn compile(&self, _: &Page) -> Result<Element, Error> {
        Ok(Element::raw(self.0.clone()))
    }
}

/// An already compiled element, placed back into a tree.
pub(crate) struct Resolved(pub Element);

impl Component for Resolved {
    fn compile(&self, _: &Page) -> Result<Element, Error> {
        Ok(self.0.clone())
    }
}

// ─── FRAGMENT ───

/// Components rendered back to back. Empty slots are skipped.
#[derive(Default)]
pub struct Fragment(pub Vec<Option<Box<dyn Component>>>);

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, component: impl Component + 'static) -> Self {
        self.0.push(Some(Box::new(component)));
        self
    }

    pub fn push_opt<C: Component + 'static>(mut self, component: Option<C>) -> Self {
        self.0.push(component.map(|c| Box::new(c) as Box<dyn Component>));
        self
    }
}

impl Component for Fragment {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        Ok(Element::Fragment(
            self.0.iter().flatten().map(|c| page.init(c.as_ref())).collect(),
        ))
    }
}

// ─── TAG ───

/// A named HTML tag. The shorthand components all desugar to this.
pub struct Tag {
    name: String,
    id: String,
    classes: Vec<String>,
    hidden: bool,
    attrs: Attributes,
    when: Vec<(Predicate, Attributes)>,
    content: Option<Box<dyn Component>>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            classes: Vec::new(),
            hidden: false,
            attrs: Attributes::new(),
            when: Vec::new(),
            content: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn attr(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.attrs.set(name, value);
        self
    }

    /// Replaces every value of `name` with `value`.
    pub fn replace_attr(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.attrs.delete(name).set(name, value);
        self
    }

    pub fn flag(mut self, name: &str, active: bool) -> Self {
        self.attrs.flag(name, active);
        self
    }

    /// Emits `name="value"` only on requests where `predicate` holds.
    pub fn attr_when(
        mut self,
        predicate: impl Fn(&RequestData) -> bool + Send + Sync + 'static,
        name: &str,
        value: impl AsRef<str>,
    ) -> Self {
        let mut attrs = Attributes::new();
        attrs.set(name, value);
        self.when.push((Arc::new(predicate), attrs));
        self
    }

    pub fn attrs(mut self, attrs: &Attributes) -> Self {
        self.attrs.merge(attrs);
        self
    }

    pub fn content(mut self, content: impl Component + 'static) -> Self {
        self.content = Some(Box::new(content));
        self
    }
}

impl Component for Tag {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let mut attrs = self.attrs.copy();
        attrs
            .set("id", &self.id)
            .set_all("class", &self.classes)
            .flag("hidden", self.hidden);
        for (predicate, extra) in &self.when {
            attrs.conditional(&page.register_predicate(predicate.clone()), extra.clone());
        }
        let child = self.content.as_ref().map(|c| page.init(c.as_ref()));
        Ok(Element::tag(self.name.clone(), attrs, child))
    }
}

// ─── DOCUMENT ───

/// `<!DOCTYPE html>` plus `html`, `head` and `body`.
#[derive(Default)]
pub struct Document {
    head: Option<Box<dyn Component>>,
    body: Option<Box<dyn Component>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(mut self, head: impl Component + 'static) -> Self {
        self.head = Some(Box::new(head));
        self
    }

    pub fn body(mut self, body: impl Component + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }
}

impl Component for Document {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let head = self.head.as_ref().map(|c| page.init(c.as_ref()));
        let body = self.body.as_ref().map(|c| page.init(c.as_ref()));
        Ok(Element::Fragment(vec![
            Element::raw("<!DOCTYPE html>"),
            Element::tag(
                "html",
                Attributes::new(),
                Some(Element::Fragment(vec![
                    Element::tag("head", Attributes::new(), head),
                    Element::tag("body", Attributes::new(), body),
                ])),
            ),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(component: &dyn Component) -> String {
        Page::new().init(component).to_html()
    }

    #[test]
    fn test_fragment_skips_empty_slots() {
        let with_gap = Fragment::new().push("a").push_opt(None::<Raw>).push(Div::new().content("b"));
        let without = Fragment::new().push("a").push(Div::new().content("b"));
        assert_eq!(compile(&with_gap), compile(&without));
        assert_eq!(compile(&with_gap), "a<div>b</div>");
        match Page::new().init(&with_gap) {
            Element::Fragment(children) => assert_eq!(children.len(), 2),
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn test_tag_attribute_order() {
        let tag = Tag::new("section")
            .class("b")
            .id("main")
            .attr("data-x", "1")
            .hidden(true)
            .class("a")
            .content(raw("hi"));
        assert_eq!(compile(&tag), r#"<section class="b a" data-x="1" hidden id="main">hi</section>"#);
    }

    #[test]
    fn test_conditional_attribute() {
        let link = Tag::new("a").attr("href", "/x").attr_when(|r| r.path == "/x", "class", "active");
        assert_eq!(
            compile(&link),
            r#"<a href="/x" {{#if (cond_0 @root.request)}}class="active"{{/if}}></a>"#
        );
    }

    #[test]
    fn test_document() {
        let doc = Document::new().head("<title>t</title>").body(P::new().content("x"));
        assert_eq!(
            compile(&doc),
            "<!DOCTYPE html><html><head><title>t</title></head><body><p>x</p></body></html>"
        );
    }

    #[test]
    fn test_boxed_and_shared_components() {
        let boxed: Box<dyn Component> = Box::new(raw("a"));
        let shared: Rc<dyn Component> = Rc::new(raw("b"));
        assert_eq!(compile(&boxed), "a");
        assert_eq!(compile(&shared), "b");
        assert_eq!(compile(&None::<Raw>), "");
    }
}
