//! Element
//!
//! The compiled, render-only tree. Rendering never mutates attribute state, so an
//! element renders to the same text every time. Tag attributes stay mutable until
//! the deferred validation pass has finished injecting ids and request wiring.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::attributes::Attributes;
use crate::error::Error;
use crate::reference::Reference;

#[derive(Clone, Debug)]
pub enum Element {
    Raw(String),
    Tag(Rc<Tag>),
    Fragment(Vec<Element>),
    Error(Error),
    Reference(Reference),
}

impl Element {
    pub fn raw(text: impl Into<String>) -> Self {
        Element::Raw(text.into())
    }

    pub fn tag(name: impl Into<String>, attrs: Attributes, child: Option<Element>) -> Self {
        Element::Tag(Rc::new(Tag::new(name, attrs, child)))
    }

    pub fn empty() -> Self {
        Element::Fragment(Vec::new())
    }

    /// Writes the template source for this subtree. Errors render as their message.
    pub fn render(&self, out: &mut String) {
        match self {
            Element::Raw(text) => out.push_str(text),
            Element::Tag(tag) => tag.render(out),
            Element::Fragment(children) => children.iter().for_each(|c| c.render(out)),
            Element::Error(err) => out.push_str(&err.to_string()),
            Element::Reference(reference) => {
                if let Err(err) = reference.render(out) {
                    out.push_str(&err.to_string());
                }
            }
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }

    /// Aggregates every error in the subtree, running deferred reference callbacks
    /// on the way.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Element::Raw(_) => Ok(()),
            Element::Tag(tag) => tag.validate(),
            Element::Fragment(children) => {
                Error::collect(children.iter().filter_map(|c| c.validate().err()).collect())
            }
            Element::Error(err) => Err(err.clone()),
            Element::Reference(reference) => reference.validate(),
        }
    }

    /// Every tag at the top of this subtree, looking through fragments and references.
    pub fn tags(&self) -> Vec<Rc<Tag>> {
        match self {
            Element::Tag(tag) => vec![tag.clone()],
            Element::Fragment(children) => children.iter().flat_map(|c| c.tags()).collect(),
            Element::Reference(reference) => reference.element().map(|e| e.tags()).unwrap_or_default(),
            Element::Raw(_) | Element::Error(_) => Vec::new(),
        }
    }

    /// The single tag of this subtree.
    pub fn find_tag(&self) -> Result<Rc<Tag>, Error> {
        let mut tags = self.tags();
        match tags.len() {
            1 => Ok(tags.remove(0)),
            n => Err(Error::TagCount(n)),
        }
    }
}

impl From<Vec<Element>> for Element {
    fn from(children: Vec<Element>) -> Self {
        Element::Fragment(children)
    }
}

// ─── TAG ───

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

pub struct Tag {
    name: String,
    attrs: RefCell<Attributes>,
    child: Option<Element>,
}

impl Tag {
    pub fn new(name: impl Into<String>, attrs: Attributes, child: Option<Element>) -> Self {
        Self { name: name.into(), attrs: RefCell::new(attrs), child }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    pub fn child(&self) -> Option<&Element> {
        self.child.as_ref()
    }

    pub fn attrs(&self) -> Ref<'_, Attributes> {
        self.attrs.borrow()
    }

    pub fn attrs_mut(&self) -> RefMut<'_, Attributes> {
        self.attrs.borrow_mut()
    }

    /// A new tag sharing this tag's child, with a copy of its attributes.
    pub fn mirror(&self, edit: impl FnOnce(&mut Attributes)) -> Tag {
        let mut attrs = self.attrs.borrow().copy();
        edit(&mut attrs);
        Tag::new(self.name.clone(), attrs, self.child.clone())
    }

    fn render(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        let attrs = self.attrs.borrow();
        if !attrs.is_empty() {
            out.push(' ');
            attrs.write_to(out);
        }
        drop(attrs);
        out.push('>');
        if self.is_void() {
            return;
        }
        if let Some(child) = &self.child {
            child.render(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push(Error::MissingTagName);
        }
        if self.is_void() && self.child.as_ref().is_some_and(|c| !c.to_html().is_empty()) {
            errors.push(Error::VoidContent(self.name.clone()));
        }
        if let Some(Err(err)) = self.child.as_ref().map(Element::validate) {
            let segment = if self.name.is_empty() { "tag" } else { self.name.as_str() };
            errors.push(err.prepend_path(&[segment]));
        }
        Error::collect(errors)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("attrs", &self.attrs.borrow().render())
            .field("child", &self.child)
            .finish()
    }
}
