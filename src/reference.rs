//! Reference
//!
//! A shared, mutable box around a component. The first compile caches the element
//! and the page it was compiled at; later compiles return the same element. A
//! one-shot callback attached to the box runs during the deferred validation pass,
//! after the whole tree has been compiled, and is cleared once it ran.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::component::Component;
use crate::element::{Element, Tag};
use crate::error::Error;
use crate::generator::ELEMENT_ID_GROUP;
use crate::page::Page;

type Callback = Box<dyn FnOnce(&Reference) -> Result<(), Error>>;

struct ReferenceState {
    component: Option<Box<dyn Component>>,
    element: Option<Element>,
    page: Option<Page>,
    on_validate: Option<Callback>,
}

#[derive(Clone)]
pub struct Reference(Rc<RefCell<ReferenceState>>);

/// Non-owning handle, used where holding a `Reference` would form a cycle.
#[derive(Clone)]
pub struct WeakReference(Weak<RefCell<ReferenceState>>);

impl WeakReference {
    pub fn upgrade(&self) -> Option<Reference> {
        self.0.upgrade().map(Reference)
    }
}

impl Reference {
    pub fn new(component: impl Component + 'static) -> Self {
        Self::from_boxed(Box::new(component))
    }

    pub fn from_boxed(component: Box<dyn Component>) -> Self {
        Reference(Rc::new(RefCell::new(ReferenceState {
            component: Some(component),
            element: None,
            page: None,
            on_validate: None,
        })))
    }

    /// Attaches the deferred validation callback, replacing any previous one.
    pub fn on_validate(&self, callback: impl FnOnce(&Reference) -> Result<(), Error> + 'static) {
        self.0.borrow_mut().on_validate = Some(Box::new(callback));
    }

    pub fn downgrade(&self) -> WeakReference {
        WeakReference(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Reference) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_compiled(&self) -> bool {
        self.0.borrow().element.is_some()
    }

    /// The compiled element, if any.
    pub fn element(&self) -> Option<Element> {
        self.0.borrow().element.clone()
    }

    /// The page this reference was compiled at, if any.
    pub fn page(&self) -> Option<Page> {
        self.0.borrow().page.clone()
    }

    pub fn render(&self, out: &mut String) -> Result<(), Error> {
        let element = self.element().ok_or(Error::NotCompiled)?;
        element.render(out);
        Ok(())
    }

    /// Runs the pending callback, if any, then validates the compiled element.
    pub fn validate(&self) -> Result<(), Error> {
        let (callback, element) = {
            let mut state = self.0.borrow_mut();
            let element = state.element.clone().ok_or(Error::NotCompiled)?;
            (state.on_validate.take(), element)
        };
        let mut errors = Vec::new();
        if let Some(callback) = callback {
            if let Err(err) = callback(self) {
                errors.push(err);
            }
        }
        if let Err(err) = element.validate() {
            errors.push(err);
        }
        Error::collect(errors)
    }

    pub fn find_tag(&self) -> Result<Rc<Tag>, Error> {
        self.element().ok_or(Error::NotCompiled)?.find_tag()
    }

    /// Returns the tag's `id`, generating and injecting one when it has none.
    pub fn id(&self) -> Result<String, Error> {
        let tag = self.find_tag()?;
        if let Some(id) = tag.attrs().get("id") {
            return Ok(id.to_string());
        }
        let page = self.page().ok_or(Error::NotCompiled)?;
        let id = page.next_id(ELEMENT_ID_GROUP);
        // Several ids may have been set; only the generated one survives.
        tag.attrs_mut().delete("id").set("id", &id);
        Ok(id)
    }
}

impl Component for Reference {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        if self.is_compiled() {
            return Ok(Element::Reference(self.clone()));
        }
        let component = self.0.borrow_mut().component.take();
        let element = match &component {
            Some(component) => page.init(component.as_ref()),
            None => Element::empty(),
        };
        let mut state = self.0.borrow_mut();
        state.component = component;
        if state.element.is_none() {
            state.element = Some(element);
            state.page = Some(page.clone());
        }
        Ok(Element::Reference(self.clone()))
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("Reference")
            .field("element", &state.element)
            .field("page", &state.page)
            .field("pending", &state.on_validate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{raw, Div};
    use std::cell::Cell;

    #[test]
    fn test_uncompiled_reference_fails() {
        let reference = Reference::new(raw("x"));
        let mut out = String::new();
        assert_eq!(reference.render(&mut out), Err(Error::NotCompiled));
        assert_eq!(reference.validate(), Err(Error::NotCompiled));
        assert_eq!(reference.id(), Err(Error::NotCompiled));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let page = Page::new();
        let reference = Reference::new(Div::new().content("x"));
        let first = reference.compile(&page).unwrap();
        let second = reference.compile(&page.at_path(&["elsewhere"])).unwrap();
        assert_eq!(first.to_html(), second.to_html());
        assert_eq!(reference.page().unwrap().path(&[]), "/");
        assert!(Rc::ptr_eq(&first.find_tag().unwrap(), &second.find_tag().unwrap()));
    }

    #[test]
    fn test_id_is_generated_once() {
        let page = Page::new();
        let reference = Reference::new(Div::new().content("x"));
        reference.compile(&page).unwrap();
        assert_eq!(reference.id().unwrap(), "weft_0");
        assert_eq!(reference.id().unwrap(), "weft_0");
        assert_eq!(reference.element().unwrap().to_html(), r#"<div id="weft_0">x</div>"#);
    }

    #[test]
    fn test_existing_id_is_kept() {
        let page = Page::new();
        let reference = Reference::new(Div::new().id("counter"));
        reference.compile(&page).unwrap();
        assert_eq!(reference.id().unwrap(), "counter");
    }

    #[test]
    fn test_duplicate_ids_are_replaced() {
        let page = Page::new();
        let reference = Reference::new(Div::new().id("a").attr("id", "b"));
        reference.compile(&page).unwrap();
        assert_eq!(reference.id().unwrap(), "weft_0");
        assert_eq!(reference.element().unwrap().to_html(), r#"<div id="weft_0"></div>"#);
    }

    #[test]
    fn test_callback_runs_once() {
        let page = Page::new();
        let calls = Rc::new(Cell::new(0));
        let reference = Reference::new(Div::new());
        let counter = calls.clone();
        reference.on_validate(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        reference.compile(&page).unwrap();
        assert!(reference.validate().is_ok());
        assert!(reference.validate().is_ok());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_callback_error_is_reported_once() {
        let page = Page::new();
        let reference = Reference::new(Div::new());
        reference.on_validate(|_| Err(Error::missing("target")));
        reference.compile(&page).unwrap();
        assert_eq!(reference.validate(), Err(Error::missing("target")));
        assert!(reference.validate().is_ok());
    }
}
