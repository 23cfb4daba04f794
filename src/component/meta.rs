//! Meta components: they change how their content is compiled rather than what
//! it renders.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Component;
use crate::element::Element;
use crate::error::Error;
use crate::page::Page;

/// Compiles its content with the path prefix extended by `path`.
pub struct AtPath {
    path: String,
    content: Box<dyn Component>,
}

impl AtPath {
    pub fn new(path: impl Into<String>, content: impl Component + 'static) -> Self {
        Self { path: path.into(), content: Box::new(content) }
    }
}

impl Component for AtPath {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        Ok(page.at_path(&[self.path.as_str()]).init(self.content.as_ref()))
    }
}

/// Compiles its content with the data prefix extended by `path`.
pub struct AtData {
    path: String,
    content: Box<dyn Component>,
}

impl AtData {
    pub fn new(path: impl Into<String>, content: impl Component + 'static) -> Self {
        Self { path: path.into(), content: Box::new(content) }
    }
}

impl Component for AtData {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        Ok(page.at_data(&[self.path.as_str()]).init(self.content.as_ref()))
    }
}

struct MonoState {
    content: Box<dyn Component>,
    cache: RefCell<Option<Element>>,
}

/// Compiles its content once. Every clone placed elsewhere in the tree reuses
/// that element, so interactions inside register a single time.
#[derive(Clone)]
pub struct Mono(Rc<MonoState>);

impl Mono {
    pub fn new(content: impl Component + 'static) -> Self {
        Self::from_boxed(Box::new(content))
    }

    pub fn from_boxed(content: Box<dyn Component>) -> Self {
        Mono(Rc::new(MonoState { content, cache: RefCell::new(None) }))
    }

    pub fn is_compiled(&self) -> bool {
        self.0.cache.borrow().is_some()
    }
}

impl Component for Mono {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        if let Some(element) = self.0.cache.borrow().clone() {
            return Ok(element);
        }
        let element = page.init(self.0.content.as_ref());
        *self.0.cache.borrow_mut() = Some(element.clone());
        Ok(element)
    }
}
