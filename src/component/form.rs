//! Form round-trips: the form posts to its own route, the action runs as a
//! loader, and the response swaps the success or error component into the
//! results area below the form.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::attributes::Attributes;
use crate::component::control::compile_branches;
use crate::component::{Component, Mono, Resolved};
use crate::element::Element;
use crate::error::{Error, Validate};
use crate::page::Page;
use crate::template::{Predicate, RequestData};

/// Key the action's failure message is stored under in the request data.
pub const FORM_ERROR_KEY: &str = "error";

/// Handles a submission. `Ok` entries become template data for the success
/// component; `Err` is shown through the error component as `{{error}}`.
pub type FormAction = Arc<dyn Fn(&RequestData) -> Result<Map<String, Value>, String> + Send + Sync>;

pub struct Form {
    id: String,
    classes: Vec<String>,
    attrs: Attributes,
    content: Option<Box<dyn Component>>,
    success: Option<Mono>,
    error: Option<Box<dyn Component>>,
    action: Option<FormAction>,
    autocomplete: Option<Predicate>,
}

impl Form {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            classes: Vec::new(),
            attrs: Attributes::new(),
            content: None,
            success: None,
            error: None,
            action: None,
            autocomplete: None,
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.attrs.set(name, value);
        self
    }

    pub fn content(mut self, content: impl Component + 'static) -> Self {
        self.content = Some(Box::new(content));
        self
    }

    pub fn success(mut self, success: impl Component + 'static) -> Self {
        self.success = Some(Mono::new(success));
        self
    }

    pub fn error(mut self, error: impl Component + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    pub fn action(
        mut self,
        action: impl Fn(&RequestData) -> Result<Map<String, Value>, String> + Send + Sync + 'static,
    ) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    /// Renders the success component on page load when `predicate` holds.
    pub fn autocomplete(mut self, predicate: impl Fn(&RequestData) -> bool + Send + Sync + 'static) -> Self {
        self.autocomplete = Some(Arc::new(predicate));
        self
    }

    fn results_id(&self) -> String {
        format!("{}-results", self.id)
    }
}

impl Component for Form {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let mut v = Validate::new();
        v.require_id(&self.id);
        v.require(self.success.is_some(), "success component");
        v.require(self.error.is_some(), "error component");
        v.finish().map_err(|e| e.enclose_path(&["form"]))?;
        let (Some(success), Some(error)) = (&self.success, &self.error) else {
            return Err(Error::missing("success component"));
        };
        let success: &dyn Component = success;
        let error: &dyn Component = error.as_ref();

        let route = page.at_path(&[self.id.as_str()]);
        if let Some(action) = self.action.clone() {
            route.load(Arc::new(move |request: &mut RequestData| match action(request) {
                Ok(data) => request.data.extend(data),
                Err(message) => request.insert(FORM_ERROR_KEY, message),
            }));
        }
        let failed: Predicate = Arc::new(|request: &RequestData| request.data.contains_key(FORM_ERROR_KEY));
        let response = compile_branches(&route, &[(Some(&failed), error), (None, success)]);
        route
            .add_interaction(&Resolved(response))
            .map_err(|e| e.enclose_path(&[format!("form({})", self.id)]))?;

        let results = match &self.autocomplete {
            Some(predicate) => compile_branches(&route, &[(Some(predicate), success)]),
            None => Element::empty(),
        };
        let mut results_attrs = Attributes::new();
        results_attrs.set("id", self.results_id());

        let mut attrs = self.attrs.copy();
        attrs
            .set("id", &self.id)
            .set_all("class", &self.classes)
            .set("hx-post", route.path(&[]))
            .set("hx-target", format!("#{}", self.results_id()));
        let content = match &self.content {
            Some(content) => page.init(content.as_ref()),
            None => Element::empty(),
        };
        Ok(Element::tag(
            "form",
            attrs,
            Some(Element::Fragment(vec![content, Element::tag("div", results_attrs, Some(results))])),
        ))
    }
}
