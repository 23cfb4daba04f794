//! Compilation Context
//!
//! A `Page` carries the current path and data prefixes plus a handle to the build
//! session shared by every fork: the id generator, the template registry under
//! construction and the per-path route index. Compilation is single threaded, so
//! the session lives behind `Rc`/`RefCell`; `build` copies the finished registry
//! into an `Arc` for the request handlers.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use axum::routing::MethodRouter;
use axum::Router;
use handlebars::Handlebars;
use tracing::{debug, info};

use crate::component::Component;
use crate::config::ServerConfig;
use crate::element::Element;
use crate::error::Error;
use crate::generator::Generator;
use crate::handler::{self, Middleware, Mount, MountKind, TemplateHandler};
use crate::template::{self, Loader, Predicate, PredicateRef, ValueFn};

/// Everything registered under one path.
#[derive(Default)]
struct Route {
    primary: Option<Element>,
    out_of_band: Vec<Element>,
    middleware: Vec<Middleware>,
    loaders: Vec<Loader>,
    handler: Option<MethodRouter>,
    primary_validated: bool,
    out_of_band_validated: usize,
}

impl Route {
    fn elements(&self) -> Vec<Element> {
        self.primary.iter().chain(self.out_of_band.iter()).cloned().collect()
    }

    fn has_content(&self) -> bool {
        self.primary.is_some() || !self.out_of_band.is_empty()
    }

    /// Hands out the next element the validation pass has not seen yet.
    fn next_unvalidated(&mut self) -> Option<Element> {
        if !self.primary_validated {
            if let Some(primary) = &self.primary {
                self.primary_validated = true;
                return Some(primary.clone());
            }
        }
        let next = self.out_of_band.get(self.out_of_band_validated).cloned();
        if next.is_some() {
            self.out_of_band_validated += 1;
        }
        next
    }
}

enum Pending {
    Template { name: String, loaders: Vec<Loader> },
    Custom(MethodRouter),
}

type Deferred = Box<dyn FnOnce() -> Result<(), Error>>;

struct Session {
    generator: RefCell<Generator>,
    registry: RefCell<Handlebars<'static>>,
    index: RefCell<BTreeMap<String, Route>>,
    deferred: RefCell<Vec<(String, Deferred)>>,
    errors: RefCell<BTreeMap<String, Vec<Error>>>,
}

#[derive(Clone)]
pub struct Page {
    path_prefix: String,
    data_prefix: String,
    session: Rc<Session>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("path_prefix", &self.path_prefix)
            .field("data_prefix", &self.data_prefix)
            .finish()
    }
}

impl Page {
    pub fn new() -> Self {
        Self {
            path_prefix: "/".to_string(),
            data_prefix: String::new(),
            session: Rc::new(Session {
                generator: RefCell::new(Generator::new()),
                registry: RefCell::new(template::new_registry()),
                index: RefCell::new(BTreeMap::new()),
                deferred: RefCell::new(Vec::new()),
                errors: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// Compiles `component` on a throwaway page and returns its text. Routes it
    /// registers are discarded.
    pub fn render_static(component: &dyn Component) -> Result<String, Error> {
        let page = Page::new();
        let element = component.compile(&page)?;
        element.validate()?;
        Ok(element.to_html())
    }

    // ─── LOCATION ───

    /// Absolute path of `segments` below the current prefix; the bare prefix
    /// when no segment is given.
    pub fn path(&self, segments: &[&str]) -> String {
        let joined = segments
            .iter()
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        if joined.is_empty() {
            return self.path_prefix.clone();
        }
        format!("{}/{}", self.path_prefix.trim_end_matches('/'), joined)
    }

    pub fn at_path(&self, segments: &[&str]) -> Page {
        Page {
            path_prefix: self.path(segments),
            data_prefix: self.data_prefix.clone(),
            session: self.session.clone(),
        }
    }

    fn join_data(&self, segments: &[&str]) -> String {
        self.data_prefix
            .split('.')
            .chain(segments.iter().flat_map(|s| s.split('.')))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Template lookup path of `segments` below the current data prefix.
    pub fn data(&self, segments: &[&str]) -> String {
        let joined = self.join_data(segments);
        if joined.is_empty() {
            "this".to_string()
        } else {
            joined
        }
    }

    pub fn at_data(&self, segments: &[&str]) -> Page {
        Page {
            path_prefix: self.path_prefix.clone(),
            data_prefix: self.join_data(segments),
            session: self.session.clone(),
        }
    }

    /// Fork whose data lookups are relative to the current template value.
    pub fn with_data_root(&self) -> Page {
        Page {
            path_prefix: self.path_prefix.clone(),
            data_prefix: String::new(),
            session: self.session.clone(),
        }
    }

    // ─── NAMESPACE ───

    pub fn next_id(&self, group: &str) -> String {
        self.session.generator.borrow_mut().next_id(group)
    }

    /// Registers a helper under a fresh name from `group` and returns the name.
    pub fn register_function(&self, group: &str, func: ValueFn) -> String {
        let name = self.next_id(group);
        template::register_function(&mut self.session.registry.borrow_mut(), &name, func);
        name
    }

    pub fn register_predicate(&self, predicate: Predicate) -> PredicateRef {
        PredicateRef::new(self.register_function("cond", template::predicate_fn(predicate)))
    }

    // ─── COMPILATION ───

    /// Compiles `component`, turning a compile error into an `Element::Error`.
    pub fn init(&self, component: &dyn Component) -> Element {
        component.compile(self).unwrap_or_else(Element::Error)
    }

    /// Compiles `component` and records it as the content served at the current path.
    pub fn add_interaction(&self, component: &dyn Component) -> Result<(), Error> {
        self.ensure_free()?;
        let element = self.init(component);
        self.ensure_free()?;
        self.route_mut(|route| route.primary = Some(element));
        debug!(path = %self.path_prefix, "registered interaction");
        Ok(())
    }

    /// Compiles `component` and appends it after the current path's content.
    pub fn add_out_of_band(&self, component: &dyn Component) {
        let element = self.init(component);
        self.add_out_of_band_element(element);
    }

    pub(crate) fn add_out_of_band_element(&self, element: Element) {
        self.route_mut(|route| route.out_of_band.push(element));
        debug!(path = %self.path_prefix, "registered out-of-band content");
    }

    /// Mounts a custom handler at the current path in place of a template.
    pub fn add_handler(&self, handler: MethodRouter) -> Result<(), Error> {
        self.ensure_free()?;
        self.route_mut(|route| route.handler = Some(handler));
        debug!(path = %self.path_prefix, "registered handler");
        Ok(())
    }

    /// Appends middleware to the current path. The first added runs outermost.
    pub fn use_middleware(&self, middleware: Middleware) {
        self.route_mut(|route| route.middleware.push(middleware));
    }

    /// Appends a loader that runs before the current path's template executes.
    pub fn load(&self, loader: Loader) {
        self.route_mut(|route| route.loaders.push(loader));
    }

    fn ensure_free(&self) -> Result<(), Error> {
        let index = self.session.index.borrow();
        match index.get(&self.path_prefix) {
            Some(route) if route.primary.is_some() || route.handler.is_some() => {
                Err(Error::DuplicateInteraction(self.path_prefix.clone()))
            }
            _ => Ok(()),
        }
    }

    fn route_mut(&self, edit: impl FnOnce(&mut Route)) {
        let mut index = self.session.index.borrow_mut();
        edit(index.entry(self.path_prefix.clone()).or_default());
    }

    // ─── INDEX ───

    /// Paths with registered content or handlers, sorted.
    pub fn routes(&self) -> Vec<String> {
        self.session
            .index
            .borrow()
            .iter()
            .filter(|(_, route)| route.has_content() || route.handler.is_some())
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn next_unvalidated(&self) -> Option<(String, Element)> {
        let mut index = self.session.index.borrow_mut();
        index
            .iter_mut()
            .find_map(|(path, route)| route.next_unvalidated().map(|e| (path.clone(), e)))
    }

    /// Queues `callback` to run once every element reachable so far has been
    /// validated. Its error is reported under the current path.
    pub fn defer(&self, callback: impl FnOnce() -> Result<(), Error> + 'static) {
        self.session
            .deferred
            .borrow_mut()
            .push((self.path_prefix.clone(), Box::new(callback)));
    }

    /// Runs the deferred validation pass and returns the errors found per path.
    /// Routes registered while validating are validated as well. Errors persist
    /// in the session, so later calls report them again.
    pub fn validate(&self) -> BTreeMap<String, Error> {
        loop {
            while let Some((path, element)) = self.next_unvalidated() {
                if let Err(err) = element.validate() {
                    self.record_error(path, err);
                }
            }
            let deferred = std::mem::take(&mut *self.session.deferred.borrow_mut());
            if deferred.is_empty() {
                break;
            }
            for (path, callback) in deferred {
                if let Err(err) = callback() {
                    self.record_error(path, err);
                }
            }
        }
        self.session
            .errors
            .borrow()
            .iter()
            .filter_map(|(path, errors)| Error::collect(errors.clone()).err().map(|e| (path.clone(), e)))
            .collect()
    }

    fn record_error(&self, path: String, err: Error) {
        self.session.errors.borrow_mut().entry(path).or_default().push(err);
    }

    /// Template text per path.
    pub fn render(&self) -> BTreeMap<String, String> {
        let snapshot: Vec<(String, Vec<Element>)> = self
            .session
            .index
            .borrow()
            .iter()
            .filter(|(_, route)| route.has_content())
            .map(|(path, route)| (path.clone(), route.elements()))
            .collect();
        snapshot
            .into_iter()
            .map(|(path, elements)| (path, Element::Fragment(elements).to_html()))
            .collect()
    }

    // ─── BUILD ───

    pub fn build(&self) -> Result<Router, Error> {
        self.build_with(&ServerConfig::default())
    }

    /// Validates every path, parses one template per path and mounts the handlers.
    /// `/` serves the full document; other paths answer partial requests.
    pub fn build_with(&self, config: &ServerConfig) -> Result<Router, Error> {
        let invalid: Vec<Error> = self
            .validate()
            .into_iter()
            .map(|(path, source)| Error::Invalid { path, source: Box::new(source) })
            .collect();
        Error::collect(invalid)?;

        let text = self.render();
        let routes: Vec<(String, Vec<Middleware>, Vec<Loader>, Option<MethodRouter>)> = self
            .session
            .index
            .borrow()
            .iter()
            .map(|(path, route)| {
                (path.clone(), route.middleware.clone(), route.loaders.clone(), route.handler.clone())
            })
            .collect();

        // Helpers stay in the session so the page can be built again.
        let mut registry = self.session.registry.borrow().clone();
        let mut pending = Vec::new();
        for (path, middleware, loaders, custom) in routes {
            let kind = match (custom, text.get(&path)) {
                (Some(router), None) => Pending::Custom(router),
                (Some(_), Some(_)) => return Err(Error::DuplicateInteraction(path)),
                (None, Some(source)) => {
                    let name = self.next_id("template");
                    registry
                        .register_template_string(&name, source)
                        .map_err(|e| Error::Template { path: path.clone(), message: e.to_string() })?;
                    Pending::Template { name, loaders }
                }
                (None, None) => {
                    debug!(path = %path, "skipping path without content");
                    continue;
                }
            };
            pending.push((path, middleware, kind));
        }

        let registry = Arc::new(registry);
        let mounts: Vec<Mount> = pending
            .into_iter()
            .map(|(path, middleware, kind)| Mount {
                path,
                middleware,
                kind: match kind {
                    Pending::Template { name, loaders } => MountKind::Template(TemplateHandler::new(
                        registry.clone(),
                        name,
                        loaders,
                        config.max_form_bytes,
                    )),
                    Pending::Custom(router) => MountKind::Custom(router),
                },
            })
            .collect();
        info!(routes = mounts.len(), "built page");
        Ok(handler::assemble(mounts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{raw, Div};

    #[test]
    fn test_path_join() {
        let page = Page::new();
        assert_eq!(page.path(&[]), "/");
        assert_eq!(page.path(&["a"]), "/a");
        assert_eq!(page.at_path(&["a"]).path(&["b"]), "/a/b");
        assert_eq!(page.at_path(&["/a/"]).path(&["/b"]), "/a/b");
        assert_eq!(page.at_path(&["a"]).path(&[]), "/a");
        assert_eq!(page.at_path(&["a", "b"]).path(&["c"]), "/a/b/c");
    }

    #[test]
    fn test_data_join() {
        let page = Page::new();
        assert_eq!(page.data(&[]), "this");
        assert_eq!(page.data(&["name"]), "name");
        let user = page.at_data(&["user"]);
        assert_eq!(user.data(&["name"]), "user.name");
        assert_eq!(user.at_data(&["address"]).data(&["city"]), "user.address.city");
        assert_eq!(user.with_data_root().data(&["name"]), "name");
    }

    #[test]
    fn test_forks_share_generator() {
        let page = Page::new();
        assert_eq!(page.at_path(&["a"]).next_id("x"), "x_0");
        assert_eq!(page.at_data(&["b"]).next_id("x"), "x_1");
        assert_eq!(page.next_id("x"), "x_2");
    }

    #[test]
    fn test_duplicate_interaction() {
        let page = Page::new();
        let route = page.at_path(&["a"]);
        route.add_interaction(&raw("one")).unwrap();
        assert_eq!(
            page.at_path(&["a"]).add_interaction(&raw("two")),
            Err(Error::DuplicateInteraction("/a".to_string()))
        );
    }

    #[test]
    fn test_out_of_band_appends() {
        let page = Page::new();
        page.add_out_of_band(&Div::new().content("b"));
        page.add_interaction(&raw("a")).unwrap();
        page.add_out_of_band(&Div::new().content("c"));
        assert_eq!(page.render()["/"], "a<div>b</div><div>c</div>");
        assert_eq!(page.routes(), vec!["/".to_string()]);
    }

    #[test]
    fn test_validate_reports_per_path() {
        let page = Page::new();
        page.add_interaction(&Div::new().content("fine")).unwrap();
        page.at_path(&["broken"]).add_interaction(&crate::component::Tag::new("")).unwrap();
        let errors = page.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["/broken"], Error::MissingTagName);
    }

    #[test]
    fn test_deferred_runs_after_routes_and_errors_persist() {
        let page = Page::new();
        page.add_interaction(&raw("a")).unwrap();
        let inner = page.clone();
        page.at_path(&["later"]).defer(move || {
            assert_eq!(inner.routes(), vec!["/".to_string()]);
            Err(Error::missing("late thing"))
        });
        let errors = page.validate();
        assert_eq!(errors["/later"], Error::missing("late thing"));
        assert_eq!(page.validate(), errors);
    }

    #[test]
    fn test_render_static() {
        let text = Page::render_static(&Div::new().class("clock").content("12:00")).unwrap();
        assert_eq!(text, r#"<div class="clock">12:00</div>"#);
    }
}
