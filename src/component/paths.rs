//! Path-switched region. Each child route is served at its own path and is also
//! rendered in place when the page is loaded at (or below) that path.

use std::sync::Arc;

use crate::attributes::Attributes;
use crate::component::control::compile_branches;
use crate::component::{Component, Div, Mono};
use crate::element::Element;
use crate::error::{Error, Validate};
use crate::handler::replace_url;
use crate::page::Page;
use crate::template::{Predicate, RequestData};

pub struct Paths {
    id: String,
    classes: Vec<String>,
    attrs: Attributes,
    routes: Vec<(String, Mono)>,
    default_path: Option<String>,
    default_content: Option<Box<dyn Component>>,
}

impl Paths {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            classes: Vec::new(),
            attrs: Attributes::new(),
            routes: Vec::new(),
            default_path: None,
            default_content: None,
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

    pub fn route(mut self, key: impl Into<String>, content: impl Component + 'static) -> Self {
        self.routes.push((key.into(), Mono::new(content)));
        self
    }

    /// Loads this route's content when no route matches. Must name a route.
    pub fn default_path(mut self, key: impl Into<String>) -> Self {
        self.default_path = Some(key.into());
        self
    }

    /// Shown when no route matches and no default path is set.
    pub fn default_content(mut self, content: impl Component + 'static) -> Self {
        self.default_content = Some(Box::new(content));
        self
    }
}

/// True when `request_path` is `path` or lies below it.
fn matches_path(path: &str, request_path: &str) -> bool {
    match request_path.strip_prefix(path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl Component for Paths {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let mut v = Validate::new();
        v.require_id(&self.id);
        v.finish().map_err(|e| e.enclose_path(&["paths"]))?;

        let mut predicates: Vec<Predicate> = Vec::with_capacity(self.routes.len());
        for (key, content) in &self.routes {
            let sub = page.at_path(&[key.as_str()]);
            let path = sub.path(&[]);
            sub.use_middleware(replace_url(path.clone()));
            sub.add_interaction(content)
                .map_err(|e| e.enclose_path(&[format!("paths({})", self.id)]))?;
            predicates.push(Arc::new(move |request: &RequestData| matches_path(&path, &request.path)));
        }

        let known = |key: &String| self.routes.iter().any(|(k, _)| k == key);
        let loader = match &self.default_path {
            Some(key) if known(key) => Some(
                Div::new()
                    .attr("hx-get", page.path(&[key.as_str()]))
                    .attr("hx-target", format!("#{}", self.id))
                    .attr("hx-trigger", "load"),
            ),
            _ => None,
        };

        let mut branches: Vec<(Option<&Predicate>, &dyn Component)> = self
            .routes
            .iter()
            .zip(predicates.iter())
            .map(|((_, content), predicate)| (Some(predicate), content as &dyn Component))
            .collect();
        if let Some(loader) = &loader {
            branches.push((None, loader as &dyn Component));
        } else if let Some(content) = &self.default_content {
            branches.push((None, content.as_ref()));
        }

        let mut attrs = self.attrs.copy();
        attrs.set("id", &self.id).set_all("class", &self.classes);
        Ok(Element::tag("div", attrs, Some(compile_branches(page, &branches))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_path() {
        assert!(matches_path("/settings", "/settings"));
        assert!(matches_path("/settings", "/settings/profile"));
        assert!(!matches_path("/settings", "/settingsx"));
        assert!(!matches_path("/settings", "/"));
    }

    #[test]
    fn test_requires_id() {
        let err = Paths::new("").compile(&Page::new()).unwrap_err();
        assert_eq!(err.to_string(), "paths missing required id");
    }

    #[test]
    fn test_routes_and_default_loader() {
        let page = Page::new();
        let paths = Paths::new("view")
            .route("home", Div::new().content("home"))
            .route("about", Div::new().content("about"))
            .default_path("home");
        page.add_interaction(&paths).unwrap();
        assert!(page.validate().is_empty());

        let rendered = page.render();
        assert_eq!(rendered["/home"], "<div>home</div>");
        assert_eq!(rendered["/about"], "<div>about</div>");
        assert_eq!(
            rendered["/"],
            concat!(
                r#"<div id="view">{{#if (cond_0 @root.request)}}<div>home</div>"#,
                r#"{{else if (cond_1 @root.request)}}<div>about</div>"#,
                r##"{{else}}<div hx-get="/home" hx-target="#view" hx-trigger="load"></div>{{/if}}</div>"##
            )
        );
    }

    #[test]
    fn test_unknown_default_path_falls_back_to_content() {
        let page = Page::new();
        let paths = Paths::new("view")
            .route("home", "home")
            .default_path("missing")
            .default_content("pick one");
        page.add_interaction(&paths).unwrap();
        assert!(page.render()["/"].ends_with("{{else}}pick one{{/if}}</div>"));
    }
}
