//! Template control flow: conditions, scoping, iteration and per-request values.
//!
//! Each component registers its callable into the page's template registry under
//! a generated name and wraps its compiled content in the matching Handlebars
//! block.

use std::sync::Arc;

use serde_json::Value;

use crate::component::Component;
use crate::element::Element;
use crate::error::Error;
use crate::page::Page;
use crate::template::{call_expr, Predicate, PredicateRef, RequestData, REQUEST_ARG};

/// Content shown when `predicate` holds. Without a predicate it is an else arm.
pub struct Condition {
    predicate: Option<Predicate>,
    content: Box<dyn Component>,
}

impl Condition {
    pub fn new(
        predicate: impl Fn(&RequestData) -> bool + Send + Sync + 'static,
        content: impl Component + 'static,
    ) -> Self {
        Self { predicate: Some(Arc::new(predicate)), content: Box::new(content) }
    }

    pub fn from_predicate(predicate: Predicate, content: impl Component + 'static) -> Self {
        Self { predicate: Some(predicate), content: Box::new(content) }
    }

    pub fn otherwise(content: impl Component + 'static) -> Self {
        Self { predicate: None, content: Box::new(content) }
    }
}

impl Component for Condition {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        Ok(compile_branches(page, &[(self.predicate.as_ref(), self.content.as_ref())]))
    }
}

/// An if / else-if chain. Every arm without a predicate joins one trailing else.
#[derive(Default)]
pub struct Conditions(pub Vec<Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(
        mut self,
        predicate: impl Fn(&RequestData) -> bool + Send + Sync + 'static,
        content: impl Component + 'static,
    ) -> Self {
        self.0.push(Condition::new(predicate, content));
        self
    }

    pub fn otherwise(mut self, content: impl Component + 'static) -> Self {
        self.0.push(Condition::otherwise(content));
        self
    }
}

impl Component for Conditions {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let branches: Vec<(Option<&Predicate>, &dyn Component)> = self
            .0
            .iter()
            .map(|c| (c.predicate.as_ref(), c.content.as_ref()))
            .collect();
        Ok(compile_branches(page, &branches))
    }
}

/// Compiles `(predicate, content)` arms into one conditional block. Arms without
/// a predicate are gathered, in order, into the else block; with no predicate at
/// all the contents are emitted bare.
pub(crate) fn compile_branches(page: &Page, branches: &[(Option<&Predicate>, &dyn Component)]) -> Element {
    let mut conditional = Vec::new();
    let mut fallback = Vec::new();
    for (predicate, content) in branches {
        match predicate {
            Some(predicate) => {
                let name = page.register_predicate((*predicate).clone());
                conditional.push((name, page.init(*content)));
            }
            None => fallback.push(page.init(*content)),
        }
    }
    if conditional.is_empty() {
        return Element::Fragment(fallback);
    }

    let mut elements = Vec::with_capacity(conditional.len() * 2 + fallback.len() + 2);
    for (i, (name, element)) in conditional.into_iter().enumerate() {
        let open = if i == 0 { name.open_block() } else { format!("{{{{else if {}}}}}", name.call()) };
        elements.push(Element::Raw(open));
        elements.push(element);
    }
    if !fallback.is_empty() {
        elements.push(Element::raw("{{else}}"));
        elements.extend(fallback);
    }
    elements.push(Element::raw(PredicateRef::close_block()));
    Element::Fragment(elements)
}

// ─── SCOPE ───

/// Rebinds the current template value to the function's result for its content.
pub struct With {
    func: Arc<dyn Fn(&RequestData) -> Value + Send + Sync>,
    content: Box<dyn Component>,
}

impl With {
    pub fn new(
        func: impl Fn(&RequestData) -> Value + Send + Sync + 'static,
        content: impl Component + 'static,
    ) -> Self {
        Self { func: Arc::new(func), content: Box::new(content) }
    }
}

impl Component for With {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let name = page.register_function("with", self.func.clone());
        Ok(Element::Fragment(vec![
            Element::Raw(format!("{{{{#with {}}}}}", call_expr(&name))),
            page.with_data_root().init(self.content.as_ref()),
            Element::raw("{{/with}}"),
        ]))
    }
}

/// Repeats its content for every item of the list at `path` under the data prefix.
pub struct Range {
    path: String,
    content: Box<dyn Component>,
    empty: Option<Box<dyn Component>>,
}

impl Range {
    pub fn new(path: impl Into<String>, content: impl Component + 'static) -> Self {
        Self { path: path.into(), content: Box::new(content), empty: None }
    }

    /// Shown when the list is missing or empty.
    pub fn empty(mut self, content: impl Component + 'static) -> Self {
        self.empty = Some(Box::new(content));
        self
    }
}

impl Component for Range {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let item = page.with_data_root();
        let mut elements = vec![
            Element::Raw(format!("{{{{#each {}}}}}", page.data(&[self.path.as_str()]))),
            item.init(self.content.as_ref()),
        ];
        if let Some(empty) = &self.empty {
            elements.push(Element::raw("{{else}}"));
            elements.push(page.init(empty.as_ref()));
        }
        elements.push(Element::raw("{{/each}}"));
        Ok(Element::Fragment(elements))
    }
}

// ─── VALUES ───

/// A per-request string, HTML-escaped on output.
pub struct Text(Arc<dyn Fn(&RequestData) -> String + Send + Sync>);

impl Text {
    pub fn new(func: impl Fn(&RequestData) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(func))
    }
}

impl Component for Text {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let func = self.0.clone();
        let name = page.register_function("text", Arc::new(move |r| Value::String(func(r))));
        Ok(Element::Raw(format!("{{{{{} {}}}}}", name, REQUEST_ARG)))
    }
}

/// Per-request HTML written without escaping. Only use with trusted output.
pub struct Dynamic(Arc<dyn Fn(&RequestData) -> String + Send + Sync>);

impl Dynamic {
    pub fn new(func: impl Fn(&RequestData) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(func))
    }
}

impl Component for Dynamic {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        let func = self.0.clone();
        let name = page.register_function("dyn", Arc::new(move |r| Value::String(func(r))));
        Ok(Element::Raw(format!("{{{{{{{} {}}}}}}}", name, REQUEST_ARG)))
    }
}

/// Escaped lookup of `path` under the current data prefix.
pub struct Data(pub String);

impl Data {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }
}

impl Component for Data {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        Ok(Element::Raw(format!("{{{{{}}}}}", page.data(&[self.0.as_str()]))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{AtData, Li, Ul};
    use serde_json::json;

    fn compile(page: &Page, component: &dyn Component) -> String {
        page.init(component).to_html()
    }

    #[test]
    fn test_condition_without_predicate_is_bare() {
        let page = Page::new();
        assert_eq!(compile(&page, &Condition::otherwise("x")), "x");
        assert_eq!(
            compile(&page, &Condition::new(|_| true, "y")),
            "{{#if (cond_0 @root.request)}}y{{/if}}"
        );
    }

    #[test]
    fn test_conditions_group_else_arms() {
        let page = Page::new();
        let conditions = Conditions::new()
            .when(|r| r.path == "/a", "X")
            .otherwise("Y")
            .otherwise("Z");
        assert_eq!(
            compile(&page, &conditions),
            "{{#if (cond_0 @root.request)}}X{{else}}YZ{{/if}}"
        );
    }

    #[test]
    fn test_conditions_else_if_chain() {
        let page = Page::new();
        let conditions = Conditions::new()
            .otherwise("C")
            .when(|_| false, "A")
            .when(|_| true, "B");
        assert_eq!(
            compile(&page, &conditions),
            "{{#if (cond_0 @root.request)}}A{{else if (cond_1 @root.request)}}B{{else}}C{{/if}}"
        );
    }

    #[test]
    fn test_only_else_arms_are_bare() {
        let page = Page::new();
        let conditions = Conditions::new().otherwise("Y").otherwise("Z");
        assert_eq!(compile(&page, &conditions), "YZ");
    }

    #[test]
    fn test_with_resets_data_prefix() {
        let page = Page::new();
        let with = AtData::new("outer", With::new(|_| json!({"name": "ada"}), Data::new("name")));
        assert_eq!(compile(&page, &with), "{{#with (with_0 @root.request)}}{{name}}{{/with}}");
    }

    #[test]
    fn test_range_and_data() {
        let page = Page::new();
        let list = Ul::new().content(
            Range::new("items", Li::new().content(Data::new("label"))).empty(Li::new().content("none")),
        );
        assert_eq!(
            compile(&page, &AtData::new("todo", list)),
            "<ul>{{#each todo.items}}<li>{{label}}</li>{{else}}<li>none</li>{{/each}}</ul>"
        );
    }

    #[test]
    fn test_text_and_dynamic_syntax() {
        let page = Page::new();
        assert_eq!(compile(&page, &Text::new(|r| r.path.clone())), "{{text_0 @root.request}}");
        assert_eq!(compile(&page, &Dynamic::new(|_| "<b>hi</b>".into())), "{{{dyn_0 @root.request}}}");
    }
}
