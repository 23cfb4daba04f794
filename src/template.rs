//! Template Namespace
//!
//! Request-scoped data and the callables registered into the Handlebars registry
//! while a page compiles. Every helper takes the serialized request
//! (`@root.request`) as its only argument.

use std::collections::BTreeMap;
use std::sync::Arc;

use handlebars::{Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, ScopedJson};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-request predicate used by conditions and conditional attributes.
pub type Predicate = Arc<dyn Fn(&RequestData) -> bool + Send + Sync>;
/// Per-request value function used by `With`, `Text` and `Dynamic`.
pub type ValueFn = Arc<dyn Fn(&RequestData) -> Value + Send + Sync>;
/// Runs before a route's template executes and may add entries to `RequestData::data`.
pub type Loader = Arc<dyn Fn(&mut RequestData) + Send + Sync>;

/// The argument every registered helper is called with.
pub const REQUEST_ARG: &str = "@root.request";

/// Everything a template or helper can see about the current request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl RequestData {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into(), path: path.into(), ..Default::default() }
    }

    /// Form value for POST requests, query value otherwise.
    pub fn value(&self, key: &str) -> Option<&str> {
        let source = if self.method.eq_ignore_ascii_case("POST") { &self.form } else { &self.query };
        source.get(key).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Root value a route template executes against: `data` entries plus `request`.
    pub fn to_template_data(&self) -> Value {
        let mut root = self.data.clone();
        let request = serde_json::to_value(self).unwrap_or(Value::Null);
        root.insert("request".to_string(), request);
        Value::Object(root)
    }
}

// ─── REGISTERED NAMES ───

/// Name of a predicate registered on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateRef(String);

impl PredicateRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Sub-expression calling the predicate, e.g. `(cond_0 @root.request)`.
    pub fn call(&self) -> String {
        call_expr(&self.0)
    }

    pub fn open_block(&self) -> String {
        format!("{{{{#if {}}}}}", self.call())
    }

    pub fn close_block() -> &'static str {
        "{{/if}}"
    }
}

pub fn call_expr(name: &str) -> String {
    format!("({} {})", name, REQUEST_ARG)
}

// ─── HELPERS ───

struct FunctionHelper {
    func: ValueFn,
}

impl HelperDef for FunctionHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let request = h
            .param(0)
            .and_then(|p| serde_json::from_value::<RequestData>(p.value().clone()).ok())
            .unwrap_or_default();
        Ok(ScopedJson::Derived((self.func)(&request)))
    }
}

pub fn new_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    registry
}

pub fn register_function(registry: &mut Handlebars<'static>, name: &str, func: ValueFn) {
    registry.register_helper(name, Box::new(FunctionHelper { func }));
}

pub fn predicate_fn(predicate: Predicate) -> ValueFn {
    Arc::new(move |request| Value::Bool(predicate(request)))
}
