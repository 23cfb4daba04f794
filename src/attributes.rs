//! Attribute Set
//!
//! HTML attribute names mapped to value lists. Serialization is sorted by name so
//! identical components always produce identical template text. Values are written
//! as given; callers escape untrusted input themselves.

use std::collections::BTreeMap;

use crate::template::PredicateRef;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, Vec<String>>,
    conditionals: Vec<(PredicateRef, Attributes)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to `name`. Empty values are ignored.
    pub fn set(&mut self, name: &str, value: impl AsRef<str>) -> &mut Self {
        let value = value.as_ref();
        if !value.is_empty() {
            self.values.entry(name.to_string()).or_default().push(value.to_string());
        }
        self
    }

    /// Appends every non-empty value to `name`.
    pub fn set_all<I, S>(&mut self, name: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            self.set(name, value);
        }
        self
    }

    /// Adds `name` as a bare attribute when `active`.
    pub fn flag(&mut self, name: &str, active: bool) -> &mut Self {
        if active {
            self.values.insert(name.to_string(), Vec::new());
        }
        self
    }

    /// Emits `attrs` only when the registered predicate holds for the request.
    pub fn conditional(&mut self, predicate: &PredicateRef, attrs: Attributes) -> &mut Self {
        if !attrs.is_empty() {
            self.conditionals.push((predicate.clone(), attrs));
        }
        self
    }

    /// Appends every value and conditional block of `other`.
    pub fn merge(&mut self, other: &Attributes) -> &mut Self {
        for (name, values) in &other.values {
            let entry = self.values.entry(name.clone()).or_default();
            entry.extend(values.iter().cloned());
        }
        self.conditionals.extend(other.conditionals.iter().cloned());
        self
    }

    /// Returns the value of `name` only when exactly one value is stored.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(values) if values.len() == 1 => Some(values[0].as_str()),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn delete(&mut self, name: &str) -> &mut Self {
        self.values.remove(name);
        self
    }

    pub fn copy(&self) -> Attributes {
        self.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.conditionals.is_empty()
    }

    pub fn write_to(&self, out: &mut String) {
        let mut first = true;
        for (name, values) in &self.values {
            if !first {
                out.push(' ');
            }
            first = false;
            out.push_str(name);
            if values.is_empty() {
                continue;
            }
            out.push_str("=\"");
            out.push_str(&values.join(" "));
            out.push('"');
        }
        for (predicate, attrs) in &self.conditionals {
            if !first {
                out.push(' ');
            }
            first = false;
            out.push_str(&predicate.open_block());
            attrs.write_to(out);
            out.push_str(PredicateRef::close_block());
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}
