//! HTML shorthands. Each one is a preset `Tag`.

use crate::attributes::Attributes;
use crate::component::{Component, Tag};
use crate::element::Element;
use crate::error::Error;
use crate::page::Page;
use crate::template::RequestData;

macro_rules! shorthand {
    ($(#[$meta:meta])* $name:ident, $init:expr) => {
        $(#[$meta])*
        pub struct $name(Tag);

        impl $name {
            pub fn new() -> Self {
                Self($init)
            }

            pub fn id(self, id: impl Into<String>) -> Self {
                Self(self.0.id(id))
            }

            pub fn class(self, class: impl Into<String>) -> Self {
                Self(self.0.class(class))
            }

            pub fn hidden(self, hidden: bool) -> Self {
                Self(self.0.hidden(hidden))
            }

            pub fn attr(self, name: &str, value: impl AsRef<str>) -> Self {
                Self(self.0.attr(name, value))
            }

            pub fn flag(self, name: &str, active: bool) -> Self {
                Self(self.0.flag(name, active))
            }

            pub fn attr_when(
                self,
                predicate: impl Fn(&RequestData) -> bool + Send + Sync + 'static,
                name: &str,
                value: impl AsRef<str>,
            ) -> Self {
                Self(self.0.attr_when(predicate, name, value))
            }

            pub fn attrs(self, attrs: &Attributes) -> Self {
                Self(self.0.attrs(attrs))
            }

            pub fn content(self, content: impl Component + 'static) -> Self {
                Self(self.0.content(content))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Component for $name {
            fn compile(&self, page: &Page) -> Result<Element, Error> {
                self.0.compile(page)
            }
        }
    };
}

shorthand!(Div, Tag::new("div"));
shorthand!(Span, Tag::new("span"));
shorthand!(P, Tag::new("p"));
shorthand!(Header, Tag::new("header"));
shorthand!(Nav, Tag::new("nav"));
shorthand!(Main, Tag::new("main"));
shorthand!(Section, Tag::new("section"));
shorthand!(Footer, Tag::new("footer"));
shorthand!(Ul, Tag::new("ul"));
shorthand!(Ol, Tag::new("ol"));
shorthand!(Li, Tag::new("li"));
shorthand!(Label, Tag::new("label"));
shorthand!(A, Tag::new("a"));
shorthand!(Img, Tag::new("img"));
shorthand!(Input, Tag::new("input"));
shorthand!(Textarea, Tag::new("textarea"));
shorthand!(
    /// Always carries `type="button"` unless `kind` replaces it.
    Button,
    Tag::new("button").attr("type", "button")
);

impl Button {
    pub fn kind(self, kind: &str) -> Self {
        Self(self.0.replace_attr("type", kind))
    }

    pub fn disabled(self, disabled: bool) -> Self {
        Self(self.0.flag("disabled", disabled))
    }
}

impl Label {
    pub fn for_input(self, id: &str) -> Self {
        Self(self.0.attr("for", id))
    }
}

impl A {
    pub fn href(self, href: &str) -> Self {
        Self(self.0.attr("href", href))
    }
}

impl Img {
    pub fn src(self, src: &str) -> Self {
        Self(self.0.attr("src", src))
    }

    pub fn alt(self, alt: &str) -> Self {
        Self(self.0.attr("alt", alt))
    }
}

impl Input {
    pub fn kind(self, kind: &str) -> Self {
        Self(self.0.replace_attr("type", kind))
    }

    pub fn name(self, name: &str) -> Self {
        Self(self.0.attr("name", name))
    }

    pub fn value(self, value: &str) -> Self {
        Self(self.0.attr("value", value))
    }

    pub fn placeholder(self, placeholder: &str) -> Self {
        Self(self.0.attr("placeholder", placeholder))
    }

    pub fn disabled(self, disabled: bool) -> Self {
        Self(self.0.flag("disabled", disabled))
    }
}

impl Textarea {
    pub fn name(self, name: &str) -> Self {
        Self(self.0.attr("name", name))
    }
}

/// Heading of the given level, clamped to `h1`..`h6`.
pub struct H(Tag);

impl H {
    pub fn new(level: u8) -> Self {
        Self(Tag::new(format!("h{}", level.clamp(1, 6))))
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        Self(self.0.id(id))
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        Self(self.0.class(class))
    }

    pub fn content(self, content: impl Component + 'static) -> Self {
        Self(self.0.content(content))
    }
}

impl Component for H {
    fn compile(&self, page: &Page) -> Result<Element, Error> {
        self.0.compile(page)
    }
}
