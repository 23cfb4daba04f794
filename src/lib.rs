//! Weft
//!
//! Server-rendered HTML components for htmx front ends:
//! - Components compile once into template text plus a route index
//! - Interactions wire triggers to swap targets across the tree
//! - Per-request conditions, values and loaders run through Handlebars helpers
//! - Server-Sent Events fan-out for live regions
//!
//! Build a tree, add it to a `Page`, and call `Page::build` to get an axum `Router`.

pub mod attributes;
pub mod component;
pub mod config;
pub mod element;
pub mod error;
pub mod generator;
pub mod handler;
pub mod interaction;
pub mod page;
pub mod reference;
pub mod sse;
pub mod template;

// Re-exports for convenience
pub use attributes::Attributes;
pub use component::Component;
pub use config::ServerConfig;
pub use element::Element;
pub use error::{Error, PathError, Validate};
pub use interaction::{Interaction, Swap, SwapMethod, Trigger};
pub use page::Page;
pub use reference::Reference;
pub use sse::{Multiplexer, SseEvent, Stream, StreamTarget};
pub use template::RequestData;
