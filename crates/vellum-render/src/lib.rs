//! # Vellum Render - Layout Template Registry
//!
//! `vellum-render` keeps a set of page templates, each compiled together with
//! a shared layout, in memory for the life of a web process, and renders them
//! into HTTP responses from any number of request handlers at once.
//!
//! Template source is parsed once at startup instead of on every response, and
//! request handlers read the compiled set through a lock that is held only for
//! the lookup.
//!
//! ## Core Concepts
//!
//! - [`Registry`]: Owns the compiled templates; `init` once, `render` per request
//! - [`TemplateSources`]: Which template names map to which files, plus the layout
//! - [`ResponseSink`]: Where rendered bytes and render failures go
//! - [`TemplateCompiler`]: The engine seam; [`MiniJinjaCompiler`] by default
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::Serialize;
//! use vellum_render::{BufferedResponse, Registry, TemplateSources};
//!
//! #[derive(Serialize)]
//! struct Page {
//!     title: String,
//! }
//!
//! let registry = Registry::new();
//! registry
//!     .init(
//!         &TemplateSources::new("views/layout.html")
//!             .add("home", "views/home.html")
//!             .add("about", "views/about.html"),
//!     )
//!     .expect("templates compile");
//!
//! let mut response = BufferedResponse::new();
//! registry.render(&mut response, "home", "base", &Page { title: "Hi".into() });
//! ```
//!
//! ## Failure Handling
//!
//! - `init` is all-or-nothing. If any template fails to compile it returns a
//!   [`CompileError`] naming that template, and the previously installed set
//!   keeps serving.
//! - `render` never fails the caller. Unknown names (including renders before
//!   the first `init`) and execution errors are reported on the sink with a
//!   `500` status. Bytes already written are not retracted.
//! - [`Registry::try_render`] returns a [`RenderError`] instead, for handlers
//!   that want to build their own error response.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (`init` results, lookup misses, render
//! failures) and leaves subscriber setup to the application.

pub mod error;
pub mod manifest;
pub mod sink;
pub mod template;

pub use error::{CompileError, ManifestError, RenderError, TemplateError};
pub use manifest::{TemplateSources, TEMPLATE_EXTENSIONS};
pub use sink::{BufferedResponse, ResponseSink};
pub use template::{
    register_filters, CompiledTemplate, CompilerOptions, MiniJinjaCompiler, MiniJinjaTemplate,
    Registry, RegistryState, TemplateCompiler,
};
