//! Compiled-template registry and render dispatch.
//!
//! This module provides the core of the crate: a load-once, read-many cache of
//! templates compiled with a shared layout, and the render path that serves
//! them to concurrent requests.
//!
//! ## Compile Once, Render Many
//!
//! [`Registry::init`] reads and compiles every configured template together
//! with the layout, then installs the whole set at once. Each request then
//! calls [`Registry::render`], which looks up the compiled artifact and
//! executes one of its sub-templates against the request data:
//!
//! ```rust,ignore
//! let registry = Registry::new();
//! registry.init(&TemplateSources::discover("./views", "./views/layout.html")?)?;
//!
//! // In a request handler
//! registry.render(&mut response, "home", "base", &page);
//! ```
//!
//! ## Key Types
//!
//! - [`Registry`]: The shared cache, its lock, `init` and `render`
//! - [`TemplateCompiler`] / [`CompiledTemplate`]: The seam to the template engine
//! - [`MiniJinjaCompiler`]: Default compiler, one MiniJinja environment per page
//!
//! ## See Also
//!
//! - [`crate::manifest`]: Building the `init` configuration
//! - [`crate::sink`]: Response sinks renders stream into

pub mod engine;
pub mod registry;
mod renderer;

pub use engine::{
    register_filters, CompiledTemplate, CompilerOptions, MiniJinjaCompiler, MiniJinjaTemplate,
    TemplateCompiler,
};
pub use registry::{Registry, RegistryState};
