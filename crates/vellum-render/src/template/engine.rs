//! Template compiler abstraction.
//!
//! This module defines the two traits the [`Registry`](crate::Registry) talks
//! to: [`TemplateCompiler`], which turns a page source and the shared layout
//! into an executable artifact, and [`CompiledTemplate`], the artifact itself.
//! The default implementation is [`MiniJinjaCompiler`].
//!
//! Keeping the compiler behind a trait means the registry never sees the
//! templating language. Tests inject an in-memory compiler, and applications
//! can plug in another engine without touching the registry.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use minijinja::{Environment, UndefinedBehavior, Value};

use crate::error::TemplateError;

/// Compiles one template source jointly with the shared layout.
///
/// Implementations must be usable from several threads at once; the registry
/// calls [`compile`](Self::compile) once per configured template on every
/// [`Registry::init`](crate::Registry::init).
pub trait TemplateCompiler: Send + Sync {
    /// Compiles `source` together with `layout` into an immutable artifact.
    fn compile(
        &self,
        source: &Path,
        layout: &Path,
    ) -> Result<Box<dyn CompiledTemplate>, TemplateError>;
}

/// An immutable, executable template artifact.
///
/// Artifacts are shared between concurrent renders, so execution takes `&self`
/// and must not mutate the artifact.
pub trait CompiledTemplate: Send + Sync {
    /// Executes `sub_template` against `data`, streaming output into `out`.
    ///
    /// Output written before a failure stays written.
    ///
    /// `data` has already passed through [`serde_json::Value`], so it carries
    /// JSON's limits: non-finite floats arrive as `null`, and integers outside
    /// the `i64`/`u64` range cannot be represented.
    fn execute(
        &self,
        sub_template: &str,
        data: &serde_json::Value,
        out: &mut dyn io::Write,
    ) -> Result<(), TemplateError>;

    /// Names of the templates bundled in this artifact.
    fn template_names(&self) -> Vec<String>;
}

/// Tuning knobs for [`MiniJinjaCompiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Fail the render when a template touches a value missing from the data.
    ///
    /// Defaults to `true` so that data-shape mismatches surface as render
    /// errors instead of silently producing empty output.
    pub strict_undefined: bool,
    /// Remove the first newline after a block tag.
    pub trim_blocks: bool,
    /// Strip leading whitespace before a block tag.
    pub lstrip_blocks: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            strict_undefined: true,
            trim_blocks: false,
            lstrip_blocks: false,
        }
    }
}

type SetupFn = Arc<dyn Fn(&mut Environment<'static>) + Send + Sync>;

/// MiniJinja-based template compiler.
///
/// Every artifact gets its own [`Environment`] holding exactly two templates,
/// registered under their file names: the layout (e.g. `layout.html`) and the
/// page (e.g. `home.html`). Pages compose with the layout through regular
/// inheritance:
///
/// ```jinja
/// {# layout.html #}
/// {% block base %}<html><body>{% block content %}{% endblock %}</body></html>{% endblock %}
///
/// {# home.html #}
/// {% extends "layout.html" %}
/// {% block content %}<h1>{{ title }}</h1>{% endblock %}
/// ```
///
/// # Sub-template resolution
///
/// When executed, the sub-template name is resolved in this order:
///
/// 1. A template of the artifact with that exact name (`"home.html"`,
///    `"layout.html"`) is rendered in full.
/// 2. Otherwise the page is evaluated and the block with that name is
///    rendered. With the layout above, `"base"` renders the whole document
///    and `"content"` renders only the page body.
///
/// Auto-escaping follows MiniJinja's defaults, which key off the template
/// file extension (`.html`, `.htm` and `.xml` are HTML-escaped).
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use vellum_render::{MiniJinjaCompiler, TemplateCompiler};
///
/// let compiler = MiniJinjaCompiler::new();
/// let artifact = compiler
///     .compile(Path::new("views/home.html"), Path::new("views/layout.html"))
///     .unwrap();
///
/// let mut out = Vec::new();
/// artifact
///     .execute("base", &serde_json::json!({ "title": "Hi" }), &mut out)
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct MiniJinjaCompiler {
    options: CompilerOptions,
    setup: Option<SetupFn>,
}

impl MiniJinjaCompiler {
    /// Creates a compiler with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compiler with explicit options.
    pub fn with_options(options: CompilerOptions) -> Self {
        Self {
            options,
            setup: None,
        }
    }

    /// Registers a hook that runs on every artifact's environment.
    ///
    /// Use this to add custom filters, tests, functions or globals. The hook
    /// runs after the built-in filters are registered and before any template
    /// is added.
    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&mut Environment<'static>) + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(setup));
        self
    }

    /// Returns the compiler options.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn configure(&self, env: &mut Environment<'static>) {
        env.set_undefined_behavior(if self.options.strict_undefined {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });
        env.set_trim_blocks(self.options.trim_blocks);
        env.set_lstrip_blocks(self.options.lstrip_blocks);
        register_filters(env);
        if let Some(setup) = &self.setup {
            setup(env);
        }
    }
}

impl fmt::Debug for MiniJinjaCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaCompiler")
            .field("options", &self.options)
            .field("setup", &self.setup.is_some())
            .finish()
    }
}

impl TemplateCompiler for MiniJinjaCompiler {
    fn compile(
        &self,
        source: &Path,
        layout: &Path,
    ) -> Result<Box<dyn CompiledTemplate>, TemplateError> {
        let page_name = template_name(source);
        let layout_name = template_name(layout);
        if page_name == layout_name {
            return Err(TemplateError::NameCollision(page_name));
        }

        let page_source = read_source(source)?;
        let layout_source = read_source(layout)?;

        let mut env = Environment::new();
        self.configure(&mut env);
        env.add_template_owned(layout_name.clone(), layout_source)?;
        env.add_template_owned(page_name.clone(), page_source)?;

        Ok(Box::new(MiniJinjaTemplate {
            env,
            page: page_name,
            layout: layout_name,
        }))
    }
}

/// A page compiled together with the layout.
#[derive(Debug)]
pub struct MiniJinjaTemplate {
    env: Environment<'static>,
    page: String,
    layout: String,
}

impl MiniJinjaTemplate {
    /// Name the page is registered under.
    pub fn page_name(&self) -> &str {
        &self.page
    }

    /// Name the layout is registered under.
    pub fn layout_name(&self) -> &str {
        &self.layout
    }
}

impl CompiledTemplate for MiniJinjaTemplate {
    fn execute(
        &self,
        sub_template: &str,
        data: &serde_json::Value,
        out: &mut dyn io::Write,
    ) -> Result<(), TemplateError> {
        let ctx = Value::from_serialize(data);

        if let Ok(tmpl) = self.env.get_template(sub_template) {
            tmpl.render_captured_to(ctx, &mut *out)?;
            return Ok(());
        }

        // Evaluate the page for its block state only; the full output is discarded.
        let page = self.env.get_template(&self.page)?;
        let mut captured = page.render_captured_to(ctx, io::sink())?;
        captured.with_state_mut(|state| state.render_block_to_write(sub_template, &mut *out))?;
        Ok(())
    }

    fn template_names(&self) -> Vec<String> {
        vec![self.layout.clone(), self.page.clone()]
    }
}

/// Registers vellum's built-in filters with a MiniJinja environment.
///
/// This is called automatically for every artifact built by
/// [`MiniJinjaCompiler`].
pub fn register_filters(env: &mut Environment<'static>) {
    // Newline filter
    env.add_filter("nl", |value: Value| -> String { format!("{}\n", value) });
}

/// Template name for a source path: its file name, like `home.html`.
fn template_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn read_source(path: &Path) -> Result<String, TemplateError> {
    std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })
}
