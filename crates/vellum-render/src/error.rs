//! Error types for template compilation and rendering.
//!
//! Three layers of error exist, matching the three places things can go wrong:
//!
//! - [`TemplateError`]: the template compiler failed, either while compiling a
//!   source file or while executing a compiled artifact. It abstracts over the
//!   underlying engine so that MiniJinja's error type does not leak into the
//!   public API.
//! - [`CompileError`]: a bulk [`Registry::init`](crate::Registry::init) failed.
//!   Names the offending template and wraps the [`TemplateError`].
//! - [`RenderError`]: a single render failed, either on lookup or execution.
//!
//! [`ManifestError`] covers loading a [`TemplateSources`](crate::TemplateSources)
//! configuration from disk.

use std::path::PathBuf;

/// Error produced by a [`TemplateCompiler`](crate::TemplateCompiler) or a
/// [`CompiledTemplate`](crate::CompiledTemplate).
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A template source file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Template syntax error.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The template referenced a value missing from the render data.
    #[error("undefined value: {0}")]
    Undefined(String),

    /// Render data could not be converted into a template value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The requested sub-template is neither a template nor a block of the artifact.
    #[error("unknown sub-template: {0}")]
    UnknownSubTemplate(String),

    /// Page and layout resolve to the same template name.
    #[error("page and layout share the template name '{0}'")]
    NameCollision(String),

    /// Writing rendered output to the sink failed.
    #[error("write failed: {0}")]
    Write(String),

    /// Any other engine failure.
    #[error("{0}")]
    Engine(String),
}

// Conversion from minijinja::Error keeps engine error kinds out of the public API
impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::SyntaxError | ErrorKind::BadEscape => TemplateError::Syntax(err.to_string()),
            ErrorKind::UndefinedError => TemplateError::Undefined(err.to_string()),
            ErrorKind::BadSerialization => TemplateError::Serialization(err.to_string()),
            ErrorKind::UnknownBlock | ErrorKind::TemplateNotFound => {
                TemplateError::UnknownSubTemplate(err.to_string())
            }
            ErrorKind::WriteFailure => TemplateError::Write(err.to_string()),
            _ => TemplateError::Engine(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TemplateError {
    fn from(err: serde_json::Error) -> Self {
        TemplateError::Serialization(err.to_string())
    }
}

/// A bulk [`Registry::init`](crate::Registry::init) failed.
///
/// Carries the configured name of the first template that failed, the source
/// path it was compiled from, and the compiler's error. When this is returned
/// the registry still serves whatever mapping was active before the call.
#[derive(Debug, thiserror::Error)]
#[error("failed to compile template '{name}' ({}): {source}", .path.display())]
pub struct CompileError {
    /// The caller-supplied template name.
    pub name: String,
    /// The template source path.
    pub path: PathBuf,
    /// The underlying compiler error.
    #[source]
    pub source: TemplateError,
}

impl CompileError {
    /// Returns the name of the template that failed to compile.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A single render failed.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The name is absent from the active mapping, or the registry was never
    /// initialized.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The compiled artifact failed while executing.
    #[error("failed to render '{sub_template}' of template '{template}': {source}")]
    Execution {
        template: String,
        sub_template: String,
        #[source]
        source: TemplateError,
    },
}

impl RenderError {
    /// Message written to the response when this error is reported.
    ///
    /// Lookup misses get a fixed message that does not echo the requested
    /// name back to the client.
    pub fn public_message(&self) -> String {
        match self {
            RenderError::TemplateNotFound(_) => "Template not found".to_string(),
            RenderError::Execution { source, .. } => source.to_string(),
        }
    }
}

/// Loading a [`TemplateSources`](crate::TemplateSources) manifest failed.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest or template directory could not be read.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The manifest content is not valid YAML or JSON of the expected shape.
    #[error("invalid manifest: {message}")]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },

    /// The manifest file extension is not one of the supported formats.
    #[error("unsupported manifest format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Directory discovery produced the same template name twice.
    #[error("template name '{name}' is provided by both {} and {}", .first.display(), .second.display())]
    Duplicate {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}
