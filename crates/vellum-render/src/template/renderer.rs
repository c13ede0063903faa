//! Render dispatch.
//!
//! Looks a template up by name in the [`Registry`] and executes one of its
//! sub-templates against request data, streaming into a response.
//!
//! Two entry points share the same dispatch:
//!
//! | Method | Failure handling |
//! |--------|------------------|
//! | [`Registry::render`] | Reported on the [`ResponseSink`] as `500`, never returned |
//! | [`Registry::try_render`] | Returned as a [`RenderError`] for the caller to handle |
//!
//! In both cases the registry lock is only held for the lookup. Execution and
//! output I/O happen with no lock held.

use std::io;

use http::StatusCode;
use serde::Serialize;

use super::registry::Registry;
use crate::error::{RenderError, TemplateError};
use crate::sink::ResponseSink;

impl Registry {
    /// Renders `sub_template` of template `name` against `data` into `sink`.
    ///
    /// Failures never propagate. A missing template (including an
    /// uninitialized registry) is reported as `500` with the message
    /// `Template not found`; an execution failure is reported as `500` with
    /// the error message. Bytes written before an execution failure stay
    /// written.
    ///
    /// `data` is converted to a [`serde_json::Value`] first. `NaN` and
    /// infinite floats render as `null`; `i128`/`u128` values beyond the 64-bit
    /// range fail the render with a serialization error.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use vellum_render::{BufferedResponse, Registry, TemplateSources};
    ///
    /// let registry = Registry::new();
    /// registry
    ///     .init(&TemplateSources::new("views/layout.html").add("home", "views/home.html"))
    ///     .unwrap();
    ///
    /// let mut response = BufferedResponse::new();
    /// registry.render(&mut response, "home", "base", &serde_json::json!({ "title": "Hi" }));
    /// ```
    pub fn render<S, T>(&self, sink: &mut S, name: &str, sub_template: &str, data: &T)
    where
        S: ResponseSink + ?Sized,
        T: Serialize + ?Sized,
    {
        let Err(err) = self.try_render(&mut *sink, name, sub_template, data) else {
            return;
        };

        match &err {
            RenderError::TemplateNotFound(_) => {
                tracing::warn!(template = name, sub_template, "template not found");
            }
            RenderError::Execution { source, .. } => {
                tracing::error!(template = name, sub_template, error = %source, "template render failed");
            }
        }
        sink.report_error(StatusCode::INTERNAL_SERVER_ERROR, &err.public_message());
    }

    /// Renders like [`render`](Self::render) but returns failures instead of
    /// reporting them.
    ///
    /// Output may already have been written to `out` when an
    /// [`RenderError::Execution`] is returned.
    ///
    /// # Errors
    ///
    /// - [`RenderError::TemplateNotFound`] if `name` is not in the active catalog
    /// - [`RenderError::Execution`] if serialising `data` or executing the
    ///   template fails
    pub fn try_render<W, T>(
        &self,
        out: &mut W,
        name: &str,
        sub_template: &str,
        data: &T,
    ) -> Result<(), RenderError>
    where
        W: io::Write + ?Sized,
        T: Serialize + ?Sized,
    {
        // The read lock is released inside `get`.
        let template = self
            .get(name)
            .ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;

        let execution_error = |source: TemplateError| RenderError::Execution {
            template: name.to_string(),
            sub_template: sub_template.to_string(),
            source,
        };

        let value = serde_json::to_value(data).map_err(|e| execution_error(e.into()))?;
        template
            .execute(sub_template, &value, &mut &mut *out)
            .map_err(execution_error)?;

        tracing::trace!(template = name, sub_template, "rendered template");
        Ok(())
    }
}
