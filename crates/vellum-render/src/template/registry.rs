//! Load-once, read-many registry of compiled templates.
//!
//! This module provides [`Registry`], which owns the mapping from template name
//! to compiled artifact and the lock guarding it.
//!
//! # Design
//!
//! The active mapping is a single `Arc<Catalog>` behind an `RwLock`:
//!
//! 1. [`Registry::init`] compiles every configured template into a fresh
//!    catalog without holding the lock, then installs it with one pointer swap
//!    under the write lock.
//! 2. Renders take the read lock only long enough to clone the artifact's
//!    `Arc`, then execute with no lock held.
//!
//! Readers therefore see either the old catalog or the new one, never a
//! partially filled one, and a slow response sink cannot hold up other renders
//! or a re-initialization.
//!
//! # Lifecycle
//!
//! | From | Event | To |
//! |------|-------|----|
//! | Uninitialized | successful `init` | Ready |
//! | Ready | successful `init` | Ready (contents replaced) |
//! | any | failed `init` | unchanged |
//!
//! Rendering while Uninitialized is a lookup miss, reported like any other
//! unknown name.
//!
//! # Example
//!
//! ```rust,no_run
//! use vellum_render::{Registry, TemplateSources};
//!
//! let registry = Registry::new();
//! registry
//!     .init(&TemplateSources::new("views/layout.html").add("home", "views/home.html"))
//!     .unwrap();
//! assert!(registry.contains("home"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::engine::{CompiledTemplate, MiniJinjaCompiler, TemplateCompiler};
use crate::error::CompileError;
use crate::manifest::TemplateSources;

/// Name → artifact mapping installed by one successful `init`.
pub(crate) type Catalog = HashMap<String, Arc<dyn CompiledTemplate>>;

/// Lifecycle state of a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No `init` has succeeded yet.
    Uninitialized,
    /// A catalog is installed (possibly empty).
    Ready,
}

/// A shared cache of templates compiled with a common layout.
///
/// Create one per application (or per test), share it between request
/// handlers with an `Arc<Registry>`, call [`init`](Self::init) before serving
/// and [`render`](Self::render) from each request.
///
/// # Thread Safety
///
/// `Registry` is `Send + Sync`. Any number of renders run in parallel; `init`
/// calls are serialised with each other but never block renders for longer
/// than a pointer swap.
pub struct Registry {
    compiler: Box<dyn TemplateCompiler>,
    /// The active catalog; `None` until the first successful init.
    active: RwLock<Option<Arc<Catalog>>>,
    /// Serialises concurrent `init` calls.
    init_lock: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an uninitialized registry backed by [`MiniJinjaCompiler`].
    pub fn new() -> Self {
        Self::with_compiler(Box::new(MiniJinjaCompiler::new()))
    }

    /// Creates an uninitialized registry with an explicit template compiler.
    ///
    /// This allows injecting a custom compiler implementation.
    pub fn with_compiler(compiler: Box<dyn TemplateCompiler>) -> Self {
        Self {
            compiler,
            active: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Compiles every configured template with the layout and installs the result.
    ///
    /// Templates are compiled in name order. The first failure aborts the call
    /// and nothing is installed: the previously active catalog, if any, keeps
    /// serving. On success the active catalog is replaced (not merged) by one
    /// containing exactly the configured names.
    ///
    /// An empty `sources` yields an empty, Ready registry.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] naming the first template that failed.
    pub fn init(&self, sources: &TemplateSources) -> Result<(), CompileError> {
        self.init_with(sources.templates(), sources.layout())
    }

    /// Same as [`init`](Self::init), taking `(name, path)` pairs directly.
    ///
    /// Pairs are compiled in the order given. If a name repeats, the last pair
    /// wins.
    pub fn init_with<I, N, P>(&self, templates: I, layout: impl AsRef<Path>) -> Result<(), CompileError>
    where
        I: IntoIterator<Item = (N, P)>,
        N: AsRef<str>,
        P: AsRef<Path>,
    {
        let _serialised = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let layout = layout.as_ref();

        let mut catalog = Catalog::new();
        for (name, path) in templates {
            let (name, path) = (name.as_ref(), path.as_ref());
            match self.compiler.compile(path, layout) {
                Ok(artifact) => {
                    tracing::debug!(template = name, path = %path.display(), "compiled template");
                    catalog.insert(name.to_string(), Arc::from(artifact));
                }
                Err(source) => {
                    tracing::warn!(
                        template = name,
                        path = %path.display(),
                        error = %source,
                        "template compilation failed, keeping previous templates"
                    );
                    return Err(CompileError {
                        name: name.to_string(),
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }

        let count = catalog.len();
        let replaced = self.swap(Some(Arc::new(catalog)));
        // The old artifacts are freed here, outside the write lock.
        drop(replaced);
        tracing::info!(count, layout = %layout.display(), "template registry initialized");
        Ok(())
    }

    /// Installs `next` and returns the catalog it replaced.
    ///
    /// The write lock covers only the pointer exchange.
    fn swap(&self, next: Option<Arc<Catalog>>) -> Option<Arc<Catalog>> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *active, next)
    }

    /// Returns a snapshot of the active catalog.
    fn snapshot(&self) -> Option<Arc<Catalog>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Looks up the artifact compiled under `name`.
    ///
    /// The read lock is released before this returns; the caller holds only a
    /// reference to the immutable artifact.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CompiledTemplate>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|catalog| catalog.get(name).cloned())
    }

    /// Returns `true` if `name` resolves in the active catalog.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> RegistryState {
        if self.is_initialized() {
            RegistryState::Ready
        } else {
            RegistryState::Uninitialized
        }
    }

    /// Returns `true` once an `init` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Names in the active catalog, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .snapshot()
            .map(|catalog| catalog.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of templates in the active catalog.
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |catalog| catalog.len())
    }

    /// Returns `true` if no template resolves.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("state", &self.state())
            .field("templates", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;
    use crate::sink::BufferedResponse;
    use http::StatusCode;
    use std::io;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::{OnceLock, Weak};
    use tracing_test::traced_test;

    /// Compiler that "compiles" a path unless it contains `bad`.
    struct PathCompiler;

    struct Echo(String);

    impl CompiledTemplate for Echo {
        fn execute(
            &self,
            sub_template: &str,
            _data: &serde_json::Value,
            out: &mut dyn io::Write,
        ) -> Result<(), TemplateError> {
            write!(out, "{}:{}", self.0, sub_template)
                .map_err(|e| TemplateError::Write(e.to_string()))
        }

        fn template_names(&self) -> Vec<String> {
            vec![self.0.clone()]
        }
    }

    impl TemplateCompiler for PathCompiler {
        fn compile(
            &self,
            source: &Path,
            _layout: &Path,
        ) -> Result<Box<dyn CompiledTemplate>, TemplateError> {
            let source = source.to_string_lossy().into_owned();
            if source.contains("panic") {
                panic!("compiler crashed on {source}");
            }
            if source.contains("bad") {
                Err(TemplateError::Syntax(format!("cannot parse {source}")))
            } else {
                Ok(Box::new(Echo(source)))
            }
        }
    }

    fn registry() -> Registry {
        Registry::with_compiler(Box::new(PathCompiler))
    }

    #[test]
    fn test_new_registry_is_uninitialized() {
        let registry = registry();
        assert_eq!(registry.state(), RegistryState::Uninitialized);
        assert!(!registry.is_initialized());
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
        assert!(registry.get("home").is_none());
    }

    #[test]
    fn test_init_installs_exact_names() {
        let registry = registry();
        registry
            .init_with([("home", "home.html"), ("about", "about.html")], "layout.html")
            .unwrap();

        assert_eq!(registry.state(), RegistryState::Ready);
        assert_eq!(registry.names(), vec!["about", "home"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("home"));
        assert!(!registry.contains("Home"));
        assert!(!registry.contains("home.html"));
    }

    #[test]
    fn test_init_empty_is_ready() {
        let registry = registry();
        registry
            .init_with(Vec::<(String, String)>::new(), "layout.html")
            .unwrap();
        assert_eq!(registry.state(), RegistryState::Ready);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_first_init_stays_uninitialized() {
        let registry = registry();
        let err = registry
            .init_with([("home", "home.html"), ("broken", "bad.html")], "layout.html")
            .unwrap_err();

        assert_eq!(err.name(), "broken");
        assert_eq!(registry.state(), RegistryState::Uninitialized);
        assert!(!registry.contains("home"));
    }

    #[test]
    fn test_failed_reinit_keeps_previous_catalog() {
        let registry = registry();
        registry.init_with([("home", "home.html")], "layout.html").unwrap();

        let err = registry
            .init_with([("about", "about.html"), ("oops", "bad.html")], "layout.html")
            .unwrap_err();
        assert_eq!(err.name(), "oops");
        assert_eq!(registry.names(), vec!["home"]);
    }

    #[test]
    fn test_reinit_replaces_not_merges() {
        let registry = registry();
        registry.init_with([("home", "home.html")], "layout.html").unwrap();
        registry.init_with([("about", "about.html")], "layout.html").unwrap();
        assert_eq!(registry.names(), vec!["about"]);
    }

    #[test]
    fn test_init_from_sources() {
        let registry = registry();
        let sources = TemplateSources::new("layout.html")
            .add("home", "home.html")
            .add("contact", "contact.html");
        registry.init(&sources).unwrap();
        assert_eq!(registry.names(), vec!["contact", "home"]);
    }

    #[test]
    fn test_init_from_sources_reports_first_failure_in_name_order() {
        let registry = registry();
        let sources = TemplateSources::new("layout.html")
            .add("zeta", "bad_z.html")
            .add("alpha", "bad_a.html");
        let err = registry.init(&sources).unwrap_err();
        assert_eq!(err.name(), "alpha");
    }

    #[test]
    fn test_debug_lists_state_and_names() {
        let registry = registry();
        registry.init_with([("home", "home.html")], "layout.html").unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains("Ready"));
        assert!(debug.contains("home"));
    }

    #[traced_test]
    #[test]
    fn test_init_logs_outcome() {
        let registry = registry();
        registry.init_with([("home", "home.html")], "layout.html").unwrap();
        assert!(logs_contain("template registry initialized"));

        let _ = registry.init_with([("broken", "bad.html")], "layout.html");
        assert!(logs_contain("template compilation failed"));
    }

    #[test]
    fn test_panicking_compiler_does_not_wedge_registry() {
        let registry = registry();
        registry.init_with([("home", "home.html")], "layout.html").unwrap();

        let crashed = panic::catch_unwind(AssertUnwindSafe(|| {
            registry.init_with([("about", "panic.html")], "layout.html")
        }));
        assert!(crashed.is_err());
        assert!(registry.init_lock.is_poisoned());
        assert_eq!(registry.names(), vec!["home"]);

        let mut response = BufferedResponse::new();
        registry.render(&mut response, "home", "base", &serde_json::json!({}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_str(), "home.html:base");

        registry.init_with([("about", "about.html")], "layout.html").unwrap();
        assert_eq!(registry.names(), vec!["about"]);
    }

    /// Records, when dropped, whether the registry's lock was free.
    struct LockWitness {
        registry: Arc<OnceLock<Weak<Registry>>>,
        observed: Arc<Mutex<Vec<bool>>>,
    }

    impl CompiledTemplate for LockWitness {
        fn execute(
            &self,
            _sub_template: &str,
            _data: &serde_json::Value,
            _out: &mut dyn io::Write,
        ) -> Result<(), TemplateError> {
            Ok(())
        }

        fn template_names(&self) -> Vec<String> {
            Vec::new()
        }
    }

    impl Drop for LockWitness {
        fn drop(&mut self) {
            if let Some(registry) = self.registry.get().and_then(Weak::upgrade) {
                let unlocked = registry.active.try_read().is_ok();
                self.observed.lock().unwrap().push(unlocked);
            }
        }
    }

    struct WitnessCompiler {
        registry: Arc<OnceLock<Weak<Registry>>>,
        observed: Arc<Mutex<Vec<bool>>>,
    }

    impl TemplateCompiler for WitnessCompiler {
        fn compile(
            &self,
            _source: &Path,
            _layout: &Path,
        ) -> Result<Box<dyn CompiledTemplate>, TemplateError> {
            Ok(Box::new(LockWitness {
                registry: Arc::clone(&self.registry),
                observed: Arc::clone(&self.observed),
            }))
        }
    }

    #[test]
    fn test_replaced_catalog_is_freed_outside_write_lock() {
        let handle = Arc::new(OnceLock::new());
        let observed = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(Registry::with_compiler(Box::new(WitnessCompiler {
            registry: Arc::clone(&handle),
            observed: Arc::clone(&observed),
        })));
        handle.set(Arc::downgrade(&registry)).unwrap();

        registry
            .init_with([("home", "home.html"), ("about", "about.html")], "layout.html")
            .unwrap();
        registry.init_with([("contact", "contact.html")], "layout.html").unwrap();

        assert_eq!(*observed.lock().unwrap(), vec![true, true]);
    }
}
