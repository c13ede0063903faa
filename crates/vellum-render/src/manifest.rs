//! Template configuration: which names map to which source files.
//!
//! [`TemplateSources`] is the input of [`Registry::init`](crate::Registry::init):
//! one shared layout path plus a set of `name → path` pairs. It can be built in
//! code, loaded from a YAML or JSON manifest, or discovered from a directory.
//!
//! # Manifest format
//!
//! ```yaml
//! layout: layout.html
//! templates:
//!   home: home.html
//!   about: pages/about.html
//! ```
//!
//! Relative paths in a manifest loaded with [`TemplateSources::from_file`] are
//! resolved against the manifest's directory.
//!
//! # Directory discovery
//!
//! [`TemplateSources::discover`] walks a directory recursively and registers
//! every file with a recognised extension. Names are relative paths without
//! extension, using forward slashes:
//!
//! | File | Name |
//! |------|------|
//! | `views/home.html` | `home` |
//! | `views/blog/post.jinja` | `blog/post` |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Template file extensions recognised by [`TemplateSources::discover`].
pub const TEMPLATE_EXTENSIONS: &[&str] = &[".html", ".htm", ".jinja", ".j2", ".tmpl"];

/// Layout path plus the `name → path` pairs compiled against it.
///
/// Names are kept exactly as given: no extension stripping, no case folding.
/// Pairs are ordered by name, which is also the order [`Registry::init`]
/// compiles them in.
///
/// [`Registry::init`]: crate::Registry::init
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSources {
    layout: PathBuf,
    #[serde(default)]
    templates: BTreeMap<String, PathBuf>,
}

impl TemplateSources {
    /// Creates an empty configuration using `layout` as the shared layout.
    pub fn new(layout: impl Into<PathBuf>) -> Self {
        Self {
            layout: layout.into(),
            templates: BTreeMap::new(),
        }
    }

    /// Adds a template, replacing any previous path for the same name.
    pub fn add(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(name, path);
        self
    }

    /// Inserts a template, returning the path it replaced.
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Option<PathBuf> {
        self.templates.insert(name.into(), path.into())
    }

    /// The shared layout path.
    pub fn layout(&self) -> &Path {
        &self.layout
    }

    /// The configured templates, ordered by name.
    pub fn templates(&self) -> &BTreeMap<String, PathBuf> {
        &self.templates
    }

    /// Number of configured templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if no template is configured.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Parses a YAML manifest.
    pub fn from_yaml(yaml: &str) -> Result<Self, ManifestError> {
        serde_yaml::from_str(yaml).map_err(|e| ManifestError::Parse {
            path: None,
            message: e.to_string(),
        })
    }

    /// Parses a JSON manifest.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::Parse {
            path: None,
            message: e.to_string(),
        })
    }

    /// Loads a manifest file, choosing the format by extension.
    ///
    /// `.yaml` and `.yml` are parsed as YAML, `.json` as JSON. Relative paths
    /// inside the manifest are resolved against the manifest's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|ext| ext.to_str());
        let parsed = match extension {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            _ => return Err(ManifestError::UnsupportedFormat(path.to_path_buf())),
        };

        let sources = parsed.map_err(|err| match err {
            ManifestError::Parse { message, .. } => ManifestError::Parse {
                path: Some(path.to_path_buf()),
                message,
            },
            other => other,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(sources.relative_to(base))
    }

    /// Resolves relative layout and template paths against `base`.
    ///
    /// Absolute paths are left untouched.
    pub fn relative_to(self, base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            layout: base.join(&self.layout),
            templates: self
                .templates
                .into_iter()
                .map(|(name, path)| (name, base.join(path)))
                .collect(),
        }
    }

    /// Builds a configuration from every template file under `dir`.
    ///
    /// Files are recognised by [`TEMPLATE_EXTENSIONS`]. The layout file is
    /// skipped if it lives inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if the directory cannot be read and
    /// [`ManifestError::Duplicate`] if two files map to the same name (for
    /// example `home.html` and `home.htm`).
    pub fn discover(dir: impl AsRef<Path>, layout: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let dir = dir.as_ref();
        let root = dir.canonicalize().map_err(|source| ManifestError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut sources = Self::new(layout);
        let skip = sources.layout.canonicalize().ok();

        let mut files = Vec::new();
        walk_dir(&root, &mut files)?;
        files.sort();

        for path in files {
            if skip.as_ref() == Some(&path) {
                continue;
            }
            let Some(name) = template_name(&path, &root) else {
                continue;
            };
            if let Some(first) = sources.templates.get(&name) {
                return Err(ManifestError::Duplicate {
                    name,
                    first: first.clone(),
                    second: path,
                });
            }
            sources.templates.insert(name, path);
        }

        tracing::debug!(dir = %dir.display(), count = sources.len(), "discovered templates");
        Ok(sources)
    }
}

/// Collects every regular file under `current`.
fn walk_dir(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ManifestError> {
    let io_error = |source| ManifestError::Io {
        path: current.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(current).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            walk_dir(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// Relative name without extension, or `None` for unrecognised files.
fn template_name(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.to_string_lossy();
    let relative = relative.replace(std::path::MAIN_SEPARATOR, "/");
    let extension = TEMPLATE_EXTENSIONS
        .iter()
        .find(|ext| relative.ends_with(*ext))?;
    relative.strip_suffix(extension).map(str::to_string)
}
