//! Template Sources
//!
//! The compute HLMS opens template and piece files by logical name through a
//! [`ResourceProvider`]. Three providers are available:
//!
//! | Provider | Source |
//! |----------|--------|
//! | [`MemoryProvider`]    | An in-memory name → text map |
//! | [`DirectoryProvider`] | Files under a root directory |
//! | [`EmbeddedTemplates`] | The crate's built-in `templates/` folder |

use std::io;
use std::path::PathBuf;

use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;

use crate::errors::{HlmsError, Result};

/// Opens template and piece files by logical name.
pub trait ResourceProvider {
    /// Returns the full text of `name`.
    fn open(&self, name: &str) -> Result<String>;

    fn exists(&self, name: &str) -> bool {
        self.open(name).is_ok()
    }
}

// ─── MemoryProvider ──────────────────────────────────────────────────────────

/// Templates held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    files: FxHashMap<String, String>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(name.into(), text.into());
    }
}

impl ResourceProvider for MemoryProvider {
    fn open(&self, name: &str) -> Result<String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| HlmsError::TemplateNotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

// ─── DirectoryProvider ───────────────────────────────────────────────────────

/// Templates read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceProvider for DirectoryProvider {
    fn open(&self, name: &str) -> Result<String> {
        match std::fs::read_to_string(self.root.join(name)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(HlmsError::TemplateNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

// ─── EmbeddedTemplates ───────────────────────────────────────────────────────

#[derive(RustEmbed)]
#[folder = "templates"]
struct TemplateAssets;

/// The built-in templates compiled into the crate.
///
/// Debug builds read `templates/` from disk first so templates can be edited
/// without rebuilding.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl ResourceProvider for EmbeddedTemplates {
    fn open(&self, name: &str) -> Result<String> {
        #[cfg(all(debug_assertions, not(target_arch = "wasm32")))]
        {
            let path = std::path::Path::new("templates").join(name);
            if path.is_file() {
                return Ok(std::fs::read_to_string(&path)?);
            }
        }

        TemplateAssets::get(name)
            .and_then(|file| String::from_utf8(file.data.into_owned()).ok())
            .ok_or_else(|| HlmsError::TemplateNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_provider_lookup() {
        let provider = MemoryProvider::new().with("a.wgsl", "body");
        assert_eq!(provider.open("a.wgsl").unwrap(), "body");
        assert!(provider.exists("a.wgsl"));
        assert!(matches!(
            provider.open("b.wgsl"),
            Err(HlmsError::TemplateNotFound(name)) if name == "b.wgsl"
        ));
    }

    #[test]
    fn embedded_templates_are_available() {
        let text = EmbeddedTemplates.open("compute/prefix_sum.wgsl").unwrap();
        assert!(text.contains("@insertpiece"));
        assert!(!EmbeddedTemplates.exists("compute/missing.wgsl"));
    }

    #[test]
    fn directory_provider_reports_missing_files() {
        let provider = DirectoryProvider::new("templates");
        assert!(provider.exists("compute/prefix_sum.wgsl"));
        assert!(matches!(
            provider.open("nope.wgsl"),
            Err(HlmsError::TemplateNotFound(_))
        ));
    }
}
