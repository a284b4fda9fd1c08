//! Site layout and configuration.

use std::path::{Path, PathBuf};

use stw_meta::{Value, ValueError};

use crate::fs::FileSystem;

/// File name that turns a directory into a page.
pub const INDEX_FILE: &str = "index.html";

/// Layout template every page is rendered through.
pub const BASE_TEMPLATE: &str = "base.html";

/// Partial templates composed with the base layout, relative to the
/// templates directory.
pub const HEAD_TEMPLATE: &str = "components/head.html";
pub const HEADER_TEMPLATE: &str = "components/header.html";
pub const FOOTER_TEMPLATE: &str = "components/footer.html";

/// Every template source loaded for a build, base layout first.
pub const TEMPLATE_FILES: [&str; 4] = [
    BASE_TEMPLATE,
    HEADER_TEMPLATE,
    FOOTER_TEMPLATE,
    HEAD_TEMPLATE,
];

/// Directory under the output root that receives the asset tree.
pub const ASSETS_OUTPUT_DIR: &str = "assets";

/// Errors that can occur when loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: ValueError },
}

/// Directories and configuration of the site being built.
#[derive(Debug, Clone)]
pub struct Site {
    /// Page sources; every `index.html` below becomes a page
    pub pages_dir: PathBuf,

    /// Base layout and partials
    pub templates_dir: PathBuf,

    /// Static files copied to `<output>/assets`
    pub assets_dir: PathBuf,

    /// Build output, wiped on every build
    pub output_dir: PathBuf,

    /// Serve mode with live reload
    pub auto_reload: bool,

    /// Configuration document handed to templates
    pub config: Value,

    /// Where `config` was read from
    pub config_path: PathBuf,
}

impl Default for Site {
    fn default() -> Self {
        Self::new("")
    }
}

impl Site {
    /// Conventional layout rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            pages_dir: root.join("pages"),
            templates_dir: root.join("templates"),
            assets_dir: root.join("assets"),
            output_dir: root.join("dist"),
            auto_reload: false,
            config: Value::empty_map(),
            config_path: root.join("config.yaml"),
        }
    }

    /// Re-read the configuration file, replacing the current document.
    ///
    /// On error the current document is kept.
    pub fn reload_config(&mut self, fs: &dyn FileSystem) -> Result<(), ConfigError> {
        self.config = load_config(fs, &self.config_path)?;
        Ok(())
    }

    /// Whether `path` is the configuration file.
    ///
    /// Works for paths that no longer exist, such as a removed config file.
    pub fn is_config_file(&self, path: &Path) -> bool {
        let (path, config) = (absolute(path), absolute(&self.config_path));
        path == config
            || (path.file_name() == config.file_name() && same_file(&path, &config))
    }

    /// Whether a change to `path` affects the build: the config file or
    /// anything below the page, template or asset directories.
    pub fn is_source(&self, path: &Path) -> bool {
        if self.is_config_file(path) {
            return true;
        }

        let path = absolute(path);
        [&self.pages_dir, &self.templates_dir, &self.assets_dir]
            .iter()
            .any(|dir| path.starts_with(absolute(dir)))
    }
}

/// `path` made absolute against the working directory, `.` removed.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

// Catches symlinked spellings of the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Load the YAML configuration document at `path`.
///
/// A missing file yields an empty document.
pub fn load_config(fs: &dyn FileSystem, path: &Path) -> Result<Value, ConfigError> {
    if !fs.exists(path) {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(Value::empty_map());
    }

    let source = fs.read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Value::from_yaml_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
