//! Asset pipeline: mirrors the asset tree into the output directory.

use std::path::{Path, PathBuf};
use std::process::Command;

use stw_meta::Value;

use crate::fs::FileSystem;

/// Configuration key holding the CSS processor command line.
pub const CSS_COMMAND_KEY: &str = "css_command";

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Errors that can occur while copying or processing assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to copy {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} failed on {path} ({status}): {stderr}")]
    Failed {
        program: String,
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// External command run on every stylesheet instead of a plain copy.
///
/// `{input}` and `{output}` in the arguments are replaced by the source and
/// destination paths; without placeholders both paths are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssProcessor {
    pub program: String,
    pub args: Vec<String>,
}

impl CssProcessor {
    /// Read the processor from the `css_command` configuration key.
    ///
    /// The key holds either a list (program then arguments) or a single
    /// whitespace-separated string.
    pub fn from_config(config: &Value) -> Option<Self> {
        let words: Vec<String> = match config.get(CSS_COMMAND_KEY)? {
            Value::String(s) => s.split_whitespace().map(str::to_string).collect(),
            Value::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Integer(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            other => {
                tracing::warn!(
                    "Ignoring {}: expected a list or string, found {}",
                    CSS_COMMAND_KEY,
                    other.kind()
                );
                return None;
            }
        };

        let mut words = words.into_iter();
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    /// Arguments for processing `input` into `output`.
    fn arguments(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let output = output.display().to_string();

        let has_placeholder = self
            .args
            .iter()
            .any(|a| a.contains(INPUT_PLACEHOLDER) || a.contains(OUTPUT_PLACEHOLDER));

        if has_placeholder {
            self.args
                .iter()
                .map(|a| {
                    a.replace(INPUT_PLACEHOLDER, &input)
                        .replace(OUTPUT_PLACEHOLDER, &output)
                })
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(input);
            args.push(output);
            args
        }
    }

    /// Run the command. Its output is not interpreted beyond the exit status.
    pub fn run(&self, input: &Path, output: &Path) -> Result<(), AssetError> {
        tracing::debug!("Processing {} with {}", input.display(), self.program);

        let result = Command::new(&self.program)
            .args(self.arguments(input, output))
            .output()
            .map_err(|source| AssetError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(AssetError::Failed {
                program: self.program.clone(),
                path: input.to_path_buf(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Copies the asset tree, running stylesheets through an optional processor.
pub struct AssetPipeline<'a> {
    fs: &'a dyn FileSystem,
    css: Option<CssProcessor>,
}

impl<'a> AssetPipeline<'a> {
    pub fn new(fs: &'a dyn FileSystem, css: Option<CssProcessor>) -> Self {
        Self { fs, css }
    }

    /// Mirror `src` into `dst`. Returns the number of files written.
    ///
    /// A missing `src` copies nothing.
    pub fn copy_tree(&self, src: &Path, dst: &Path) -> Result<usize, AssetError> {
        if !self.fs.exists(src) {
            tracing::debug!("No assets directory at {}", src.display());
            return Ok(0);
        }

        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| AssetError::Io { path, source }
        };

        let entries = self.fs.walk(src).map_err(io_error(src))?;
        let mut copied = 0;

        for entry in entries {
            let relative = entry.path.strip_prefix(src).unwrap_or(&entry.path);
            let target = dst.join(relative);

            if entry.is_dir {
                self.fs.create_dir_all(&target).map_err(io_error(&target))?;
                continue;
            }

            match &self.css {
                Some(css) if is_stylesheet(&entry.path) => css.run(&entry.path, &target)?,
                _ => {
                    let bytes = self.fs.read(&entry.path).map_err(io_error(&entry.path))?;
                    self.fs.write(&target, &bytes).map_err(io_error(&target))?;
                }
            }
            copied += 1;
        }

        Ok(copied)
    }
}

fn is_stylesheet(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("css")
}
