//! Static site builder.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use stw_meta::{
    load_site_meta, merge, parse_front_matter, FrontmatterError, Meta, MetaError, ASSETS_URL,
};

use crate::assets::{AssetError, AssetPipeline, CssProcessor};
use crate::fs::{FileSystem, OsFileSystem};
use crate::page::{page_title, url_path, Page};
use crate::site::{
    ConfigError, Site, ASSETS_OUTPUT_DIR, BASE_TEMPLATE, INDEX_FILE, TEMPLATE_FILES,
};
use crate::templates::{
    config_value, JinjaRenderer, Renderer, TemplateError, TemplateSet, TemplateSource,
};

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages generated
    pub pages: usize,

    /// Number of asset files copied or processed
    pub assets: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to prepare output directory {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Pages directory not found: {0}")]
    PagesNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse front matter in {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        source: FrontmatterError,
    },

    #[error("Invalid metadata in {path}: {source}")]
    Meta { path: PathBuf, source: MetaError },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Failed to render {path}: {source}")]
    Page {
        path: PathBuf,
        source: TemplateError,
    },

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// A discovered page source.
#[derive(Debug)]
struct PageSource {
    /// Source file path
    source_path: PathBuf,

    /// Relative path from the pages directory
    relative_path: PathBuf,

    /// Output path
    output_path: PathBuf,
}

/// Static site builder.
///
/// Every call to [`SiteBuilder::build`] is a full rebuild: the output
/// directory is wiped, templates are recompiled and every page and asset is
/// written again.
pub struct SiteBuilder<F = OsFileSystem, R = JinjaRenderer> {
    site: Site,
    fs: F,
    renderer: R,
}

impl SiteBuilder {
    /// Builder for `site` on the real file system.
    pub fn with_os(site: Site) -> Self {
        Self::new(site, OsFileSystem, JinjaRenderer)
    }
}

impl<F: FileSystem, R: Renderer> SiteBuilder<F, R> {
    pub fn new(site: Site, fs: F, renderer: R) -> Self {
        Self { site, fs, renderer }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn site_mut(&mut self) -> &mut Site {
        &mut self.site
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Re-read the configuration file used by subsequent builds.
    pub fn reload_config(&mut self) -> Result<(), ConfigError> {
        self.site.reload_config(&self.fs)
    }

    /// Build the site.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let output_dir = &self.site.output_dir;

        self.reset_output()?;

        let site_meta = load_site_meta(&self.site.config);
        let templates = self.compose_templates()?;

        let pages = self.discover_pages()?;
        let config = config_value(&self.site.config);

        pages
            .par_iter()
            .map(|page| self.build_page(page, &templates, &site_meta, &config))
            .collect::<Result<Vec<()>, BuildError>>()?;

        let css = CssProcessor::from_config(&self.site.config);
        let assets = AssetPipeline::new(&self.fs, css)
            .copy_tree(&self.site.assets_dir, &output_dir.join(ASSETS_OUTPUT_DIR))?;

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: pages.len(),
            assets,
            duration_ms: duration.as_millis() as u64,
            output_dir: output_dir.clone(),
        })
    }

    /// Remove and recreate the output directory.
    fn reset_output(&self) -> Result<(), BuildError> {
        let path = &self.site.output_dir;
        let output_error = |source| BuildError::Output {
            path: path.clone(),
            source,
        };

        self.fs.remove_dir_all(path).map_err(output_error)?;
        self.fs.create_dir_all(path).map_err(output_error)
    }

    /// Read the base layout and partials and compile them together.
    fn compose_templates(&self) -> Result<R::Set, BuildError> {
        let sources = TEMPLATE_FILES
            .iter()
            .map(|name| -> Result<TemplateSource, BuildError> {
                let path = self.site.templates_dir.join(name);
                let source = self
                    .fs
                    .read_to_string(&path)
                    .map_err(|source| BuildError::Read { path, source })?;
                Ok(TemplateSource {
                    name: name.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.renderer.compose(sources)?)
    }

    /// Find every index file below the pages directory.
    fn discover_pages(&self) -> Result<Vec<PageSource>, BuildError> {
        let pages_dir = &self.site.pages_dir;

        if !self.fs.is_dir(pages_dir) {
            return Err(BuildError::PagesNotFound(pages_dir.clone()));
        }

        let entries = self.fs.walk(pages_dir).map_err(|source| BuildError::Read {
            path: pages_dir.clone(),
            source,
        })?;

        let pages = entries
            .into_iter()
            .filter(|entry| !entry.is_dir && entry.file_name() == INDEX_FILE)
            .map(|entry| {
                let relative_path = entry
                    .path
                    .strip_prefix(pages_dir)
                    .unwrap_or(&entry.path)
                    .to_path_buf();
                let output_path = self.site.output_dir.join(&relative_path);

                PageSource {
                    source_path: entry.path,
                    relative_path,
                    output_path,
                }
            })
            .collect();

        Ok(pages)
    }

    /// Render a single page and write it to the output tree.
    fn build_page(
        &self,
        page: &PageSource,
        templates: &R::Set,
        site_meta: &Meta,
        config: &minijinja::Value,
    ) -> Result<(), BuildError> {
        let source_path = &page.source_path;

        let raw = self
            .fs
            .read_to_string(source_path)
            .map_err(|source| BuildError::Read {
                path: source_path.clone(),
                source,
            })?;

        let (page_meta, body) =
            parse_front_matter(&raw).map_err(|source| BuildError::Frontmatter {
                path: source_path.clone(),
                source,
            })?;

        let meta = merge(site_meta, &page_meta);
        meta.validate(ASSETS_URL).map_err(|source| BuildError::Meta {
            path: source_path.clone(),
            source,
        })?;

        let mut context = Page {
            title: page_title(&page.relative_path),
            content: String::new(),
            path: url_path(&page.relative_path),
            is_dev: self.site.auto_reload,
            config: config.clone(),
            meta,
        };

        // Page bodies are templates too.
        context.content = self
            .renderer
            .render_str(&context.path, body, &context.body_context())
            .map_err(|source| BuildError::Page {
                path: source_path.clone(),
                source,
            })?;

        let mut html = Vec::new();
        templates
            .render_into(&mut html, BASE_TEMPLATE, &context.context())
            .map_err(|source| BuildError::Page {
                path: source_path.clone(),
                source,
            })?;

        self.write_output(&page.output_path, &html)?;

        tracing::debug!("Built {}", context.path);
        Ok(())
    }

    fn write_output(&self, path: &Path, contents: &[u8]) -> Result<(), BuildError> {
        let write_error = |source| BuildError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent).map_err(write_error)?;
        }
        self.fs.write(path, contents).map_err(write_error)
    }
}
