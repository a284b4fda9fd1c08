//! Static site builder for stw.
//!
//! Renders every `index.html` below the pages directory through a shared
//! base layout and mirrors the asset tree into the output directory.

pub mod assets;
pub mod builder;
pub mod fs;
pub mod page;
pub mod site;
pub mod templates;

pub use assets::{AssetError, AssetPipeline, CssProcessor};
pub use builder::{BuildError, BuildResult, SiteBuilder};
pub use fs::{Entry, FileSystem, MemoryFileSystem, OsFileSystem};
pub use page::{page_title, title_case, Page};
pub use site::{load_config, ConfigError, Site};
pub use templates::{JinjaRenderer, Renderer, TemplateError, TemplateSet, TemplateSource};
