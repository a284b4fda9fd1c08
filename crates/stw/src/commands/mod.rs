pub mod build;
pub mod init;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use stw_static::{load_config, OsFileSystem, Site};

/// Where the site sources live.
#[derive(Args, Debug, Clone)]
pub struct SiteArgs {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    pub config: PathBuf,

    /// Page sources directory
    #[arg(long, default_value = "pages", global = true)]
    pub pages: PathBuf,

    /// Templates directory
    #[arg(long, default_value = "templates", global = true)]
    pub templates: PathBuf,

    /// Static assets directory
    #[arg(long, default_value = "assets", global = true)]
    pub assets: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "dist", global = true)]
    pub output: PathBuf,
}

impl SiteArgs {
    /// Site described by these arguments, with its config loaded.
    pub fn load(&self, auto_reload: bool) -> Result<Site> {
        let config = load_config(&OsFileSystem, &self.config)
            .with_context(|| format!("Failed to load {}", self.config.display()))?;

        Ok(Site {
            pages_dir: self.pages.clone(),
            templates_dir: self.templates.clone(),
            assets_dir: self.assets.clone(),
            output_dir: self.output.clone(),
            auto_reload,
            config,
            config_path: self.config.clone(),
        })
    }
}
