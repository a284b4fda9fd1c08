//! stw CLI - static web generator with a live-reloading dev server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::SiteArgs;

#[derive(Parser)]
#[command(name = "stw")]
#[command(about = "Static web generator")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    site: SiteArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the static site
    Build,

    /// Build and serve the static site
    Serve {
        /// Port to serve on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable rebuilding and reloading on file changes
        #[arg(long)]
        no_watch: bool,

        /// Open the site in a browser
        #[arg(long)]
        open: bool,
    },

    /// Scaffold a new site
    Init {
        /// Directory to create the site in
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    // Execute command
    match cli.command {
        Commands::Build => {
            commands::build::run(&cli.site)?;
        }
        Commands::Serve {
            port,
            host,
            no_watch,
            open,
        } => {
            commands::serve::run(&cli.site, host, port, !no_watch, open).await?;
        }
        Commands::Init { dir, yes } => {
            commands::init::run(&dir, yes)?;
        }
    }

    Ok(())
}
