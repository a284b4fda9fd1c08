//! Static site build command.

use anyhow::Result;
use stw_static::SiteBuilder;

use super::SiteArgs;

/// Run the build command.
pub fn run(args: &SiteArgs) -> Result<()> {
    tracing::info!("Building static site...");

    let site = args.load(false)?;
    let result = SiteBuilder::with_os(site).build()?;

    tracing::info!(
        "Built {} pages and {} assets in {}ms",
        result.pages,
        result.assets,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
