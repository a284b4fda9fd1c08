//! Development server command.

use anyhow::Result;
use stw_server::{DevServer, DevServerConfig};
use stw_static::SiteBuilder;

use super::SiteArgs;

/// Run the dev server until it fails or Ctrl-C is pressed.
pub async fn run(args: &SiteArgs, host: String, port: u16, watch: bool, open: bool) -> Result<()> {
    let site = args.load(watch)?;

    if watch {
        tracing::info!("Watching for changes");
    }

    let config = DevServerConfig { host, port, open };
    let server = DevServer::new(config, SiteBuilder::with_os(site));

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            shutdown.cancel();
        }
    });

    server.serve().await?;

    Ok(())
}
