//! Development server with live reload for stw sites.
//!
//! Serves the built output directory, watches the site sources and pushes a
//! reload event to connected browsers after every successful rebuild.

pub mod registry;
pub mod server;
pub mod watcher;

pub use registry::{ClientId, ClientRegistry, Subscription, RELOAD_MESSAGE};
pub use server::{DevServer, DevServerConfig, RebuildOutcome, Rebuilder, ServerError, RELOAD_ROUTE};
pub use watcher::{Change, ChangeKind, FileWatcher, WatchEvent};
