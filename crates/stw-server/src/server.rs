//! Development server implementation.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use stw_static::{BuildError, FileSystem, JinjaRenderer, OsFileSystem, Renderer, SiteBuilder};

use crate::registry::{ClientRegistry, RELOAD_MESSAGE};
use crate::watcher::{Change, ChangeKind, FileWatcher, WatchEvent};

/// Route serving the live-reload event stream.
pub const RELOAD_ROUTE: &str = "/__reload";

/// Changes arriving this close together trigger a single rebuild.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            open: false,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Initial build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Development server.
///
/// Serves the output directory and, when the site has auto-reload enabled,
/// rebuilds on source changes and tells connected browsers to reload.
pub struct DevServer<F = OsFileSystem, R = JinjaRenderer> {
    config: DevServerConfig,
    builder: SiteBuilder<F, R>,
    registry: ClientRegistry,
    shutdown: CancellationToken,
}

impl<F, R> DevServer<F, R>
where
    F: FileSystem + 'static,
    R: Renderer + 'static,
{
    /// Create a new development server.
    pub fn new(config: DevServerConfig, builder: SiteBuilder<F, R>) -> Self {
        Self {
            config,
            builder,
            registry: ClientRegistry::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Clients currently subscribed to reloads.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Token that stops the server and the watch loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Build the site, then bind the configured address and serve.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.initial_build()?;

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.run(listener).await
    }

    /// Build the site, then serve on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        self.initial_build()?;
        self.run(listener).await
    }

    fn initial_build(&self) -> Result<(), ServerError> {
        let result = self.builder.build()?;
        tracing::info!(
            "Built {} pages and {} assets in {}ms",
            result.pages,
            result.assets,
            result.duration_ms
        );
        Ok(())
    }

    async fn run(self, listener: TcpListener) -> Result<(), ServerError> {
        let site = self.builder.site().clone();
        let state = ReloadState {
            registry: self.registry.clone(),
            shutdown: self.shutdown.clone(),
        };
        let app = router(&site.output_dir, site.auto_reload, state);

        if site.auto_reload {
            let (watcher, events) = FileWatcher::new()?;
            let mut watch = WatchLoop {
                rebuilder: Rebuilder::new(self.builder, self.registry.clone()),
                watcher,
                events,
                shutdown: self.shutdown.clone(),
            };
            watch.watch_sources()?;
            tokio::spawn(watch.run());
        }

        let local = listener.local_addr().map_err(ServerError::Serve)?;
        let url = browse_url(local);
        tracing::info!("Serving {} at {}", site.output_dir.display(), url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(ServerError::Serve)?;

        // Stop the watch loop with the listener.
        self.shutdown.cancel();
        Ok(())
    }
}

fn browse_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{}", addr)
    }
}

/// State shared by the reload stream handlers.
#[derive(Clone)]
struct ReloadState {
    registry: ClientRegistry,
    shutdown: CancellationToken,
}

/// Static files from `output_dir`, plus the reload stream when enabled.
fn router(output_dir: &Path, auto_reload: bool, state: ReloadState) -> Router {
    let mut app = Router::new();

    if auto_reload {
        app = app.route(RELOAD_ROUTE, get(reload_stream));
    }

    app.fallback_service(ServeDir::new(output_dir))
        .with_state(state)
}

/// Handler for the live-reload event stream.
async fn reload_stream(
    State(state): State<ReloadState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.registry.register();
    let shutdown = state.shutdown;

    // Dropping the stream on disconnect deregisters the client.
    let stream = async_stream::stream! {
        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => None,
                message = subscription.recv() => message,
            };
            let Some(message) = message else { break };
            yield Ok(Event::default().data(message));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// What a batch of changes led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The site was rebuilt and this many clients were told to reload
    Reloaded(usize),

    /// The configuration file could not be reloaded; nothing was rebuilt
    ConfigFailed,

    /// The rebuild failed; clients keep the previous output
    BuildFailed,
}

/// Rebuilds the site after changes and notifies clients.
pub struct Rebuilder<F = OsFileSystem, R = JinjaRenderer> {
    builder: SiteBuilder<F, R>,
    registry: ClientRegistry,
}

impl<F: FileSystem, R: Renderer> Rebuilder<F, R> {
    pub fn new(builder: SiteBuilder<F, R>, registry: ClientRegistry) -> Self {
        Self { builder, registry }
    }

    pub fn builder(&self) -> &SiteBuilder<F, R> {
        &self.builder
    }

    /// Handle one batch of changes.
    pub fn on_changes(&mut self, changes: &[Change]) -> RebuildOutcome {
        let config_changed = changes
            .iter()
            .any(|change| self.builder.site().is_config_file(&change.path));

        if config_changed {
            if let Err(e) = self.builder.reload_config() {
                tracing::warn!("Keeping previous configuration: {}", e);
                return RebuildOutcome::ConfigFailed;
            }
            tracing::info!("Reloaded configuration");
        }

        match self.builder.build() {
            Ok(result) => {
                let clients = self.registry.broadcast(RELOAD_MESSAGE);
                tracing::info!(
                    "Rebuilt {} pages in {}ms, reloading {} clients",
                    result.pages,
                    result.duration_ms,
                    clients
                );
                RebuildOutcome::Reloaded(clients)
            }
            Err(e) => {
                tracing::error!("Rebuild failed: {}", e);
                RebuildOutcome::BuildFailed
            }
        }
    }
}

/// Background task turning file system events into rebuilds.
struct WatchLoop<F, R> {
    rebuilder: Rebuilder<F, R>,
    watcher: FileWatcher,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    shutdown: CancellationToken,
}

impl<F, R> WatchLoop<F, R>
where
    F: FileSystem + 'static,
    R: Renderer + 'static,
{
    /// Watch the page, template and asset trees and the config file.
    fn watch_sources(&mut self) -> Result<(), notify::Error> {
        let site = self.rebuilder.builder().site();

        for dir in [&site.pages_dir, &site.templates_dir, &site.assets_dir] {
            self.watcher.watch_dir(dir)?;
        }
        self.watcher.watch_file(&site.config_path)?;

        Ok(())
    }

    async fn run(mut self) {
        tracing::debug!("Watch loop started");

        while let Some(changes) = self.next_batch().await {
            self.update_watches(&changes);

            let mut rebuilder = self.rebuilder;
            // Builds are synchronous and may take a while.
            let handle = tokio::task::spawn_blocking(move || {
                let outcome = rebuilder.on_changes(&changes);
                (rebuilder, outcome)
            });

            match handle.await {
                Ok((rebuilder, outcome)) => {
                    tracing::debug!("Rebuild outcome: {:?}", outcome);
                    self.rebuilder = rebuilder;
                }
                Err(e) => {
                    tracing::error!("Rebuild task failed, stopping watch loop: {}", e);
                    return;
                }
            }
        }

        tracing::debug!("Watch loop stopped");
    }

    /// Wait for changes, then gather whatever else arrives within the
    /// debounce window. `None` once shut down.
    async fn next_batch(&mut self) -> Option<Vec<Change>> {
        let mut changes = Vec::new();

        while changes.is_empty() {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                event = self.events.recv() => event?,
            };
            self.collect(event, &mut changes);
        }

        let deadline = tokio::time::sleep(DEBOUNCE);
        tokio::pin!(deadline);

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = &mut deadline => break,
                event = self.events.recv() => event,
            };
            match event {
                Some(event) => self.collect(event, &mut changes),
                None => break,
            }
        }

        Some(changes)
    }

    /// Keep changes to site sources; the config file's directory also
    /// reports unrelated entries such as the output directory.
    fn collect(&self, event: WatchEvent, changes: &mut Vec<Change>) {
        match event {
            WatchEvent::Changed(change) => {
                if !self.rebuilder.builder().site().is_source(&change.path) {
                    return;
                }
                tracing::debug!("{:?} {}", change.kind, change.path.display());
                changes.push(change);
            }
            WatchEvent::Error(e) => tracing::warn!("Watch error: {}", e),
        }
    }

    /// Watch directories that appeared and drop the ones that went away.
    fn update_watches(&mut self, changes: &[Change]) {
        for change in changes {
            match change.kind {
                ChangeKind::Removed => {
                    self.watcher.forget(&change.path);
                }
                ChangeKind::Created if change.path.is_dir() => {
                    if let Err(e) = self.watcher.watch_dir(&change.path) {
                        tracing::warn!("Failed to watch {}: {}", change.path.display(), e);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Subscription;
    use std::path::PathBuf;
    use stw_static::{MemoryFileSystem, Site};
    use tempfile::tempdir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio_test::{assert_pending, task};

    fn seed(fs: &MemoryFileSystem) {
        fs.add_file("templates/base.html", "<title>{{ title }}</title>{{ content }}");
        fs.add_file("templates/components/head.html", "");
        fs.add_file("templates/components/header.html", "");
        fs.add_file("templates/components/footer.html", "");
        fs.add_file("pages/index.html", "<h1>{{ config.name }}</h1>");
        fs.add_file("config.yaml", "name: First\n");
    }

    fn rebuilder() -> (Rebuilder<MemoryFileSystem>, ClientRegistry) {
        let fs = MemoryFileSystem::new();
        seed(&fs);
        let mut builder = SiteBuilder::new(Site::default(), fs, JinjaRenderer);
        builder.reload_config().unwrap();
        builder.build().unwrap();

        let registry = ClientRegistry::new();
        (Rebuilder::new(builder, registry.clone()), registry)
    }

    fn changed(path: &str) -> Change {
        Change {
            path: PathBuf::from(path),
            kind: ChangeKind::Modified,
        }
    }

    #[tokio::test]
    async fn successful_rebuild_notifies_clients() {
        let (mut rebuilder, registry) = rebuilder();
        let mut client = registry.register();
        rebuilder
            .builder()
            .fs()
            .add_file("pages/index.html", "<h1>Changed</h1>");

        let outcome = rebuilder.on_changes(&[changed("pages/index.html")]);

        assert_eq!(outcome, RebuildOutcome::Reloaded(1));
        assert_eq!(client.recv().await, Some(RELOAD_MESSAGE));
        let html = rebuilder.builder().fs().file("dist/index.html").unwrap();
        assert!(html.contains("<h1>Changed</h1>"));
    }

    #[test]
    fn failed_rebuild_keeps_clients_quiet() {
        let (mut rebuilder, registry) = rebuilder();
        let mut client = registry.register();
        rebuilder
            .builder()
            .fs()
            .add_file("pages/index.html", "---\ntitle: [unclosed\n");

        let outcome = rebuilder.on_changes(&[changed("pages/index.html")]);

        assert_eq!(outcome, RebuildOutcome::BuildFailed);
        let mut next = task::spawn(client.recv());
        assert_pending!(next.poll());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn config_change_is_reloaded_before_build() {
        let (mut rebuilder, _registry) = rebuilder();
        rebuilder.builder().fs().add_file("config.yaml", "name: Second\n");

        let outcome = rebuilder.on_changes(&[changed("config.yaml")]);

        assert_eq!(outcome, RebuildOutcome::Reloaded(0));
        let html = rebuilder.builder().fs().file("dist/index.html").unwrap();
        assert!(html.contains("<h1>Second</h1>"));
    }

    #[test]
    fn broken_config_skips_rebuild() {
        let (mut rebuilder, _registry) = rebuilder();
        let fs = rebuilder.builder().fs();
        fs.add_file("config.yaml", "name: [broken\n");
        fs.add_file("pages/index.html", "<h1>Not built</h1>");

        let outcome = rebuilder.on_changes(&[changed("config.yaml")]);

        assert_eq!(outcome, RebuildOutcome::ConfigFailed);
        let html = rebuilder.builder().fs().file("dist/index.html").unwrap();
        assert!(html.contains("<h1>First</h1>"));

        // The previous document is still in use for later changes.
        let outcome = rebuilder.on_changes(&[changed("pages/index.html")]);
        assert_eq!(outcome, RebuildOutcome::Reloaded(0));
        let html = rebuilder.builder().fs().file("dist/index.html").unwrap();
        assert!(html.contains("<h1>Not built</h1>"));
    }

    fn change_event(path: &str) -> WatchEvent {
        WatchEvent::Changed(changed(path))
    }

    #[tokio::test]
    async fn bursts_are_batched() {
        let (rebuilder, _registry) = rebuilder();
        let (watcher, _) = FileWatcher::new().unwrap();
        let (tx, events) = mpsc::unbounded_channel();
        let mut watch = WatchLoop {
            rebuilder,
            watcher,
            events,
            shutdown: CancellationToken::new(),
        };

        for path in [
            "pages/index.html",
            "templates/base.html",
            "dist/index.html",
            "pages/about/index.html",
        ] {
            tx.send(change_event(path)).unwrap();
        }
        let late = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            late.send(change_event("assets/site.css")).unwrap();
            tokio::time::sleep(Duration::from_millis(400)).await;
            late.send(change_event("pages/index.html")).unwrap();
        });

        let batch = watch.next_batch().await.unwrap();
        let paths: Vec<_> = batch.iter().map(|change| change.path.clone()).collect();
        assert_eq!(
            paths,
            [
                PathBuf::from("pages/index.html"),
                PathBuf::from("templates/base.html"),
                PathBuf::from("pages/about/index.html"),
                PathBuf::from("assets/site.css"),
            ]
        );

        let batch = watch.next_batch().await.unwrap();
        assert_eq!(batch, [changed("pages/index.html")]);

        watch.shutdown.cancel();
        assert!(watch.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn output_changes_alone_do_not_start_a_batch() {
        let (rebuilder, _registry) = rebuilder();
        let (watcher, _) = FileWatcher::new().unwrap();
        let (tx, events) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let mut watch = WatchLoop {
            rebuilder,
            watcher,
            events,
            shutdown: shutdown.clone(),
        };

        tx.send(change_event("dist/index.html")).unwrap();
        tx.send(change_event(".config.yaml.swp")).unwrap();
        tx.send(WatchEvent::Error("overflow".into())).unwrap();
        drop(tx);

        assert!(watch.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn failed_initial_build_does_not_serve() {
        let fs = MemoryFileSystem::new();
        fs.add_file("pages/index.html", "x");
        let builder = SiteBuilder::new(Site::default(), fs, JinjaRenderer);
        let server = DevServer::new(DevServerConfig::default(), builder);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let result = server.serve_on(listener).await;

        assert!(matches!(result, Err(ServerError::Build(_))));
    }

    /// Send a bare HTTP/1.1 request and return the reader positioned after
    /// the response head.
    async fn request(addr: SocketAddr, path: &str) -> (String, BufReader<TcpStream>) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let req = format!(
            "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n"
        );
        stream.write_all(req.as_bytes()).await.unwrap();

        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            head.push_str(&line);
        }
        (head, reader)
    }

    fn write_site(root: &Path) {
        std::fs::create_dir_all(root.join("pages")).unwrap();
        std::fs::create_dir_all(root.join("templates/components")).unwrap();
        std::fs::write(root.join("templates/base.html"), "<body>{{ content }}</body>").unwrap();
        for partial in ["head", "header", "footer"] {
            std::fs::write(root.join(format!("templates/components/{partial}.html")), "")
                .unwrap();
        }
        std::fs::write(root.join("pages/index.html"), "<h1>v1</h1>").unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reload_stream_delivers_rebuilds() {
        let temp = tempdir().unwrap();
        write_site(temp.path());

        let mut site = Site::new(temp.path());
        site.auto_reload = true;
        let server = DevServer::new(DevServerConfig::default(), SiteBuilder::with_os(site));
        let registry = server.registry().clone();
        let shutdown = server.shutdown_token();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(server.serve_on(listener));

        // Static output is served
        let (head, _) = request(addr, "/").await;
        assert!(head.starts_with("HTTP/1.1 200"), "{head}");

        let (head, mut events) = request(addr, RELOAD_ROUTE).await;
        assert!(head.starts_with("HTTP/1.1 200"), "{head}");
        assert!(head.contains("text/event-stream"), "{head}");

        for _ in 0..50 {
            if !registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(registry.len(), 1);

        // Give the watcher time to set up before touching sources.
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(temp.path().join("pages/index.html"), "<h1>v2</h1>").unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let mut line = String::new();
                events.read_line(&mut line).await.unwrap();
                if line.contains("data:") {
                    return line;
                }
            }
        })
        .await
        .expect("timeout waiting for reload event");

        assert!(payload.contains("data: reload"), "{payload}");
        let html = std::fs::read_to_string(temp.path().join("dist/index.html")).unwrap();
        assert!(html.contains("<h1>v2</h1>"));

        shutdown.cancel();
        drop(events);
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn reload_route_only_with_auto_reload() {
        let temp = tempdir().unwrap();
        write_site(temp.path());

        let server = DevServer::new(
            DevServerConfig::default(),
            SiteBuilder::with_os(Site::new(temp.path())),
        );
        let shutdown = server.shutdown_token();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(server.serve_on(listener));

        let (head, _) = request(addr, RELOAD_ROUTE).await;
        assert!(head.starts_with("HTTP/1.1 404"), "{head}");

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    /// Run a watch loop over the site at `root`, as `serve` does.
    fn spawn_watch_loop(root: &Path) -> (ClientRegistry, CancellationToken) {
        let mut site = Site::new(root);
        site.auto_reload = true;
        let mut builder = SiteBuilder::with_os(site);
        builder.reload_config().unwrap();
        builder.build().unwrap();

        let registry = ClientRegistry::new();
        let shutdown = CancellationToken::new();
        let (watcher, events) = FileWatcher::new().unwrap();
        let mut watch = WatchLoop {
            rebuilder: Rebuilder::new(builder, registry.clone()),
            watcher,
            events,
            shutdown: shutdown.clone(),
        };
        watch.watch_sources().unwrap();
        tokio::spawn(watch.run());

        (registry, shutdown)
    }

    fn contains(path: &Path, needle: &str) -> bool {
        std::fs::read_to_string(path)
            .map(|html| html.contains(needle))
            .unwrap_or(false)
    }

    /// Take reloads until `done` holds after one of them.
    async fn reload_until(client: &mut Subscription, done: impl Fn() -> bool) {
        let wait = async {
            loop {
                assert_eq!(client.recv().await, Some(RELOAD_MESSAGE));
                if done() {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("timeout waiting for reload");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn new_page_directories_are_watched() {
        let temp = tempdir().unwrap();
        write_site(temp.path());
        let (registry, shutdown) = spawn_watch_loop(temp.path());
        let mut client = registry.register();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let blog = temp.path().join("pages/blog");
        let output = temp.path().join("dist/blog/index.html");

        std::fs::create_dir(&blog).unwrap();
        std::fs::write(blog.join("index.html"), "<h1>blog v1</h1>").unwrap();
        reload_until(&mut client, || contains(&output, "blog v1")).await;

        // Only a watch on the new directory sees this edit.
        std::fs::write(blog.join("index.html"), "<h1>blog v2</h1>").unwrap();
        reload_until(&mut client, || contains(&output, "blog v2")).await;

        std::fs::remove_dir_all(&blog).unwrap();
        reload_until(&mut client, || !output.exists()).await;

        std::fs::create_dir(&blog).unwrap();
        std::fs::write(blog.join("index.html"), "<h1>blog v3</h1>").unwrap();
        reload_until(&mut client, || contains(&output, "blog v3")).await;

        std::fs::write(blog.join("index.html"), "<h1>blog v4</h1>").unwrap();
        reload_until(&mut client, || contains(&output, "blog v4")).await;

        shutdown.cancel();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn config_saved_by_rename_is_reloaded() {
        let temp = tempdir().unwrap();
        write_site(temp.path());
        let config = temp.path().join("config.yaml");
        std::fs::write(&config, "name: one\n").unwrap();
        std::fs::write(
            temp.path().join("pages/index.html"),
            "<h1>{{ config.name }}</h1>",
        )
        .unwrap();

        let (registry, shutdown) = spawn_watch_loop(temp.path());
        let mut client = registry.register();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let output = temp.path().join("dist/index.html");
        assert!(contains(&output, "<h1>one</h1>"));

        for name in ["two", "three"] {
            let staging = temp.path().join(".config.yaml.swp");
            std::fs::write(&staging, format!("name: {name}\n")).unwrap();
            std::fs::rename(&staging, &config).unwrap();

            let expected = format!("<h1>{name}</h1>");
            reload_until(&mut client, || contains(&output, &expected)).await;
        }

        shutdown.cancel();
    }
}
