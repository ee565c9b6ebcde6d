//! Wiring and lifecycle: config → logging → event loop → world →
//! services → transport.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voxgate_loop::{EventLoop, LoopHandle, LoopMetrics, Priority};
use voxgate_network::{accept_all, ServerTransport, SessionId, SessionManager};
use voxgate_protocol::messages::SystemChat;
use voxgate_protocol::PacketProcessor;
use voxgate_store::{FileStore, SeedService, User};
use voxgate_world::{ChunkCache, GenerationPipeline, WorldManager};

use crate::services::{self, ASSETS_DIR, SERVER_VERSION};
use crate::streaming::ChunkStreamer;
use crate::{GameState, ServerConfig};

/// How often the cache TTL sweep runs.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Peers silent for longer than this are retired.
const SESSION_TIMEOUT: Duration = Duration::from_secs(90);

/// Command-line surface of the server binary.
#[derive(Parser, Debug)]
#[command(name = "voxgate-server", version, about = "The voxgate server")]
pub struct ServerArgs {
    /// Log filter when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Server root holding config, Database, and Assets. Overridden by
    /// the SERVER_ROOT environment variable.
    #[arg(long, default_value = "voxgate")]
    pub root_directory: PathBuf,

    #[arg(long, default_value = "voxgate.json")]
    pub config_file_name: String,

    /// When set, the process id is written here on startup.
    #[arg(long)]
    pub pid_file_name: Option<String>,

    /// Accepted for compatibility; the in-process shell is not part of
    /// this build.
    #[arg(long, default_value_t = false)]
    pub is_shell_enabled: bool,

    #[arg(long, default_value_t = false)]
    pub show_header: bool,
}

/// A running server: its bound address plus the handles to stop it.
pub struct ServerHandle {
    pub addr: SocketAddr,
    handle: LoopHandle<GameState>,
    task: JoinHandle<LoopMetrics>,
}

impl ServerHandle {
    /// Requests a graceful stop; queued work drains before the loop
    /// exits.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Waits for the loop to finish and returns its final metrics.
    pub async fn stopped(self) -> LoopMetrics {
        self.task.await.unwrap_or_default()
    }

    /// Runs a closure against the live game state, on the loop thread.
    /// For diagnostics and tests.
    pub async fn inspect<R: Send + 'static>(
        &self,
        f: impl FnOnce(&GameState) -> R + Send + 'static,
    ) -> anyhow::Result<R> {
        let (tx, rx) = tokio::sync::oneshot::channel();

        self.handle.enqueue(Priority::High, "inspect", move |state, _| {
            let _ = tx.send(f(state));
            Ok(())
        });

        rx.await.context("server loop is gone")
    }
}

/// Builds every subsystem and starts the loop on a background task.
///
/// `config.network.port` of zero binds an ephemeral port; the actual
/// address is on the returned handle.
pub async fn start(config: ServerConfig, root: &Path) -> anyhow::Result<ServerHandle> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("creating server root {}", root.display()))?;

    let assets_dir = root.join(ASSETS_DIR);
    std::fs::create_dir_all(&assets_dir)?;

    // World: pipeline, cache, initial ring.
    let pipeline = GenerationPipeline::with_default_steps(config.chunk_generator.seed);
    let cache = ChunkCache::new(pipeline, config.chunk_generator.cache_config());
    cache
        .populate_initial()
        .await
        .context("generating the initial chunk ring")?;
    let world = WorldManager::new(cache);

    // Accounts.
    let users = Arc::new(FileStore::<User>::open(root)?);
    SeedService::new(&users)
        .seed_default_admin(&config.seed_user.email, &config.seed_user.password)?;

    // Transport and session management.
    let codec = config.network.codec_config()?;
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.network.port));
    let transport = ServerTransport::bind(bind_addr, accept_all()).await?;
    let addr = transport.local_addr();

    let mut net = SessionManager::new(transport, PacketProcessor::new(codec));
    services::register_all(&mut net);
    net.set_hello(|_| {
        vec![SystemChat { text: format!("voxgate server {SERVER_VERSION}") }.into()]
    });

    // The loop and its per-tick systems.
    let mut event_loop = EventLoop::new(config.event_loop.loop_config());

    event_loop.add_system("network", |state: &mut GameState, handle| {
        let dispatches = state.net.pump();
        voxgate_network::dispatch(dispatches, handle);
        Ok(())
    });

    let mut last_sweep = Instant::now();
    event_loop.add_system("cache-eviction", move |state: &mut GameState, _| {
        if last_sweep.elapsed() >= EVICTION_INTERVAL {
            state.world.cache().evict_expired();
            last_sweep = Instant::now();
        }
        Ok(())
    });

    event_loop.add_system("session-timeout", |state: &mut GameState, _| {
        let expired: Vec<SessionId> = state
            .net
            .sessions()
            .filter(|s| s.last_ping().elapsed() > SESSION_TIMEOUT)
            .map(|s| s.id())
            .collect();

        for id in expired {
            warn!(%id, "session timed out");
            state.net.disconnect(id);
        }
        Ok(())
    });

    let handle = event_loop.handle();

    let mut state = GameState {
        net,
        world,
        streamer: ChunkStreamer::new(config.chunk_generator.initial_chunk_radius),
        users,
        assets_dir,
    };

    info!(%addr, seed = config.chunk_generator.seed, "server ready");

    let task = tokio::spawn(async move {
        let metrics = event_loop.run(&mut state).await;
        info!(cache = ?state.world.cache().metrics(), "world state at shutdown");
        metrics
    });

    Ok(ServerHandle { addr, handle, task })
}

const HEADER: &str = concat!(
    "==========================================\n",
    "  voxgate server ",
    env!("CARGO_PKG_VERSION"),
    "\n==========================================",
);

/// The binary entry point: parse, configure, run until interrupted.
pub async fn run(args: ServerArgs) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.show_header {
        println!("{HEADER}");
    }

    if args.is_shell_enabled {
        warn!("--is-shell-enabled was passed, but this build carries no shell");
    }

    let root = std::env::var_os("SERVER_ROOT")
        .map(PathBuf::from)
        .unwrap_or(args.root_directory);
    std::fs::create_dir_all(&root)?;

    let config = ServerConfig::load_or_create(&root.join(&args.config_file_name))?;

    let pid_path = args.pid_file_name.as_ref().map(|name| root.join(name));
    if let Some(path) = &pid_path {
        std::fs::write(path, std::process::id().to_string())
            .with_context(|| format!("writing pid file {}", path.display()))?;
    }

    let server = start(config, &root).await?;
    info!(addr = %server.addr, "accepting connections; ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("signal listener failed: {e}; shutting down");
    }

    server.shutdown();
    server.stopped().await;

    if let Some(path) = &pid_path {
        let _ = std::fs::remove_file(path);
    }

    info!("clean shutdown");
    Ok(())
}
