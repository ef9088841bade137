mod config;
mod console;

use std::sync::Arc;
use std::time::Duration;

use config::ServerConfig;
use console::Flow;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};
use vx_world::{BlockRegistry, BlockType, World, WorldError, WorldWorkers};

fn build_registry(config: &ServerConfig) -> Result<BlockRegistry, WorldError> {
    let mut registry = BlockRegistry::new();
    for name in &config.blocks.names {
        registry.register(BlockType::new(name.as_str()))?;
    }
    for layer in &config.world.flat_layers {
        if !registry.contains(&layer.block) {
            warn!(
                "flat layer y={} uses unregistered block {:?}; it will be stored but inert",
                layer.y, layer.block
            );
        }
    }
    Ok(registry)
}

#[tokio::main]
async fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| "world.toml".into());
    let config = match ServerConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("vx-server v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "World: {} (generator: {}, radius: {}, chunk y {}..{})",
        config.world.directory.display(),
        config.world.generator,
        config.world.load_radius,
        config.world.min_chunk_y,
        config.world.max_chunk_y
    );

    let registry = match build_registry(&config) {
        Ok(r) => r,
        Err(e) => {
            error!("Invalid block list: {e}");
            std::process::exit(1);
        }
    };
    info!("Registered {} block types", registry.len());

    let world = match World::open(config.world.clone(), Arc::new(registry)) {
        Ok(w) => Arc::new(w),
        Err(e) => {
            error!("Failed to open world: {e}");
            std::process::exit(1);
        }
    };
    world.set_focus(config.focus_pos());

    let workers = match WorldWorkers::start(world.clone()) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to start world workers: {e}");
            std::process::exit(1);
        }
    };

    // Console REPL: read lines from stdin
    let (console_tx, mut console_rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let auto_save = config.auto_save_interval > 0;
    let period = Duration::from_secs(config.auto_save_interval.max(1));
    let mut auto_save_interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
            _ = auto_save_interval.tick(), if auto_save => {
                let world = world.clone();
                match tokio::task::spawn_blocking(move || world.save_all()).await {
                    Ok(Ok(n)) => info!("Auto-save: {n} chunks written"),
                    Ok(Err(e)) => error!("Auto-save failed: {e}"),
                    Err(e) => error!("Auto-save task failed: {e}"),
                }
            }
            Some(line) = console_rx.recv() => {
                let command = match console::parse(&line) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };
                let world = world.clone();
                match tokio::task::spawn_blocking(move || console::execute(&world, command)).await {
                    Ok(Flow::Stop) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => error!("Console command failed: {e}"),
                }
            }
        }
    }

    info!("Stopping world workers...");
    let shutdown = tokio::task::spawn_blocking(move || {
        workers.shutdown();
        world.flush_block_queue();
        world.save_all()
    })
    .await;
    match shutdown {
        Ok(Ok(n)) => info!("Final save: {n} chunks written"),
        Ok(Err(e)) => error!("Final save failed: {e}"),
        Err(e) => error!("Shutdown task failed: {e}"),
    }
    info!("Server shut down.");
}
