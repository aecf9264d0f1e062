use std::sync::Arc;

use tokio::io::BufReader;
use tracing::info;

use slotbook::compactor;
use slotbook::config::ServerConfig;
use slotbook::directory::InMemoryDirectory;
use slotbook::driver::Driver;
use slotbook::engine::{Collaborators, Engine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries responses; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::from_env()?;
    slotbook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    let directory = Arc::new(match &config.directory_seed {
        Some(path) => InMemoryDirectory::load_seed(path)?,
        None => InMemoryDirectory::new(),
    });

    let wal_path = config.data_dir.join("slotbook.wal");
    let engine = Arc::new(Engine::new(
        wal_path,
        config.engine.clone(),
        Collaborators::local(directory.clone()),
    )?);

    info!("slotbook ready");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  timezone: {}", config.engine.timezone);
    info!("  max_slots_per_window: {}", config.engine.max_slots_per_window);
    info!("  lock_timeout: {:?}", config.engine.lock_timeout);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let compactor_engine = engine.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        compactor::run_compactor(compactor_engine, threshold).await;
    });

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        Ok::<(), std::io::Error>(())
    };

    let driver = Driver::new(engine.clone(), directory);
    let serve = driver.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout());

    tokio::select! {
        result = serve => {
            result?;
            info!("stdin closed");
        }
        result = shutdown => {
            result?;
            info!("shutdown signal received");
        }
    }

    if let Err(e) = engine.compact_wal().await {
        tracing::warn!("final compaction failed: {e}");
    }
    info!("slotbook stopped");
    Ok(())
}
