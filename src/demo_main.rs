mod catalog;

use anyhow::Context;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use sysinfo::System;

use catalog::{CatalogManager, EditManager, Outcome, ProductSource};
use catalog_dispatch::{
    logging, AppResult, DispatchConfig, DispatchContext, ExecutorHandle, ManagerSet,
    ThreadAffineExecutor,
};

const LOG_TARGET_STARTUP: &str = "catalog_demo::startup";

/// Price multiplier applied to the first product
const MARKUP: f32 = 1.2;

/// Highest price the edit manager accepts
const MAX_PRICE: f32 = 100.0;

fn log_runtime_environment(config: &DispatchConfig) {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting catalog demo v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
    tracing::debug!(
        target: LOG_TARGET_STARTUP,
        "Workers: {} threads, tick every {}ms, at most {} ticks",
        config.workers.threads,
        config.tick_interval_ms,
        config.max_ticks
    );
}

/// `--config <path>` or the platform default
fn config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|arg| arg == "--config")
        .and_then(|index| args.get(index + 1))
        .map(PathBuf::from)
        .unwrap_or_else(DispatchConfig::default_path)
}

fn main() -> AppResult<()> {
    let path = config_path();
    let config = DispatchConfig::load_from(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
    log_runtime_environment(&config);

    // The main thread owns the executor and drains it once per tick
    let mut executor = ThreadAffineExecutor::install();
    let ctx = DispatchContext::from_config(&config)?;

    let catalog = CatalogManager::new(MARKUP);
    let products = catalog.products();
    let edit = EditManager::new(MAX_PRICE);
    let outcome = edit.outcome();

    let mut managers = ManagerSet::builder()
        .with(ProductSource::new())
        .with(catalog)
        .with(edit)
        .build();
    managers.attach_all(&ctx);
    tracing::info!("Managers attached: {}", managers.names().join(", "));

    catalog::fetch_products(&ctx, ExecutorHandle::instance()?);

    let tick = Duration::from_millis(config.tick_interval_ms);
    let mut ticks = 0;
    while *outcome.lock() == Outcome::Pending && ticks < config.max_ticks {
        executor.drain()?;
        ticks += 1;
        thread::sleep(tick);
    }

    managers.detach_all(&ctx);

    let outcome = outcome.lock().clone();
    match &outcome {
        Outcome::Edited { name, price } => {
            tracing::info!("Edited {} to {:.2} after {} ticks", name, price, ticks);
            println!("✓ {} products loaded, {} now costs {:.2}", products.lock().len(), name, price);
        }
        Outcome::Pending => {
            tracing::warn!("No result after {} ticks", ticks);
            println!("✗ Timed out after {} ticks", ticks);
        }
        other => {
            tracing::warn!("Flow ended with {:?}", other);
            println!("✗ Flow ended with {:?}", other);
        }
    }

    Ok(())
}
