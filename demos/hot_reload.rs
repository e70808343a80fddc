//! Example demonstrating polling-based hot reload of an INI file.
//!
//! This example shows how to:
//! - Register a file with the supervisor
//! - Keep a self-refreshing parse of it with `ReloadingFile`
//! - Subscribe a closure that hears about every change
//!
//! Run with: cargo run --example hot_reload
//!
//! While running, try editing demos/config/hot_reload.ini to see automatic reloads.
//! Set `RUST_LOG=hotswap_supervisor=debug` to watch the supervisor at work.

use hotswap_supervisor::prelude::*;
use hotswap_supervisor::sources::ReloadingFile;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Hot Reload Example ===\n");

    // Create an initial file if it doesn't exist
    let config_path = "demos/config/hot_reload.ini";
    if !std::path::Path::new(config_path).exists() {
        std::fs::create_dir_all("demos/config")?;
        std::fs::write(
            config_path,
            "[server]\nip=127.0.0.1\nport=8888\n\n[client]\nname=mike\ninfo=hello world\n",
        )?;
        println!("Created {}", config_path);
    }

    let app = Arc::new(ReloadingFile::load(config_path, FileKind::Ini)?);

    let supervisor = Supervisor::builder()
        .with_file_kind(config_path, FileKind::Ini, Duration::from_secs(1))
        .with_subscriber(app.clone())
        .build()?;

    // Track the number of changes
    let change_count = Arc::new(AtomicUsize::new(0));
    let change_count_clone = Arc::clone(&change_count);
    let _subscription = supervisor.subscribe(move |path| {
        let count = change_count_clone.fetch_add(1, Ordering::SeqCst) + 1;
        println!("\n[Event] {} changed (change #{})", path.display(), count);
    });

    supervisor.start()?;
    println!("Watching: {}\n", config_path);
    println!("Press Ctrl+C to exit\n");

    let mut status = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status.tick() => {
                let current = app.get();
                println!(
                    "[Status] changes: {}, server: {}:{}",
                    change_count.load(Ordering::SeqCst),
                    current.get_string("server.ip").unwrap_or_default(),
                    current.get_string("server.port").unwrap_or_default(),
                );
            }
        }
    }

    supervisor.stop().await?;
    println!("Stopped");
    Ok(())
}
