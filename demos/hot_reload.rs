//! Example demonstrating file watching and automatic hot-reload.
//!
//! This example shows how to:
//! - Select a configuration file through `CONFIG_FILE`
//! - Reload automatically when the file changes
//! - Subscribe to configuration change notifications
//!
//! Run with: cargo run --example hot_reload
//!
//! While running, edit the printed file to see automatic reloads. Set
//! `RUST_LOG=service_config=debug` for the library's own logs.

use serde::Deserialize;
use service_config::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct AppConfig {
    server: ServerConfig,
    database: DatabaseConfig,
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    port: u16,
    host: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    url: String,
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("service_config=info")),
        )
        .init();

    println!("=== Hot Reload Example ===\n");

    // Create an initial config file if it doesn't exist
    let config_path = std::env::temp_dir().join("service-config-hot-reload.yaml");
    if !config_path.exists() {
        std::fs::write(
            &config_path,
            r#"server:
  port: 8080
  host: localhost

database:
  url: postgres://localhost/mydb
  max_connections: 10
"#,
        )?;
        println!("Created {}", config_path.display());
    }

    let path = config_path.to_string_lossy().into_owned();
    let config = ConfigProvider::builder(ConfigFormat::Yaml)
        .with_env_lookup(move |key: &str| match key {
            "CONFIG_FILE" => Some(path.clone()),
            _ => std::env::var(key).ok(),
        })
        .with_watch(true)
        .with_watch_debounce(Duration::from_millis(500))
        .build::<AppConfig>()
        .await?;

    println!("Configuration loaded from {}\n", config.source_name());

    // Track the number of reloads
    let reload_count = Arc::new(AtomicUsize::new(0));
    let reload_count_clone = Arc::clone(&reload_count);

    let _subscription = config.subscribe(move |cfg: &AppConfig| {
        let count = reload_count_clone.fetch_add(1, Ordering::SeqCst) + 1;
        println!(
            "\n[Event] Configuration reloaded (reload #{}): {}:{}",
            count, cfg.server.host, cfg.server.port
        );
    });

    let cfg = config.get();
    println!("Current configuration:");
    println!("  Server: {}:{}", cfg.server.host, cfg.server.port);
    println!(
        "  Database: {} (max connections: {})",
        cfg.database.url, cfg.database.max_connections
    );

    println!(
        "\n===> Try editing {} to see automatic reloads! <===",
        config_path.display()
    );
    println!("\nPress Ctrl+C to exit\n");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                let cfg = config.get();
                println!(
                    "[Status] reloads: {}, server: {}:{}, database: {} (max: {})",
                    reload_count.load(Ordering::SeqCst),
                    cfg.server.host,
                    cfg.server.port,
                    cfg.database.url,
                    cfg.database.max_connections
                );
            }
        }
    }

    config.shutdown().await;
    Ok(())
}
