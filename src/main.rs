//! Relay server binary
//!
//! Run with: relay [BIND_ADDR]
//!
//! Configuration comes from `RELAY_*` environment variables; a bind address
//! given on the command line overrides `RELAY_BIND_ADDR`.
//!
//! ```text
//! RELAY_AUTH_TOKEN=secret relay localhost:3000
//! curl -N localhost:3000/stream?channel=predictions
//! curl -H 'Authorization: Bearer secret' -d '{"name":"a","tier":"1","message":"hi"}' \
//!      localhost:3000/publish-sub
//! ```

use std::net::SocketAddr;

use relay_rs::{RelayServer, ServerConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 3000;

/// Parse bind address from command line argument
///
/// Accepts `localhost`, `localhost:PORT`, `IP` and `IP:PORT`.
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RELAY_AUTH_TOKEN       Bearer token required by publish routes");
    eprintln!("  RELAY_BIND_ADDR        Address to bind to");
    eprintln!("  RELAY_KEEPALIVE_SECS   Seconds between keepalive events (default: 15)");
    eprintln!("  RELAY_QUEUE_CAPACITY   Events buffered per subscriber (default: 64)");
    eprintln!("  RUST_LOG               Log filter (default: info)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    if config.auth_token.is_none() {
        tracing::warn!("RELAY_AUTH_TOKEN not set, publish routes will reject every request");
    }

    let server = RelayServer::new(config);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
