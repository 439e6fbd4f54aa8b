//! Standalone relay binary.
//!
//! Usage:
//!   cargo run -p blastar_relay -- [--addr 127.0.0.1:40000] [--config arena.json]
//!
//! Console commands:
//!   status - Show known clients and counters
//!   quit   - Shut down the relay

use std::env;
use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use blastar_relay::relay::RelayServer;
use blastar_shared::config::ArenaConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<ArenaConfig> {
    let args: Vec<String> = env::args().collect();
    let mut addr = None;
    let mut config = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                addr = Some(args[i + 1].clone());
                i += 2;
            }
            "--config" if i + 1 < args.len() => {
                config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            _ => i += 1,
        }
    }
    let mut cfg = match config {
        Some(path) => ArenaConfig::load(&path)?,
        None => ArenaConfig::default(),
    };
    if let Some(addr) = addr {
        cfg.relay_addr = addr;
    }
    Ok(cfg)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    let addr: SocketAddr = cfg.relay_addr.parse().context("parse relay_addr")?;
    info!(%addr, "Starting relay");

    let mut relay = RelayServer::bind(addr).await.context("create relay")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Relay ready. Type 'status' for info, 'quit' to exit.");
    println!();

    loop {
        tokio::select! {
            Some(line) = console_rx.recv() => match line.as_str() {
                "status" => {
                    for line in relay.status() {
                        println!("{line}");
                    }
                }
                "quit" | "exit" => break,
                other => println!("Unknown command: {other}"),
            },
            received = relay.recv() => match received {
                Ok((from, payload)) => {
                    relay.forward(from, &payload).await;
                }
                Err(e) => warn!(error = %e, "Relay receive failed"),
            },
        }
    }

    info!("Relay shutting down");
    Ok(())
}
