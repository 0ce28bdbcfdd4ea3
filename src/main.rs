//! strandkv server entry point
//!
//! Parses the configuration, starts the command executor and accepts client
//! connections until Ctrl+C.

use clap::Parser;
use std::sync::Arc;
use strandkv::commands::CommandHandler;
use strandkv::connection::{handle_connection, ConnectionStats};
use strandkv::executor::{Executor, ExecutorHandle};
use strandkv::Config;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(version = strandkv::VERSION, "strandkv starting");

    let handler = CommandHandler::with_feed_capacity(config.feed_capacity);
    // Subscribe before the handler moves into the executor
    let feed = handler.subscribe();
    tokio::spawn(log_propagation(feed));

    let (executor, executor_task) =
        Executor::spawn(handler, config.expiry_config(), config.queue_depth);

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Ready to accept connections");

    tokio::select! {
        _ = accept_loop(listener, executor, Arc::clone(&stats)) => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received, stopping server..."),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }
    }

    // Connection tasks still hold handles; stop waiting for them
    executor_task.abort();

    info!(
        connections = stats
            .connections_accepted
            .load(std::sync::atomic::Ordering::Relaxed),
        commands = stats
            .commands_processed
            .load(std::sync::atomic::Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Accepts incoming connections forever.
async fn accept_loop(listener: TcpListener, executor: ExecutorHandle, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(client = %addr, error = %e, "Could not disable Nagle");
                }
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    executor.clone(),
                    Arc::clone(&stats),
                ));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Drains the propagation feed.
///
/// There is no persistence or replication consumer yet, so propagated
/// commands are only traced.
async fn log_propagation(mut feed: broadcast::Receiver<Vec<bytes::Bytes>>) {
    loop {
        match feed.recv().await {
            Ok(argv) => {
                let rendered: Vec<_> = argv.iter().map(|a| String::from_utf8_lossy(a)).collect();
                trace!(command = ?rendered, "Propagated");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Propagation feed consumer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
