//! Relay server listener
//!
//! Binds the TCP listener, serves the router and owns the keepalive task.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::routes::router;
use crate::server::state::RelayState;

/// Relay server
pub struct RelayServer {
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: Arc::new(RelayState::new(config)),
        }
    }

    /// Get a reference to the shared state
    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.state.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        let keepalive_handle = self.spawn_keepalive();
        let app = router(Arc::clone(&self.state));

        // Streams never end on their own, so shutdown stops accepting
        // instead of waiting for open connections to drain.
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = axum::serve(listener, app).into_future() => {
                result.map_err(Into::into)
            }
        };

        // Stop keepalive task on shutdown
        keepalive_handle.abort();

        result
    }

    fn spawn_keepalive(&self) -> JoinHandle<()> {
        let scheduler = self.state.keepalive_scheduler();
        tracing::debug!(
            interval_secs = scheduler.interval().as_secs(),
            channels = ?scheduler.channels(),
            "Keepalive task started"
        );
        scheduler.spawn()
    }
}
