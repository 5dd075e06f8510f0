//! The node server: runtime, listener and acceptor loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use oef_core::ServiceDirectory;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::directory::AgentDirectory;
use crate::session;

/// Grace given to in-flight work when the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Error raised while setting up the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The runtime could not be built or the listener could not be bound.
    #[error("server setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A running (or startable) OEF node.
///
/// The server owns its I/O runtime: `new` builds the worker pool and
/// binds the listener, [`run`](Self::run) starts accepting, and
/// [`stop`](Self::stop) (also invoked on drop) gives in-flight work a
/// brief grace before shutting the runtime down and joining every worker.
#[derive(Debug)]
pub struct Server {
    runtime: Option<tokio::runtime::Runtime>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    agents: Arc<AgentDirectory>,
    services: Arc<ServiceDirectory>,
    shutdown: watch::Sender<bool>,
    max_frame_bytes: usize,
}

impl Server {
    /// Builds the runtime and binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the runtime cannot be built or the
    /// port cannot be bound.
    pub fn new(config: &NodeConfig) -> Result<Self, ServerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.threads)
            .thread_name("oef-node-worker")
            .enable_all()
            .build()?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let backlog = config.backlog;
        let listener = runtime.block_on(async move {
            let socket = TcpSocket::new_v4()?;
            socket.set_reuseaddr(true)?;
            socket.bind(addr)?;
            socket.listen(backlog)
        })?;
        let local_addr = listener.local_addr()?;

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            runtime: Some(runtime),
            listener: Some(listener),
            local_addr,
            agents: Arc::new(AgentDirectory::new()),
            services: Arc::new(ServiceDirectory::new()),
            shutdown,
            max_frame_bytes: config.max_frame_bytes,
        })
    }

    /// Starts the acceptor loop. Returns immediately; a second call is a
    /// no-op.
    pub fn run(&mut self) {
        let (Some(runtime), Some(listener)) = (self.runtime.as_ref(), self.listener.take()) else {
            return;
        };
        let agents = Arc::clone(&self.agents);
        let services = Arc::clone(&self.services);
        let max_frame_bytes = self.max_frame_bytes;
        let mut shutdown = self.shutdown.subscribe();
        let local_addr = self.local_addr;

        runtime.spawn(async move {
            info!(%local_addr, "listening for agents");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "accepted connection");
                            tokio::spawn(session::run_connection(
                                stream,
                                peer,
                                Arc::clone(&agents),
                                Arc::clone(&services),
                                max_frame_bytes,
                            ));
                        },
                        Err(e) => warn!(error = %e, "accept failed"),
                    },
                }
            }
            info!("acceptor stopped");
        });
    }

    /// The address the listener is bound to.
    ///
    /// With a configured port of `0` this carries the OS-assigned port.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Number of distinct advertised service instances.
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Stops the server: signals the acceptor, gives in-flight work a
    /// brief grace, then shuts the runtime down and joins every worker.
    pub fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(runtime) = self.runtime.take() {
            info!("shutting down");
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
        self.agents.clear();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_config() -> NodeConfig {
        NodeConfig {
            port: 0,
            threads: 2,
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_server_binds_ephemeral_port() {
        let server = Server::new(&ephemeral_config()).unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.agent_count(), 0);
        assert_eq!(server.service_count(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut server = Server::new(&ephemeral_config()).unwrap();
        server.run();
        server.stop();
        server.stop();
        // run() after stop() must not panic.
        server.run();
    }
}
