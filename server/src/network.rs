//! Accept loop. One task owns the listener and never waits on any single
//! connection: each accepted socket gets its own reader/writer task pair
//! (see `connection`), scheduled on the runtime's worker threads. The loop
//! ends on the cooperative shutdown signal.

use crate::connection::run_connection;
use crate::dispatcher::Services;
use log::{error, info};
use shared::TransportError;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub struct Server {
    listener: TcpListener,
    services: Services,
}

impl Server {
    pub async fn bind(addr: &str, services: Services) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", listener.local_addr()?);
        Ok(Self { listener, services })
    }

    /// Actual bound address; useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the shutdown signal flips. A failed
    /// accept is logged and the loop keeps serving; connection failures
    /// are handled entirely inside the connection's own tasks.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut shutdown_watch = shutdown.clone();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("accepted connection from {}", peer);
                        let services = self.services.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(run_connection(stream, peer, services, shutdown));
                    }
                    Err(e) => error!("accept failed: {}", e),
                },
                _ = shutdown_watch.changed() => {
                    info!("server shutting down");
                    break;
                }
            }
        }
    }
}
