use crate::chain_id::ChainId;
use crate::channel::Channel;
use crate::protocol::{Request, Response};
use crate::Result;
use tracing::{debug, info};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What the server answers to `Request::ChainId`.
#[derive(Debug, Clone)]
pub enum Reply {
    ChainId(ChainId),
    Error(String),
}

/// Implements a minimal upstream node answering identity and liveness requests.
pub struct Server {
    /// The ip address which this server binds to.
    ip: SocketAddr,
    /// The answer to chain id queries.
    reply: Reply,
}

/// A running server. Dropping it does not stop the server, `shutdown` does.
pub struct ServerHandle {
    address: SocketAddr,
    connections: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    listener: JoinHandle<()>,
}

impl Server {
    pub fn new(ip: SocketAddr, reply: Reply) -> Server {
        Server { ip, reply }
    }

    /// Binds and starts listening in the background.
    pub async fn start(ip: SocketAddr, reply: Reply) -> Result<ServerHandle> {
        Server::new(ip, reply).spawn().await
    }

    pub async fn spawn(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind(self.ip).await?;
        let address = listener.local_addr()?;
        info!("listening on {:?}", address);
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(self.listen(listener, connections.clone(), shutdown.clone()));
        Ok(ServerHandle { address, connections, shutdown, listener })
    }

    async fn listen(
        self,
        listener: TcpListener,
        connections: Arc<AtomicUsize>,
        shutdown: CancellationToken,
    ) {
        let mut handlers = vec![];
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = Channel::<Response, Request>::accept(&listener) => accepted,
            };
            let (channel, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    debug!("accept error: {:?}", err);
                    continue;
                }
            };
            let _ = connections.fetch_add(1, Ordering::SeqCst);
            debug!("accepted {:?}", peer);
            let reply = self.reply.clone();
            let shutdown = shutdown.clone();
            handlers.push(tokio::spawn(async move {
                let (mut sender, mut receiver) = channel.split();
                loop {
                    // receive a request
                    let request = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        request = receiver.recv() => request,
                    };
                    // process the request
                    let response = match request {
                        Ok(Some(Request::ChainId)) => match reply.clone() {
                            Reply::ChainId(chain_id) => Response::ChainId(chain_id),
                            Reply::Error(err) => Response::Error(err),
                        },
                        Ok(Some(Request::Ping)) => Response::Pong,
                        Ok(None) | Err(_) => break,
                    };
                    if sender.send(response).await.is_err() {
                        break;
                    }
                }
            }));
            handlers.retain(|handler| !handler.is_finished());
        }
        for handler in handlers {
            let _ = handler.await;
        }
    }
}

impl ServerHandle {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Stops accepting, hangs up on every connected client and waits for the listener.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.listener.await;
    }
}

/// Returns a local address nothing listens on (yet).
#[cfg(test)]
pub fn unused_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
