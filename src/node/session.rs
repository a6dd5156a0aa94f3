use crate::channel::{Channel, Sender};
use crate::protocol::{Request, Response};
use crate::{Error, Result};

use futures::Future;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use std::net::SocketAddr;

use tracing::debug;

const RESPONSE_BUFFER: usize = 16;

struct SessionIo {
    sender: Sender<Request, Response>,
    responses: mpsc::Receiver<Response>,
}

/// A persistent connection to an upstream. A reader task drains incoming frames so that a
/// hang-up is noticed even while the session is idle.
pub struct Session {
    address: SocketAddr,
    request_timeout: Duration,
    io: Mutex<SessionIo>,
    closed: CancellationToken,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Connects to `address`, failing with a transport error if the connection cannot be opened
    /// within `connect_timeout`.
    pub async fn open(
        address: SocketAddr,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Session> {
        let channel: Channel<Request, Response> =
            match timeout(connect_timeout, Channel::connect(&address)).await {
                Ok(channel) => channel?,
                Err(_) => return Err(Error::Timeout),
            };
        let (sender, mut receiver) = channel.split();
        let (responses_tx, responses) = mpsc::channel(RESPONSE_BUFFER);
        let closed = CancellationToken::new();

        let token = closed.clone();
        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    frame = receiver.recv() => match frame {
                        Ok(Some(response)) => {
                            if responses_tx.send(response).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("[session] {:?} hung up", address);
                            break;
                        }
                        Err(err) => {
                            debug!("[session] {:?} read error: {:?}", address, err);
                            break;
                        }
                    }
                }
            }
            token.cancel();
        });

        Ok(Session {
            address,
            request_timeout,
            io: Mutex::new(SessionIo { sender, responses }),
            closed,
            reader: std::sync::Mutex::new(Some(reader)),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session is closed, locally or by the upstream.
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.closed.clone();
        async move { token.cancelled().await }
    }

    /// Sends a request and waits for its response. Requests are answered in order, one at a
    /// time; a request that times out closes the session since its late response would be
    /// taken for the next one.
    pub async fn request(&self, request: Request) -> Result<Response> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let mut io = self.io.lock().await;
        if let Err(err) = io.sender.send(request).await {
            self.closed.cancel();
            return Err(err.into());
        }
        let result = tokio::select! {
            response = io.responses.recv() => response.ok_or(Error::SessionClosed),
            _ = self.closed.cancelled() => Err(Error::SessionClosed),
            _ = tokio::time::sleep(self.request_timeout) => Err(Error::Timeout),
        };
        if result.is_err() {
            self.closed.cancel();
        }
        result
    }

    /// Closes the session and waits for its reader task. Idempotent.
    pub async fn close(&self) {
        self.closed.cancel();
        let reader = match self.reader.lock() {
            Ok(mut reader) => reader.take(),
            Err(_) => None,
        };
        if let Some(reader) = reader {
            let _ = reader.await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_id::ChainId;
    use crate::server::{Reply, Server};

    #[actix_rt::test]
    async fn test_request_and_hang_up() {
        let server = Server::start("127.0.0.1:0".parse().unwrap(), Reply::ChainId(ChainId(7)))
            .await
            .unwrap();
        let session = Session::open(
            server.address(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let response = session.request(Request::ChainId).await.unwrap();
        assert_eq!(response, Response::ChainId(ChainId(7)));
        let response = session.request(Request::Ping).await.unwrap();
        assert_eq!(response, Response::Pong);

        let closed = session.closed();
        server.shutdown().await;
        timeout(Duration::from_secs(5), closed).await.expect("session did not notice hang-up");
        assert!(session.is_closed());
        assert!(session.request(Request::Ping).await.is_err());
        session.close().await;
        session.close().await;
    }

    #[actix_rt::test]
    async fn test_open_unreachable() {
        let address = crate::server::unused_address();
        let result = Session::open(address, Duration::from_secs(1), Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
