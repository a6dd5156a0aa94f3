use crate::channel::Channel;
use crate::protocol::{Request, Response};
use crate::{Error, Result};
use tracing::debug;

use std::net::SocketAddr;
use tokio::time::{timeout, Duration};

/// A plain request client: every request opens its own connection, sends a single request
/// and waits for a single response.
#[derive(Debug, Clone)]
pub struct Client {
    address: SocketAddr,
    request_timeout: Duration,
}

impl Client {
    pub fn new(address: SocketAddr, request_timeout: Duration) -> Client {
        Client { address, request_timeout }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Opens a connection to the upstream within `connect_timeout`.
    pub async fn connect(&self, connect_timeout: Duration) -> Result<Channel<Request, Response>> {
        match timeout(connect_timeout, Channel::connect(&self.address)).await {
            Ok(channel) => Ok(channel?),
            Err(_) => Err(Error::Timeout),
        }
    }

    pub async fn request(&self, request: Request) -> Result<Response> {
        let channel = self.connect(self.request_timeout).await?;
        self.request_on(channel, request).await
    }

    /// Sends `request` over an already opened connection, consuming it.
    pub async fn request_on(
        &self,
        channel: Channel<Request, Response>,
        request: Request,
    ) -> Result<Response> {
        match timeout(self.request_timeout, oneshot(channel, request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }
}

async fn oneshot(channel: Channel<Request, Response>, request: Request) -> Result<Response> {
    let (mut sender, mut receiver) = channel.split();
    // send a message to the upstream
    let () = sender.send(request).await?;
    // await a response
    let response = receiver.recv().await?;
    debug!("<-- {:?}", response);
    // ... the connection closes when the sender and receiver drop
    response.ok_or(Error::EmptyResponse)
}
