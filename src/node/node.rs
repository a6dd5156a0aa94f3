use crate::chain_id::TargetChainId;
use crate::client::Client;
use crate::protocol::{Request, Response};
use crate::Result;

use super::endpoint::Endpoint;
use super::link::Link;
use super::probe::{self, Probe, Report};
use super::state::NodeState;
use super::{NodeConfig, PoolNode, SafeFuture};

use futures::FutureExt;

use std::fmt;

use tracing::warn;

/// A full upstream: a streaming session to the primary address and, optionally, a plain
/// request client to the secondary address. Calls prefer the secondary address.
pub struct Node {
    endpoint: Endpoint,
    primary: Link,
    secondary: Option<Client>,
}

impl Node {
    pub fn new(endpoint: Endpoint, config: NodeConfig) -> Self {
        let primary = Link::new(&endpoint.name, endpoint.primary, config.clone());
        let secondary =
            endpoint.secondary.map(|address| Client::new(address, config.request_timeout));
        Node { endpoint, primary, secondary }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn probe_secondary(&self) -> Option<Report> {
        match &self.secondary {
            Some(client) => {
                let dial_timeout = self.primary.config().dial_timeout;
                Some(probe::probe_client(client, dial_timeout).await)
            }
            None => None,
        }
    }

    /// Issues a call to the upstream.
    ///
    /// A secondary address that cannot be reached demotes the whole node, so that it is no longer
    /// selected and both addresses are verified again by the next dial.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let client = match &self.secondary {
            Some(client) => client,
            None => return self.primary.request(request).await,
        };
        let result = client.request(request).await;
        if let Err(err) = &result {
            if err.is_connection() && self.state() == NodeState::Alive {
                warn!("[node] {} secondary {:?} failed: {}", self, client.address(), err);
                self.primary.demote().await;
            }
        }
        result
    }
}

impl PoolNode for Node {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn state(&self) -> NodeState {
        self.primary.state()
    }

    fn probe(&self) -> SafeFuture<'_, Probe> {
        async move {
            let ((report, session), secondary) =
                futures::join!(self.primary.probe(), self.probe_secondary());
            let mut reports = vec![report];
            reports.extend(secondary);
            Probe { reports, session }
        }
        .boxed()
    }

    fn commit<'a>(&'a self, probe: Probe, target: &'a TargetChainId) -> SafeFuture<'a, Result<()>> {
        self.primary.commit(probe, target).boxed()
    }

    fn disconnected(&self) -> SafeFuture<'static, ()> {
        self.primary.disconnected()
    }

    fn demote(&self) -> SafeFuture<'_, ()> {
        self.primary.demote().boxed()
    }

    fn close(&self) -> SafeFuture<'_, ()> {
        self.primary.close().boxed()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.endpoint.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_id::ChainId;
    use crate::server::{unused_address, Reply, Server};
    use crate::Error;

    #[actix_rt::test]
    async fn test_secondary_is_verified_separately() {
        let primary = Server::start(unused_address(), Reply::ChainId(ChainId(1))).await.unwrap();
        let secondary = Server::start(unused_address(), Reply::ChainId(ChainId(2))).await.unwrap();
        let endpoint = Endpoint::new("full", primary.address(), Some(secondary.address()));
        let node = Node::new(endpoint, NodeConfig::default());

        let err = node.dial(&TargetChainId::new(Some(ChainId(1)))).await.unwrap_err();
        match err.errors().as_slice() {
            [Error::ChainIdMismatch { address, reported, .. }] => {
                assert_eq!(*address, secondary.address());
                assert_eq!(*reported, ChainId(2));
            }
            _ => panic!("unexpected {:?}", err),
        }
        assert_eq!(node.state(), NodeState::Dead);

        node.close().await;
        primary.shutdown().await;
        secondary.shutdown().await;
    }

    #[actix_rt::test]
    async fn test_requests_prefer_secondary() {
        let primary = Server::start(unused_address(), Reply::ChainId(ChainId(3))).await.unwrap();
        let secondary = Server::start(unused_address(), Reply::ChainId(ChainId(3))).await.unwrap();
        let endpoint = Endpoint::new("full", primary.address(), Some(secondary.address()));
        let node = Node::new(endpoint, NodeConfig::default());

        node.dial(&TargetChainId::new(None)).await.unwrap();
        assert_eq!(node.state(), NodeState::Alive);
        let before = secondary.connections();
        assert_eq!(node.request(Request::Ping).await.unwrap(), Response::Pong);
        assert_eq!(secondary.connections(), before + 1);
        assert_eq!(primary.connections(), 1);

        node.close().await;
        primary.shutdown().await;
        secondary.shutdown().await;
    }

    #[actix_rt::test]
    async fn test_failed_secondary_demotes() {
        let primary = Server::start(unused_address(), Reply::ChainId(ChainId(3))).await.unwrap();
        let secondary = Server::start(unused_address(), Reply::ChainId(ChainId(3))).await.unwrap();
        let endpoint = Endpoint::new("full", primary.address(), Some(secondary.address()));
        let node = Node::new(endpoint, NodeConfig::default());
        node.dial(&TargetChainId::new(None)).await.unwrap();

        secondary.shutdown().await;
        assert_eq!(node.state(), NodeState::Alive);
        let err = node.request(Request::Ping).await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(node.state(), NodeState::Dead);

        node.close().await;
        primary.shutdown().await;
    }

    #[actix_rt::test]
    async fn test_unreachable_secondary_is_transport() {
        let primary = Server::start(unused_address(), Reply::ChainId(ChainId(3))).await.unwrap();
        let endpoint = Endpoint::new("full", primary.address(), Some(unused_address()));
        let node = Node::new(endpoint, NodeConfig::default());

        let err = node.dial(&TargetChainId::new(None)).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(node.state(), NodeState::Dead);

        node.close().await;
        primary.shutdown().await;
    }
}
