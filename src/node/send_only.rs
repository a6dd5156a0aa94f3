use crate::chain_id::TargetChainId;
use crate::protocol::{Request, Response};
use crate::Result;

use super::endpoint::Endpoint;
use super::link::Link;
use super::probe::Probe;
use super::state::NodeState;
use super::{NodeConfig, PoolNode, SafeFuture};

use futures::FutureExt;

use std::fmt;

use tracing::warn;

/// An upstream only used to broadcast, over a single session to its primary address.
pub struct SendOnlyNode {
    endpoint: Endpoint,
    link: Link,
}

impl SendOnlyNode {
    pub fn new(endpoint: Endpoint, config: NodeConfig) -> Self {
        if let Some(secondary) = endpoint.secondary {
            warn!("[node] send-only {} ignores secondary address {:?}", endpoint.name, secondary);
        }
        let link = Link::new(&endpoint.name, endpoint.primary, config);
        SendOnlyNode { endpoint, link }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn request(&self, request: Request) -> Result<Response> {
        self.link.request(request).await
    }
}

impl PoolNode for SendOnlyNode {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn state(&self) -> NodeState {
        self.link.state()
    }

    fn probe(&self) -> SafeFuture<'_, Probe> {
        async move {
            let (report, session) = self.link.probe().await;
            Probe { reports: vec![report], session }
        }
        .boxed()
    }

    fn commit<'a>(&'a self, probe: Probe, target: &'a TargetChainId) -> SafeFuture<'a, Result<()>> {
        self.link.commit(probe, target).boxed()
    }

    fn disconnected(&self) -> SafeFuture<'static, ()> {
        self.link.disconnected()
    }

    fn demote(&self) -> SafeFuture<'_, ()> {
        self.link.demote().boxed()
    }

    fn close(&self) -> SafeFuture<'_, ()> {
        self.link.close().boxed()
    }
}

impl fmt::Display for SendOnlyNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.endpoint.name)
    }
}
