use crate::chain_id::TargetChainId;
use crate::protocol::{Request, Response};
use crate::{Error, Result};

use super::probe::{self, Probe, Report};
use super::session::Session;
use super::state::{Liveness, NodeState};
use super::{NodeConfig, SafeFuture};

use futures::FutureExt;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

/// The streaming session of a node together with the node's liveness. Shared by `Node` and
/// `SendOnlyNode`.
pub(crate) struct Link {
    name: String,
    address: SocketAddr,
    config: NodeConfig,
    liveness: Liveness,
    session: Mutex<Option<Arc<Session>>>,
}

impl Link {
    pub fn new(name: &str, address: SocketAddr, config: NodeConfig) -> Self {
        Link {
            name: name.to_owned(),
            address,
            config,
            liveness: Liveness::new(),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> NodeState {
        self.liveness.get()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub async fn probe(&self) -> (Report, Option<Session>) {
        probe::probe_session(self.address, self.config.dial_timeout, self.config.request_timeout)
            .await
    }

    /// Judges `probe` and either installs its session or leaves the link dead.
    pub async fn commit(&self, probe: Probe, target: &TargetChainId) -> Result<()> {
        let Probe { reports, session } = probe;
        let verdict = probe::verify(&self.name, reports, target);
        match (verdict, session) {
            (Ok(()), Some(session)) => {
                self.install(session);
                Ok(())
            }
            (verdict, session) => {
                if let Some(session) = session {
                    session.close().await;
                }
                self.teardown().await;
                let _ = self.liveness.set(NodeState::Dead);
                verdict.and(Err(Error::SessionClosed))
            }
        }
    }

    fn install(&self, session: Session) {
        let session = Arc::new(session);
        if let Ok(mut slot) = self.session.lock() {
            *slot = Some(session);
        }
        let previous = self.liveness.set(NodeState::Alive);
        if previous != NodeState::Alive {
            info!("[node] {} ({:?}) is {:?}", self.name, self.address, NodeState::Alive);
        }
    }

    fn session(&self) -> Option<Arc<Session>> {
        match self.session.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        }
    }

    /// Takes the session out of the slot and closes it.
    pub async fn teardown(&self) {
        let session = match self.session.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(session) = session {
            debug!("[node] {} closing session to {:?}", self.name, session.address());
            session.close().await;
        }
    }

    /// Resolves once the installed session drops, right away if there is none.
    pub fn disconnected(&self) -> SafeFuture<'static, ()> {
        match self.session() {
            Some(session) => session.closed().boxed(),
            None => futures::future::ready(()).boxed(),
        }
    }

    /// Marks the link dead after its session dropped.
    pub async fn demote(&self) {
        self.teardown().await;
        let previous = self.liveness.set(NodeState::Dead);
        if previous == NodeState::Alive {
            warn!(
                "[node] {} ({:?}) lost its session, now {:?}",
                self.name,
                self.address,
                NodeState::Dead
            );
        }
    }

    pub async fn close(&self) {
        self.teardown().await;
        let _ = self.liveness.set(NodeState::Dead);
    }

    pub async fn request(&self, request: Request) -> Result<Response> {
        match self.session() {
            Some(session) => session.request(request).await,
            None => Err(Error::SessionClosed),
        }
    }
}
