//! Dial attempts are split in two: a probe opens the sessions and asks each address for its chain
//! id, and a verdict judges the reports against the target chain id. The pool probes every node
//! concurrently but judges the probes in endpoint order, so a derived target always comes from
//! the first endpoint that reported one.

use crate::chain_id::{ChainId, TargetChainId};
use crate::client::Client;
use crate::protocol::Request;
use crate::{Error, Result};

use super::session::Session;

use tokio::time::Duration;

use std::net::SocketAddr;

#[derive(Debug)]
pub enum Outcome {
    /// The address answered with a chain id.
    Reported(ChainId),
    /// No session could be opened to the address.
    Unreachable(Error),
    /// The session opened but the chain id query failed.
    QueryFailed(Error),
}

#[derive(Debug)]
pub struct Report {
    pub address: SocketAddr,
    pub outcome: Outcome,
}

/// The result of one dial attempt, not judged yet.
pub struct Probe {
    pub reports: Vec<Report>,
    /// The streaming session, kept open when its chain id query succeeded.
    pub session: Option<Session>,
}

/// Opens a streaming session and queries its chain id.
pub async fn probe_session(
    address: SocketAddr,
    dial_timeout: Duration,
    request_timeout: Duration,
) -> (Report, Option<Session>) {
    let session = match Session::open(address, dial_timeout, request_timeout).await {
        Ok(session) => session,
        Err(err) => return (Report { address, outcome: Outcome::Unreachable(err) }, None),
    };
    let reported = match session.request(Request::ChainId).await {
        Ok(response) => response.into_chain_id(),
        Err(err) => Err(err),
    };
    match reported {
        Ok(chain_id) => (Report { address, outcome: Outcome::Reported(chain_id) }, Some(session)),
        Err(err) => {
            session.close().await;
            (Report { address, outcome: Outcome::QueryFailed(err) }, None)
        }
    }
}

/// Queries the chain id through a plain request client.
pub async fn probe_client(client: &Client, dial_timeout: Duration) -> Report {
    let address = client.address();
    let channel = match client.connect(dial_timeout).await {
        Ok(channel) => channel,
        Err(err) => return Report { address, outcome: Outcome::Unreachable(err) },
    };
    let reported = match client.request_on(channel, Request::ChainId).await {
        Ok(response) => response.into_chain_id(),
        Err(err) => Err(err),
    };
    match reported {
        Ok(chain_id) => Report { address, outcome: Outcome::Reported(chain_id) },
        Err(err) => Report { address, outcome: Outcome::QueryFailed(err) },
    }
}

/// Judges the reports of `endpoint` in order. Every disagreeing or failed query is a separate
/// fault; faults win over unreachable addresses.
pub fn verify(endpoint: &str, reports: Vec<Report>, target: &TargetChainId) -> Result<()> {
    let mut faults = vec![];
    let mut unreachable = None;
    for Report { address, outcome } in reports {
        match outcome {
            Outcome::Reported(reported) => {
                let expected = target.expect(reported);
                if expected != reported {
                    faults.push(Error::ChainIdMismatch {
                        endpoint: endpoint.to_owned(),
                        address,
                        expected,
                        reported,
                    });
                }
            }
            Outcome::QueryFailed(cause) => faults.push(Error::ChainIdQuery {
                endpoint: endpoint.to_owned(),
                address,
                cause: Box::new(cause),
            }),
            Outcome::Unreachable(cause) => {
                if unreachable.is_none() {
                    unreachable = Some(Error::Transport {
                        endpoint: endpoint.to_owned(),
                        address,
                        cause: Box::new(cause),
                    });
                }
            }
        }
    }
    if !faults.is_empty() {
        Err(Error::Verification(faults))
    } else if let Some(err) = unreachable {
        Err(err)
    } else {
        Ok(())
    }
}
