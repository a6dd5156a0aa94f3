//! Messages exchanged with an upstream node.
use crate::chain_id::ChainId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    // Identity
    ChainId,
    // Liveness
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    // Identity
    ChainId(ChainId),
    // Liveness
    Pong,
    // Error
    Error(String),
}

impl Response {
    /// Extracts the chain id from a reply to `Request::ChainId`.
    pub fn into_chain_id(self) -> crate::Result<ChainId> {
        match self {
            Response::ChainId(chain_id) => Ok(chain_id),
            Response::Error(err) => Err(crate::Error::Upstream(err)),
            _ => Err(crate::Error::InvalidResponse),
        }
    }
}
