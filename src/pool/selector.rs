use crate::chain_id::ChainId;
use crate::node::Node;
use crate::Result;

use super::pool::{NodeStatus, Pool};

use actix::{Actor, Context, Handler};
use actix_derive::{Message, MessageResponse};

use std::sync::Arc;

use tracing::debug;

/// Serves node selection to other actors.
pub struct Selector {
    pool: Arc<Pool>,
}

impl Selector {
    pub fn new(pool: Arc<Pool>) -> Self {
        Selector { pool }
    }
}

impl Actor for Selector {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("[selector] started");
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<Arc<Node>>")]
pub struct SelectNode;

impl Handler<SelectNode> for Selector {
    type Result = Result<Arc<Node>>;

    fn handle(&mut self, _msg: SelectNode, _ctx: &mut Context<Self>) -> Self::Result {
        self.pool.select_node()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[rtype(result = "NodeStates")]
pub struct GetNodeStates;

#[derive(Debug, Clone, Serialize, Deserialize, MessageResponse)]
pub struct NodeStates {
    pub states: Vec<NodeStatus>,
}

impl Handler<GetNodeStates> for Selector {
    type Result = NodeStates;

    fn handle(&mut self, _msg: GetNodeStates, _ctx: &mut Context<Self>) -> Self::Result {
        NodeStates { states: self.pool.node_states() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[rtype(result = "Option<ChainId>")]
pub struct GetChainId;

impl Handler<GetChainId> for Selector {
    type Result = Option<ChainId>;

    fn handle(&mut self, _msg: GetChainId, _ctx: &mut Context<Self>) -> Self::Result {
        self.pool.chain_id()
    }
}
