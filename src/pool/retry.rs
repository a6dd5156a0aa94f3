use crate::chain_id::TargetChainId;
use crate::node::{NodeState, PoolNode};

use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use std::sync::Arc;

use tracing::{debug, error, info};

/// Keeps one node connected for the lifetime of the pool.
///
/// A dead node is redialed every `interval` until a dial succeeds. An alive node is left alone
/// until its session drops, at which point it is demoted and the redialing starts over. This
/// task is the only one dialing the node once the initial dial is over, so attempts never
/// overlap.
pub async fn run(
    node: Arc<dyn PoolNode>,
    target: Arc<TargetChainId>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    loop {
        if node.state() == NodeState::Alive {
            let disconnected = node.disconnected();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = disconnected => node.demote().await,
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = sleep(interval) => (),
        }

        debug!("[retry] dialing {}", node);
        let attempt = tokio::select! {
            _ = shutdown.cancelled() => break,
            attempt = node.dial(&target) => attempt,
        };
        match attempt {
            Ok(()) => info!("[retry] {} reconnected", node),
            // Nobody waits on a retry, so a disagreeing node can only be reported here. It
            // stays dead and is never selected.
            Err(err) if err.is_verification() => {
                error!("[retry] {} failed verification: {}", node, err)
            }
            Err(err) => debug!("[retry] {} still unreachable: {}", node, err),
        }
    }
    debug!("[retry] {} stopped", node);
}
