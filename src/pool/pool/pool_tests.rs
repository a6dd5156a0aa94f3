use super::*;
use crate::node::NodeConfig;
use crate::protocol::Request;
use crate::server::{unused_address, Reply, Server, ServerHandle};

use std::net::SocketAddr;

const INTERVAL: Duration = Duration::from_millis(100);
const DEADLINE: Duration = Duration::from_secs(5);

fn config() -> PoolConfig {
    PoolConfig {
        node: NodeConfig {
            dial_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
        },
        retry_interval: INTERVAL,
        ..PoolConfig::default()
    }
}

async fn upstream(id: u64) -> ServerHandle {
    Server::start(unused_address(), Reply::ChainId(ChainId(id))).await.unwrap()
}

fn node(name: &str, primary: SocketAddr, secondary: Option<SocketAddr>) -> Endpoint {
    Endpoint::new(name, primary, secondary)
}

async fn wait_for_state(pool: &Pool, name: &str, state: NodeState) {
    for _ in 0..50 {
        if pool.node_states().iter().any(|status| status.name == name && status.state == state) {
            return;
        }
        tokio::time::sleep(INTERVAL).await;
    }
    panic!("{} never became {:?}: {:?}", name, state, pool.node_states());
}

#[actix_rt::test]
async fn test_single_node_derives_chain_id() {
    let a = upstream(42).await;
    let pool = Pool::from_endpoints(vec![node("a", a.address(), None)], vec![], None, config());
    assert_eq!(pool.chain_id(), None);

    pool.dial(DEADLINE).await.unwrap();
    assert_eq!(pool.chain_id(), Some(ChainId(42)));
    assert_eq!(pool.select_node().unwrap().name(), "a");

    pool.close().await;
    a.shutdown().await;
}

#[actix_rt::test]
async fn test_single_node_matching_pin() {
    let a = upstream(7).await;
    let nodes = vec![node("a", a.address(), None)];
    let pool = Pool::from_endpoints(nodes, vec![], Some(ChainId(7)), config());

    pool.dial(DEADLINE).await.unwrap();
    assert_eq!(pool.chain_id(), Some(ChainId(7)));
    assert_eq!(pool.node_states()[0].state, NodeState::Alive);

    pool.close().await;
    a.shutdown().await;
}

#[actix_rt::test]
async fn test_mismatch_without_pin_blames_later_node() {
    let a = upstream(1).await;
    let b = upstream(2).await;
    let pool = Pool::from_endpoints(
        vec![node("a", a.address(), None), node("b", b.address(), None)],
        vec![],
        None,
        config(),
    );

    let err = pool.dial(DEADLINE).await.unwrap_err();
    assert!(err.is_verification());
    let errors = err.errors();
    match errors.as_slice() {
        [Error::ChainIdMismatch { endpoint, expected, reported, .. }] => {
            assert_eq!(endpoint, "b");
            assert_eq!(*expected, ChainId(1));
            assert_eq!(*reported, ChainId(2));
        }
        _ => panic!("unexpected {:?}", err),
    }
    assert_eq!(pool.chain_id(), Some(ChainId(1)));

    let states = pool.node_states();
    assert_eq!(states[0].state, NodeState::Alive);
    assert_eq!(states[1].state, NodeState::Dead);

    pool.close().await;
    a.shutdown().await;
    b.shutdown().await;
}

#[actix_rt::test]
async fn test_every_disagreeing_address_is_reported() {
    let a_primary = upstream(1).await;
    let a_secondary = upstream(2).await;
    let b_primary = upstream(3).await;
    let b_secondary = upstream(1).await;
    let c = upstream(2).await;
    let d = upstream(6).await;
    let pool = Pool::from_endpoints(
        vec![
            node("a", a_primary.address(), Some(a_secondary.address())),
            node("b", b_primary.address(), Some(b_secondary.address())),
        ],
        vec![node("c", c.address(), None), node("d", d.address(), None)],
        Some(ChainId(1)),
        config(),
    );

    let err = pool.dial(DEADLINE).await.unwrap_err();
    let errors = err.errors();
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(|err| matches!(err, Error::ChainIdMismatch { .. })));
    assert!(pool.node_states().iter().all(|status| status.state == NodeState::Dead));
    assert!(pool.send_only_nodes_alive().is_empty());
    assert!(matches!(pool.select_node(), Err(Error::NoAliveNode)));

    pool.close().await;
    for server in vec![a_primary, a_secondary, b_primary, b_secondary, c, d] {
        server.shutdown().await;
    }
}

#[actix_rt::test]
async fn test_chain_id_query_error_fails_dial() {
    let a = upstream(5).await;
    let b = Server::start(unused_address(), Reply::Error("not synced".to_owned())).await.unwrap();
    let pool = Pool::from_endpoints(
        vec![node("a", a.address(), None)],
        vec![node("b", b.address(), None)],
        None,
        config(),
    );

    let err = pool.dial(DEADLINE).await.unwrap_err();
    let errors = err.errors();
    match errors.as_slice() {
        [Error::ChainIdQuery { endpoint, .. }] => assert_eq!(endpoint, "b"),
        _ => panic!("unexpected {:?}", err),
    }

    pool.close().await;
    a.shutdown().await;
    b.shutdown().await;
}

#[actix_rt::test]
async fn test_unreachable_node_recovers() {
    let a = upstream(9).await;
    let late = unused_address();
    let pool = Pool::from_endpoints(
        vec![node("a", a.address(), None)],
        vec![node("late", late, None)],
        None,
        config(),
    );

    pool.dial(DEADLINE).await.unwrap();
    assert_eq!(pool.node_states()[1].state, NodeState::Dead);
    assert!(pool.send_only_nodes_alive().is_empty());

    let server = Server::start(late, Reply::ChainId(ChainId(9))).await.unwrap();
    wait_for_state(&pool, "late", NodeState::Alive).await;
    assert_eq!(pool.send_only_nodes_alive().len(), 1);

    pool.close().await;
    a.shutdown().await;
    server.shutdown().await;
}

#[actix_rt::test]
async fn test_unreachable_pool_starts_empty() {
    let pool =
        Pool::from_endpoints(vec![node("a", unused_address(), None)], vec![], None, config());

    pool.dial(DEADLINE).await.unwrap();
    assert_eq!(pool.chain_id(), None);
    assert!(matches!(pool.select_node(), Err(Error::NoAliveNode)));

    pool.close().await;
}

#[actix_rt::test]
async fn test_close_is_idempotent() {
    let pool = Pool::from_endpoints(vec![], vec![], None, config());
    pool.close().await;
    pool.close().await;
    assert!(matches!(pool.dial(DEADLINE).await, Err(Error::PoolClosed)));

    let a = upstream(3).await;
    let pool = Pool::from_endpoints(vec![node("a", a.address(), None)], vec![], None, config());
    pool.dial(DEADLINE).await.unwrap();
    assert!(matches!(pool.dial(DEADLINE).await, Err(Error::AlreadyDialed)));
    pool.close().await;
    pool.close().await;
    assert!(pool.tasks.lock().await.is_empty());
    assert!(pool.node_states().iter().all(|status| status.state == NodeState::Dead));

    a.shutdown().await;
}

#[actix_rt::test]
async fn test_no_redial_while_alive() {
    let a = upstream(4).await;
    let pool = Pool::from_endpoints(vec![], vec![node("a", a.address(), None)], None, config());

    pool.dial(DEADLINE).await.unwrap();
    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(a.connections(), 1);

    pool.close().await;
    a.shutdown().await;
}

#[actix_rt::test]
async fn test_late_mismatch_stays_dead() {
    let address = unused_address();
    let server = Server::start(address, Reply::ChainId(ChainId(1))).await.unwrap();
    let pool = Pool::from_endpoints(vec![node("a", address, None)], vec![], None, config());
    pool.dial(DEADLINE).await.unwrap();

    server.shutdown().await;
    wait_for_state(&pool, "a", NodeState::Dead).await;
    let server = Server::start(address, Reply::ChainId(ChainId(2))).await.unwrap();

    // The node is redialed and rejected over and over
    tokio::time::sleep(INTERVAL * 10).await;
    assert!(server.connections() > 1);
    assert_eq!(pool.node_states()[0].state, NodeState::Dead);
    assert_eq!(pool.chain_id(), Some(ChainId(1)));

    pool.close().await;
    server.shutdown().await;
}

#[actix_rt::test]
async fn test_lost_secondary_demotes_node() {
    let primary = upstream(1).await;
    let secondary_address = unused_address();
    let secondary = Server::start(secondary_address, Reply::ChainId(ChainId(1))).await.unwrap();
    let pool = Pool::from_endpoints(
        vec![node("a", primary.address(), Some(secondary_address))],
        vec![],
        None,
        config(),
    );
    pool.dial(DEADLINE).await.unwrap();

    secondary.shutdown().await;
    let a = pool.select_node().unwrap();
    assert!(a.request(Request::Ping).await.unwrap_err().is_connection());
    assert!(matches!(pool.select_node(), Err(Error::NoAliveNode)));

    // Redials keep failing on the secondary address
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(pool.node_states()[0].state, NodeState::Dead);

    let secondary = Server::start(secondary_address, Reply::ChainId(ChainId(1))).await.unwrap();
    wait_for_state(&pool, "a", NodeState::Alive).await;
    assert!(pool.select_node().unwrap().request(Request::Ping).await.is_ok());

    pool.close().await;
    primary.shutdown().await;
    secondary.shutdown().await;
}

#[actix_rt::test]
async fn test_dial_deadline() {
    // Accepts connections without ever answering
    let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let a = upstream(8).await;
    let pool = Pool::from_endpoints(
        vec![node("a", a.address(), None), node("silent", silent.local_addr().unwrap(), None)],
        vec![],
        None,
        config(),
    );

    match pool.dial(Duration::from_millis(300)).await {
        Err(Error::DialTimeout(names)) => assert_eq!(names, vec!["silent".to_owned()]),
        other => panic!("unexpected {:?}", other),
    }

    pool.close().await;
    assert!(pool.tasks.lock().await.is_empty());
    a.shutdown().await;
}

#[actix_rt::test]
async fn test_round_robin_selection() {
    let a = upstream(1).await;
    let b = upstream(1).await;
    let pool = Pool::from_endpoints(
        vec![node("a", a.address(), None), node("b", b.address(), None)],
        vec![],
        None,
        config(),
    );
    pool.dial(DEADLINE).await.unwrap();

    let picks: Vec<String> =
        (0..4).map(|_| pool.select_node().unwrap().name().to_owned()).collect();
    assert_eq!(picks, vec!["a", "b", "a", "b"]);

    pool.close().await;
    a.shutdown().await;
    b.shutdown().await;
}
