use tracing::info;
use tracing_subscriber;

use clap::{value_t, App, Arg};

use std::net::SocketAddr;

use zfx_upstream_pool::chain_id::ChainId;
use zfx_upstream_pool::server::{Reply, Server};
use zfx_upstream_pool::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let matches = App::new("zfx-upstream")
        .version("0.1")
        .author("zero.fx labs ltd.")
        .about("Runs a stub upstream node answering chain id queries")
        .arg(
            Arg::with_name("listener-ip")
                .short("a")
                .long("listener-ip")
                .value_name("LISTENER_IP")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("chain-id")
                .long("chain-id")
                .value_name("CHAIN_ID")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("error")
                .long("error")
                .value_name("MESSAGE")
                .takes_value(true)
                .conflicts_with("chain-id"),
        )
        .get_matches();

    let listener_ip =
        value_t!(matches.value_of("listener-ip"), SocketAddr).unwrap_or_else(|e| e.exit());
    let reply = match matches.value_of("error") {
        Some(message) => Reply::Error(message.to_owned()),
        None => Reply::ChainId(
            value_t!(matches.value_of("chain-id"), ChainId).unwrap_or_else(|_| ChainId(1)),
        ),
    };

    let sys = actix::System::new();
    sys.block_on(async move {
        let server = Server::start(listener_ip, reply).await.unwrap();
        info!("serving {:?} on {:?}", server.address(), listener_ip);

        tokio::signal::ctrl_c().await.unwrap();
        info!("stopping...");
        server.shutdown().await;
        actix::System::current().stop();
    });
    sys.run()?;

    Ok(())
}
