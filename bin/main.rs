use tracing::{error, info};
use tracing_subscriber;

use clap::{value_t, values_t, App, Arg};

use actix::Actor;

use std::path::Path;
use std::sync::Arc;

use zfx_upstream_pool::chain_id::ChainId;
use zfx_upstream_pool::node::Endpoint;
use zfx_upstream_pool::pool::{Pool, Selector};
use zfx_upstream_pool::settings::Settings;
use zfx_upstream_pool::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("zfx-upstream-pool")
        .version("0.1")
        .author("zero.fx labs ltd.")
        .about("Keeps a verified pool of upstream nodes connected")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("CONFIG_DIR")
                .takes_value(true)
                .default_value("settings"),
        )
        .arg(
            Arg::with_name("node")
                .short("n")
                .long("node")
                .value_name("NAME@PRIMARY[,SECONDARY]")
                .multiple(true),
        )
        .arg(
            Arg::with_name("send-only")
                .short("s")
                .long("send-only")
                .value_name("NAME@PRIMARY")
                .multiple(true),
        )
        .arg(
            Arg::with_name("chain-id")
                .long("chain-id")
                .value_name("CHAIN_ID")
                .takes_value(true)
                .required(false),
        )
        .get_matches();

    let config_dir = value_t!(matches.value_of("config"), String).unwrap_or_else(|e| e.exit());
    let mut settings = Settings::load(Path::new(&config_dir))?;
    let chain_id = match matches.value_of("chain-id") {
        Some(_) => {
            Some(value_t!(matches.value_of("chain-id"), ChainId).unwrap_or_else(|e| e.exit()))
        }
        None => settings.chain_id(),
    };
    settings.chain_id = chain_id.map(|ChainId(id)| id);

    let pool = if matches.is_present("node") {
        let nodes = values_t!(matches.values_of("node"), Endpoint).unwrap_or_else(|e| e.exit());
        let send_only_nodes = match matches.values_of("send-only") {
            Some(_) => {
                values_t!(matches.values_of("send-only"), Endpoint).unwrap_or_else(|e| e.exit())
            }
            None => vec![],
        };
        Pool::from_endpoints(nodes, send_only_nodes, chain_id, settings.pool_config())
    } else {
        Pool::from_settings(&settings)
    };
    let pool = Arc::new(pool);
    let deadline = settings.dial_deadline();

    let sys = actix::System::new();
    sys.block_on(async move {
        if let Err(err) = pool.dial(deadline).await {
            error!("{}", err);
            pool.close().await;
            actix::System::current().stop();
            return;
        }
        let _selector = Selector::new(pool.clone()).start();
        pool.report();

        let sig = if cfg!(unix) {
            use futures::future::FutureExt;
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = signal(SignalKind::interrupt()).unwrap();
            let mut sigterm = signal(SignalKind::terminate()).unwrap();

            futures::select! {
                _ = sigint.recv().fuse() => "SIGINT",
                _ = sigterm.recv().fuse() => "SIGTERM"
            }
        } else {
            tokio::signal::ctrl_c().await.unwrap();
            "Ctrl+C"
        };
        info!(target: "upstream-pool", "Got {}, stopping...", sig);

        pool.close().await;
        actix::System::current().stop();
    });
    sys.run()?;

    Ok(())
}
