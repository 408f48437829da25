use std::net::IpAddr;

use anyhow::Context as _;
use structopt;
use tracing::info;

use chirp::{routes, RedisStore};

#[derive(Debug, Clone, structopt::StructOpt)]
struct Args {
    #[structopt(short, long, env = "PORT", help = "The port to serve on")]
    port: u16,

    #[structopt(
        short,
        long,
        default_value = "0.0.0.0",
        help = "The IP address to bind to"
    )]
    bind: IpAddr,

    #[structopt(
        short,
        long,
        env = "DATABASE_URL",
        help = "Connection string for the document store"
    )]
    database_url: String,
}

#[paw::main]
#[tokio::main]
async fn main(args: Args) -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let store = RedisStore::connect(&args.database_url)
        .await
        .context("failed to connect to the document store")?;
    info!("connected to the document store");

    let service = routes::app(store);

    let (addr, server) = warp::serve(service).bind_with_graceful_shutdown(
        (args.bind, args.port),
        async {
            // Serve until the process is asked to stop; in-flight requests
            // drain before the listener closes.
            let _ = tokio::signal::ctrl_c().await;
        },
    );

    info!(%addr, "serving");
    server.await;
    info!("shut down");

    Ok(())
}
