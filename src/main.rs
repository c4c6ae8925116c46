use anyhow::Context;
use leverslot::routing::AggregatorRouteSource;
use leverslot::{api, config::Config, Host, Repository, Sandbox, Timestamp};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let repo = Repository::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open journal at {}", config.database_path))?;

    let sandbox = Sandbox::build(config.chain_id, Timestamp::now())
        .context("Failed to seed sandbox chain")?;
    let host = Host::new(sandbox.chain)
        .with_journal(repo.clone())
        .with_wall_clock();
    host.deploy_factory(config.factory_address)
        .await
        .context("Failed to deploy factory")?;
    tracing::info!(
        factory = %config.factory_address,
        usdc = %sandbox.usdc,
        usdt = %sandbox.usdt,
        "sandbox chain ready"
    );

    let routes = AggregatorRouteSource::new(config.route_api_url.clone(), config.chain_id)
        .with_decimals(sandbox.usdc, 6)
        .with_decimals(sandbox.usdt, 6);
    tracing::info!(
        url = %config.route_api_url,
        slippage_bps = config.slippage_bps,
        "route source configured"
    );

    let app = api::create_router(api::AppState::new(
        Arc::new(host),
        Arc::new(repo),
        Arc::new(routes),
        config,
    ));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
