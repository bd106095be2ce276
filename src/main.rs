use anyhow::{bail, Context};
use navrecon::datasource::{NavApiSource, QuoteSource};
use navrecon::domain::MAX_ASSET_DECIMALS;
use navrecon::orchestration::{run_pull_loop, SystemClock};
use navrecon::{
    api, config::Config, db::init_db, CycleRunner, LedgerConnector, LedgerGateway,
    OperationMode, Reconciler, Repository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("initializing database at {}", config.database_path))?;
    let store = Arc::new(Repository::new(pool));

    let ledger = Arc::new(LedgerGateway::new(
        config.ledger_endpoint.clone(),
        config.ledger_api_key.clone(),
    ));
    let asset_decimals = match config.asset_decimals {
        Some(decimals) => decimals,
        None => ledger
            .asset_decimals()
            .await
            .context("querying vault asset decimals")?,
    };
    if asset_decimals > MAX_ASSET_DECIMALS {
        bail!(
            "vault asset reports {} decimals, at most {} are supported",
            asset_decimals,
            MAX_ASSET_DECIMALS
        );
    }
    tracing::info!(
        asset_decimals,
        mode = ?config.operation_mode,
        threshold_percent = config.threshold_percent,
        threshold_period_seconds = config.threshold_period_seconds,
        fee_percent = %config.fee_rate_percent,
        "starting reconciler"
    );

    let reconciler = Reconciler::new(
        ledger,
        store,
        Arc::new(SystemClock),
        config.engine_policy(),
    );
    let runner = Arc::new(CycleRunner::new(Arc::new(reconciler)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let pull_loop = match (config.operation_mode, &config.nav_api) {
        (OperationMode::Pull, Some(nav_api)) => {
            let source: Arc<dyn QuoteSource> = Arc::new(NavApiSource::new(
                nav_api.url.clone(),
                nav_api.api_key.clone(),
                asset_decimals,
            ));
            let initial = runner
                .bootstrap(source.as_ref())
                .await
                .context("initial reconciliation cycle")?;
            tracing::info!(code = %initial.code, "initial cycle complete");

            Some(tokio::spawn(run_pull_loop(
                runner.clone(),
                source,
                config.poll_interval,
                wait_for_shutdown(shutdown_rx.clone()),
            )))
        }
        (OperationMode::Pull, None) => bail!("pull mode requires GET_NAV_URL and API_KEY"),
        (OperationMode::Push, _) => None,
    };

    let app = api::create_router(api::AppState::new(runner, asset_decimals));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .await
        .context("server error")?;

    if let Some(handle) = pull_loop {
        handle.await.context("pull loop panicked")?;
    }
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
