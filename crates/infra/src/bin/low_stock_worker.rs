//! Runs the low-stock report job against Postgres until Ctrl-C.

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stockledger_infra::{LedgerConfig, LowStockReportJob, PgLedgerStore};

#[tokio::main]
async fn main() {
    stockledger_observability::init();

    let config = LedgerConfig::from_env();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        error!("DATABASE_URL not set");
        std::process::exit(2);
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
    {
        Ok(pool) => pool,
        Err(err) => {
            error!(error = %err, "failed to connect to Postgres");
            std::process::exit(1);
        }
    };

    let store = PgLedgerStore::new(pool);
    if let Err(err) = store.migrate().await {
        error!(error = %err, "failed to apply ledger schema");
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            cancel.cancel();
        }
    });

    LowStockReportJob::new(store, config.low_stock)
        .run(cancel)
        .await;
}
