use cellmap::telemetry;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info");

    match cellmap::sync().await {
        Ok(summary) => {
            info!(
                watermark = ?summary.watermark,
                fetched = summary.fetched,
                inserted = summary.inserted,
                "sync finished"
            );
            Ok(())
        }
        Err(err) => {
            error!(error = ?err, "sync failed");
            Err(err)
        }
    }
}
