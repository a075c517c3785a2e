use std::time::Duration;

use modera_core::store::PostgresTaskStore;
use modera_core::CONFIG;

/// Retries connecting to Postgres until it accepts connections, or gives
/// up after `retries` attempts.
pub(crate) async fn wait_for_db(retries: u32, backoff_secs: u64) -> anyhow::Result<()> {
    let mut attempt = 0;
    loop {
        match PostgresTaskStore::connect(&CONFIG.database).await {
            Ok(_) => {
                tracing::info!("database is reachable");
                return Ok(());
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(attempt, error = %e, "database not reachable yet, retrying");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }
            Err(e) => {
                anyhow::bail!("database not reachable after {retries} retries: {e}");
            }
        }
    }
}
