use modera_core::CONFIG;

use crate::serve::build_state;

/// Runs the moderation worker: consumes the bus, scores listings, commits
/// terminal task state.
pub(crate) async fn run() -> anyhow::Result<()> {
    let state = build_state().await?;
    tracing::info!(topic = %CONFIG.bus.topic, "starting moderation worker");
    modera_core::service::run_worker(state, &CONFIG.bus).await
}
