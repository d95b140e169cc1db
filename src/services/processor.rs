use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use super::StatusPoller;
use crate::ports::PaymentStore;

pub const RECONCILE_BATCH_SIZE: i64 = 50;
pub const RECONCILE_MIN_AGE_SECS: i64 = 120;

/// Runs the background reconciler loop. Resolves payments whose callback never
/// arrived by polling the provider through the status poller, without
/// blocking the HTTP server.
pub async fn run_reconciler(
    store: Arc<dyn PaymentStore>,
    poller: Arc<StatusPoller>,
    interval: Duration,
) {
    info!(interval_secs = interval.as_secs(), "Payment reconciler started");

    loop {
        sleep(interval).await;

        let purged = poller.purge_cache();
        if purged > 0 {
            debug!(purged, "Expired status cache entries dropped");
        }

        match reconcile_batch(store.as_ref(), &poller).await {
            Ok(0) => {}
            Ok(count) => debug!(count, "Reconciled pending payment(s)"),
            Err(e) => error!("Reconciler batch error: {}", e),
        }
    }
}

/// One sweep over stale non-terminal payments. Returns how many were checked.
pub async fn reconcile_batch(store: &dyn PaymentStore, poller: &StatusPoller) -> anyhow::Result<usize> {
    let cutoff = Utc::now() - chrono::Duration::seconds(RECONCILE_MIN_AGE_SECS);
    let pending = store.list_unsettled(cutoff, RECONCILE_BATCH_SIZE).await?;

    if pending.is_empty() {
        return Ok(0);
    }

    debug!("Reconciling {} pending payment(s)", pending.len());

    for request in &pending {
        match poller.refresh(&request.reference).await {
            Ok(body) => debug!(
                reference = %request.reference,
                status = body["status"].as_str().unwrap_or("unknown"),
                "Payment reconciled"
            ),
            Err(e) => warn!(reference = %request.reference, error = %e, "Failed to reconcile payment"),
        }
    }

    Ok(pending.len())
}
