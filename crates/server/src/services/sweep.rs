//! Background expiry of stale payment QRs.

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::db::payment_qr;

/// Spawn the QR sweep, ticking every `interval`.
///
/// The sweep only retires QRs. Orders stay `PENDING` and the customer can
/// generate a fresh QR.
pub fn spawn_qr_sweep(pool: PgPool, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "QR expiry sweep started");
        loop {
            ticker.tick().await;
            sweep_once(&pool).await;
        }
    })
}

/// Run one sweep. Errors are logged and retried on the next tick.
#[instrument(skip_all)]
pub async fn sweep_once(pool: &PgPool) -> u64 {
    match payment_qr::expire_stale(pool).await {
        Ok(0) => {
            debug!("No stale payment QRs");
            0
        }
        Ok(count) => {
            info!(count, "Expired stale payment QRs");
            count
        }
        Err(e) => {
            warn!(error = %e, "QR expiry sweep failed");
            0
        }
    }
}
