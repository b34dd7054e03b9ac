use std::time::Duration;
use tokio::time;

use crate::broker::SessionBroker;

/// Background reaper for abandoned rooms: receivers that vanished without
/// tearing down, senders that never came back.
pub async fn task(broker: SessionBroker, ttl: Duration, period: Duration) {
    let mut tick = time::interval(period);
    loop {
        tick.tick().await;
        let swept = broker.sweep_idle(ttl).await;
        if !swept.is_empty() {
            tracing::info!(count = swept.len(), "swept idle rooms");
        }
    }
}
