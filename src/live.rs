//! Live feed poller
//!
//! Polls `live_pc` on an interval and publishes every snapshot that changed
//! since the previous poll to the event bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::{Database, LiveSnapshot};
use crate::events::EventBus;

/// Start the poller background task
pub fn start_live_poller(db: Arc<Database>, event_bus: EventBus, interval: Duration) {
    tokio::spawn(live_poller_task(db, event_bus, interval));
}

async fn live_poller_task(db: Arc<Database>, event_bus: EventBus, interval: Duration) {
    let mut last_seen: HashMap<String, LiveSnapshot> = HashMap::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Live poller started (interval={}s)", interval.as_secs());

    loop {
        ticker.tick().await;
        match db.get_all_live_stats().await {
            Ok(snapshots) => {
                let published = publish_changes(&mut last_seen, snapshots, &event_bus);
                if published > 0 {
                    debug!(published, "Published live snapshots");
                }
            }
            Err(e) => warn!("Failed to poll live stats: {}", e),
        }
    }
}

/// Publish snapshots that differ from the last seen one for their store
fn publish_changes(
    last_seen: &mut HashMap<String, LiveSnapshot>,
    snapshots: Vec<LiveSnapshot>,
    event_bus: &EventBus,
) -> usize {
    let mut published = 0;
    for snapshot in snapshots {
        if last_seen.get(&snapshot.store_id) == Some(&snapshot) {
            continue;
        }
        last_seen.insert(snapshot.store_id.clone(), snapshot.clone());
        event_bus.publish(snapshot);
        published += 1;
    }
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::CounterRow;
    use chrono::NaiveDate;
    use tokio::sync::broadcast;

    fn snapshot(store: &str, total: i64) -> LiveSnapshot {
        LiveSnapshot {
            store_id: store.to_string(),
            counters: CounterRow {
                timestamp: NaiveDate::from_ymd_opt(2024, 6, 15)
                    .unwrap()
                    .and_hms_opt(14, 0, 0)
                    .unwrap(),
                hour_enter_count: 1,
                hour_exit_count: 1,
                day_enter_count: 10,
                day_exit_count: 9,
                total_enter_count: total,
                total_exit_count: total - 1,
            },
        }
    }

    #[tokio::test]
    async fn publishes_only_changed_snapshots() {
        let (tx, _) = broadcast::channel(16);
        let bus = EventBus::new(tx);
        let mut rx = bus.subscribe();
        let mut seen = HashMap::new();

        let first = publish_changes(&mut seen, vec![snapshot("S1", 100), snapshot("S2", 50)], &bus);
        assert_eq!(first, 2);

        let second = publish_changes(&mut seen, vec![snapshot("S1", 100), snapshot("S2", 51)], &bus);
        assert_eq!(second, 1);

        assert_eq!(rx.recv().await.unwrap().store_id, "S1");
        assert_eq!(rx.recv().await.unwrap().store_id, "S2");
        let changed = rx.recv().await.unwrap();
        assert_eq!(changed.store_id, "S2");
        assert_eq!(changed.counters.total_enter_count, 51);
    }
}
