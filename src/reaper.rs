use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::model::now_ms;

/// Background task that returns expired holds to availability and prunes
/// archived hold records past retention. Mandatory for correctness: without
/// it, rooms held by an abandoned checkout would be lost forever.
pub async fn run_reaper(engine: Arc<Engine>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = now_ms();
        for hold_id in engine.collect_expired_holds(now) {
            match engine.expire_hold(hold_id, now).await {
                Ok(()) => info!("reaped expired hold {hold_id}"),
                // Lost the race to a confirm or cancel — that's fine.
                Err(e) => debug!("reaper skip {hold_id}: {e}"),
            }
        }
        let pruned = engine.prune_archived(now);
        if pruned > 0 {
            debug!("pruned {pruned} archived holds");
        }
    }
}

/// Background task that rewrites the journal down to live state once enough
/// appends accumulate since the last rewrite.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        let appends = engine.journal_appends_since_rewrite().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_journal().await {
            Ok(()) => info!("journal compacted after {appends} appends"),
            Err(e) => warn!("journal compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::catalog::CatalogStore;
    use crate::engine::Engine;
    use crate::model::*;

    fn test_journal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("stayd_test_reaper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn catalog() -> Arc<CatalogStore> {
        let mut calendar = BTreeMap::new();
        let range = DateRange::new(
            "2025-12-01".parse().unwrap(),
            "2025-12-05".parse().unwrap(),
        );
        for date in range.days() {
            calendar.insert(date, BTreeMap::from([("standard_room".to_string(), 10u32)]));
        }
        Arc::new(CatalogStore::from_properties(vec![Property {
            property_id: "dubai_grand_001".into(),
            name: "Dubai Grand Hotel".into(),
            address: String::new(),
            city: "Dubai".into(),
            star_rating: 5,
            amenities: vec![],
            room_types: vec![RoomType {
                room_type_id: "standard_room".into(),
                name: "Standard Room".into(),
                max_occupancy: 2,
                base_price_usd: 160.0,
            }],
            availability_calendar: calendar,
        }]))
    }

    #[tokio::test]
    async fn sweep_restores_abandoned_rooms() {
        let engine = Arc::new(
            Engine::new(
                catalog(),
                test_journal_path("sweep_restores.journal"),
                600_000,
            )
            .unwrap(),
        );
        let range = DateRange::new(
            "2025-12-01".parse().unwrap(),
            "2025-12-03".parse().unwrap(),
        );

        // An abandoned checkout: held, never confirmed, TTL already lapsed.
        engine
            .create_hold("dubai_grand_001", "standard_room", range, 3, "sess_gone", -1_000)
            .await
            .unwrap();

        // One manual sweep iteration.
        let now = now_ms();
        for hold_id in engine.collect_expired_holds(now) {
            engine.expire_hold(hold_id, now).await.unwrap();
        }

        let report = engine
            .check_availability("dubai_grand_001", "standard_room", &range, 10)
            .await
            .unwrap();
        assert!(report.available);
        assert_eq!(report.available_rooms, 10);
        assert!(engine.collect_expired_holds(now).is_empty());
    }
}
