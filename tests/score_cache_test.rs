use wallet_radar::cache::ScoreCache;
use wallet_radar::config::{CacheConfig, QualityTtl};
use wallet_radar::model::Quality;

fn cache(max_entries: usize, high_ms: u64, medium_ms: u64, low_ms: u64) -> ScoreCache<String> {
    ScoreCache::new(&CacheConfig {
        max_entries,
        ttl: QualityTtl {
            high_ms,
            medium_ms,
            low_ms,
        },
    })
}

#[test]
fn quality_selects_the_ttl() {
    let mut cache = cache(10, 1000, 500, 100);
    cache.put_at("good", "a".to_string(), Quality::High, 0);
    cache.put_at("poor", "b".to_string(), Quality::Low, 0);

    assert_eq!(cache.get_at("good", 500), Some("a".to_string()));
    assert_eq!(cache.get_at("poor", 500), None);
    // the boundary itself is already stale
    assert_eq!(cache.get_at("good", 1000), None);
}

#[test]
fn stale_entries_are_absent_but_stay_resident() {
    let mut cache = cache(10, 1000, 500, 100);
    cache.put_at("a", "1".to_string(), Quality::Low, 0);
    cache.put_at("b", "2".to_string(), Quality::High, 0);

    assert_eq!(cache.get_at("a", 200), None);
    assert_eq!(cache.len(), 2); // stale read does not evict
}

#[test]
fn size_cap_evicts_exactly_the_single_oldest_entry() {
    let mut cache = cache(2, 1000, 500, 100);
    cache.put_at("a", "1".to_string(), Quality::High, 0);
    cache.put_at("b", "2".to_string(), Quality::High, 10);
    cache.put_at("c", "3".to_string(), Quality::High, 20);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get_at("a", 30), None);
    assert_eq!(cache.get_at("b", 30), Some("2".to_string()));
    assert_eq!(cache.get_at("c", 30), Some("3".to_string()));
}

#[test]
fn overwrite_is_last_write_wins() {
    let mut cache = cache(10, 1000, 500, 100);
    cache.put_at("a", "old".to_string(), Quality::Low, 0);
    cache.put_at("a", "new".to_string(), Quality::High, 150);
    assert_eq!(cache.get_at("a", 500), Some("new".to_string()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn split_by_freshness_partitions_fetch_work() {
    let mut cache = cache(10, 1000, 500, 100);
    cache.put_at("fresh", "1".to_string(), Quality::High, 0);
    cache.put_at("stale", "2".to_string(), Quality::Low, 0);

    let keys = vec![
        "fresh".to_string(),
        "stale".to_string(),
        "unknown".to_string(),
    ];
    let (fresh, missing) = cache.split_by_freshness_at(&keys, 500);

    assert_eq!(fresh, vec![("fresh".to_string(), "1".to_string())]);
    assert_eq!(missing, vec!["stale".to_string(), "unknown".to_string()]);
}
