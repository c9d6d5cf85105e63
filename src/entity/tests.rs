use super::*;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use std::thread;

fn at(ms: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
}

#[test]
fn test_upsert_creates_entity() {
    let cache = EntityCache::new();
    cache.upsert("Wand", EntityUpdate::marker_set(Vec3::new(1.0, 2.0, 3.0), at(0)));

    let state = cache.get("Wand").unwrap();
    assert_eq!(state.name, "Wand");
    assert_eq!(state.position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(state.rotation, None);
    assert_eq!(state.timestamp, at(0));
    assert!(state.valid);
    assert_eq!(state.source, EntitySource::MarkerSet);
}

#[test]
fn test_get_nonexistent_entity() {
    let cache = EntityCache::new();
    assert!(cache.get("Sub001").is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_last_upsert_wins() {
    let cache = EntityCache::new();

    cache.upsert(
        "Chair",
        EntityUpdate::rigid_body(4, Vec3::new(1.0, 1.0, 1.0), Quat::new(0.0, 0.0, 0.0, 1.0), at(0)),
    );
    cache.upsert("Chair", EntityUpdate::marker_set(Vec3::new(5.0, 6.0, 7.0), at(10)));

    let state = cache.get("Chair").unwrap();
    assert_eq!(state.position, Vec3::new(5.0, 6.0, 7.0));
    assert_eq!(state.timestamp, at(10));
    // Every field comes from the last write, including the cleared rotation
    assert_eq!(state.rotation, None);
    assert_eq!(state.source, EntitySource::MarkerSet);
    assert_eq!(state.source_id, None);
}

#[test]
fn test_subject_alias_reads_same_sample() {
    let cache = EntityCache::new();
    cache.upsert("Sub001", EntityUpdate::marker_set(Vec3::new(0.5, 1.7, -2.0), at(5)));

    let by_subject = cache.get("Sub001").unwrap();
    let by_skeleton = cache.get("Skeleton_1").unwrap();
    assert_eq!(by_subject, by_skeleton);
    assert_eq!(by_skeleton.name, "Sub001");

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.alias_count(), 2);
}

#[test]
fn test_alias_updates_are_shared() {
    let cache = EntityCache::new();
    cache.upsert("Sub002", EntityUpdate::marker_set(Vec3::new(0.0, 0.0, 0.0), at(0)));

    // A write under the skeleton alias lands in the same record
    let aliases = vec!["Skeleton_2".to_string()];
    cache.upsert_aliases(
        "Skeleton_2",
        &aliases,
        EntityUpdate::skeleton(2, Vec3::new(3.0, 1.0, 4.0), None, at(20)),
    );

    let state = cache.get("Sub002").unwrap();
    assert_eq!(state.position, Vec3::new(3.0, 1.0, 4.0));
    assert_eq!(state.timestamp, at(20));
    assert_eq!(state.source_id, Some(2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_new_alias_joins_existing_entity() {
    let cache = EntityCache::new();
    cache.upsert("Sub003", EntityUpdate::marker_set(Vec3::new(1.0, 0.0, 0.0), at(0)));

    let aliases = vec!["Alice".to_string(), "Skeleton_3".to_string()];
    cache.upsert_aliases(
        "Alice",
        &aliases,
        EntityUpdate::skeleton(3, Vec3::new(2.0, 0.0, 0.0), None, at(1)),
    );

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.names(), vec!["Alice", "Skeleton_3", "Sub003"]);
    for name in ["Alice", "Skeleton_3", "Sub003"] {
        assert_eq!(cache.get(name).unwrap().position, Vec3::new(2.0, 0.0, 0.0));
    }
}

#[test]
fn test_distinct_entities_do_not_mix() {
    let cache = EntityCache::new();
    cache.upsert("Sub001", EntityUpdate::marker_set(Vec3::new(1.0, 1.0, 1.0), at(0)));
    cache.upsert("Sub002", EntityUpdate::marker_set(Vec3::new(2.0, 2.0, 2.0), at(1)));

    assert_eq!(cache.get("Skeleton_1").unwrap().position, Vec3::new(1.0, 1.0, 1.0));
    assert_eq!(cache.get("Skeleton_2").unwrap().position, Vec3::new(2.0, 2.0, 2.0));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.snapshot().len(), 2);
}

#[test]
fn test_first_valid_prefers_body_positions() {
    let cache = EntityCache::new();
    cache.upsert(
        "RigidBody_1",
        EntityUpdate::rigid_body(1, Vec3::new(9.0, 9.0, 9.0), Quat::new(0.0, 0.0, 0.0, 1.0), at(0)),
    );
    assert_eq!(cache.first_valid().unwrap().name, "RigidBody_1");

    cache.upsert("Sub001", EntityUpdate::marker_set(Vec3::new(1.0, 0.0, 0.0), at(1)));
    assert_eq!(cache.first_valid().unwrap().name, "Sub001");
}

#[test]
fn test_freshness() {
    let cache = EntityCache::new();
    cache.upsert("Sub001", EntityUpdate::marker_set(Vec3::default(), at(0)));
    let state = cache.get("Sub001").unwrap();

    assert!(state.is_fresh(at(2_999), Duration::seconds(3)));
    assert!(!state.is_fresh(at(3_000), Duration::seconds(3)));
    assert_eq!(state.age(at(1_500)), Duration::milliseconds(1_500));
}

#[test]
fn test_concurrent_readers_never_see_mixed_fields() {
    let cache = Arc::new(EntityCache::new());
    cache.upsert("Sub001", EntityUpdate::marker_set(Vec3::new(0.0, 0.0, 0.0), at(0)));

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for i in 1..=2_000i64 {
                let v = i as f64;
                cache.upsert("Sub001", EntityUpdate::marker_set(Vec3::new(v, v, v), at(i)));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let cache = Arc::clone(&cache);
            let name = if r % 2 == 0 { "Sub001" } else { "Skeleton_1" };
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let state = cache.get(name).unwrap();
                    let p = state.position;
                    assert_eq!(p.x, p.y);
                    assert_eq!(p.y, p.z);
                    assert_eq!(state.timestamp, at(p.x as i64));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(cache.get("Skeleton_1").unwrap().position.x, 2_000.0);
}

#[test]
fn test_concurrent_registration_of_distinct_entities() {
    let cache = Arc::new(EntityCache::new());
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let name = format!("Sub{:03}", i + 1);
                cache.upsert(&name, EntityUpdate::marker_set(Vec3::new(i as f64, 0.0, 0.0), at(0)));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 10);
    assert_eq!(cache.alias_count(), 20);
    assert_eq!(cache.get("Skeleton_10").unwrap().position.x, 9.0);
}
