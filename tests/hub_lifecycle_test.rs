// Integration tests for the tracking hub lifecycle
//
// Frames are fed through the hub's frame port and outlets are in-memory, so
// no motion-capture server or NATS connection is needed.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use trackhub::entity::Vec3;
use trackhub::frame::{FrameSample, MarkerSetGroup};
use trackhub::mocap::ReplayClient;
use trackhub::outlet::{MemoryOutletFactory, Sample};
use trackhub::{HubConfig, TrackingHub};

// ── Helpers ────────────────────

fn marker_frame(groups: &[(&str, [f64; 3])]) -> FrameSample {
    FrameSample {
        frame_number: None,
        marker_sets: groups
            .iter()
            .map(|(name, position)| MarkerSetGroup {
                name: Some(name.to_string()),
                positions: vec![Some(position.to_vec())],
            })
            .collect(),
        skeletons: vec![],
    }
}

fn marker_codes(factory: &MemoryOutletFactory) -> Vec<i32> {
    factory
        .outlet("Navigation_Markers")
        .unwrap()
        .samples()
        .into_iter()
        .map(|sample| match sample {
            Sample::Int32(values) => values[0],
            other => panic!("unexpected marker sample {:?}", other),
        })
        .collect()
}

// ── Tests ──────────────────────

#[tokio::test]
async fn test_full_session() {
    let factory = MemoryOutletFactory::new();
    let hub = Arc::new(TrackingHub::new(HubConfig::default()));
    hub.start(Some(&factory), None).unwrap();

    let status = hub.connection_status();
    assert!(status.publish_live);
    assert!(!status.degraded);

    let port = hub.frame_port();
    for i in 0..10 {
        let x = i as f64 * 0.1;
        port.deliver_frame(&marker_frame(&[("Sub001", [x, 0.0, 1.0]), ("Sub002", [0.0, x, 1.0])]));
    }

    let sub1 = hub.cached_position("Sub001").unwrap();
    let sub1_alias = hub.cached_position("Skeleton_1").unwrap();
    assert_eq!(sub1, sub1_alias);
    assert!((sub1.position.x - 0.9).abs() < 1e-9);
    assert_eq!(hub.cached_position("Sub002").unwrap().position.z, 1.0);

    for code in [11, 12, 13, 21, 22] {
        assert!(hub.enqueue_marker(code));
    }

    let stats = hub.stats();
    assert_eq!(stats.total_frames, 10);
    assert_eq!(stats.cached_entity_count, 2);
    assert_eq!(stats.cached_alias_count, 4);

    hub.stop().await;

    assert_eq!(marker_codes(&factory), vec![11, 12, 13, 21, 22]);
    assert_eq!(factory.outlet("Sub001_Position").unwrap().samples().len(), 10);
    assert_eq!(factory.outlet("Sub002_Position").unwrap().samples().len(), 10);

    // Cache outlives the session
    assert!(hub.cached_position("Sub002").is_some());
}

#[tokio::test]
async fn test_marker_enqueue_from_other_threads() {
    let factory = MemoryOutletFactory::new();
    let hub = Arc::new(TrackingHub::new(HubConfig::default()));
    hub.start(Some(&factory), None).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || {
                for i in 0..25 {
                    assert!(hub.enqueue_marker(t * 100 + i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    hub.stop().await;

    let codes = marker_codes(&factory);
    assert_eq!(codes.len(), 100);
    // Per-thread order is preserved
    for t in 0..4 {
        let from_thread: Vec<i32> = codes.iter().copied().filter(|c| c / 100 == t).collect();
        assert_eq!(from_thread, (0..25).map(|i| t * 100 + i).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_partial_position_outlets() {
    let factory = MemoryOutletFactory::new();
    factory.mark_unavailable("Sub002_Position");

    let hub = TrackingHub::new(HubConfig::default());
    hub.start(Some(&factory), None).unwrap();
    assert!(hub.broadcaster().has_channel("Sub001"));
    assert!(!hub.broadcaster().has_channel("Sub002"));

    hub.frame_port()
        .deliver_frame(&marker_frame(&[("Sub001", [1.0, 1.0, 1.0]), ("Sub002", [2.0, 2.0, 2.0])]));

    // Sub002 is still cached even though it has no outlet
    assert_eq!(hub.cached_position("Sub002").unwrap().position, Vec3::new(2.0, 2.0, 2.0));
    hub.stop().await;
}

#[tokio::test]
async fn test_replay_client_session() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"type":"frame","marker_sets":[{{"name":"Sub001","positions":[[1,2,3],[3,2,3]]}}]}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"type":"rigid_body","id":2,"position":[0.0,1.0,0.0],"rotation":[0.0,0.0,0.0,1.0]}}"#
    )
    .unwrap();

    let mut config = HubConfig::default();
    config.mocap.replay_file = Some(file.path().to_path_buf());
    let client = ReplayClient::new(file.path(), 200.0, false);

    let factory = MemoryOutletFactory::new();
    let hub = TrackingHub::new(config);
    hub.start(Some(&factory), Some(Box::new(client))).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while hub.cached_rigid_body("RigidBody_2").is_none() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(
        hub.cached_position("Sub001").unwrap().position,
        Vec3::new(2.0, 2.0, 3.0)
    );
    assert!(hub.cached_rigid_body("RigidBody_2").is_some());
    assert!(hub.connection_status().ingestion_live);

    hub.stop().await;
}
