use super::*;
use crate::outlet::{MemoryOutlet, MemoryOutletFactory};

fn small_config(capacity: usize) -> MarkerConfig {
    MarkerConfig {
        queue_capacity: capacity,
        ..MarkerConfig::default()
    }
}

fn marker_outlet(factory: &MemoryOutletFactory) -> Arc<MemoryOutlet> {
    factory.outlet("Navigation_Markers").unwrap()
}

fn codes(outlet: &MemoryOutlet) -> Vec<i32> {
    outlet
        .samples()
        .into_iter()
        .map(|sample| match sample {
            Sample::Int32(values) => values[0],
            other => panic!("unexpected sample {:?}", other),
        })
        .collect()
}

#[test]
fn test_default_config() {
    let config = MarkerConfig::default();
    assert_eq!(config.queue_capacity, 1000);
    assert_eq!(config.join_timeout_ms, 1000);
    assert_eq!(config.stream_name, "Navigation_Markers");
}

#[test]
fn test_enqueue_rejected_while_stopped() {
    let publisher = MarkerPublisher::new(MarkerConfig::default());
    assert!(!publisher.is_running());
    assert!(!publisher.enqueue(1));
    assert_eq!(publisher.dropped(), 1);
}

#[tokio::test]
async fn test_markers_published_in_enqueue_order() {
    let factory = MemoryOutletFactory::new();
    let publisher = MarkerPublisher::new(MarkerConfig::default());
    publisher.initialize(Some(&factory));
    assert!(!publisher.is_degraded());
    assert!(publisher.start());

    let sent: Vec<i32> = (1..=50).collect();
    for code in &sent {
        assert!(publisher.enqueue(*code));
    }

    publisher.stop().await;

    assert_eq!(codes(&marker_outlet(&factory)), sent);
    assert_eq!(publisher.published(), 50);
    assert!(!publisher.is_running());
}

#[tokio::test]
async fn test_enqueue_beyond_capacity_fails() {
    let factory = MemoryOutletFactory::new();
    let publisher = MarkerPublisher::new(small_config(1000));
    publisher.initialize(Some(&factory));
    publisher.start();

    // Current-thread runtime: the worker cannot drain until we yield
    for code in 0..1000 {
        assert!(publisher.enqueue(code));
    }
    assert_eq!(publisher.queue_len(), 1000);
    assert!(!publisher.enqueue(1000));
    assert_eq!(publisher.dropped(), 1);

    publisher.stop().await;

    let published = codes(&marker_outlet(&factory));
    assert_eq!(published, (0..1000).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_degraded_mode_still_accepts_markers() {
    let publisher = MarkerPublisher::new(MarkerConfig::default());
    publisher.initialize(None);
    assert!(publisher.is_degraded());
    assert!(!publisher.has_outlet());

    assert!(publisher.start());
    assert!(publisher.enqueue(7));
    assert!(publisher.enqueue_with_description(8, "Trial start"));

    publisher.stop().await;
    assert_eq!(publisher.published(), 0);
    assert_eq!(publisher.dropped(), 0);
}

#[tokio::test]
async fn test_outlet_creation_failure_enters_degraded_mode() {
    let factory = MemoryOutletFactory::new();
    factory.mark_unavailable("Navigation_Markers");

    let publisher = MarkerPublisher::new(MarkerConfig::default());
    publisher.initialize(Some(&factory));
    assert!(publisher.is_degraded());

    publisher.start();
    assert!(publisher.enqueue(1));
    publisher.stop().await;
}

#[tokio::test]
async fn test_publish_failure_does_not_stop_worker() {
    let factory = MemoryOutletFactory::new();
    let publisher = MarkerPublisher::new(MarkerConfig::default());
    publisher.initialize(Some(&factory));
    publisher.start();

    let outlet = marker_outlet(&factory);
    outlet.set_rejecting(true);
    assert!(publisher.enqueue(1));
    assert!(publisher.enqueue(2));

    // Let the worker drain the rejected markers
    while publisher.queue_len() > 0 {
        tokio::task::yield_now().await;
    }
    tokio::task::yield_now().await;

    outlet.set_rejecting(false);
    assert!(publisher.enqueue(3));
    publisher.stop().await;

    assert_eq!(codes(&outlet), vec![3]);
    assert_eq!(publisher.published(), 1);
}

#[tokio::test]
async fn test_single_worker_per_publisher() {
    let publisher = MarkerPublisher::new(MarkerConfig::default());
    publisher.initialize(None);
    assert!(publisher.start());
    assert!(!publisher.start());
    publisher.stop().await;

    // Restart after stop
    assert!(publisher.start());
    assert!(publisher.enqueue(5));
    publisher.stop().await;
    assert!(!publisher.enqueue(6));
}

#[tokio::test]
async fn test_stop_without_start_is_noop() {
    let publisher = MarkerPublisher::new(MarkerConfig::default());
    publisher.stop().await;
    assert!(!publisher.is_running());
}
