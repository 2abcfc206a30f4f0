use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use infrastructure::{EventHub, StreamEvent};

fn event(n: usize) -> StreamEvent {
    StreamEvent {
        kind: "line.status".into(),
        payload: json!({ "seq": n }),
    }
}

#[tokio::test]
async fn test_all_subscribers_receive_broadcasts() {
    let hub = EventHub::new();
    let mut a = hub.register();
    let mut b = hub.register();
    assert_eq!(hub.subscriber_count(), 2);

    for n in 0..5 {
        hub.broadcast(event(n));
    }

    for n in 0..5 {
        let got = timeout(Duration::from_secs(1), a.rx.recv())
            .await
            .expect("subscriber a timed out")
            .expect("subscriber a channel closed");
        assert_eq!(got.payload["seq"], n);

        let got = timeout(Duration::from_secs(1), b.rx.recv())
            .await
            .expect("subscriber b timed out")
            .expect("subscriber b channel closed");
        assert_eq!(got.payload["seq"], n);
    }
}

#[tokio::test]
async fn test_slow_subscriber_drops_without_stalling_others() {
    let hub = EventHub::new();
    let mut fast = hub.register();
    let mut slow = hub.register();

    // The slow subscriber never reads while 100 events go out.
    let reader = tokio::spawn(async move {
        let mut received = 0usize;
        while received < 100 {
            match timeout(Duration::from_secs(2), fast.rx.recv()).await {
                Ok(Some(_)) => received += 1,
                _ => break,
            }
        }
        received
    });

    for n in 0..100 {
        hub.broadcast(event(n));
        // Let the hub loop and the fast reader keep pace; the slow
        // subscriber still never reads.
        tokio::task::yield_now().await;
    }

    let fast_received = reader.await.unwrap();
    assert_eq!(fast_received, 100, "fast subscriber must see every event");

    // The slow subscriber got at most its buffered prefix, in order.
    let mut slow_received = Vec::new();
    while let Ok(got) = slow.rx.try_recv() {
        slow_received.push(got.payload["seq"].as_u64().unwrap());
    }
    assert!(
        slow_received.len() <= 16,
        "slow subscriber got more than its buffer: {}",
        slow_received.len()
    );
    assert!(!slow_received.is_empty());
    for (i, seq) in slow_received.iter().enumerate() {
        assert_eq!(*seq, i as u64);
    }
}

#[tokio::test]
async fn test_unregister_closes_channel_once() {
    let hub = EventHub::new();
    let mut subscriber = hub.register();
    let id = subscriber.id;

    hub.unregister(id);
    // A second unregister of the same id is a no-op.
    hub.unregister(id);

    assert_eq!(hub.subscriber_count(), 0);
    let closed = timeout(Duration::from_secs(1), subscriber.rx.recv())
        .await
        .expect("recv timed out");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_broadcast_after_shutdown_is_silent() {
    let hub = EventHub::new();
    let mut subscriber = hub.register();

    hub.shutdown();
    assert_eq!(hub.subscriber_count(), 0);

    // Channel closed by shutdown.
    let closed = timeout(Duration::from_secs(1), subscriber.rx.recv())
        .await
        .expect("recv timed out");
    assert!(closed.is_none());

    // No panic, no delivery.
    hub.broadcast(event(1));
}
