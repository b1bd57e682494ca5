mod common;

use common::{EndlessClient, Notification, RecordingObserver};
use futures_util::stream::StreamExt;
use rx_rpc_stream::stream_configuration::{AdapterConfig, ServiceConfig};
use rx_rpc_stream::*;
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::time::sleep;

fn fast_service() -> InMemoryEventService {
    InMemoryEventService::new(
        ServiceConfig::default()
            .with_unary_delay(Duration::from_millis(1))
            .with_default_stream_delay(Duration::from_millis(5)),
    )
}

fn ids(events: &[StreamResult<Event>]) -> Vec<i32> {
    events
        .iter()
        .filter_map(|e| e.as_ref().ok().map(Event::id))
        .collect()
}

// ================================
// Unary calls
// ================================

#[tokio::test]
async fn test_call_once_returns_requested_event() {
    let client = EventClient::new(fast_service());

    let event = client.call_once(7).await.unwrap();
    assert_eq!(event, Event::new(7, "value 7"));
    assert_eq!(client.stats().unary_calls, 1);
}

#[tokio::test]
async fn test_call_once_surfaces_transport_error() {
    let service = fast_service();
    service.set_unavailable(true);
    let client = EventClient::new(service);

    let err = client.call_once(1).await.unwrap_err();
    assert!(matches!(
        err,
        StreamError::Transport(TransportError::Unavailable(_))
    ));
    assert_eq!(client.stats().errors, 1);
}

#[tokio::test]
async fn test_call_once_respects_deadline() {
    let service =
        InMemoryEventService::new(ServiceConfig::default().with_unary_delay(Duration::from_millis(200)));
    let config = AdapterConfig {
        request_timeout_ms: Some(20),
        ..Default::default()
    };
    let client = EventClient::with_config(service, config);
    assert_eq!(client.config().request_timeout(), Some(Duration::from_millis(20)));

    let err = client.call_once(1).await.unwrap_err();
    assert_eq!(err, StreamError::Transport(TransportError::DeadlineExceeded));
}

#[tokio::test]
async fn test_push_event_is_recorded() {
    let service = fast_service();
    let client = EventClient::new(service.clone());

    client.push_event(Event::from_id(3)).await.unwrap();
    assert_eq!(service.received_events().await, vec![Event::from_id(3)]);
    assert_eq!(client.stats().events_sent, 1);
}

// ================================
// Server streams
// ================================

#[tokio::test]
async fn test_server_stream_emits_max_count_then_completes() {
    let client = EventClient::new(fast_service());

    let events = client
        .open_server_stream(Some(5), Some(Duration::from_millis(2)))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(ids(&events), vec![1, 2, 3, 4, 5]);
    assert!(events.iter().all(|e| e.is_ok()));
    assert_eq!(client.stats().events_received, 5);
}

#[tokio::test]
async fn test_server_stream_enforces_max_count_client_side() {
    let client = EventClient::new(EndlessClient::default());

    let events = client.open_server_stream(Some(3), None).collect::<Vec<_>>().await;
    assert_eq!(ids(&events), vec![1, 2, 3]);

    let events = client.pull_server_stream(Some(4), None).collect::<Vec<_>>().await;
    assert_eq!(ids(&events), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_server_stream_is_cold() {
    let service = fast_service();
    let client = EventClient::new(service.clone());

    let stream = client.open_server_stream(Some(1), None);
    sleep(Duration::from_millis(20)).await;
    assert_eq!(service.streams_opened(), 0);

    let events = stream.collect::<Vec<_>>().await;
    assert_eq!(ids(&events), vec![1]);
    assert_eq!(service.streams_opened(), 1);
}

#[tokio::test]
async fn test_server_stream_read_failure_terminates_with_error() {
    let service = fast_service().failing_reads_after(2);
    let client = EventClient::new(service);

    let events = client
        .open_server_stream(None, Some(Duration::from_millis(2)))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(events.len(), 3);
    assert_eq!(ids(&events), vec![1, 2]);
    assert!(matches!(
        events[2],
        Err(StreamError::Transport(TransportError::ReadFailed(_)))
    ));
}

#[tokio::test]
async fn test_server_stream_open_failure_reaches_observer() {
    let service = fast_service();
    service.set_unavailable(true);
    let client = EventClient::new(service);
    let observer = RecordingObserver::new();

    client
        .subscribe_server_stream(None, None, observer.clone())
        .join()
        .await
        .unwrap();

    let notifications = observer.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        notifications[0],
        Notification::Error(StreamError::Transport(TransportError::Unavailable(_)))
    ));
}

#[tokio::test]
#[serial]
async fn test_cancelled_subscription_stops_within_one_pull() {
    let service = fast_service();
    let client = EventClient::new(service.clone());
    let observer = RecordingObserver::new();

    let subscription =
        client.subscribe_server_stream(None, Some(Duration::from_millis(10)), observer.clone());
    assert!(observer.wait_for_values(2, Duration::from_secs(2)).await);

    subscription.cancel();
    let pulls_at_cancel = service.pulls();
    let values_at_cancel = observer.values().len();
    subscription.join().await.unwrap();
    sleep(Duration::from_millis(60)).await;

    // At most the pull that was already in flight gets delivered
    assert!(observer.values().len() <= values_at_cancel + 1);
    assert!(service.pulls() <= pulls_at_cancel + 1);
    assert_eq!(observer.terminal_count(), 0);
    assert_eq!(service.active_streams(), 0);
}

#[tokio::test]
#[serial]
async fn test_pull_in_flight_at_cancel_is_delivered_then_stream_stops() {
    // The reader ignores the call token, so the second pull outlives the cancel
    let slow = EndlessClient {
        pull_delay: Duration::from_millis(100),
        ..Default::default()
    };
    let client = EventClient::new(slow.clone());
    let observer = RecordingObserver::new();

    let subscription = client.subscribe_server_stream(None, None, observer.clone());
    sleep(Duration::from_millis(150)).await;
    subscription.cancel();

    let cancelled_at = Instant::now();
    subscription.join().await.unwrap();
    assert!(cancelled_at.elapsed() < Duration::from_millis(100));

    sleep(Duration::from_millis(150)).await;
    assert_eq!(
        observer.notifications(),
        vec![
            Notification::Next(Event::from_id(1)),
            Notification::Next(Event::from_id(2)),
        ]
    );
    assert_eq!(slow.pulls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
#[serial]
async fn test_dropping_server_stream_releases_the_call() {
    let service = fast_service();
    let client = EventClient::new(service.clone());

    let events = client
        .open_server_stream(None, Some(Duration::from_millis(5)))
        .take(2)
        .collect::<Vec<_>>()
        .await;
    assert_eq!(ids(&events), vec![1, 2]);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(service.streams_opened(), 1);
    assert_eq!(service.active_streams(), 0);
}

#[tokio::test]
async fn test_subscribed_server_stream_completes_once() {
    let client = EventClient::new(fast_service());
    let observer = RecordingObserver::new();

    client
        .subscribe_server_stream(Some(3), Some(Duration::from_millis(1)), observer.clone())
        .join()
        .await
        .unwrap();

    assert_eq!(
        observer.notifications(),
        vec![
            Notification::Next(Event::from_id(1)),
            Notification::Next(Event::from_id(2)),
            Notification::Next(Event::from_id(3)),
            Notification::Completed,
        ]
    );
}

#[tokio::test]
async fn test_pull_server_stream_reads_until_server_ends() {
    let client = EventClient::new(fast_service());

    let events = client
        .pull_server_stream(Some(4), Some(Duration::from_millis(1)))
        .collect::<Vec<_>>()
        .await;
    assert_eq!(ids(&events), vec![1, 2, 3, 4]);
}

// ================================
// Client streams
// ================================

#[tokio::test]
async fn test_push_events_preserves_order_and_completes() {
    let service = fast_service();
    let client = EventClient::new(service.clone());
    let events: Vec<Event> = (1..=10).map(Event::from_id).collect();

    client.push_events(from_iter(events.clone())).await.unwrap();

    assert_eq!(service.received_events().await, events);
    assert_eq!(service.completed_pushes(), 1);
    assert_eq!(client.stats().events_sent, 10);
}

#[tokio::test]
async fn test_push_events_writes_strictly_sequentially() {
    let endless = EndlessClient {
        write_delay: Duration::from_millis(3),
        ..Default::default()
    };
    let client = EventClient::new(endless.clone());

    client
        .push_events(from_iter((1..=8).map(Event::from_id).collect::<Vec<_>>()))
        .await
        .unwrap();

    assert_eq!(endless.overlapping_writes.load(Ordering::SeqCst), 0);
    assert_eq!(*endless.written.lock().unwrap(), (1..=8).collect::<Vec<_>>());
    assert!(endless.completed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_push_events_completes_only_after_source_completes() {
    let service = fast_service();
    let client = EventClient::new(service.clone());

    let source = from_iter(vec![Event::from_id(1), Event::from_id(2)]).chain(
        futures_util::stream::once(async {
            sleep(Duration::from_millis(80)).await;
            Ok(Event::from_id(3))
        }),
    );
    let push = tokio::spawn(async move { client.push_events(source).await });

    sleep(Duration::from_millis(30)).await;
    assert_eq!(service.received_events().await.len(), 2);
    assert_eq!(service.completed_pushes(), 0);

    push.await.unwrap().unwrap();
    assert_eq!(service.received_events().await.len(), 3);
    assert_eq!(service.completed_pushes(), 1);
}

#[tokio::test]
async fn test_push_events_stops_at_failed_write() {
    let service = fast_service().failing_write_at(3);
    let client = EventClient::new(service.clone());

    let err = client
        .push_events(from_iter((1..=5).map(Event::from_id).collect::<Vec<_>>()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StreamError::Transport(TransportError::WriteFailed(_))
    ));
    assert_eq!(
        service.received_events().await,
        vec![Event::from_id(1), Event::from_id(2)]
    );
    assert_eq!(service.completed_pushes(), 0);
}

#[tokio::test]
async fn test_push_events_propagates_source_failure() {
    let service = fast_service();
    let client = EventClient::new(service.clone());

    let source = emit(Event::from_id(1)).chain(fail(StreamError::Custom("upstream".into())));
    let err = client.push_events(source).await.unwrap_err();

    assert_eq!(err, StreamError::Custom("upstream".into()));
    assert_eq!(service.received_events().await, vec![Event::from_id(1)]);
    assert_eq!(service.completed_pushes(), 0);
}
