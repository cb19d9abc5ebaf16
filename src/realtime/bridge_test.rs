use crate::logging::init_for_tests;
use crate::realtime::broker::{Broker, topic_for};
use crate::realtime::connection::{
    CloseReason, ConnectionHandle, ConnectionState, OutboundFrame,
};
use crate::realtime::hub::Realtime;
use crate::realtime::memory_broker::MemoryBroker;
use crate::shared::config::RealtimeSettings;
use crate::test_helpers::wait::eventually;
use bytes::Bytes;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use uuid::Uuid;

fn settings() -> RealtimeSettings {
    RealtimeSettings {
        shutdown_grace_ms: 200,
        write_timeout_ms: 200,
        ..RealtimeSettings::default()
    }
}

fn start(broker: &MemoryBroker) -> Arc<Realtime> {
    init_for_tests();
    Realtime::start(Arc::new(broker.connect()), settings())
}

fn tables(ids: &[Uuid]) -> HashSet<Uuid> {
    ids.iter().copied().collect()
}

fn drain(rx: &mut mpsc::Receiver<OutboundFrame>) -> Vec<Bytes> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let OutboundFrame::Event(payload) = frame {
            out.push(payload);
        }
    }
    out
}

#[tokio::test]
async fn broker_subscriptions_follow_interest() {
    let broker = MemoryBroker::new();
    let hub = start(&broker);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (t_a, t_b) = (topic_for(a), topic_for(b));

    let (h1, _rx1, _) = ConnectionHandle::detached(8);
    let (h2, _rx2, _) = ConnectionHandle::detached(8);
    hub.registry().register(h1.clone(), tables(&[a])).await.unwrap();
    hub.registry().register(h2.clone(), tables(&[a, b])).await.unwrap();
    eventually("both topics subscribed", || {
        broker.subscriber_count(&t_a) == 1 && broker.subscriber_count(&t_b) == 1
    })
    .await;

    hub.registry().unregister(h2.id()).await.unwrap();
    eventually("b unsubscribed", || broker.subscriber_count(&t_b) == 0).await;
    assert_eq!(broker.subscriber_count(&t_a), 1);

    hub.registry().unsubscribe(h1.id(), a).await.unwrap();
    eventually("a unsubscribed", || broker.subscriber_count(&t_a) == 0).await;
}

#[tokio::test]
async fn published_events_fan_out_to_interested_handles() {
    let broker = MemoryBroker::new();
    let hub = start(&broker);
    let publisher = broker.connect();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let (h1, mut rx1, _) = ConnectionHandle::detached(8);
    let (h2, mut rx2, _) = ConnectionHandle::detached(8);
    let (h3, mut rx3, _) = ConnectionHandle::detached(8);
    hub.registry().register(h1, tables(&[a])).await.unwrap();
    hub.registry().register(h2, tables(&[a])).await.unwrap();
    hub.registry().register(h3, tables(&[b])).await.unwrap();
    eventually("a subscribed", || broker.subscriber_count(&topic_for(a)) == 1).await;

    publisher
        .publish(&topic_for(a), Bytes::from_static(b"evt"))
        .await
        .unwrap();

    let mut got1 = Vec::new();
    let mut got2 = Vec::new();
    eventually("both handles receive", || {
        got1.extend(drain(&mut rx1));
        got2.extend(drain(&mut rx2));
        !got1.is_empty() && !got2.is_empty()
    })
    .await;
    assert_eq!(got1, vec![Bytes::from_static(b"evt")]);
    assert_eq!(got2, vec![Bytes::from_static(b"evt")]);
    assert!(drain(&mut rx3).is_empty());
}

#[tokio::test]
async fn slow_consumer_is_evicted_and_topic_released() {
    let broker = MemoryBroker::new();
    let hub = start(&broker);
    let publisher = broker.connect();
    let table_id = Uuid::new_v4();
    let topic = topic_for(table_id);

    let (slow, _rx, state) = ConnectionHandle::detached(1);
    hub.registry().register(slow.clone(), tables(&[table_id])).await.unwrap();
    eventually("subscribed", || broker.subscriber_count(&topic) == 1).await;

    for i in 0..3u8 {
        publisher.publish(&topic, Bytes::from(vec![i])).await.unwrap();
    }

    eventually("evicted", || {
        *state.borrow() == ConnectionState::Closing(CloseReason::SlowConsumer)
    })
    .await;
    eventually("unsubscribed", || broker.subscriber_count(&topic) == 0).await;
    assert_eq!(hub.registry().interests(slow.id()).await.unwrap(), None);
}

#[tokio::test]
async fn failed_subscribe_is_retried() {
    let broker = MemoryBroker::new();
    let hub = start(&broker);
    let table_id = Uuid::new_v4();
    let topic = topic_for(table_id);

    broker.set_available(false);
    let (handle, _rx, _) = ConnectionHandle::detached(8);
    hub.registry().register(handle, tables(&[table_id])).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(broker.subscriber_count(&topic), 0);

    broker.set_available(true);
    eventually("subscribed after retry", || broker.subscriber_count(&topic) == 1).await;
}

#[tokio::test]
async fn shutdown_closes_handles_and_unsubscribes() {
    let broker = MemoryBroker::new();
    let hub = start(&broker);
    let table_id = Uuid::new_v4();
    let topic = topic_for(table_id);

    let (handle, _rx, state) = ConnectionHandle::detached(8);
    hub.registry().register(handle, tables(&[table_id])).await.unwrap();
    eventually("subscribed", || broker.subscriber_count(&topic) == 1).await;

    hub.shutdown().await;
    assert!(hub.is_shutting_down());
    assert_eq!(
        *state.borrow(),
        ConnectionState::Closing(CloseReason::Shutdown)
    );
    assert_eq!(broker.subscriber_count(&topic), 0);
}

/// Half the connections leave while events flow. Those that stay see every
/// event for their tables in publish order. Those that leave see nothing
/// published after their removal was acknowledged.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unregistration_keeps_delivery_exact() {
    const CONNECTIONS: usize = 20;
    const EVENTS: usize = 400;

    let broker = MemoryBroker::new();
    let hub = start(&broker);
    let publisher = broker.connect();
    let table_ids = [Uuid::new_v4(), Uuid::new_v4()];
    let table_of = move |seq: usize| table_ids[seq % 2];

    let mut handles = Vec::new();
    for i in 0..CONNECTIONS {
        let interests = match i % 4 {
            0 | 3 => tables(&[table_ids[0]]),
            1 => tables(&[table_ids[1]]),
            _ => tables(&table_ids),
        };
        let (handle, rx, _) = ConnectionHandle::detached(EVENTS + 16);
        hub.registry().register(handle.clone(), interests.clone()).await.unwrap();
        handles.push((handle, rx, interests));
    }
    eventually("both topics subscribed", || {
        table_ids
            .iter()
            .all(|t| broker.subscriber_count(&topic_for(*t)) == 1)
    })
    .await;

    let published = Arc::new(AtomicUsize::new(0));
    let producer = {
        let published = Arc::clone(&published);
        tokio::spawn(async move {
            for seq in 0..EVENTS {
                let payload = Bytes::from(seq.to_string());
                publisher.publish(&topic_for(table_of(seq)), payload).await.unwrap();
                published.fetch_add(1, Ordering::SeqCst);
                if seq % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    let mut leavers = Vec::new();
    for (handle, _, _) in handles.iter().filter(|(_, _, i)| i.len() == 1).skip(1).step_by(2) {
        let registry = hub.registry().clone();
        let published = Arc::clone(&published);
        let id = handle.id();
        let delay = rand::thread_rng().gen_range(0..20);
        leavers.push(tokio::spawn(async move {
            sleep(Duration::from_millis(delay)).await;
            registry.unregister(id).await.unwrap();
            (id, published.load(Ordering::SeqCst))
        }));
    }

    producer.await.unwrap();
    let mut cutoffs = std::collections::HashMap::new();
    for leaver in leavers {
        let (id, cutoff) = leaver.await.unwrap();
        cutoffs.insert(id, cutoff);
    }

    // Every event ends up with the stayers once the registry catches up.
    let expected_total: usize = handles
        .iter()
        .filter(|(h, _, _)| !cutoffs.contains_key(&h.id()))
        .map(|(_, _, interests)| (0..EVENTS).filter(|s| interests.contains(&table_of(*s))).count())
        .sum();
    let mut received: Vec<Vec<usize>> = vec![Vec::new(); handles.len()];
    eventually("stayers receive every event", || {
        for (slot, (_, rx, _)) in received.iter_mut().zip(handles.iter_mut()) {
            slot.extend(
                drain(rx)
                    .iter()
                    .map(|b| std::str::from_utf8(b).unwrap().parse::<usize>().unwrap()),
            );
        }
        let got: usize = handles
            .iter()
            .zip(&received)
            .filter(|((h, _, _), _)| !cutoffs.contains_key(&h.id()))
            .map(|(_, seqs)| seqs.len())
            .sum();
        got >= expected_total
    })
    .await;

    for ((handle, _, interests), seqs) in handles.iter().zip(&received) {
        match cutoffs.get(&handle.id()) {
            None => {
                let expected: Vec<usize> = (0..EVENTS)
                    .filter(|s| interests.contains(&table_of(*s)))
                    .collect();
                assert_eq!(seqs, &expected);
            }
            Some(&cutoff) => {
                assert!(seqs.windows(2).all(|w| w[0] < w[1]));
                assert!(seqs.iter().all(|s| *s <= cutoff));
                assert!(seqs.iter().all(|s| interests.contains(&table_of(*s))));
            }
        }
    }
    assert!(!cutoffs.is_empty());
}
