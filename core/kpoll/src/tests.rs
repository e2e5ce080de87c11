//! Unit tests for the pollqueue primitive.

#![cfg(test)]

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::{thread, time::Duration};

use khal::time::{monotonic_time_nanos, NS_MS};

use crate::{IoEvents, PollChain, PollQueue, NOTIFY_ALL};

#[test]
fn test_level_state_set_clear() {
    let q = PollQueue::new();
    assert_eq!(q.poll(), IoEvents::empty());

    q.set(IoEvents::IN);
    assert_eq!(q.poll(), IoEvents::IN);
    assert_eq!(q.poll_masked(IoEvents::OUT), IoEvents::empty());

    q.set(IoEvents::OUT);
    assert_eq!(q.poll(), IoEvents::IN | IoEvents::OUT);

    q.clear(IoEvents::IN);
    assert_eq!(q.poll(), IoEvents::OUT);
}

#[test]
fn test_chain_delivery_respects_mask() {
    let q = PollQueue::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits2 = hits.clone();
    let chain = PollChain::new(IoEvents::IN, move |_, ev| {
        assert_eq!(ev, IoEvents::IN);
        hits2.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(q.register(&chain), IoEvents::empty());

    // OUT does not intersect the mask.
    q.set(IoEvents::OUT);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    q.set(IoEvents::IN);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Asserting a superset delivers only the intersecting bits.
    q.set(IoEvents::IN | IoEvents::OUT);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_register_returns_active_events() {
    let q = PollQueue::new();
    q.set(IoEvents::IN | IoEvents::HUP);

    let chain = PollChain::new(IoEvents::IN, |_, _| {});
    assert_eq!(q.register(&chain), IoEvents::IN | IoEvents::HUP);
}

#[test]
fn test_chain_self_disarm() {
    // A chain zeroing its own mask in the callback sees exactly one delivery.
    let q = PollQueue::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits2 = hits.clone();
    let chain = PollChain::new(IoEvents::IN, move |me, _| {
        me.set_mask(IoEvents::empty());
        hits2.fetch_add(1, Ordering::SeqCst);
    });
    q.register(&chain);

    q.set(IoEvents::IN);
    q.set(IoEvents::IN);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Re-arming restores delivery.
    q.reregister(&chain, IoEvents::IN);
    q.set(IoEvents::IN);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unregister_stops_delivery() {
    let q = PollQueue::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits2 = hits.clone();
    let chain = PollChain::new(IoEvents::IN, move |_, _| {
        hits2.fetch_add(1, Ordering::SeqCst);
    });
    q.register(&chain);
    assert!(q.unregister(&chain));
    assert!(!q.unregister(&chain));

    q.set(IoEvents::IN);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_wait_ready_immediately() {
    let q = PollQueue::new();
    q.set(IoEvents::IN);
    assert!(q.wait_until(IoEvents::IN, 0));
}

#[test]
fn test_wait_timeout_elapses() {
    let q = PollQueue::new();
    let start = monotonic_time_nanos();
    let woke = q.wait_until(IoEvents::IN, start + 30 * NS_MS);
    assert!(!woke);
    assert!(monotonic_time_nanos() - start >= 30 * NS_MS);
}

#[test]
fn test_wait_woken_cross_thread() {
    let q = Arc::new(PollQueue::new());

    let q2 = q.clone();
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        q2.set(IoEvents::IN);
    });

    assert!(q.wait_until(IoEvents::IN, 0));
    producer.join().unwrap();
}

#[test]
fn test_wake_all_releases_every_waiter() {
    let q = Arc::new(PollQueue::new());

    let handles: std::vec::Vec<_> = (0..2)
        .map(|_| {
            let q = q.clone();
            thread::spawn(move || q.wait_until(IoEvents::IN, 0))
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    q.set_n(IoEvents::IN, NOTIFY_ALL);
    for h in handles {
        assert!(h.join().unwrap());
    }
}

#[test]
fn test_wake_one_leaves_other_blocked() {
    let q = Arc::new(PollQueue::new());
    let done = Arc::new(AtomicUsize::new(0));

    let handles: std::vec::Vec<_> = (0..2)
        .map(|_| {
            let q = q.clone();
            let done = done.clone();
            thread::spawn(move || {
                // Waiters consume the event word so a single set_n(.., 1)
                // releases exactly one of them.
                if q.wait_until(IoEvents::IN, 0) {
                    q.clear(IoEvents::IN);
                    done.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    q.set_n(IoEvents::IN, 1);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(done.load(Ordering::SeqCst), 1);

    q.set_n(IoEvents::IN, 1);
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(done.load(Ordering::SeqCst), 2);
}
