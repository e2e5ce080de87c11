// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use spin::Mutex;

use crate::{wait::Waiter, IoEvents};

/// Waiter count meaning "wake every matching waiter".
pub const NOTIFY_ALL: usize = usize::MAX;

type ChainCallback = dyn Fn(&PollChain, IoEvents) + Send + Sync;

/// One subscription registered in a [`PollQueue`].
///
/// The interest mask is atomic so a callback may disarm its own chain in
/// place (one-shot delivery) and subscribers may retarget the mask without
/// unregistering.
pub struct PollChain {
    mask: AtomicU32,
    callback: Box<ChainCallback>,
}

impl PollChain {
    /// Creates a subscription with the given interest mask.
    ///
    /// `callback` runs under the owning queue's lock whenever asserted
    /// events intersect the mask; it receives the chain itself and the
    /// intersecting bits. It must not block and must not re-enter the
    /// queue it is registered on.
    pub fn new<F>(mask: IoEvents, callback: F) -> Arc<Self>
    where
        F: Fn(&PollChain, IoEvents) + Send + Sync + 'static,
    {
        Arc::new(Self {
            mask: AtomicU32::new(mask.bits()),
            callback: Box::new(callback),
        })
    }

    /// Current interest mask.
    pub fn mask(&self) -> IoEvents {
        IoEvents::from_bits_truncate(self.mask.load(Ordering::Acquire))
    }

    /// Replaces the interest mask.
    pub fn set_mask(&self, mask: IoEvents) {
        self.mask.store(mask.bits(), Ordering::Release);
    }
}

impl fmt::Debug for PollChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollChain").field("mask", &self.mask()).finish()
    }
}

/// Readiness-notification queue owned by one pollable object.
pub struct PollQueue {
    /// Currently-asserted events (level state).
    events: AtomicU32,
    /// Registered subscriptions.
    chains: Mutex<Vec<Arc<PollChain>>>,
    /// Blocked `wait_until` callers.
    waiters: Mutex<Vec<Arc<Waiter>>>,
}

impl PollQueue {
    /// Creates an empty queue with no events asserted.
    pub const fn new() -> Self {
        Self {
            events: AtomicU32::new(0),
            chains: Mutex::new(Vec::new()),
            waiters: Mutex::new(Vec::new()),
        }
    }

    /// Non-blocking snapshot of the asserted events.
    pub fn poll(&self) -> IoEvents {
        IoEvents::from_bits_truncate(self.events.load(Ordering::Acquire))
    }

    /// Non-blocking snapshot restricted to `mask`.
    pub fn poll_masked(&self, mask: IoEvents) -> IoEvents {
        self.poll() & mask
    }

    /// Asserts `ev`, waking every matching waiter.
    pub fn set(&self, ev: IoEvents) {
        self.set_n(ev, NOTIFY_ALL);
    }

    /// Asserts `ev`: ORs it into the level state, delivers it to every
    /// chain whose mask intersects, and wakes up to `nwake` matching
    /// waiters.
    pub fn set_n(&self, ev: IoEvents, nwake: usize) {
        if ev.is_empty() {
            return;
        }
        self.events.fetch_or(ev.bits(), Ordering::AcqRel);
        {
            let chains = self.chains.lock();
            for chain in chains.iter() {
                let hit = chain.mask() & ev;
                if !hit.is_empty() {
                    (chain.callback)(chain, hit);
                }
            }
        }
        self.wake_waiters(ev, nwake);
    }

    /// Retracts `ev` from the level state. No notification.
    pub fn clear(&self, ev: IoEvents) {
        self.events.fetch_and(!ev.bits(), Ordering::AcqRel);
    }

    /// Registers a subscription and returns the events asserted at
    /// registration time.
    ///
    /// The snapshot is taken with the chain already in the list, so an
    /// assertion racing with registration is either in the returned value
    /// or delivered through the callback; never lost.
    pub fn register(&self, chain: &Arc<PollChain>) -> IoEvents {
        let mut chains = self.chains.lock();
        chains.push(chain.clone());
        self.poll()
    }

    /// Removes a subscription. Returns whether it was present.
    ///
    /// On return no further callback invocation for this chain is in
    /// progress or will start.
    pub fn unregister(&self, chain: &Arc<PollChain>) -> bool {
        let mut chains = self.chains.lock();
        let before = chains.len();
        chains.retain(|c| !Arc::ptr_eq(c, chain));
        chains.len() != before
    }

    /// Swaps a registered subscription's interest mask in place,
    /// serialized against concurrent delivery.
    pub fn reregister(&self, chain: &Arc<PollChain>, mask: IoEvents) {
        let _chains = self.chains.lock();
        chain.set_mask(mask);
    }

    /// Blocks until an event in `mask` is asserted or the monotonic
    /// `deadline` (nanoseconds) passes. `deadline == 0` waits
    /// indefinitely. Returns `false` on timeout.
    pub fn wait_until(&self, mask: IoEvents, deadline: u64) -> bool {
        loop {
            if !self.poll_masked(mask).is_empty() {
                return true;
            }
            if deadline != 0 && khal::time::monotonic_time_nanos() >= deadline {
                return false;
            }
            let waiter = Waiter::current(mask);
            self.waiters.lock().push(waiter.clone());
            // Recheck after publishing the waiter; an assertion racing
            // with us must observe either the event word or the waiter.
            if !self.poll_masked(mask).is_empty() {
                self.discard_waiter(&waiter);
                return true;
            }
            let woken = waiter.block_until(deadline);
            self.discard_waiter(&waiter);
            if !woken && self.poll_masked(mask).is_empty() {
                return false;
            }
        }
    }

    fn wake_waiters(&self, ev: IoEvents, mut n: usize) {
        if n == 0 {
            return;
        }
        let mut waiters = self.waiters.lock();
        waiters.retain(|w| {
            if n == 0 || (w.mask() & ev).is_empty() {
                return true;
            }
            w.wake();
            n -= 1;
            false
        });
    }

    fn discard_waiter(&self, waiter: &Arc<Waiter>) {
        self.waiters.lock().retain(|w| !Arc::ptr_eq(w, waiter));
    }
}

impl Default for PollQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PollQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollQueue")
            .field("events", &self.poll())
            .finish()
    }
}

/// An object owning a [`PollQueue`].
pub trait Pollable {
    /// The object's notification queue.
    fn poll_queue(&self) -> &PollQueue;

    /// Immediate, non-blocking readiness check.
    fn poll(&self) -> IoEvents {
        self.poll_queue().poll()
    }
}
