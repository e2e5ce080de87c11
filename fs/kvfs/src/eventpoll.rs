// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use alloc::{boxed::Box, sync::Arc};
use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use kpoll::IoEvents;
use spin::Mutex;

type SinkFn = dyn Fn(IoEvents) + Send + Sync;
type EvictFn = dyn Fn() + Send + Sync;
type UnregisterFn = dyn Fn(&EventpollCb) + Send + Sync;

/// Callback control block connecting a legacy driver to one subscriber.
///
/// The subscriber creates the block with its interest mask, a `sink`
/// receiving masked event pushes, and an `evict` closure run when the
/// watched file closes underneath the subscription. The driver may install
/// an [`EventpollCb::on_unregister`] hook to unlink the block from its own
/// list when the subscription is torn down.
pub struct EventpollCb {
    mask: AtomicU32,
    sink: Box<SinkFn>,
    evict: Box<EvictFn>,
    unregister: Mutex<Option<Box<UnregisterFn>>>,
}

impl EventpollCb {
    /// Creates a control block with the given interest mask.
    pub fn new<S, E>(mask: IoEvents, sink: S, evict: E) -> Arc<Self>
    where
        S: Fn(IoEvents) + Send + Sync + 'static,
        E: Fn() + Send + Sync + 'static,
    {
        Arc::new(Self {
            mask: AtomicU32::new(mask.bits()),
            sink: Box::new(sink),
            evict: Box::new(evict),
            unregister: Mutex::new(None),
        })
    }

    /// Current interest mask.
    pub fn mask(&self) -> IoEvents {
        IoEvents::from_bits_truncate(self.mask.load(Ordering::Acquire))
    }

    /// Replaces the interest mask. A zero mask disarms delivery until the
    /// subscriber re-arms it.
    pub fn set_mask(&self, mask: IoEvents) {
        self.mask.store(mask.bits(), Ordering::Release);
    }

    /// Installs the driver's teardown hook. Drivers use this to drop the
    /// block from their signal list when the subscription goes away.
    pub fn on_unregister<F>(&self, hook: F)
    where
        F: Fn(&EventpollCb) + Send + Sync + 'static,
    {
        *self.unregister.lock() = Some(Box::new(hook));
    }

    /// Tears the subscription down from the subscriber side: runs and
    /// consumes the driver hook, if any.
    pub fn unregister(&self) {
        let hook = self.unregister.lock().take();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    pub(crate) fn signal(&self, revents: IoEvents) {
        let hit = revents & self.mask();
        if !hit.is_empty() {
            (self.sink)(hit);
        }
    }

    pub(crate) fn evict(&self) {
        (self.evict)();
    }
}

impl fmt::Debug for EventpollCb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventpollCb").field("mask", &self.mask()).finish()
    }
}

/// Driver entry point: push level-triggered events to one subscriber.
///
/// Events are masked against the block's interest mask before delivery;
/// a fully-masked push is dropped here.
pub fn eventpoll_signal(cb: &Arc<EventpollCb>, revents: IoEvents) {
    cb.signal(revents);
}
