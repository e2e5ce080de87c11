// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use khal::time::monotonic_time_nanos;

use crate::IoEvents;

/// One blocked `wait_until` caller.
///
/// Hosted builds park the calling thread; freestanding builds spin on the
/// wake flag against the monotonic clock.
pub(crate) struct Waiter {
    mask: u32,
    woken: AtomicBool,
    #[cfg(feature = "std")]
    thread: std::thread::Thread,
}

impl Waiter {
    pub(crate) fn current(mask: IoEvents) -> Arc<Self> {
        Arc::new(Self {
            mask: mask.bits(),
            woken: AtomicBool::new(false),
            #[cfg(feature = "std")]
            thread: std::thread::current(),
        })
    }

    pub(crate) fn mask(&self) -> IoEvents {
        IoEvents::from_bits_truncate(self.mask)
    }

    pub(crate) fn wake(&self) {
        self.woken.store(true, Ordering::Release);
        #[cfg(feature = "std")]
        self.thread.unpark();
    }

    /// Blocks until woken or the deadline passes. `deadline == 0` blocks
    /// indefinitely. Returns whether the waiter was woken.
    #[cfg(feature = "std")]
    pub(crate) fn block_until(&self, deadline: u64) -> bool {
        loop {
            if self.woken.load(Ordering::Acquire) {
                return true;
            }
            if deadline == 0 {
                std::thread::park();
            } else {
                let now = monotonic_time_nanos();
                if now >= deadline {
                    return self.woken.load(Ordering::Acquire);
                }
                std::thread::park_timeout(core::time::Duration::from_nanos(deadline - now));
            }
        }
    }

    /// Blocks until woken or the deadline passes. `deadline == 0` blocks
    /// indefinitely. Returns whether the waiter was woken.
    #[cfg(not(feature = "std"))]
    pub(crate) fn block_until(&self, deadline: u64) -> bool {
        loop {
            if self.woken.load(Ordering::Acquire) {
                return true;
            }
            if deadline != 0 && monotonic_time_nanos() >= deadline {
                return self.woken.load(Ordering::Acquire);
            }
            core::hint::spin_loop();
        }
    }
}
