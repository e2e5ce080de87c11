// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Time-related operations.
//!
//! All deadlines in the workspace are absolute nanosecond readings of the
//! monotonic clock, with `0` reserved to mean "no deadline".

pub use core::time::Duration;
pub type TimeValue = Duration;

/// Nanoseconds per microsecond.
pub const NS_US: u64 = 1_000;
/// Nanoseconds per millisecond.
pub const NS_MS: u64 = 1_000_000;
/// Nanoseconds per second.
pub const NS_SEC: u64 = 1_000_000_000;
/// Microseconds per second.
pub const US_SEC: u64 = 1_000_000;
/// Milliseconds per second.
pub const MS_SEC: u64 = 1_000;

/// Platform clock source for freestanding builds.
///
/// Hosted (`std`) builds read `std::time::Instant` instead and never call
/// through this interface.
#[crate_interface::def_interface]
pub trait ClockAdapter {
    /// Nanoseconds of monotonic time since an arbitrary epoch.
    fn now_ns() -> u64;
}

/// Current monotonic time in nanoseconds.
pub fn monotonic_time_nanos() -> u64 {
    cfg_if::cfg_if! {
        if #[cfg(feature = "std")] {
            use std::time::Instant;
            static START: spin::Lazy<Instant> = spin::Lazy::new(Instant::now);
            return START.elapsed().as_nanos() as u64;
        } else {
            return crate_interface::call_interface!(ClockAdapter::now_ns);
        }
    }
}

/// Current monotonic time as a [`Duration`].
pub fn monotonic_time() -> TimeValue {
    Duration::from_nanos(monotonic_time_nanos())
}
