// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Pollqueue: the kernel's readiness-notification primitive.
//!
//! Every pollable object owns a [`PollQueue`] holding:
//! - an atomic word of currently-asserted [`IoEvents`] (level state);
//! - a list of registered [`PollChain`] subscriptions, called back when
//!   events are asserted;
//! - a list of blocked waiters with monotonic deadlines.
//!
//! Producers assert events with [`PollQueue::set`] / [`PollQueue::set_n`]
//! and retract level state with [`PollQueue::clear`]. Consumers either
//! block via [`PollQueue::wait_until`] or subscribe a chain and get called
//! back under the queue lock.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod events;
mod queue;
mod wait;

mod tests;

pub use events::IoEvents;
pub use queue::{PollChain, PollQueue, Pollable, NOTIFY_ALL};
