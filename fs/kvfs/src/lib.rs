// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Legacy vnode-backed files and their event delivery path.
//!
//! Legacy drivers do not own a pollqueue. Instead, a subscriber hands the
//! driver an [`EventpollCb`] control block through [`Vnode::poll`]; the
//! driver keeps it on its own list and pushes level-triggered updates with
//! [`eventpoll_signal`]. When a watched file is closed, the file layer
//! calls [`eventpoll_notify_close`], which evicts every attached watcher.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[macro_use]
extern crate log;

mod eventpoll;
mod file;


pub use eventpoll::{eventpoll_signal, EventpollCb};
pub use file::{eventpoll_notify_close, VfsFile, Vnode};
