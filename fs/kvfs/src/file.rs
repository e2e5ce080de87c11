// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use alloc::{sync::Arc, vec::Vec};
use core::fmt;

use kerrno::KResult;
use kpoll::IoEvents;
use spin::Mutex;

use crate::EventpollCb;

/// Poll interface implemented by legacy drivers.
pub trait Vnode: Send + Sync {
    /// Returns the currently-asserted events and records `cb` for later
    /// [`eventpoll_signal`](crate::eventpoll_signal) pushes.
    ///
    /// Repeated polls with a block the driver already holds must not
    /// duplicate it.
    fn poll(&self, cb: &Arc<EventpollCb>) -> KResult<IoEvents>;
}

/// A legacy open file: a vnode plus the list of epoll watchers attached
/// to it.
pub struct VfsFile {
    vnode: Arc<dyn Vnode>,
    /// Watchers to evict when this file closes.
    f_ep: Mutex<Vec<Arc<EventpollCb>>>,
}

impl VfsFile {
    pub fn new(vnode: Arc<dyn Vnode>) -> Arc<Self> {
        Arc::new(Self {
            vnode,
            f_ep: Mutex::new(Vec::new()),
        })
    }

    /// The driver behind this file.
    pub fn vnode(&self) -> &Arc<dyn Vnode> {
        &self.vnode
    }

    /// Polls the driver, handing it the watcher's control block.
    pub fn poll(&self, cb: &Arc<EventpollCb>) -> KResult<IoEvents> {
        self.vnode.poll(cb)
    }

    /// Attaches a watcher for close-time eviction. Re-attaching a block
    /// already on the list is a no-op, so re-registration through
    /// [`Vnode::poll`] stays idempotent.
    pub fn attach_watcher(&self, cb: Arc<EventpollCb>) {
        let mut f_ep = self.f_ep.lock();
        if !f_ep.iter().any(|c| Arc::ptr_eq(c, &cb)) {
            f_ep.push(cb);
        }
    }

    /// Detaches a watcher. A block already drained by
    /// [`eventpoll_notify_close`] is silently absent.
    pub fn detach_watcher(&self, cb: &Arc<EventpollCb>) {
        self.f_ep.lock().retain(|c| !Arc::ptr_eq(c, cb));
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.f_ep.lock().len()
    }
}

impl fmt::Debug for VfsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VfsFile")
            .field("watchers", &self.f_ep.lock().len())
            .finish()
    }
}

/// File-layer entry point: a watched legacy file is being closed.
///
/// Drains the watcher list first, then runs each eviction outside the list
/// lock; an eviction re-enters the file through
/// [`VfsFile::detach_watcher`], which must not deadlock against us.
pub fn eventpoll_notify_close(file: &VfsFile) {
    let watchers: Vec<Arc<EventpollCb>> = core::mem::take(&mut *file.f_ep.lock());
    if !watchers.is_empty() {
        debug!("eventpoll_notify_close: evicting {} watcher(s)", watchers.len());
    }
    for cb in watchers {
        cb.evict();
    }
}
