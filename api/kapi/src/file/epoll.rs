//! The epoll kernel object.
//!
//! An [`Epoll`] owns an interest list of [`EpollEntry`] subscriptions and
//! a pollqueue of its own whose `IN` bit is the instance's readiness
//! signal. Watched files feed entries through one of two backends:
//!
//! - modern files: a [`PollChain`] registered in the file's pollqueue,
//!   called back on every event assertion;
//! - legacy files: an [`EventpollCb`] control block handed to the vnode
//!   driver, which pushes level updates via `eventpoll_signal`.
//!
//! Both backends converge on [`EpollEntry::notify`]: OR the delivered
//! bits into the entry's pending word and raise the readiness bit. The
//! notification path never takes the epoll lock; the control plane holds
//! it exclusively, wait-loop scans hold it shared.

use alloc::{
    borrow::Cow,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{
    any::Any,
    sync::atomic::{AtomicU32, Ordering},
};

use bitflags::bitflags;
use kerrno::{KError, KResult};
use kpoll::{IoEvents, PollChain, PollQueue, Pollable, NOTIFY_ALL};
use kvfs::{EventpollCb, VfsFile};
use spin::{Mutex, RwLock};

use crate::{fdtab::ShimFile, file::FileLike};

bitflags! {
    /// Subscription option bits carried in the upper part of
    /// `epoll_event.events`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EpollFlags: u32 {
        /// Wake only one of the epolls sharing a source. Recorded, not
        /// acted upon.
        const EXCLUSIVE = 1 << 28;
        /// Keep the system awake while events are pending. Recorded, not
        /// acted upon.
        const WAKEUP = 1 << 29;
        /// Disarm the entry after one delivery until re-armed via MOD.
        const ONESHOT = 1 << 30;
        /// Edge-triggered delivery.
        const ET = 1 << 31;
    }
}

/// One subscription as supplied by user code: interest mask plus opaque
/// user data returned verbatim with every report.
#[derive(Debug, Clone, Copy)]
pub struct EpollEvent {
    pub events: IoEvents,
    pub user_data: u64,
}

/// Interest bits an entry actually subscribes to: the standard events of
/// the user mask plus the unmaskable conditions.
fn events2mask(events: IoEvents) -> IoEvents {
    const STANDARD: IoEvents = IoEvents::IN
        .union(IoEvents::OUT)
        .union(IoEvents::RDHUP)
        .union(IoEvents::PRI)
        .union(IoEvents::ALWAYS);
    (events & STANDARD) | IoEvents::ALWAYS
}

enum Backend {
    Modern {
        file: Weak<dyn FileLike>,
        chain: Arc<PollChain>,
    },
    Legacy {
        file: Weak<VfsFile>,
        cb: Arc<EventpollCb>,
    },
}

/// One (epoll, watched fd) subscription.
struct EpollEntry {
    fd: i32,
    /// User mask and data word; mutated only under the epoll write lock.
    event: Mutex<EpollEvent>,
    /// Option bits, readable from notification context without the epoll
    /// lock.
    opts: AtomicU32,
    /// Events delivered but not yet reported.
    pending: AtomicU32,
    /// The owning epoll's readiness queue.
    ready_q: Arc<PollQueue>,
    backend: Backend,
}

impl EpollEntry {
    fn flags(&self) -> EpollFlags {
        EpollFlags::from_bits_truncate(self.opts.load(Ordering::Acquire))
    }

    fn is_edge(&self) -> bool {
        self.flags().contains(EpollFlags::ET)
    }

    fn is_oneshot(&self) -> bool {
        self.flags().contains(EpollFlags::ONESHOT)
    }

    fn push_pending(&self, ev: IoEvents) {
        self.pending.fetch_or(ev.bits(), Ordering::AcqRel);
    }

    fn take_pending(&self) -> IoEvents {
        IoEvents::from_bits_truncate(self.pending.swap(0, Ordering::AcqRel))
    }

    /// Notification path shared by both backends: record the events and
    /// raise the readiness bit, waking one waiter for edge-triggered
    /// entries and all waiters otherwise.
    fn notify(&self, ev: IoEvents) {
        self.push_pending(ev);
        let nwake = if self.is_edge() { 1 } else { NOTIFY_ALL };
        self.ready_q.set_n(IoEvents::IN, nwake);
    }

    /// Zeroes the backend delivery mask so no further events arrive until
    /// MOD re-arms the entry.
    fn disarm(&self) {
        match &self.backend {
            Backend::Modern { chain, .. } => chain.set_mask(IoEvents::empty()),
            Backend::Legacy { cb, .. } => cb.set_mask(IoEvents::empty()),
        }
    }

    /// Re-reads the watched file's current readiness, masked to this
    /// entry's interest. Used by the level-triggered re-verification step.
    fn poll_live(&self, mask: IoEvents) -> IoEvents {
        match &self.backend {
            Backend::Modern { file, .. } => file
                .upgrade()
                .and_then(|f| f.pollable().map(|p| p.poll()))
                .unwrap_or(IoEvents::empty())
                & mask,
            Backend::Legacy { file, cb } => match file.upgrade() {
                Some(vf) => match vf.poll(cb) {
                    Ok(ev) => ev & mask,
                    // A driver that fails the re-poll still owes the user
                    // an answer; ERR is always in the mask.
                    Err(_) => IoEvents::ERR,
                },
                None => IoEvents::empty(),
            },
        }
    }

    /// Detaches the subscription from the watched file. After this
    /// returns no further notification for the entry is possible.
    fn unregister(&self) {
        match &self.backend {
            Backend::Modern { file, chain } => {
                if let Some(f) = file.upgrade() {
                    if let Some(p) = f.pollable() {
                        p.poll_queue().unregister(chain);
                    }
                }
            }
            Backend::Legacy { file, cb } => {
                cb.unregister();
                if let Some(vf) = file.upgrade() {
                    vf.detach_watcher(cb);
                }
            }
        }
    }
}

/// An epoll instance.
pub struct Epoll {
    /// Interest list in insertion order, which is also scan order.
    interest: RwLock<Vec<Arc<EpollEntry>>>,
    /// The instance's own pollqueue: `IN` is the readiness bit, waiters
    /// are blocked `wait` callers, chains are outer epolls watching us.
    pollq: Arc<PollQueue>,
    /// Back-reference handed to legacy eviction closures.
    myself: Weak<Epoll>,
}

impl Epoll {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            interest: RwLock::new(Vec::new()),
            pollq: Arc::new(PollQueue::new()),
            myself: me.clone(),
        })
    }

    /// Recovers an epoll instance from a descriptor, failing with
    /// `InvalidInput` if the fd refers to anything else.
    pub fn from_fd(epfd: i32) -> KResult<Arc<Self>> {
        match crate::fdtab::get(epfd)? {
            ShimFile::Modern(f) => f
                .as_any_arc()
                .downcast::<Epoll>()
                .map_err(|_| KError::InvalidInput),
            ShimFile::Legacy(_) => Err(KError::InvalidInput),
        }
    }

    /// Non-blocking readiness check of the instance itself, for outer
    /// `poll`/`select`.
    pub fn poll_immediate(&self, mask: IoEvents) -> IoEvents {
        self.pollq.poll_masked(mask)
    }

    /// EPOLL_CTL_ADD: subscribe `fd`.
    pub fn add(&self, fd: i32, file: ShimFile, event: EpollEvent, flags: EpollFlags) -> KResult {
        let mut interest = self.interest.write();
        if interest.iter().any(|e| e.fd == fd) {
            return Err(KError::AlreadyExists);
        }
        let entry = match file {
            ShimFile::Modern(f) => self.new_modern_entry(fd, &f, event, flags)?,
            ShimFile::Legacy(vf) => self.new_legacy_entry(fd, &vf, event, flags),
        };
        interest.push(entry);
        Ok(())
    }

    /// EPOLL_CTL_MOD: replace the mask and data of an existing entry and
    /// re-arm its backend.
    pub fn modify(&self, fd: i32, event: EpollEvent, flags: EpollFlags) -> KResult {
        let interest = self.interest.write();
        let entry = interest
            .iter()
            .find(|e| e.fd == fd)
            .ok_or(KError::NotFound)?;

        let mask = events2mask(event.events);
        entry.opts.store(flags.bits(), Ordering::Release);
        match &entry.backend {
            Backend::Modern { file, chain } => {
                match file.upgrade() {
                    Some(f) => match f.pollable() {
                        Some(p) => p.poll_queue().reregister(chain, mask),
                        None => chain.set_mask(mask),
                    },
                    None => chain.set_mask(mask),
                }
                entry.pending.store(0, Ordering::Release);
                *entry.event.lock() = event;
            }
            Backend::Legacy { file, cb } => {
                entry.pending.store(0, Ordering::Release);
                cb.set_mask(mask);
                *entry.event.lock() = event;
                if let Some(vf) = file.upgrade() {
                    self.legacy_poll_register(&vf, entry, cb);
                }
            }
        }
        Ok(())
    }

    /// EPOLL_CTL_DEL: unlink and unregister an entry.
    pub fn delete(&self, fd: i32) -> KResult {
        let mut interest = self.interest.write();
        let pos = interest
            .iter()
            .position(|e| e.fd == fd)
            .ok_or(KError::NotFound)?;
        let entry = interest.remove(pos);
        entry.unregister();
        Ok(())
    }

    /// Blocks until at least one entry reports, the deadline passes, or
    /// `out` fills up. `deadline` is absolute monotonic nanoseconds with
    /// `0` meaning no deadline. Returns the number of reports written.
    pub fn wait(&self, out: &mut [EpollEvent], deadline: u64) -> KResult<usize> {
        if out.is_empty() {
            return Err(KError::InvalidInput);
        }
        while self.pollq.wait_until(IoEvents::IN, deadline) {
            // Consume the readiness bit before scanning: notifications
            // arriving mid-scan re-set it.
            self.pollq.clear(IoEvents::IN);

            let interest = self.interest.read();
            let mut nout = 0;
            let mut level_remains = false;
            let mut truncated = false;
            for entry in interest.iter() {
                if nout == out.len() {
                    truncated = true;
                    break;
                }
                let mut revents = entry.take_pending();
                if revents.is_empty() {
                    continue;
                }
                let (interest_mask, user_data) = {
                    let ev = entry.event.lock();
                    (ev.events, ev.user_data)
                };
                if entry.is_oneshot() {
                    // One delivery, then silence until MOD re-arms.
                    // Covers registration-time deliveries that bypassed
                    // the backend callback's own disarm.
                    entry.disarm();
                } else if !entry.is_edge() {
                    // Level-triggered: re-verify against the file itself
                    // so delivery does not depend on the backend
                    // re-asserting the same condition.
                    revents = entry.poll_live(events2mask(interest_mask));
                    if revents.is_empty() {
                        continue;
                    }
                    level_remains = true;
                    entry.push_pending(revents);
                }
                out[nout] = EpollEvent {
                    events: revents,
                    user_data,
                };
                nout += 1;
            }
            drop(interest);

            // Entries still pending (level condition held, or unscanned
            // past the maxevents cut) must be seen by the next waiter.
            if level_remains || truncated {
                self.pollq.set(IoEvents::IN);
            }
            if nout > 0 {
                return Ok(nout);
            }
            // Spurious wakeup: all pending events evaporated on
            // re-verification. Go back to sleep.
        }
        Ok(0)
    }

    fn new_modern_entry(
        &self,
        fd: i32,
        f: &Arc<dyn FileLike>,
        event: EpollEvent,
        flags: EpollFlags,
    ) -> KResult<Arc<EpollEntry>> {
        let pollable = f.pollable().ok_or(KError::InvalidInput)?;
        let mask = events2mask(event.events);

        let entry = Arc::new_cyclic(|me: &Weak<EpollEntry>| {
            let me = me.clone();
            let chain = PollChain::new(mask, move |chain, ev| {
                let Some(entry) = me.upgrade() else { return };
                entry.notify(ev);
                if entry.is_oneshot() {
                    chain.set_mask(IoEvents::empty());
                }
            });
            EpollEntry {
                fd,
                event: Mutex::new(event),
                opts: AtomicU32::new(flags.bits()),
                pending: AtomicU32::new(0),
                ready_q: self.pollq.clone(),
                backend: Backend::Modern {
                    file: Arc::downgrade(f),
                    chain,
                },
            }
        });

        // Fold in events already asserted at registration time so ADD
        // never misses a pre-existing ready condition.
        let Backend::Modern { chain, .. } = &entry.backend else {
            unreachable!()
        };
        let active = pollable.poll_queue().register(chain) & mask;
        if !active.is_empty() {
            entry.push_pending(active);
            let nwake = if flags.contains(EpollFlags::ET) { 1 } else { NOTIFY_ALL };
            self.pollq.set_n(IoEvents::IN, nwake);
        }
        Ok(entry)
    }

    fn new_legacy_entry(
        &self,
        fd: i32,
        vf: &Arc<VfsFile>,
        event: EpollEvent,
        flags: EpollFlags,
    ) -> Arc<EpollEntry> {
        let mask = events2mask(event.events);
        let weak_ep = self.myself.clone();

        let entry = Arc::new_cyclic(|me: &Weak<EpollEntry>| {
            let sink_entry = me.clone();
            let cb = EventpollCb::new(
                mask,
                move |ev| {
                    if let Some(entry) = sink_entry.upgrade() {
                        entry.notify(ev);
                    }
                },
                // Push-eviction: the watched file is closing underneath
                // us, so drop the whole entry from the interest list.
                move || {
                    if let Some(ep) = weak_ep.upgrade() {
                        let _ = ep.delete(fd);
                    }
                },
            );
            EpollEntry {
                fd,
                event: Mutex::new(event),
                opts: AtomicU32::new(flags.bits()),
                pending: AtomicU32::new(0),
                ready_q: self.pollq.clone(),
                backend: Backend::Legacy {
                    file: Arc::downgrade(vf),
                    cb,
                },
            }
        });

        let Backend::Legacy { cb, .. } = &entry.backend else {
            unreachable!()
        };
        self.legacy_poll_register(vf, &entry, cb);
        entry
    }

    /// Polls the legacy driver and wires the entry into the file's
    /// watcher list. A driver failure does not fail the control-plane op;
    /// the entry is armed with `ERR` so the user observes it via `wait`.
    fn legacy_poll_register(&self, vf: &Arc<VfsFile>, entry: &EpollEntry, cb: &Arc<EventpollCb>) {
        match vf.poll(cb) {
            Ok(ev) => {
                vf.attach_watcher(cb.clone());
                let active = ev & cb.mask();
                if !active.is_empty() {
                    entry.push_pending(active);
                    self.pollq.set(IoEvents::IN);
                }
            }
            Err(err) => {
                warn!("legacy poll registration failed: {err}");
                entry.push_pending(IoEvents::ERR);
                self.pollq.set(IoEvents::IN);
            }
        }
    }

    #[cfg(test)]
    fn interest_len(&self) -> usize {
        self.interest.read().len()
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        // Instance release: every subscription must leave its watched
        // file before the entries go away.
        let entries = core::mem::take(self.interest.get_mut());
        for entry in entries {
            entry.unregister();
        }
    }
}

impl Pollable for Epoll {
    fn poll_queue(&self) -> &PollQueue {
        &self.pollq
    }
}

impl FileLike for Epoll {
    fn pollable(&self) -> Option<&dyn Pollable> {
        Some(self)
    }

    fn path(&self) -> Cow<'_, str> {
        "anon_inode:[eventpoll]".into()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests_epoll {
    use super::*;
    use crate::file::Pipe;

    fn event(events: IoEvents, data: u64) -> EpollEvent {
        EpollEvent {
            events,
            user_data: data,
        }
    }

    #[test]
    fn test_add_del_restores_interest_list() {
        let ep = Epoll::new();
        let pipe = Pipe::new();
        assert_eq!(ep.interest_len(), 0);

        ep.add(
            5,
            ShimFile::Modern(pipe.clone()),
            event(IoEvents::IN, 1),
            EpollFlags::empty(),
        )
        .unwrap();
        assert_eq!(ep.interest_len(), 1);
        assert_eq!(
            ep.add(
                5,
                ShimFile::Modern(pipe.clone()),
                event(IoEvents::IN, 2),
                EpollFlags::empty(),
            ),
            Err(KError::AlreadyExists)
        );

        ep.delete(5).unwrap();
        assert_eq!(ep.interest_len(), 0);
        assert_eq!(ep.delete(5), Err(KError::NotFound));
    }

    #[test]
    fn test_release_unregisters_subscriptions() {
        let pipe = Pipe::new();
        let ep = Epoll::new();
        ep.add(
            3,
            ShimFile::Modern(pipe.clone()),
            event(IoEvents::IN, 0),
            EpollFlags::empty(),
        )
        .unwrap();

        let weak = Arc::downgrade(&ep);
        drop(ep);
        // Release tore every subscription down and nothing keeps the
        // instance alive; a fresh assertion hits no dead entry.
        assert!(weak.upgrade().is_none());
        pipe.write(b"x").unwrap();
    }

    #[test]
    fn test_delete_stops_delivery() {
        let ep = Epoll::new();
        let pipe = Pipe::new();
        ep.add(
            9,
            ShimFile::Modern(pipe.clone()),
            event(IoEvents::IN, 0),
            EpollFlags::empty(),
        )
        .unwrap();
        ep.delete(9).unwrap();

        pipe.write(b"x").unwrap();
        assert_eq!(ep.poll_immediate(IoEvents::IN), IoEvents::empty());
    }
}
