//! Epoll syscalls.
//!
//! This module implements epoll I/O multiplexing operations including:
//! - Epoll instance creation (epoll_create, epoll_create1)
//! - Epoll event management (epoll_ctl)
//! - Event waiting (epoll_wait, epoll_pwait, epoll_pwait2)
//!
//! Event buffers and timespecs arrive as raw pointers with the kernel ABI
//! layouts from `linux_raw_sys`; everything behind the pointer checks is
//! typed.

use alloc::vec;
use core::{ffi::c_void, slice};

use bitflags::bitflags;
use kerrno::{KError, KResult};
use kpoll::IoEvents;
use linux_raw_sys::general::{
    epoll_event, timespec, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD,
};

use crate::{
    fdtab::{self, ShimFile},
    file::{Epoll, EpollEvent, EpollFlags},
    time::{deadline_after, deadline_after_ms, timespec_to_nanos},
};

bitflags! {
    /// Flags for the `epoll_create` syscall.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct EpollCreateFlags: u32 {
        const CLOEXEC = EPOLL_CLOEXEC;
    }
}

/// Create an epoll instance. The size argument is vestigial and only
/// checked for positivity.
pub fn sys_epoll_create(size: i32) -> KResult<isize> {
    debug!("sys_epoll_create <= size: {size}");
    if size <= 0 {
        return Err(KError::InvalidInput);
    }
    do_epoll_create(EpollCreateFlags::empty())
}

/// Create an epoll instance for efficient I/O event multiplexing
pub fn sys_epoll_create1(flags: u32) -> KResult<isize> {
    let flags = EpollCreateFlags::from_bits(flags).ok_or(KError::InvalidInput)?;
    debug!("sys_epoll_create1 <= flags: {flags:?}");
    do_epoll_create(flags)
}

fn do_epoll_create(flags: EpollCreateFlags) -> KResult<isize> {
    let epoll = Epoll::new();
    fdtab::install(
        ShimFile::Modern(epoll),
        flags.contains(EpollCreateFlags::CLOEXEC),
    )
    .map(|fd| fd as isize)
}

/// Control the epoll instance: add, modify, or delete event subscriptions
pub fn sys_epoll_ctl(epfd: i32, op: u32, fd: i32, event: *const epoll_event) -> KResult<isize> {
    let epoll = Epoll::from_fd(epfd)?;
    debug!("sys_epoll_ctl <= epfd: {epfd}, op: {op}, fd: {fd}");

    if fd == epfd {
        // Subscribing an instance to itself would recurse into its own
        // notification queue.
        return Err(KError::InvalidInput);
    }
    let file = fdtab::get(fd)?;

    let parse_event = || -> KResult<(EpollEvent, EpollFlags)> {
        if event.is_null() {
            return Err(KError::BadAddress);
        }
        // The x86-64 ABI packs epoll_event.
        let raw = unsafe { event.read_unaligned() };
        Ok((
            EpollEvent {
                events: IoEvents::from_bits_truncate(raw.events),
                user_data: raw.data,
            },
            EpollFlags::from_bits_truncate(raw.events),
        ))
    };
    match op {
        EPOLL_CTL_ADD => {
            let (event, flags) = parse_event()?;
            epoll.add(fd, file, event, flags)?;
        }
        EPOLL_CTL_MOD => {
            let (event, flags) = parse_event()?;
            epoll.modify(fd, event, flags)?;
        }
        EPOLL_CTL_DEL => {
            epoll.delete(fd)?;
        }
        _ => return Err(KError::InvalidInput),
    }
    Ok(0)
}

/// Wait for events on the epoll instance until an absolute monotonic
/// deadline (0 = no deadline).
fn do_epoll_wait(
    epfd: i32,
    events: *mut epoll_event,
    maxevents: i32,
    deadline: u64,
    sigmask: *const c_void,
) -> KResult<isize> {
    let epoll = Epoll::from_fd(epfd)?;
    debug!("sys_epoll_wait <= epfd: {epfd}, maxevents: {maxevents}, deadline: {deadline}");

    if events.is_null() {
        return Err(KError::BadAddress);
    }
    if maxevents <= 0 {
        return Err(KError::InvalidInput);
    }
    if !sigmask.is_null() {
        warn!("epoll_pwait: no sigmask support");
        return Err(KError::Unsupported);
    }

    let mut buf = vec![
        EpollEvent {
            events: IoEvents::empty(),
            user_data: 0,
        };
        maxevents as usize
    ];
    let nout = epoll.wait(&mut buf, deadline)?;

    let out = unsafe { slice::from_raw_parts_mut(events, nout) };
    for (dst, src) in out.iter_mut().zip(&buf[..nout]) {
        *dst = epoll_event {
            events: src.events.bits(),
            data: src.user_data,
        };
    }
    Ok(nout as isize)
}

/// Wait for events with millisecond timeout
pub fn sys_epoll_wait(
    epfd: i32,
    events: *mut epoll_event,
    maxevents: i32,
    timeout: i32,
) -> KResult<isize> {
    do_epoll_wait(
        epfd,
        events,
        maxevents,
        deadline_after_ms(timeout),
        core::ptr::null(),
    )
}

/// Wait for events with millisecond timeout and signal masking
pub fn sys_epoll_pwait(
    epfd: i32,
    events: *mut epoll_event,
    maxevents: i32,
    timeout: i32,
    sigmask: *const c_void,
    _sigsetsize: usize,
) -> KResult<isize> {
    do_epoll_wait(epfd, events, maxevents, deadline_after_ms(timeout), sigmask)
}

/// Wait for events with high-precision timeout and signal masking
pub fn sys_epoll_pwait2(
    epfd: i32,
    events: *mut epoll_event,
    maxevents: i32,
    timeout: *const timespec,
    sigmask: *const c_void,
    _sigsetsize: usize,
) -> KResult<isize> {
    let timeout = if timeout.is_null() {
        None
    } else {
        let ts = unsafe { timeout.read_unaligned() };
        Some(timespec_to_nanos(&ts)?)
    };
    do_epoll_wait(epfd, events, maxevents, deadline_after(timeout), sigmask)
}
